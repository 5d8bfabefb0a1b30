//! Sign-in and password commands.

use secrecy::SecretString;

use craftmart_storefront::account::{LoginForm, RegisterForm};
use craftmart_storefront::state::AppState;

use super::{CliError, emit};

/// Registration arguments as given on the command line.
pub struct RegisterArgs {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub confirm_password: String,
    pub captcha: String,
}

pub async fn login(
    state: &AppState,
    username: String,
    password: String,
    remember: bool,
) -> Result<(), CliError> {
    let form = LoginForm {
        username,
        password: SecretString::from(password),
        remember,
    };
    state.account().login(&form).await?;
    let count = state.session().cart_count();
    emit(&format!("Signed in. {count} item(s) in your cart."));
    Ok(())
}

pub fn logout(state: &AppState) -> Result<(), CliError> {
    state.account().logout()?;
    emit("Signed out.");
    Ok(())
}

pub async fn register(state: &AppState, args: RegisterArgs) -> Result<(), CliError> {
    let form = RegisterForm {
        first_name: args.first_name,
        last_name: args.last_name,
        email: args.email,
        phone: args.phone,
        password: SecretString::from(args.password),
        confirm_password: SecretString::from(args.confirm_password),
        captcha_token: args.captcha,
    };
    state.account().register(&form).await?;
    emit("Account created. You can sign in now.");
    Ok(())
}

pub async fn forgot_password(state: &AppState, email: &str) -> Result<(), CliError> {
    state.account().request_password_reset(email).await?;
    emit("If that email has an account, a reset link is on its way.");
    Ok(())
}

pub async fn reset_password(
    state: &AppState,
    code: &str,
    password: String,
    confirm: String,
) -> Result<(), CliError> {
    state
        .account()
        .reset_password(
            code,
            &SecretString::from(password),
            &SecretString::from(confirm),
        )
        .await?;
    emit("Password reset. Sign in with your new password.");
    Ok(())
}

pub async fn change_password(
    state: &AppState,
    current: String,
    new: String,
    confirm: String,
) -> Result<(), CliError> {
    state
        .account()
        .update_password(
            &SecretString::from(current),
            &SecretString::from(new),
            &SecretString::from(confirm),
        )
        .await?;
    emit("Password changed.");
    Ok(())
}
