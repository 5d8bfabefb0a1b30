//! Sign-in, registration and password flows.

use std::collections::HashMap;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::{info, instrument, warn};

use craftmart_core::{CustomerId, Email};

use crate::api::endpoints;
use crate::api::types::{
    ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest, TokenData,
    UpdatePasswordRequest,
};
use crate::api::{ApiClient, ApiError};
use crate::cart::CartManager;
use crate::error::{AppError, FieldErrors, FormField, Result};
use crate::events::StoreEvent;
use crate::session::AuthTokens;

/// Minimum password length accepted by the backend.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Login form input.
#[derive(Debug)]
pub struct LoginForm {
    pub username: String,
    pub password: SecretString,
    /// Pre-fill the username next time.
    pub remember: bool,
}

/// Registration form input.
#[derive(Debug)]
pub struct RegisterForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub password: SecretString,
    pub confirm_password: SecretString,
    pub captcha_token: String,
}

/// Validate a new password and its confirmation into `errors`.
fn check_new_password(
    errors: &mut FieldErrors,
    field: FormField,
    password: &SecretString,
    confirm: &SecretString,
) {
    let password = password.expose_secret();
    errors.check(
        password.chars().count() < MIN_PASSWORD_LEN,
        field,
        format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
    );
    errors.check(
        password != confirm.expose_secret(),
        FormField::ConfirmPassword,
        "Passwords do not match",
    );
}

fn is_ten_digit_phone(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.len() == 10 && trimmed.bytes().all(|b| b.is_ascii_digit())
}

impl LoginForm {
    fn validate(&self) -> Result<()> {
        let mut errors = FieldErrors::new();
        errors.check(
            self.username.trim().is_empty(),
            FormField::Username,
            "Username is required",
        );
        errors.check(
            self.password.expose_secret().is_empty(),
            FormField::Password,
            "Password is required",
        );
        errors.into_result()
    }
}

impl RegisterForm {
    fn validate(&self) -> Result<Email> {
        let mut errors = FieldErrors::new();
        errors.check(
            self.first_name.trim().is_empty(),
            FormField::FirstName,
            "First name is required",
        );
        errors.check(
            self.last_name.trim().is_empty(),
            FormField::LastName,
            "Last name is required",
        );
        let email = Email::parse(&self.email);
        if let Err(e) = &email {
            errors.insert(FormField::Email, e.to_string());
        }
        errors.check(
            !is_ten_digit_phone(&self.phone),
            FormField::Phone,
            "Enter a valid 10-digit phone number",
        );
        check_new_password(
            &mut errors,
            FormField::Password,
            &self.password,
            &self.confirm_password,
        );
        errors.check(
            self.captcha_token.trim().is_empty(),
            FormField::Captcha,
            "Please complete the captcha",
        );
        errors.into_result()?;
        email.map_err(|e| FieldErrors::single(FormField::Email, e.to_string()).into())
    }
}

// =============================================================================
// Account
// =============================================================================

/// Account flows for the storefront shopper.
#[derive(Clone)]
pub struct Account {
    inner: Arc<AccountInner>,
}

struct AccountInner {
    api: ApiClient,
    cart: CartManager,
    password_fields: HashMap<i64, FormField>,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("signed_in", &self.inner.api.session().is_authenticated())
            .finish_non_exhaustive()
    }
}

impl Account {
    #[must_use]
    pub fn new(api: ApiClient, cart: CartManager, password_fields: HashMap<i64, FormField>) -> Self {
        Self {
            inner: Arc::new(AccountInner {
                api,
                cart,
                password_fields,
            }),
        }
    }

    /// Username to pre-fill on the login form.
    #[must_use]
    pub fn remembered_user(&self) -> Option<String> {
        self.inner.api.session().remembered_user()
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.inner.api.session().is_authenticated()
    }

    /// Sign in and store the returned tokens.
    ///
    /// # Errors
    ///
    /// Returns field errors for empty input, otherwise the server error.
    #[instrument(skip(self, form), fields(username = %form.username))]
    pub async fn login(&self, form: &LoginForm) -> Result<Option<CustomerId>> {
        form.validate()?;
        let request = LoginRequest {
            username: form.username.trim(),
            password: form.password.expose_secret(),
        };
        let tokens: TokenData = self.inner.api.post_data(endpoints::LOGIN, &request).await?;

        let session = self.inner.api.session();
        session.store_tokens(&AuthTokens {
            access_token: SecretString::from(tokens.access_token),
            refresh_token: tokens.refresh_token.map(SecretString::from),
        })?;
        if let Some(id) = tokens.customer_id {
            session.set_customer_id(id)?;
        }
        session.remember_user(form.remember.then_some(form.username.trim()))?;

        self.inner
            .api
            .events()
            .publish(StoreEvent::AuthChanged { signed_in: true });
        info!(customer_id = ?tokens.customer_id, "Signed in");

        if let Err(e) = self.inner.cart.fetch_cart().await {
            warn!(error = %e, "Cart refresh after sign-in failed");
        }
        Ok(tokens.customer_id)
    }

    /// Create an account. The shopper signs in separately afterwards.
    ///
    /// # Errors
    ///
    /// Returns field errors for invalid input, otherwise the server error.
    #[instrument(skip(self, form))]
    pub async fn register(&self, form: &RegisterForm) -> Result<()> {
        let email = form.validate()?;
        let request = RegisterRequest {
            first_name: form.first_name.trim(),
            last_name: form.last_name.trim(),
            email: email.as_str(),
            phone: form.phone.trim(),
            password: form.password.expose_secret(),
            captcha_token: form.captcha_token.trim(),
        };
        let body = self.inner.api.post(endpoints::REGISTER, &request).await?;
        ApiClient::expect_ack(body)?;
        info!(email = %email, "Account registered");
        Ok(())
    }

    /// Ask the backend to email a reset link.
    ///
    /// # Errors
    ///
    /// Returns a field error for an invalid email, otherwise the server error.
    #[instrument(skip(self))]
    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let email =
            Email::parse(email).map_err(|e| FieldErrors::single(FormField::Email, e.to_string()))?;
        let body = self
            .inner
            .api
            .post(
                endpoints::FORGOT_PASSWORD,
                &ForgotPasswordRequest {
                    email: email.as_str(),
                },
            )
            .await?;
        ApiClient::expect_ack(body)?;
        Ok(())
    }

    /// Set a new password using the code from a reset link.
    ///
    /// # Errors
    ///
    /// Returns field errors for invalid input, otherwise the server error.
    #[instrument(skip_all)]
    pub async fn reset_password(
        &self,
        code: &str,
        password: &SecretString,
        confirm: &SecretString,
    ) -> Result<()> {
        let mut errors = FieldErrors::new();
        errors.check(
            code.trim().is_empty(),
            FormField::Form,
            "This reset link is invalid or has expired",
        );
        check_new_password(&mut errors, FormField::NewPassword, password, confirm);
        errors.into_result()?;

        let request = ResetPasswordRequest {
            new_password: password.expose_secret(),
            confirm_password: confirm.expose_secret(),
        };
        let body = self
            .inner
            .api
            .put(&endpoints::reset_password(code.trim()), &request)
            .await?;
        ApiClient::expect_ack(body)?;
        info!("Password reset");
        Ok(())
    }

    /// Change the signed-in shopper's password.
    ///
    /// Backend error codes listed in the configured code table come back as
    /// an error on the matching field; other codes keep the server message.
    ///
    /// # Errors
    ///
    /// Returns field errors for invalid input or mapped codes, otherwise the
    /// server error.
    #[instrument(skip_all)]
    pub async fn update_password(
        &self,
        current: &SecretString,
        new: &SecretString,
        confirm: &SecretString,
    ) -> Result<()> {
        let customer = self
            .inner
            .api
            .session()
            .customer_id()
            .ok_or(ApiError::AuthRequired)?;

        let mut errors = FieldErrors::new();
        errors.check(
            current.expose_secret().is_empty(),
            FormField::CurrentPassword,
            "Current password is required",
        );
        check_new_password(&mut errors, FormField::NewPassword, new, confirm);
        errors.into_result()?;

        let request = UpdatePasswordRequest {
            current_password: current.expose_secret(),
            new_password: new.expose_secret(),
            confirm_password: confirm.expose_secret(),
        };
        let result = match self
            .inner
            .api
            .put(&endpoints::update_password(customer), &request)
            .await
        {
            Ok(body) => ApiClient::expect_ack(body),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                info!("Password changed");
                Ok(())
            }
            Err(e) => Err(self.map_password_error(e)),
        }
    }

    fn map_password_error(&self, err: ApiError) -> AppError {
        let field = err
            .code()
            .and_then(|code| self.inner.password_fields.get(&code).copied());
        match field {
            Some(field) => {
                let message = err.user_message();
                FieldErrors::single(field, message).into()
            }
            None => err.into(),
        }
    }

    /// Sign out: forget tokens and per-customer caches.
    ///
    /// # Errors
    ///
    /// Returns an error if local storage cannot be written.
    #[instrument(skip(self))]
    pub fn logout(&self) -> Result<()> {
        self.inner.api.session().clear_auth()?;
        self.inner.cart.reset();
        self.inner
            .api
            .events()
            .publish(StoreEvent::AuthChanged { signed_in: false });
        info!("Signed out");
        Ok(())
    }
}
