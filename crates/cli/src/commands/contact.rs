//! Contact form commands.

use clap::Args;

use craftmart_core::ContactTypeId;
use craftmart_storefront::contact::ContactForm;
use craftmart_storefront::state::AppState;

use super::{CliError, emit};
use crate::{ContactAction, views};

/// Fields of the contact form.
#[derive(Args)]
pub struct SendArgs {
    #[arg(long)]
    name: String,

    #[arg(long)]
    email: String,

    #[arg(long)]
    phone: Option<String>,

    /// Enquiry type id (see `craftmart contact types`)
    #[arg(long = "type")]
    contact_type: ContactTypeId,

    #[arg(long)]
    message: String,

    /// reCAPTCHA response token
    #[arg(long)]
    captcha: String,
}

pub async fn run(state: &AppState, action: ContactAction) -> Result<(), CliError> {
    match action {
        ContactAction::Types => {
            let types = state.contact().contact_types().await?;
            emit(&views::contact_types(&types));
        }
        ContactAction::Send(args) => {
            let form = ContactForm {
                name: args.name,
                email: args.email,
                phone: args.phone,
                contact_type: Some(args.contact_type),
                message: args.message,
                captcha_token: args.captcha,
            };
            state.contact().submit_contact(&form).await?;
            emit("Thanks! We will get back to you soon.");
        }
    }
    Ok(())
}
