//! "Reach us" contact form.

use tracing::{info, instrument};

use craftmart_core::{ContactTypeId, Email};

use crate::api::cache::{CacheKey, CacheValue};
use crate::api::conversions::convert_contact_type;
use crate::api::endpoints;
use crate::api::types::{ContactRequest, ContactTypeDto};
use crate::api::ApiClient;
use crate::error::{FieldErrors, FormField, Result};
use crate::models::ContactType;

/// Contact form input.
#[derive(Debug, Clone, Default)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub contact_type: Option<ContactTypeId>,
    pub message: String,
    pub captcha_token: String,
}

impl ContactForm {
    fn validate(&self) -> Result<(Email, ContactTypeId)> {
        let mut errors = FieldErrors::new();
        errors.check(self.name.trim().is_empty(), FormField::FirstName, "Name is required");
        let email = Email::parse(&self.email);
        if let Err(e) = &email {
            errors.insert(FormField::Email, e.to_string());
        }
        errors.check(
            self.contact_type.is_none(),
            FormField::ContactType,
            "Choose what your message is about",
        );
        errors.check(
            self.message.trim().is_empty(),
            FormField::Message,
            "Message is required",
        );
        errors.check(
            self.captcha_token.trim().is_empty(),
            FormField::Captcha,
            "Please complete the captcha",
        );

        match (email, self.contact_type) {
            (Ok(email), Some(kind)) if errors.is_empty() => Ok((email, kind)),
            _ => Err(errors.into()),
        }
    }
}

/// Contact form submission over the shared API client.
#[derive(Debug, Clone)]
pub struct Contact {
    api: ApiClient,
}

impl Contact {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Enquiry types for the contact form dropdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the types cannot be fetched.
    #[instrument(skip(self))]
    pub async fn contact_types(&self) -> Result<Vec<ContactType>> {
        if let Some(CacheValue::ContactTypes(types)) =
            self.api.cache().get(&CacheKey::ContactTypes).await
        {
            return Ok(types);
        }

        let dtos: Vec<ContactTypeDto> = self.api.get_data(endpoints::CONTACT_TYPES).await?;
        let types: Vec<ContactType> = dtos.into_iter().map(convert_contact_type).collect();
        self.api
            .cache()
            .insert(CacheKey::ContactTypes, CacheValue::ContactTypes(types.clone()))
            .await;
        Ok(types)
    }

    /// Validate and send the contact form.
    ///
    /// # Errors
    ///
    /// Returns field errors for invalid input, otherwise the server error.
    #[instrument(skip(self, form))]
    pub async fn submit_contact(&self, form: &ContactForm) -> Result<()> {
        let (email, contact_type) = form.validate()?;
        let request = ContactRequest {
            name: form.name.trim(),
            email: email.as_str(),
            phone: form.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()),
            reach_us_type_id: contact_type,
            message: form.message.trim(),
            captcha_token: form.captcha_token.trim(),
        };
        let body = self.api.post(endpoints::CONTACT, &request).await?;
        ApiClient::expect_ack(body)?;
        info!(contact_type = %contact_type, "Contact message sent");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form() -> ContactForm {
        ContactForm {
            name: "Asha".to_string(),
            email: "asha@example.in".to_string(),
            phone: None,
            contact_type: Some(ContactTypeId::new(2)),
            message: "Do you ship block prints abroad?".to_string(),
            captcha_token: "ok".to_string(),
        }
    }

    #[test]
    fn test_valid_form() {
        let (email, kind) = form().validate().unwrap();
        assert_eq!(email.as_str(), "asha@example.in");
        assert_eq!(kind, ContactTypeId::new(2));
    }

    #[test]
    fn test_missing_fields() {
        let err = ContactForm::default().validate().unwrap_err();
        let fields = err.field_errors().unwrap();
        for field in [
            FormField::FirstName,
            FormField::Email,
            FormField::ContactType,
            FormField::Message,
            FormField::Captcha,
        ] {
            assert!(fields.get(field).is_some(), "missing {field}");
        }
    }

    #[test]
    fn test_only_captcha_missing() {
        let err = ContactForm {
            captcha_token: " ".to_string(),
            ..form()
        }
        .validate()
        .unwrap_err();
        let fields = err.field_errors().unwrap();
        assert_eq!(fields.iter().count(), 1);
        assert!(fields.get(FormField::Captcha).is_some());
    }
}
