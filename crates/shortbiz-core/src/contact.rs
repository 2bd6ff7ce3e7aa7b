//! Contact form.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::auth::require_admin;
use crate::error::{ServiceError, ServiceResult};
use crate::store::{ContactMessage, Store, User};

/// A message submitted through the contact form.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, JsonSchema)]
pub struct ContactForm {
    /// Sender name.
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    /// Sender email.
    #[validate(email)]
    pub email: String,
    /// Optional subject line.
    #[serde(default)]
    #[validate(length(max = 200))]
    pub subject: Option<String>,
    /// Message body.
    #[validate(length(min = 1, max = 5000))]
    pub message: String,
}

/// Store a contact message.
#[tracing::instrument(skip_all, fields(email = %form.email))]
pub fn submit_contact(store: &Store, form: &ContactForm) -> ServiceResult<ContactMessage> {
    form.validate()?;
    if form.name.trim().is_empty() || form.message.trim().is_empty() {
        return Err(ServiceError::Validation(
            "name and message must not be blank".into(),
        ));
    }
    let subject = form.subject.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let msg = store.insert_contact(form.name.trim(), form.email.trim(), subject, form.message.trim())?;
    info!(message_id = msg.id, "contact message received");
    Ok(msg)
}

/// All contact messages, newest first. Admin only.
pub fn list_contact_messages(store: &Store, admin: &User) -> ServiceResult<Vec<ContactMessage>> {
    require_admin(admin)?;
    Ok(store.contact_messages()?)
}
