//! Contact form relay
//!
//! Takes a submission from the site's contact form, checks the required
//! fields and forwards a plain-text email through the configured provider.

mod mailer;
mod service;
mod submission;

pub use mailer::{DeliveryReceipt, EmailProvider, OutgoingEmail, ProviderError, ResendMailer};
pub use service::{ContactError, ContactService, EmailDispatchResult, ErrorCategory};
pub use submission::{ContactSubmission, Interest};

#[cfg(test)]
pub(crate) use service::tests::RecordingProvider;
