pub mod deliverability;
pub mod transport;

pub use deliverability::{
    AttemptError, DeliverabilityClient, DeliverabilityError, EmailVerifier, MAX_CHECK_ATTEMPTS,
};
pub use transport::{MailApiClient, MailError, MailTransport};
