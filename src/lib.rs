//! A mail transport for the Mailchimp Transactional (Mandrill) HTTP
//! API: takes a normalized outbound [`Email`], maps it into the
//! provider's request schema, and turns the provider's per-recipient
//! results back into a single send outcome.

pub mod config;
pub mod email;
pub mod error;
pub mod mandrill;
pub mod transport;

pub use email::Email;
pub use error::Error;
pub use transport::{MandrillTransport, SendInfo, Transport, TransportOptions};

/// Transport identity, reported to consumers that track which
/// backend delivered a message.
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
