//! `nudge-channels`: outbound relay of session replies to the messaging
//! gateway that owns the conversation.

pub mod error;
pub mod relay;
pub mod types;

pub use error::RelayError;
pub use relay::{build_relay, DisabledRelay, WebhookRelay};
pub use types::RelayMessage;
