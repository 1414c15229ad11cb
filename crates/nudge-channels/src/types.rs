use serde::{Deserialize, Serialize};

/// JSON body posted to the gateway for one relayed reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayMessage {
    /// Route reference the reply belongs to; the gateway maps it to a chat.
    pub route: String,
    /// Reply text, already cut to the job's `delivery.maxChars`.
    pub text: String,
}
