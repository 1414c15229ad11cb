//! `nudge-core`: configuration, the shared error type, and the collaborator
//! contracts consumed by the scheduler (routing, sessions, messaging relay).

pub mod collab;
pub mod config;
pub mod error;

pub use collab::{MessageRelay, ResolvedRoute, RouteResolver, RouteState, SessionBackend};
pub use config::NudgeConfig;
pub use error::{NudgeError, Result};
