//! nudge-terminal: tmux-backed agent sessions.
//!
//! Each route is bound to a named tmux session running an interactive agent
//! CLI. A `tmuxMessage` payload is typed into that session and the reply is
//! read back from the pane once the output has settled.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use nudge_core::{config::SessionConfig, SessionBackend};
//! use nudge_terminal::TmuxBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = TmuxBackend::new(SessionConfig::default());
//!     backend.ensure_started("agent-1", Some("/srv/project")).await.unwrap();
//!     let reply = backend
//!         .send_and_receive("agent-1", "status?", std::time::Duration::from_secs(60))
//!         .await
//!         .unwrap();
//!     println!("{reply}");
//! }
//! ```

pub mod backend;
pub mod error;
pub mod reply;
pub mod safety;
pub mod tmux;
pub mod truncate;

pub use backend::TmuxBackend;
pub use error::{Result, TerminalError};
