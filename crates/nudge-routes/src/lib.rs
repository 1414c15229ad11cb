//! `nudge-routes`: resolves opaque route references to agent sessions.
//!
//! Routes come from two places: a JSON registry file maintained by the
//! control plane and read on every lookup, and static entries in
//! `[[routes.static]]`. The registry file wins when both define a route.

pub mod error;
pub mod registry;
pub mod types;

pub use error::RouteError;
pub use registry::RouteRegistry;
pub use types::{RegistryFile, RouteEntry};
