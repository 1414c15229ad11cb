//! `nudge-scheduler`: persistent wake-up scheduler for agent sessions.
//!
//! # Overview
//!
//! Jobs live in a JSON table (`jobs.json`) replaced atomically on every save;
//! every execution attempt appends one line to `runs.jsonl`. The
//! [`engine::SchedulerEngine`] owns the table, keeps a single wake timer armed
//! for the earliest due job, and hands due jobs one at a time to the
//! [`executor::JobExecutor`], which talks to the routing, session and relay
//! collaborators defined in `nudge-core`. While a daemon runs it holds
//! `daemon.lease` ([`lease::DaemonLease`]), and one-shot writers stand back.
//!
//! # Schedule variants
//!
//! | Variant | Behaviour                                                   |
//! |---------|-------------------------------------------------------------|
//! | `at`    | Single fire at an absolute instant (ms since epoch)         |
//! | `every` | `anchorMs + k * everyMs`, never drifting                    |
//! | `cron`  | Crontab expression evaluated in a mandatory IANA timezone   |

pub mod clock;
pub mod engine;
pub mod error;
pub mod executor;
pub mod lease;
pub mod ops;
pub mod schedule;
pub mod store;
pub mod summary;
pub mod timer;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{EngineSettings, SchedulerCommand, SchedulerEngine, SchedulerHandle};
pub use error::{Result, SchedulerError};
pub use executor::JobExecutor;
pub use lease::{ensure_no_daemon, live_holder, DaemonLease, LeaseRecord};
pub use ops::{JobOp, OpResult, OpStatus};
pub use store::JobStore;
pub use summary::SchedulerSummary;
pub use types::{
    Delivery, DeliveryMode, DeliveryPatch, ErrorCode, Job, JobPatch, NewJob, Payload, RouteStatus,
    RunLogEntry, RunStatus, Schedule, SessionTarget,
};
