use clap::{Args, Parser, Subcommand, ValueEnum};

/// `nudge`: recoverable wake-up scheduler for agent sessions.
#[derive(Parser, Debug)]
#[command(name = "nudge")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("NUDGE_GIT_SHA"), ")"))]
#[command(about = "Schedule wake-up messages into agent sessions.", long_about = None)]
pub struct Cli {
    /// Config file (defaults to $NUDGE_CONFIG, then ~/.nudge/nudge.toml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the scheduler loop until interrupted (SIGHUP reloads the job table)
    Daemon,

    /// Job counts, next wake time, stuck/invalid/orphaned counts
    Status,

    /// List every job
    List,

    /// Show one job
    Show { id: String },

    /// Create a job
    Add(AddArgs),

    /// Change fields of an existing job
    Edit(EditArgs),

    /// Enable a job and compute its next run
    Enable { id: String },

    /// Disable a job
    Disable { id: String },

    /// Delete a job
    Remove { id: String },

    /// Run a job now, regardless of its schedule
    Run { id: String },

    /// Recent run-log entries
    Runs {
        /// Only entries for this job
        #[arg(long)]
        job: Option<String>,

        /// Newest N entries
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Apply run-log retention (configured policy unless a flag is given)
    PruneRuns {
        /// Drop entries older than N days
        #[arg(long, conflicts_with = "max_lines")]
        max_age_days: Option<u32>,

        /// Keep only the newest N entries
        #[arg(long)]
        max_lines: Option<usize>,
    },
}

/// One of `--at`, `--every` or `--cron`.
#[derive(Args, Debug, Default, Clone)]
pub struct ScheduleArgs {
    /// One-shot time: RFC 3339 (`2026-03-01T09:00:00+08:00`) or epoch ms
    #[arg(long, conflicts_with_all = ["every", "cron"])]
    pub at: Option<String>,

    /// Fixed interval: `90s`, `15m`, `2h`, `1d`, or plain milliseconds
    #[arg(long, conflicts_with = "cron")]
    pub every: Option<String>,

    /// Anchor for `--every` (RFC 3339 or epoch ms, default: now)
    #[arg(long, requires = "every")]
    pub anchor: Option<String>,

    /// Cron expression (5 or 6 fields)
    #[arg(long, requires = "tz")]
    pub cron: Option<String>,

    /// IANA timezone for `--cron`, e.g. `Asia/Shanghai`
    #[arg(long)]
    pub tz: Option<String>,
}

impl ScheduleArgs {
    pub fn is_set(&self) -> bool {
        self.at.is_some() || self.every.is_some() || self.cron.is_some()
    }
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long, default_value = "")]
    pub description: String,

    /// Route reference of the conversation that owns the job
    #[arg(long)]
    pub route: String,

    /// Text typed into the session
    #[arg(long)]
    pub message: String,

    #[command(flatten)]
    pub schedule: ScheduleArgs,

    #[arg(long, value_enum, default_value_t = TargetArg::Main)]
    pub target: TargetArg,

    #[arg(long, value_enum, default_value_t = DeliverArg::None)]
    pub deliver: DeliverArg,

    /// Fail the run when the relay fails (default: warn only)
    #[arg(long)]
    pub strict_delivery: bool,

    /// Cap on relayed reply length
    #[arg(long)]
    pub max_chars: Option<usize>,

    /// Create the job disabled
    #[arg(long)]
    pub disabled: bool,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    pub id: String,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub route: Option<String>,

    #[arg(long)]
    pub message: Option<String>,

    #[command(flatten)]
    pub schedule: ScheduleArgs,

    #[arg(long, value_enum)]
    pub target: Option<TargetArg>,

    #[arg(long, value_enum)]
    pub deliver: Option<DeliverArg>,

    #[arg(long)]
    pub strict_delivery: Option<bool>,

    #[arg(long)]
    pub max_chars: Option<usize>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetArg {
    Main,
    Isolated,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverArg {
    None,
    Reply,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_add_with_cron() {
        let cli = Cli::parse_from([
            "nudge", "add", "--name", "standup", "--route", "chat-1", "--message", "status?",
            "--cron", "0 9 * * 1-5", "--tz", "Asia/Shanghai", "--deliver", "reply",
        ]);
        let Commands::Add(args) = cli.command else {
            panic!("expected add");
        };
        assert_eq!(args.schedule.cron.as_deref(), Some("0 9 * * 1-5"));
        assert_eq!(args.deliver, DeliverArg::Reply);
        assert_eq!(args.target, TargetArg::Main);
    }

    #[test]
    fn cron_without_tz_is_rejected() {
        let res = Cli::try_parse_from([
            "nudge", "add", "--name", "x", "--route", "r", "--message", "m", "--cron", "* * * * *",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn prune_flags_conflict() {
        let res = Cli::try_parse_from(["nudge", "prune-runs", "--max-age-days", "3", "--max-lines", "9"]);
        assert!(res.is_err());
    }
}
