//! Turning command-line flags into scheduler requests.

use chrono::DateTime;
use nudge_core::config::RetentionPolicy;
use nudge_scheduler::{
    Delivery, DeliveryMode, DeliveryPatch, JobOp, JobPatch, NewJob, Payload, Schedule,
    SessionTarget,
};

use crate::cli::{AddArgs, Commands, DeliverArg, EditArgs, ScheduleArgs, TargetArg};

/// Map a one-shot command to its [`JobOp`]. `Daemon` has no op.
pub fn to_op(command: Commands, now_ms: i64) -> Result<Option<JobOp>, String> {
    let op = match command {
        Commands::Daemon => return Ok(None),
        Commands::Status => JobOp::Summary,
        Commands::List => JobOp::List,
        Commands::Show { id } => JobOp::Show { id },
        Commands::Add(args) => JobOp::Add(new_job(args, now_ms)?),
        Commands::Edit(args) => {
            let id = args.id.clone();
            JobOp::Edit {
                id,
                patch: job_patch(args, now_ms)?,
            }
        }
        Commands::Enable { id } => JobOp::Enable { id },
        Commands::Disable { id } => JobOp::Disable { id },
        Commands::Remove { id } => JobOp::Remove { id },
        Commands::Run { id } => JobOp::ForceRun { id },
        Commands::Runs { job, limit } => JobOp::Runs { job_id: job, limit },
        Commands::PruneRuns {
            max_age_days,
            max_lines,
        } => JobOp::PruneRuns {
            policy: match (max_age_days, max_lines) {
                (Some(days), _) => Some(RetentionPolicy::MaxAge { days }),
                (None, Some(lines)) => Some(RetentionPolicy::MaxLines { lines }),
                (None, None) => None,
            },
        },
    };
    Ok(Some(op))
}

fn new_job(args: AddArgs, now_ms: i64) -> Result<NewJob, String> {
    let schedule = schedule(&args.schedule, now_ms)?
        .ok_or_else(|| "one of --at, --every or --cron is required".to_string())?;
    let mut delivery = Delivery {
        mode: delivery_mode(args.deliver),
        best_effort: !args.strict_delivery,
        ..Delivery::default()
    };
    if let Some(max) = args.max_chars {
        delivery.max_chars = max;
    }

    Ok(NewJob {
        name: args.name,
        description: args.description,
        route: args.route,
        schedule,
        session_target: session_target(args.target),
        payload: Payload::TmuxMessage { text: args.message },
        delivery,
        enabled: !args.disabled,
    })
}

fn job_patch(args: EditArgs, now_ms: i64) -> Result<JobPatch, String> {
    let delivery = DeliveryPatch {
        mode: args.deliver.map(delivery_mode),
        best_effort: args.strict_delivery.map(|strict| !strict),
        max_chars: args.max_chars,
    };

    let patch = JobPatch {
        name: args.name,
        description: args.description,
        route: args.route,
        schedule: schedule(&args.schedule, now_ms)?,
        session_target: args.target.map(session_target),
        payload: args.message.map(|text| Payload::TmuxMessage { text }),
        delivery: (!delivery.is_empty()).then_some(delivery),
    };
    if patch.is_empty() {
        return Err("nothing to edit; pass at least one field flag".to_string());
    }
    Ok(patch)
}

/// `None` when no schedule flag was given.
pub fn schedule(args: &ScheduleArgs, now_ms: i64) -> Result<Option<Schedule>, String> {
    if let Some(at) = &args.at {
        return Ok(Some(Schedule::At {
            at_ms: parse_instant(at)?,
        }));
    }
    if let Some(every) = &args.every {
        let anchor_ms = match &args.anchor {
            Some(a) => parse_instant(a)?,
            None => now_ms,
        };
        return Ok(Some(Schedule::Every {
            every_ms: parse_duration_ms(every)?,
            anchor_ms,
        }));
    }
    if let Some(expr) = &args.cron {
        let tz = args
            .tz
            .clone()
            .ok_or_else(|| "--cron needs --tz".to_string())?;
        return Ok(Some(Schedule::Cron {
            expr: expr.clone(),
            tz,
        }));
    }
    if args.tz.is_some() {
        return Err("--tz only applies to --cron".to_string());
    }
    Ok(None)
}

/// RFC 3339 timestamp or epoch milliseconds.
pub fn parse_instant(raw: &str) -> Result<i64, String> {
    let raw = raw.trim();
    if let Ok(ms) = raw.parse::<i64>() {
        return Ok(ms);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| format!("invalid time {raw:?}: {e}"))
}

/// `250ms`, `90s`, `15m`, `2h`, `1d`, or bare milliseconds.
pub fn parse_duration_ms(raw: &str) -> Result<i64, String> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let n: i64 = digits
        .parse()
        .map_err(|_| format!("invalid duration {raw:?}"))?;
    let factor = match unit {
        "" | "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        other => return Err(format!("unknown duration unit {other:?} in {raw:?}")),
    };
    n.checked_mul(factor)
        .ok_or_else(|| format!("duration {raw:?} is too large"))
}

fn session_target(t: TargetArg) -> SessionTarget {
    match t {
        TargetArg::Main => SessionTarget::Main,
        TargetArg::Isolated => SessionTarget::Isolated,
    }
}

fn delivery_mode(d: DeliverArg) -> DeliveryMode {
    match d {
        DeliverArg::None => DeliveryMode::None,
        DeliverArg::Reply => DeliveryMode::Reply,
    }
}
