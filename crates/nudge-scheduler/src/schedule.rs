//! Schedule calculator: pure functions from a schedule and "now" to the next
//! fire time. Shared by the live engine and the read-only summary so the two
//! can never disagree.

use std::str::FromStr;

use chrono::{TimeZone, Utc};
use chrono_tz::Tz;

use crate::{
    error::ScheduleError,
    types::{Job, RouteStatus, Schedule},
};

const WEEKDAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Next fire time strictly after `now_ms`, or `None` when the schedule is
/// exhausted (a one-shot in the past).
pub fn next_fire_after(schedule: &Schedule, now_ms: i64) -> Result<Option<i64>, ScheduleError> {
    match schedule {
        Schedule::At { at_ms } => Ok((*at_ms > now_ms).then_some(*at_ms)),

        Schedule::Every {
            every_ms,
            anchor_ms,
        } => {
            if *every_ms <= 0 {
                return Err(ScheduleError::InvalidInterval(format!(
                    "everyMs must be positive, got {every_ms}"
                )));
            }
            if now_ms < *anchor_ms {
                return Ok(Some(*anchor_ms));
            }
            // Always land on the anchor grid; never add to the previous fire time.
            let k = (now_ms - anchor_ms) / every_ms + 1;
            Ok(k.checked_mul(*every_ms)
                .and_then(|offset| anchor_ms.checked_add(offset)))
        }

        Schedule::Cron { expr, tz } => {
            let (cron, tz) = parse_cron(expr, tz)?;
            let Some(now) = Utc.timestamp_millis_opt(now_ms).single() else {
                return Ok(None);
            };
            let now_local = now.with_timezone(&tz);
            Ok(cron.after(&now_local).next().map(|dt| dt.timestamp_millis()))
        }
    }
}

/// Reject schedules that can never be evaluated. Called at creation and edit.
pub fn validate(schedule: &Schedule) -> Result<(), ScheduleError> {
    match schedule {
        Schedule::At { .. } => Ok(()),
        Schedule::Every { every_ms, .. } if *every_ms <= 0 => Err(
            ScheduleError::InvalidInterval(format!("everyMs must be positive, got {every_ms}")),
        ),
        Schedule::Every { .. } => Ok(()),
        Schedule::Cron { expr, tz } => parse_cron(expr, tz).map(|_| ()),
    }
}

/// Earliest cached `nextRunAtMs` over enabled, non-orphaned jobs.
pub fn next_wake_across_jobs<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> Option<i64> {
    jobs.into_iter()
        .filter(|j| j.enabled && j.state.route_status != RouteStatus::Orphaned)
        .filter_map(|j| j.state.next_run_at_ms)
        .min()
}

fn parse_cron(expr: &str, tz: &str) -> Result<(cron::Schedule, Tz), ScheduleError> {
    let tz_name = tz.trim();
    if tz_name.is_empty() {
        return Err(ScheduleError::InvalidTimezone(tz.to_string()));
    }
    let tz: Tz = tz_name
        .parse()
        .map_err(|_| ScheduleError::InvalidTimezone(tz_name.to_string()))?;

    let normalized = normalize_expression(expr).map_err(|reason| ScheduleError::InvalidCron {
        expr: expr.to_string(),
        reason,
    })?;
    let schedule = cron::Schedule::from_str(&normalized).map_err(|e| ScheduleError::InvalidCron {
        expr: expr.to_string(),
        reason: e.to_string(),
    })?;
    Ok((schedule, tz))
}

/// Turn a crontab expression into the `cron` crate's dialect.
///
/// 5 fields gain a leading seconds field. The day-of-week field is always
/// read with crontab numbering (0 or 7 = Sunday) and rewritten to names,
/// since the crate numbers Sunday as 1.
fn normalize_expression(expression: &str) -> Result<String, String> {
    let mut fields: Vec<String> = expression.split_whitespace().map(str::to_string).collect();
    match fields.len() {
        // standard crontab syntax: minute hour day month weekday
        5 => fields.insert(0, "0".to_string()),
        // crate-native syntax includes seconds (+ optional year)
        6 | 7 => {}
        n => return Err(format!("expected 5, 6, or 7 fields, got {n}")),
    }
    fields[5] = translate_weekdays(&fields[5])?;
    Ok(fields.join(" "))
}

fn translate_weekdays(field: &str) -> Result<String, String> {
    let mut parts = Vec::new();
    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((r, s)) => (r, Some(s)),
            None => (part, None),
        };
        let suffix = step.map(|s| format!("/{s}")).unwrap_or_default();

        if range == "*" || range == "?" {
            parts.push(format!("{range}{suffix}"));
            continue;
        }

        match range.split_once('-') {
            Some((start, end)) => {
                let start_n = weekday_number(start)?;
                let end_n = weekday_number(end)?;
                match (start_n, end_n) {
                    (Some(s), Some(7)) if step.is_none() => {
                        // `5-7` means FRI through SUN; the crate cannot wrap.
                        if s == 0 {
                            parts.push("*".to_string());
                        } else if s == 7 {
                            parts.push("SUN".to_string());
                        } else {
                            parts.push(format!("{}-SAT", WEEKDAY_NAMES[s as usize]));
                            parts.push("SUN".to_string());
                        }
                    }
                    (Some(_), Some(7)) => {
                        return Err("stepped weekday ranges must end at 6 (SAT)".to_string())
                    }
                    (Some(s), Some(e)) => {
                        if s > e {
                            return Err(format!("weekday range {range} runs backwards"));
                        }
                        parts.push(format!(
                            "{}-{}{suffix}",
                            WEEKDAY_NAMES[s as usize], WEEKDAY_NAMES[e as usize]
                        ));
                    }
                    _ => parts.push(format!(
                        "{}-{}{suffix}",
                        weekday_token(start, start_n),
                        weekday_token(end, end_n)
                    )),
                }
            }
            None => {
                let n = weekday_number(range)?;
                parts.push(format!("{}{suffix}", weekday_token(range, n)));
            }
        }
    }
    Ok(parts.join(","))
}

/// `Some(0..=7)` for numeric tokens, `None` for names.
fn weekday_number(token: &str) -> Result<Option<u8>, String> {
    if token.chars().all(|c| c.is_ascii_digit()) && !token.is_empty() {
        match token.parse::<u8>() {
            Ok(n) if n <= 7 => Ok(Some(n)),
            _ => Err(format!("weekday {token} out of range 0-7")),
        }
    } else {
        Ok(None)
    }
}

fn weekday_token(raw: &str, number: Option<u8>) -> String {
    match number {
        Some(n) => WEEKDAY_NAMES[(n % 7) as usize].to_string(),
        None => raw.to_ascii_uppercase(),
    }
}
