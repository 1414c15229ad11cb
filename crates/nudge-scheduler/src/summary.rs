use serde::Serialize;

use crate::{
    schedule::next_wake_across_jobs,
    types::{Job, RouteStatus},
};

/// Read-only health snapshot. Uses the same calculator as the live loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerSummary {
    pub total: usize,
    pub enabled: usize,
    pub disabled: usize,
    pub running: usize,
    pub stuck: usize,
    pub invalid: usize,
    pub orphaned: usize,
    pub next_wake_at_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

impl SchedulerSummary {
    pub fn compute(
        jobs: &[Job],
        now_ms: i64,
        stuck_threshold_ms: u64,
        degraded: Option<&str>,
    ) -> Self {
        let threshold = i64::try_from(stuck_threshold_ms).unwrap_or(i64::MAX);
        let enabled = jobs.iter().filter(|j| j.enabled).count();
        Self {
            total: jobs.len(),
            enabled,
            disabled: jobs.len() - enabled,
            running: jobs.iter().filter(|j| j.is_running()).count(),
            stuck: jobs
                .iter()
                .filter_map(|j| j.state.running_at_ms)
                .filter(|t| now_ms.saturating_sub(*t) >= threshold)
                .count(),
            invalid: count_status(jobs, RouteStatus::Invalid),
            orphaned: count_status(jobs, RouteStatus::Orphaned),
            next_wake_at_ms: if degraded.is_some() {
                None
            } else {
                next_wake_across_jobs(jobs)
            },
            degraded: degraded.map(str::to_string),
        }
    }
}

fn count_status(jobs: &[Job], status: RouteStatus) -> usize {
    jobs.iter().filter(|j| j.state.route_status == status).count()
}
