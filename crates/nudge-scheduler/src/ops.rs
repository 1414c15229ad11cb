use nudge_core::config::RetentionPolicy;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::SchedulerError,
    types::{ErrorCode, JobPatch, NewJob, RunWarning},
};

/// Operator request handled by [`crate::SchedulerEngine::apply`].
#[derive(Debug, Clone)]
pub enum JobOp {
    Add(NewJob),
    Edit { id: String, patch: JobPatch },
    Enable { id: String },
    Disable { id: String },
    Remove { id: String },
    ForceRun { id: String },
    Summary,
    List,
    Show { id: String },
    Runs { job_id: Option<String>, limit: usize },
    /// `None` falls back to the configured policy.
    PruneRuns { policy: Option<RetentionPolicy> },
    Reload,
}

impl JobOp {
    /// Whether the op writes the job table.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            JobOp::Add(_)
                | JobOp::Edit { .. }
                | JobOp::Enable { .. }
                | JobOp::Disable { .. }
                | JobOp::Remove { .. }
                | JobOp::ForceRun { .. }
        )
    }

    /// Whether the op writes anything under the state directory.
    pub fn writes_state(&self) -> bool {
        self.is_mutation() || matches!(self, JobOp::PruneRuns { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpStatus {
    Ok,
    Error,
}

/// Structured result printed by every CLI command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpResult {
    pub status: OpStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<RunWarning>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl OpResult {
    pub fn ok(message: impl Into<String>, data: impl Serialize) -> Self {
        Self {
            status: OpStatus::Ok,
            code: None,
            message: message.into(),
            hint: None,
            warnings: Vec::new(),
            data: serde_json::to_value(data).unwrap_or(Value::Null),
        }
    }

    pub fn failure(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: OpStatus::Error,
            code: Some(code),
            message: message.into(),
            hint: Some(code.hint().to_string()),
            warnings: Vec::new(),
            data: Value::Null,
        }
    }

    pub fn from_error(e: &SchedulerError) -> Self {
        Self::failure(e.code(), e.to_string())
    }

    pub fn with_data(mut self, data: impl Serialize) -> Self {
        self.data = serde_json::to_value(data).unwrap_or(Value::Null);
        self
    }

    pub fn with_warning(mut self, code: ErrorCode, message: impl Into<String>) -> Self {
        self.warnings.push(RunWarning {
            code,
            message: message.into(),
        });
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == OpStatus::Ok
    }

    /// 0 ok, 2 bad input, 3 data corrupt or degraded, 1 anything else.
    pub fn exit_code(&self) -> i32 {
        match (self.status, self.code) {
            (OpStatus::Ok, _) => 0,
            (_, Some(ErrorCode::InvalidArgument)) => 2,
            (_, Some(ErrorCode::DataCorrupt | ErrorCode::SchedulerDegraded)) => 3,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_status_and_code() {
        assert_eq!(OpResult::ok("fine", ()).exit_code(), 0);
        assert_eq!(
            OpResult::failure(ErrorCode::InvalidArgument, "bad").exit_code(),
            2
        );
        assert_eq!(OpResult::failure(ErrorCode::DataCorrupt, "x").exit_code(), 3);
        assert_eq!(
            OpResult::failure(ErrorCode::SchedulerDegraded, "x").exit_code(),
            3
        );
        assert_eq!(OpResult::failure(ErrorCode::JobNotFound, "x").exit_code(), 1);
    }

    #[test]
    fn failure_json_carries_code_and_hint() {
        let r = OpResult::failure(ErrorCode::JobNotFound, "Job not found: abc");
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["status"], "error");
        assert_eq!(v["code"], "JOB_NOT_FOUND");
        assert!(v["hint"].as_str().unwrap().contains("list"));
        assert!(v.get("data").is_none());
    }
}
