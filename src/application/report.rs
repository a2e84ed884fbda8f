//! Structured outcome of a scenario run.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::HarnessResult;

/// Keys resolved by one step, by label.
pub type Resolved = BTreeMap<String, String>;

/// How a step ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Every check held.
    Passed,
    /// Ended with `error`.
    Failed { error: String },
    /// Not run because an earlier step failed.
    Skipped,
}

impl StepOutcome {
    /// Lowercase label used in tables and logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed { .. } => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Result of one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    /// Step name.
    pub name: String,
    /// Outcome of the step.
    pub outcome: StepOutcome,
    /// Wall time spent in the step.
    pub elapsed_ms: u64,
    /// Keys resolved while the step ran.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resolved: Resolved,
}

/// Outcome of a whole scenario run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario name.
    pub scenario: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Steps in execution order.
    pub steps: Vec<StepReport>,
    /// False once any step failed.
    pub passed: bool,
}

impl ScenarioReport {
    /// Empty passing report for `scenario`.
    pub fn new(scenario: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            started_at: Utc::now(),
            steps: Vec::new(),
            passed: true,
        }
    }

    /// Record the result of a step that ran.
    pub fn record(&mut self, name: &str, result: HarnessResult<Resolved>, elapsed: Duration) {
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let (outcome, resolved) = match result {
            Ok(resolved) => (StepOutcome::Passed, resolved),
            Err(err) => {
                self.passed = false;
                (
                    StepOutcome::Failed {
                        error: err.to_string(),
                    },
                    Resolved::new(),
                )
            }
        };
        self.steps.push(StepReport {
            name: name.to_string(),
            outcome,
            elapsed_ms,
            resolved,
        });
    }

    /// Record a step that did not run.
    pub fn skip(&mut self, name: &str) {
        self.steps.push(StepReport {
            name: name.to_string(),
            outcome: StepOutcome::Skipped,
            elapsed_ms: 0,
            resolved: Resolved::new(),
        });
    }

    /// Report for the step called `name`.
    pub fn step(&self, name: &str) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// First step that failed, if any.
    pub fn first_failure(&self) -> Option<&StepReport> {
        self.steps
            .iter()
            .find(|s| matches!(s.outcome, StepOutcome::Failed { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::HarnessError;

    #[test]
    fn test_failure_marks_report_failed() {
        let mut report = ScenarioReport::new("meter");
        report.record("ok", Ok(Resolved::new()), Duration::from_millis(5));
        report.record(
            "bad",
            Err(HarnessError::InvalidValue("x".to_string())),
            Duration::from_millis(7),
        );
        report.skip("later");

        assert!(!report.passed);
        let failed = report.first_failure().unwrap();
        assert_eq!(failed.name, "bad");
        assert_eq!(failed.elapsed_ms, 7);
        assert_eq!(report.step("later").unwrap().outcome, StepOutcome::Skipped);
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(StepOutcome::Failed {
            error: "boom".to_string(),
        })
        .unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "boom");
    }
}
