use crate::config::BatchConfig;
use crate::error::VarError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of relocation a batch performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Load,
    Unload,
    Archive,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Load => "load",
            OperationKind::Unload => "unload",
            OperationKind::Archive => "archive",
        }
    }

    /// Past-tense verb used in summaries.
    pub fn past_tense(&self) -> &'static str {
        match self {
            OperationKind::Load => "Loaded",
            OperationKind::Unload => "Unloaded",
            OperationKind::Archive => "Archived",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one item in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub identifier: String,
    pub success: bool,
    #[serde(default)]
    pub error_reason: Option<String>,
    /// The item was rejected as a recent repeat, not attempted.
    #[serde(default)]
    pub throttled: bool,
}

impl OperationResult {
    pub fn succeeded(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            success: true,
            error_reason: None,
            throttled: false,
        }
    }

    pub fn failed(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            success: false,
            error_reason: Some(reason.into()),
            throttled: false,
        }
    }

    pub fn from_error(identifier: impl Into<String>, err: &VarError) -> Self {
        Self {
            identifier: identifier.into(),
            success: false,
            error_reason: Some(err.to_string()),
            throttled: err.is_throttle(),
        }
    }
}

/// Results of a load/unload/archive batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// One result per attempted item, in execution order.
    pub results: Vec<OperationResult>,
    /// Items named by the caller.
    pub requested_count: usize,
    /// Items added by dependency expansion.
    pub dependency_count: usize,
    /// The batch stopped early on cancellation.
    pub cancelled: bool,
}

impl BatchOutcome {
    pub fn succeeded_names(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|r| r.success)
            .map(|r| r.identifier.as_str())
    }

    pub fn summary(&self, kind: OperationKind) -> BatchSummary {
        BatchSummary::from_results(&self.results, kind.past_tense())
    }
}

/// Counts plus a bounded list of concrete failure reasons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub verb: String,
    pub succeeded: usize,
    pub failed: usize,
    pub throttled: usize,
    /// First few failure messages, `identifier: reason`.
    pub messages: Vec<String>,
}

impl BatchSummary {
    pub fn from_results(results: &[OperationResult], verb: &str) -> Self {
        let mut summary = Self {
            verb: verb.to_string(),
            ..Default::default()
        };
        for result in results {
            if result.success {
                summary.succeeded += 1;
                continue;
            }
            if result.throttled {
                summary.throttled += 1;
            } else {
                summary.failed += 1;
            }
            if summary.messages.len() < BatchConfig::MAX_SUMMARY_MESSAGES {
                summary.messages.push(format!(
                    "{}: {}",
                    result.identifier,
                    result.error_reason.as_deref().unwrap_or("unknown error")
                ));
            }
        }
        summary
    }

    /// Build a summary from plain error strings, as collected by resolution runs.
    pub fn from_counts(verb: &str, succeeded: usize, errors: &[String]) -> Self {
        Self {
            verb: verb.to_string(),
            succeeded,
            failed: errors.len(),
            throttled: 0,
            messages: errors
                .iter()
                .take(BatchConfig::MAX_SUMMARY_MESSAGES)
                .cloned()
                .collect(),
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}, failed {}", self.verb, self.succeeded, self.failed)?;
        if self.throttled > 0 {
            write!(f, ", skipped {} (recently performed)", self.throttled)?;
        }
        Ok(())
    }
}
