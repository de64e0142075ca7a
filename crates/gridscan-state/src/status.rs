use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a cell was given up on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipReason {
    /// The last error reported by the source.
    pub error: String,
    pub attempts: u32,
    /// The error was not retryable.
    #[serde(default)]
    pub fatal: bool,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.fatal { "fatal" } else { "gave up" };
        write!(f, "{kind} after {} attempt(s): {}", self.attempts, self.error)
    }
}

/// Per-cell lifecycle. A cell only ever moves from `Pending` to one of the
/// two terminal states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CellStatus {
    Pending,
    Completed {
        #[serde(default)]
        saturated: bool,
    },
    Skipped {
        reason: SkipReason,
    },
}

impl CellStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            Self::Skipped { reason } => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for CellStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed { saturated: false } => write!(f, "completed"),
            Self::Completed { saturated: true } => write!(f, "completed (saturated)"),
            Self::Skipped { reason } => write!(f, "skipped ({reason})"),
        }
    }
}

/// Terminal result of fetching one cell, as committed to the checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellOutcome {
    Completed { saturated: bool },
    Skipped(SkipReason),
}

impl From<CellOutcome> for CellStatus {
    fn from(outcome: CellOutcome) -> Self {
        match outcome {
            CellOutcome::Completed { saturated } => Self::Completed { saturated },
            CellOutcome::Skipped(reason) => Self::Skipped { reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_state_tag() {
        let status = CellStatus::Skipped {
            reason: SkipReason {
                error: "HTTP 503".into(),
                attempts: 4,
                fatal: false,
            },
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "skipped");
        assert_eq!(json["reason"]["attempts"], 4);

        let back: CellStatus = serde_json::from_value(json).unwrap();
        assert_eq!(back, status);

        let pending: CellStatus = serde_json::from_str(r#"{"state":"pending"}"#).unwrap();
        assert!(pending.is_pending());
        let done: CellStatus = serde_json::from_str(r#"{"state":"completed"}"#).unwrap();
        assert_eq!(done, CellStatus::Completed { saturated: false });
    }

    #[test]
    fn display() {
        assert_eq!(CellStatus::Completed { saturated: true }.to_string(), "completed (saturated)");
        let reason = SkipReason {
            error: "unauthorized".into(),
            attempts: 1,
            fatal: true,
        };
        assert_eq!(
            CellStatus::from(CellOutcome::Skipped(reason)).to_string(),
            "skipped (fatal after 1 attempt(s): unauthorized)"
        );
    }
}
