//! Shared types for Greenroom
//!
//! Error enum, result alias, and the per-item outcome rows that seeding and
//! cleanup phases return instead of relying on side-effecting logs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for the lifecycle manager.
#[derive(Error, Debug)]
pub enum GreenroomError {
    /// Configuration problem detected before any external call.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A reset (or seed) is already running on this coordinator instance.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Messaging-service failure that aborted a phase.
    #[error("Messaging service error: {0}")]
    Messaging(String),

    /// Feed-service failure that aborted a phase.
    #[error("Feed service error: {0}")]
    Feed(String),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, GreenroomError>;

/// Aggregated counts returned by a seed or reset run.
///
/// Summary value only - never persisted. Counts reflect successfully
/// completed items; per-item failures live in the phase outcome rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedingResult {
    pub user_count: usize,
    pub channel_count: usize,
    pub activity_count: usize,
    pub follow_edge_count: usize,
}

/// How a single item fared within a phase.
#[derive(Debug, Clone)]
pub enum Outcome<T = ()> {
    /// The item was created/updated/deleted as intended.
    Succeeded(T),
    /// The item was deliberately left alone (e.g. on the preserve list).
    Skipped(String),
    /// All fallbacks were exhausted; the item was logged and passed over.
    Failed(String),
}

/// Per-item result row returned by seeding and cleanup phases.
#[derive(Debug, Clone)]
pub struct ItemOutcome<T = ()> {
    pub id: String,
    pub outcome: Outcome<T>,
}

impl<T> ItemOutcome<T> {
    pub fn succeeded(id: impl Into<String>, value: T) -> Self {
        Self {
            id: id.into(),
            outcome: Outcome::Succeeded(value),
        }
    }

    pub fn skipped(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            outcome: Outcome::Skipped(reason.into()),
        }
    }

    pub fn failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            outcome: Outcome::Failed(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Succeeded(_))
    }

    pub fn value(&self) -> Option<&T> {
        match &self.outcome {
            Outcome::Succeeded(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self.outcome {
            Outcome::Succeeded(v) => Some(v),
            _ => None,
        }
    }
}

/// Count successful rows in a phase result.
pub fn success_count<T>(rows: &[ItemOutcome<T>]) -> usize {
    rows.iter().filter(|r| r.is_success()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_accessors() {
        let ok: ItemOutcome<u32> = ItemOutcome::succeeded("a", 7);
        let failed: ItemOutcome<u32> = ItemOutcome::failed("b", "boom");
        let skipped: ItemOutcome<u32> = ItemOutcome::skipped("c", "preserved");

        assert!(ok.is_success());
        assert_eq!(ok.value(), Some(&7));
        assert!(!failed.is_success());
        assert!(failed.value().is_none());
        assert!(!skipped.is_success());

        assert_eq!(success_count(&[ok, failed, skipped]), 1);
    }

    #[test]
    fn test_seeding_result_serialization() {
        let result = SeedingResult {
            user_count: 6,
            channel_count: 6,
            activity_count: 3,
            follow_edge_count: 7,
        };

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("userCount"));
        assert!(json.contains("followEdgeCount"));

        let parsed: SeedingResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result);
    }
}
