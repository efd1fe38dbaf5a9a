// ABOUTME: Term type definitions
// ABOUTME: Terms, their lifecycle status, history entries and merged senses

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a term.
///
/// `Pending` is the only non-terminal state. A pending term moves exactly
/// once, to `Canonical`, `Rejected`, or `Merged` (an approved variant whose
/// sense was folded into the existing canonical entry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermStatus {
    Pending,
    Canonical,
    Rejected,
    Merged,
}

impl TermStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TermStatus::Pending => "pending",
            TermStatus::Canonical => "canonical",
            TermStatus::Rejected => "rejected",
            TermStatus::Merged => "merged",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TermStatus::Pending)
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: TermStatus) -> bool {
        matches!(
            (self, next),
            (
                TermStatus::Pending,
                TermStatus::Canonical | TermStatus::Rejected | TermStatus::Merged
            )
        )
    }
}

impl fmt::Display for TermStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TermStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TermStatus::Pending),
            "canonical" => Ok(TermStatus::Canonical),
            "rejected" => Ok(TermStatus::Rejected),
            "merged" => Ok(TermStatus::Merged),
            other => Err(format!("Unknown term status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Term {
    pub id: String,
    pub text: String,
    pub normalized_text: String,
    pub definition: String,
    pub status: TermStatus,
    pub submitted_by: String,
    pub canonical_ref: Option<String>,
    pub usage_example: Option<String>,
    pub origin_location: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Already-validated fields for a new pending term
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermCreateInput {
    pub text: String,
    pub definition: String,
    pub submitted_by: String,
    pub usage_example: Option<String>,
    pub origin_location: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEvent {
    Submitted,
    FlaggedVariant,
    Promoted,
    Rejected,
    Merged,
}

impl HistoryEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryEvent::Submitted => "submitted",
            HistoryEvent::FlaggedVariant => "flagged_variant",
            HistoryEvent::Promoted => "promoted",
            HistoryEvent::Rejected => "rejected",
            HistoryEvent::Merged => "merged",
        }
    }
}

impl FromStr for HistoryEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(HistoryEvent::Submitted),
            "flagged_variant" => Ok(HistoryEvent::FlaggedVariant),
            "promoted" => Ok(HistoryEvent::Promoted),
            "rejected" => Ok(HistoryEvent::Rejected),
            "merged" => Ok(HistoryEvent::Merged),
            other => Err(format!("Unknown history event: {}", other)),
        }
    }
}

/// One append-only lifecycle record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermHistoryEntry {
    pub id: i64,
    pub term_id: String,
    pub event: HistoryEvent,
    pub related_term_id: Option<String>,
    pub detail: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// A definition contributed to a canonical term by a merged variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermSense {
    pub id: i64,
    pub term_id: String,
    pub source_term_id: String,
    pub definition: String,
    pub added_at: DateTime<Utc>,
}
