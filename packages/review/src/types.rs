// ABOUTME: Review type definitions
// ABOUTME: Votes, tallies, the promotion policy and service request/response shapes

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hellafresh_terms::{ConflictCheck, Term, TermHistoryEntry, TermSense, TermStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteValue {
    Approve,
    Reject,
}

impl VoteValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteValue::Approve => "approve",
            VoteValue::Reject => "reject",
        }
    }
}

impl fmt::Display for VoteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteValue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(VoteValue::Approve),
            "reject" => Ok(VoteValue::Reject),
            other => Err(format!("Unknown vote value: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub term_id: String,
    pub voter_id: String,
    pub value: VoteValue,
    pub cast_at: DateTime<Utc>,
}

/// Aggregate vote counts for one term, always computed from stored votes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tally {
    pub approve_count: u32,
    pub reject_count: u32,
    pub total_voters: u32,
}

impl Tally {
    /// Share of voters that cast `count` votes, in whole percent (rounded half up)
    pub fn share_percent(count: u32, total: u32) -> u32 {
        if total == 0 {
            return 0;
        }
        let (count, total) = (u64::from(count), u64::from(total));
        ((200 * count + total) / (2 * total)) as u32
    }

    /// Whether `count` of `total` voters reaches `percent`.
    ///
    /// The share must lie strictly above the half percent below `percent`, so
    /// 2 of 3 reaches 67 while 99 of 200 falls short of 50. A zero count never
    /// reaches anything.
    pub fn reaches(count: u32, total: u32, percent: u32) -> bool {
        if count == 0 || total == 0 {
            return false;
        }
        let floor = u64::from(percent.clamp(1, 100)) * 2 - 1;
        200 * u64::from(count) > u64::from(total) * floor
    }

    pub fn approve_percent(&self) -> u32 {
        Self::share_percent(self.approve_count, self.total_voters)
    }

    pub fn reject_percent(&self) -> u32 {
        Self::share_percent(self.reject_count, self.total_voters)
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "approve={} reject={} voters={}",
            self.approve_count, self.reject_count, self.total_voters
        )
    }
}

/// Thresholds deciding when a pending term resolves.
///
/// Ratios are in `(0, 1]` and taken at whole-percent precision, rounded up,
/// so a 0.004 ratio still asks for 1%. Two approvals out of three voters
/// meet a 0.67 ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionPolicy {
    pub min_votes: u32,
    pub approve_ratio: f64,
    pub reject_ratio: f64,
}

impl Default for PromotionPolicy {
    fn default() -> Self {
        Self {
            min_votes: 3,
            approve_ratio: 0.67,
            reject_ratio: 0.67,
        }
    }
}

impl PromotionPolicy {
    pub fn validate(&self) -> Result<(), String> {
        if self.min_votes == 0 {
            return Err("min_votes must be at least 1".to_string());
        }
        for (name, ratio) in [
            ("approve_ratio", self.approve_ratio),
            ("reject_ratio", self.reject_ratio),
        ] {
            if !ratio.is_finite() || ratio <= 0.0 || ratio > 1.0 {
                return Err(format!("{} must be in (0, 1], got {}", name, ratio));
            }
        }
        Ok(())
    }

    pub fn approve_percent(&self) -> u32 {
        ratio_to_percent(self.approve_ratio)
    }

    pub fn reject_percent(&self) -> u32 {
        ratio_to_percent(self.reject_ratio)
    }
}

fn ratio_to_percent(ratio: f64) -> u32 {
    (ratio * 100.0 - 1e-9).ceil().clamp(1.0, 100.0) as u32
}

/// A status change applied by the promotion engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    pub term_id: String,
    pub from: TermStatus,
    pub to: TermStatus,
    /// Canonical entry a merged term was folded into
    pub canonical_ref: Option<String>,
}

/// Fields of a new submission, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub text: String,
    pub definition: String,
    pub submitted_by: String,
    pub usage_example: Option<String>,
    pub origin_location: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Submit even when the text collides, as a variant of the existing entries
    #[serde(default)]
    pub as_variant: bool,
}

/// An accepted submission and what the conflict check saw
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub term: Term,
    pub check: ConflictCheck,
}

/// Outcome of one vote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    pub vote: Vote,
    pub tally: Tally,
    pub status: TermStatus,
    pub transition: Option<Transition>,
}

/// A term with its review context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermDetail {
    pub term: Term,
    /// Present while the term is pending
    pub tally: Option<Tally>,
    pub history: Vec<TermHistoryEntry>,
    pub senses: Vec<TermSense>,
}
