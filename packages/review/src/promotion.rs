// ABOUTME: Promotion engine resolving pending terms from their vote tally
// ABOUTME: Applies canonical, merged and rejected transitions inside the caller's transaction

use std::sync::Arc;

use sqlx::SqliteConnection;
use tracing::{debug, info};

use super::error::ReviewResult;
use super::types::{PromotionPolicy, Tally, Transition};
use hellafresh_terms::{ConflictDetector, HistoryEvent, Term, TermStatus, TermStorage};

/// What a tally means under the current policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Remain,
    Approve,
    Reject,
}

impl PromotionPolicy {
    /// Approval is checked first, so a tally meeting both ratios approves.
    pub fn decide(&self, tally: &Tally) -> Decision {
        if tally.total_voters < self.min_votes {
            return Decision::Remain;
        }
        let total = tally.total_voters;
        if Tally::reaches(tally.approve_count, total, self.approve_percent()) {
            Decision::Approve
        } else if Tally::reaches(tally.reject_count, total, self.reject_percent()) {
            Decision::Reject
        } else {
            Decision::Remain
        }
    }
}

pub struct PromotionEngine {
    terms: Arc<TermStorage>,
    detector: Arc<ConflictDetector>,
    policy: PromotionPolicy,
}

impl PromotionEngine {
    pub fn new(
        terms: Arc<TermStorage>,
        detector: Arc<ConflictDetector>,
        policy: PromotionPolicy,
    ) -> Self {
        Self {
            terms,
            detector,
            policy,
        }
    }

    pub fn policy(&self) -> &PromotionPolicy {
        &self.policy
    }

    /// Resolve `term` if `tally` crosses a threshold.
    ///
    /// An approved term whose text already has a canonical entry is merged
    /// into it instead: its definition becomes an extra sense of the canonical
    /// term. Returns the applied transition, or `None` while still pending.
    pub async fn evaluate_in(
        &self,
        conn: &mut SqliteConnection,
        term: &Term,
        tally: &Tally,
    ) -> ReviewResult<Option<Transition>> {
        let decision = self.policy.decide(tally);
        debug!("Term {} at {}: {:?}", term.id, tally, decision);

        let detail = tally.to_string();
        let transition = match decision {
            Decision::Remain => return Ok(None),
            Decision::Reject => {
                self.terms
                    .update_status_in(&mut *conn, &term.id, TermStatus::Rejected)
                    .await?;
                self.terms
                    .append_history(
                        &mut *conn,
                        &term.id,
                        HistoryEvent::Rejected,
                        None,
                        Some(detail.as_str()),
                    )
                    .await?;

                Transition {
                    term_id: term.id.clone(),
                    from: term.status,
                    to: TermStatus::Rejected,
                    canonical_ref: None,
                }
            }
            Decision::Approve => {
                // A canonical entry may have appeared after submission
                let canonical_ref = match &term.canonical_ref {
                    Some(existing) => Some(existing.clone()),
                    None => {
                        self.detector
                            .relink_canonical_in(&mut *conn, &term.id, &term.normalized_text)
                            .await?
                    }
                };

                match canonical_ref {
                    Some(canonical_id) => {
                        self.terms
                            .update_status_in(&mut *conn, &term.id, TermStatus::Merged)
                            .await?;
                        self.terms
                            .append_sense_in(&mut *conn, &canonical_id, &term.id, &term.definition)
                            .await?;
                        self.terms
                            .append_history(
                                &mut *conn,
                                &term.id,
                                HistoryEvent::Merged,
                                Some(canonical_id.as_str()),
                                Some(detail.as_str()),
                            )
                            .await?;

                        info!("Term {} merged into canonical {}", term.id, canonical_id);
                        Transition {
                            term_id: term.id.clone(),
                            from: term.status,
                            to: TermStatus::Merged,
                            canonical_ref: Some(canonical_id),
                        }
                    }
                    None => {
                        self.terms
                            .update_status_in(&mut *conn, &term.id, TermStatus::Canonical)
                            .await?;
                        self.terms
                            .append_history(
                                &mut *conn,
                                &term.id,
                                HistoryEvent::Promoted,
                                None,
                                Some(detail.as_str()),
                            )
                            .await?;

                        Transition {
                            term_id: term.id.clone(),
                            from: term.status,
                            to: TermStatus::Canonical,
                            canonical_ref: None,
                        }
                    }
                }
            }
        };

        Ok(Some(transition))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tally(approve: u32, reject: u32) -> Tally {
        Tally {
            approve_count: approve,
            reject_count: reject,
            total_voters: approve + reject,
        }
    }

    #[test]
    fn test_below_min_votes_remains() {
        let policy = PromotionPolicy::default();
        assert_eq!(policy.decide(&tally(2, 0)), Decision::Remain);
        assert_eq!(policy.decide(&tally(0, 2)), Decision::Remain);
    }

    #[test]
    fn test_two_of_three_approves() {
        let policy = PromotionPolicy::default();
        assert_eq!(policy.decide(&tally(2, 1)), Decision::Approve);
        assert_eq!(policy.decide(&tally(1, 2)), Decision::Reject);
    }

    #[test]
    fn test_split_vote_remains() {
        let policy = PromotionPolicy::default();
        assert_eq!(policy.decide(&tally(2, 2)), Decision::Remain);
        assert_eq!(policy.decide(&tally(3, 2)), Decision::Remain);
    }

    #[test]
    fn test_approval_wins_when_both_ratios_are_met() {
        let policy = PromotionPolicy {
            min_votes: 2,
            approve_ratio: 0.5,
            reject_ratio: 0.5,
        };
        assert_eq!(policy.decide(&tally(1, 1)), Decision::Approve);
    }

    #[test]
    fn test_unanimous_policy() {
        let policy = PromotionPolicy {
            min_votes: 3,
            approve_ratio: 1.0,
            reject_ratio: 1.0,
        };
        assert_eq!(policy.decide(&tally(3, 0)), Decision::Approve);
        assert_eq!(policy.decide(&tally(4, 1)), Decision::Remain);
        assert_eq!(policy.decide(&tally(0, 3)), Decision::Reject);
    }

    #[test]
    fn test_tiny_ratio_still_needs_an_approval() {
        let policy = PromotionPolicy {
            min_votes: 3,
            approve_ratio: 0.004,
            reject_ratio: 0.9,
        };
        assert!(policy.validate().is_ok());
        assert_eq!(policy.decide(&tally(0, 3)), Decision::Reject);
        assert_eq!(policy.decide(&tally(1, 2)), Decision::Approve);
    }

    #[test]
    fn test_share_just_under_the_ratio_remains() {
        let policy = PromotionPolicy {
            min_votes: 3,
            approve_ratio: 0.5,
            reject_ratio: 0.6,
        };
        assert_eq!(policy.decide(&tally(99, 101)), Decision::Remain);
        assert_eq!(policy.decide(&tally(100, 100)), Decision::Approve);
    }
}
