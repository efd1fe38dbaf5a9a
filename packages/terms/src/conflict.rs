// ABOUTME: Submission conflict detection against canonical and pending terms
// ABOUTME: Exact matches on folded text first, then edit-distance near duplicates

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::debug;

use super::storage::{TermError, TermStorage};
use super::types::{HistoryEvent, TermStatus};
use hellafresh_core::{edit_distance, normalize_text};
use hellafresh_storage::StorageError;

/// A near-duplicate candidate found by the fuzzy scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarMatch {
    pub term_id: String,
    pub text: String,
    pub status: TermStatus,
    pub distance: u32,
}

/// Result of checking a submission against the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ConflictCheck {
    /// Nothing collides
    Clear,
    /// A canonical term with the same folded text exists
    Conflict {
        #[serde(rename = "canonicalRef")]
        canonical_ref: String,
    },
    /// Pending terms with the same folded text exist (oldest first)
    DuplicatePending {
        #[serde(rename = "existingIds")]
        existing_ids: Vec<String>,
    },
    /// Pending or canonical terms within the similarity threshold
    NearDuplicate { matches: Vec<SimilarMatch> },
}

impl ConflictCheck {
    pub fn is_clear(&self) -> bool {
        matches!(self, ConflictCheck::Clear)
    }

    /// The canonical term this submission collides with, if any
    pub fn canonical_ref(&self) -> Option<&str> {
        match self {
            ConflictCheck::Conflict { canonical_ref } => Some(canonical_ref),
            _ => None,
        }
    }
}

pub struct ConflictDetector {
    terms: Arc<TermStorage>,
    similarity_threshold: u32,
}

impl ConflictDetector {
    /// `similarity_threshold` is the largest edit distance still flagged as a
    /// near duplicate; 0 turns the fuzzy scan off.
    pub fn new(terms: Arc<TermStorage>, similarity_threshold: u32) -> Self {
        Self {
            terms,
            similarity_threshold,
        }
    }

    pub fn similarity_threshold(&self) -> u32 {
        self.similarity_threshold
    }

    /// Check raw submission text against the registry
    pub async fn check(&self, text: &str) -> Result<ConflictCheck, StorageError> {
        let mut conn = self.terms.acquire().await?;
        self.check_in(&mut conn, text).await
    }

    pub async fn check_in(
        &self,
        conn: &mut SqliteConnection,
        text: &str,
    ) -> Result<ConflictCheck, StorageError> {
        let normalized = normalize_text(text);

        if let Some(canonical) = self
            .terms
            .find_canonical_by_text_in(&mut *conn, &normalized)
            .await?
        {
            debug!("Submission '{}' conflicts with canonical {}", normalized, canonical.id);
            return Ok(ConflictCheck::Conflict {
                canonical_ref: canonical.id,
            });
        }

        let pending = self
            .terms
            .find_pending_by_text_in(&mut *conn, &normalized)
            .await?;
        if !pending.is_empty() {
            debug!(
                "Submission '{}' duplicates {} pending term(s)",
                normalized,
                pending.len()
            );
            return Ok(ConflictCheck::DuplicatePending {
                existing_ids: pending.into_iter().map(|t| t.id).collect(),
            });
        }

        if self.similarity_threshold == 0 {
            return Ok(ConflictCheck::Clear);
        }

        let candidates = self
            .terms
            .find_length_neighbors_in(&mut *conn, &normalized, self.similarity_threshold)
            .await?;

        let mut matches: Vec<SimilarMatch> = candidates
            .into_iter()
            .filter_map(|term| {
                let distance = edit_distance(&normalized, &term.normalized_text) as u32;
                (distance <= self.similarity_threshold).then(|| SimilarMatch {
                    term_id: term.id,
                    text: term.text,
                    status: term.status,
                    distance,
                })
            })
            .collect();

        if matches.is_empty() {
            return Ok(ConflictCheck::Clear);
        }

        // Candidates arrive oldest first; a stable sort keeps that as the tiebreak
        matches.sort_by_key(|m| m.distance);

        debug!(
            "Submission '{}' has {} near duplicate(s)",
            normalized,
            matches.len()
        );

        Ok(ConflictCheck::NearDuplicate { matches })
    }

    /// Record that a pending term was accepted despite `check`.
    ///
    /// Links the term to the colliding canonical entry (when there is one) and
    /// appends a `flagged_variant` history event naming the collision.
    pub async fn flag_variant_in(
        &self,
        conn: &mut SqliteConnection,
        term_id: &str,
        check: &ConflictCheck,
    ) -> Result<(), TermError> {
        let (related, detail) = match check {
            ConflictCheck::Clear => return Ok(()),
            ConflictCheck::Conflict { canonical_ref } => {
                self.terms
                    .set_canonical_ref_in(&mut *conn, term_id, canonical_ref)
                    .await?;
                (Some(canonical_ref.as_str()), "conflict".to_string())
            }
            ConflictCheck::DuplicatePending { existing_ids } => (
                existing_ids.first().map(String::as_str),
                format!("duplicate_pending:{}", existing_ids.join(",")),
            ),
            ConflictCheck::NearDuplicate { matches } => (
                matches.first().map(|m| m.term_id.as_str()),
                format!(
                    "near_duplicate:{}",
                    matches
                        .iter()
                        .map(|m| m.term_id.as_str())
                        .collect::<Vec<_>>()
                        .join(",")
                ),
            ),
        };

        self.terms
            .append_history(
                conn,
                term_id,
                HistoryEvent::FlaggedVariant,
                related,
                Some(detail.as_str()),
            )
            .await?;

        Ok(())
    }

    /// Link a pending term to the canonical entry for its text, if one now exists.
    ///
    /// Used right before promotion: a canonical term may have appeared after
    /// the submission was checked. Returns the canonical id that was linked.
    pub async fn relink_canonical_in(
        &self,
        conn: &mut SqliteConnection,
        term_id: &str,
        normalized_text: &str,
    ) -> Result<Option<String>, TermError> {
        let canonical = self
            .terms
            .find_canonical_by_text_in(&mut *conn, normalized_text)
            .await?;

        match canonical {
            Some(canonical) if canonical.id != term_id => {
                self.terms
                    .set_canonical_ref_in(conn, term_id, &canonical.id)
                    .await?;
                Ok(Some(canonical.id))
            }
            _ => Ok(None),
        }
    }
}
