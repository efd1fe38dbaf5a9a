// ABOUTME: Review service coordinating submissions, votes and promotion
// ABOUTME: Each write runs in one transaction checked against the caller's deadline before commit

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::{debug, info};

use super::error::{ReviewError, ReviewResult};
use super::ledger::ReviewLedger;
use super::locks::TermLocks;
use super::promotion::PromotionEngine;
use super::types::{
    PromotionPolicy, Submission, SubmissionRequest, TermDetail, VoteReceipt, VoteValue,
};
use hellafresh_core::validation::MAX_METADATA_SIZE;
use hellafresh_core::{
    validate_definition, validate_identity, validate_optional_field, validate_tags,
    validate_term_text, Deadline,
};
use hellafresh_terms::{ConflictDetector, Term, TermCreateInput, TermStatus, TermStorage};

pub struct ReviewService {
    terms: Arc<TermStorage>,
    detector: Arc<ConflictDetector>,
    ledger: ReviewLedger,
    engine: PromotionEngine,
    locks: TermLocks,
}

impl ReviewService {
    pub fn new(
        pool: SqlitePool,
        policy: PromotionPolicy,
        similarity_threshold: u32,
    ) -> ReviewResult<Self> {
        policy.validate().map_err(ReviewError::InvalidPolicy)?;

        let terms = Arc::new(TermStorage::new(pool));
        let detector = Arc::new(ConflictDetector::new(terms.clone(), similarity_threshold));

        Ok(Self {
            ledger: ReviewLedger::new(terms.clone()),
            engine: PromotionEngine::new(terms.clone(), detector.clone(), policy),
            terms,
            detector,
            locks: TermLocks::new(),
        })
    }

    pub fn policy(&self) -> &PromotionPolicy {
        self.engine.policy()
    }

    pub fn terms(&self) -> &TermStorage {
        &self.terms
    }

    pub fn detector(&self) -> &ConflictDetector {
        &self.detector
    }

    pub fn ledger(&self) -> &ReviewLedger {
        &self.ledger
    }

    /// Submit a new term for review.
    ///
    /// Colliding submissions fail with `Conflict` unless `as_variant` is set,
    /// in which case the term is stored pending and flagged with the collision.
    pub async fn submit(
        &self,
        request: SubmissionRequest,
        deadline: Deadline,
    ) -> ReviewResult<Submission> {
        let input = TermCreateInput {
            text: validate_term_text(&request.text)?,
            definition: validate_definition(&request.definition)?,
            submitted_by: validate_identity(&request.submitted_by, "submittedBy")?,
            usage_example: validate_optional_field(
                request.usage_example.as_deref(),
                "usageExample",
                MAX_METADATA_SIZE * 5,
            )?,
            origin_location: validate_optional_field(
                request.origin_location.as_deref(),
                "originLocation",
                MAX_METADATA_SIZE,
            )?,
            category: validate_optional_field(
                request.category.as_deref(),
                "category",
                MAX_METADATA_SIZE,
            )?,
            tags: validate_tags(&request.tags)?,
        };

        // Check and insert under one write lock so identical submissions
        // racing each other cannot both read a clear registry
        let mut tx = self.terms.pool().begin().await?;
        self.terms.reserve_write_in(&mut tx).await?;

        let check = self.detector.check_in(&mut tx, &input.text).await?;
        if !check.is_clear() && !request.as_variant {
            debug!("Refusing submission '{}': {:?}", input.text, check);
            return Err(ReviewError::Conflict(check));
        }

        let term = self.terms.insert_term(&mut tx, input).await?;
        self.detector.flag_variant_in(&mut tx, &term.id, &check).await?;
        let term = self.terms.get_term_in(&mut tx, &term.id).await?;

        deadline.check()?;
        tx.commit().await?;

        info!(
            "Term {} submitted by {} ({})",
            term.id,
            term.submitted_by,
            if check.is_clear() { "clear" } else { "variant" }
        );

        Ok(Submission { term, check })
    }

    /// Cast or replace a vote and resolve the term if it crosses a threshold.
    ///
    /// Votes on one term are serialized; the vote, the tally and any status
    /// change commit together or not at all.
    pub async fn cast_vote(
        &self,
        term_id: &str,
        voter_id: &str,
        value: VoteValue,
        deadline: Deadline,
    ) -> ReviewResult<VoteReceipt> {
        let voter_id = validate_identity(voter_id, "voterId")?;

        let _guard = self.locks.lock(term_id).await;
        deadline.check()?;

        let mut tx = self.terms.pool().begin().await?;

        // Write first so the transaction holds SQLite's write lock from the start
        self.terms.bump_version_in(&mut tx, term_id).await?;

        let vote = self
            .ledger
            .cast_vote_in(&mut tx, term_id, &voter_id, value)
            .await?;
        let tally = self.ledger.tally_in(&mut tx, term_id).await?;
        let term = self.terms.get_term_in(&mut tx, term_id).await?;
        let transition = self.engine.evaluate_in(&mut tx, &term, &tally).await?;

        deadline.check()?;
        tx.commit().await?;

        let status = match &transition {
            Some(t) => {
                info!("Term {} resolved: {} -> {}", t.term_id, t.from, t.to);
                t.to
            }
            None => TermStatus::Pending,
        };

        Ok(VoteReceipt {
            vote,
            tally,
            status,
            transition,
        })
    }

    /// A term with its history, merged senses and (while pending) live tally
    pub async fn term_detail(&self, term_id: &str) -> ReviewResult<TermDetail> {
        let term = self.terms.get_term(term_id).await?;

        let tally = if term.status == TermStatus::Pending {
            Some(self.ledger.tally(term_id).await?)
        } else {
            None
        };
        let history = self.terms.history(term_id).await?;
        let senses = self.terms.senses(term_id).await?;

        Ok(TermDetail {
            term,
            tally,
            history,
            senses,
        })
    }

    /// Pending terms oldest first, with the total pending count
    pub async fn pending_queue(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> ReviewResult<(Vec<Term>, i64)> {
        Ok(self.terms.list_pending_paginated(limit, offset).await?)
    }
}
