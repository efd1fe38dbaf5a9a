// ABOUTME: Review ledger recording one vote per voter per term
// ABOUTME: Upserts votes and computes tallies straight from the stored rows

use std::sync::Arc;

use chrono::Utc;
use sqlx::{Row, SqliteConnection};
use tracing::debug;

use super::error::{ReviewError, ReviewResult};
use super::types::{Tally, Vote, VoteValue};
use hellafresh_storage::StorageError;
use hellafresh_terms::{TermStatus, TermStorage};

pub struct ReviewLedger {
    terms: Arc<TermStorage>,
}

impl ReviewLedger {
    pub fn new(terms: Arc<TermStorage>) -> Self {
        Self { terms }
    }

    /// Record `voter_id`'s vote on a pending term, replacing any earlier vote.
    ///
    /// Fails with `TermNotPending` once the term has resolved; votes on
    /// resolved terms are kept for audit but never change.
    pub async fn cast_vote_in(
        &self,
        conn: &mut SqliteConnection,
        term_id: &str,
        voter_id: &str,
        value: VoteValue,
    ) -> ReviewResult<Vote> {
        let term = self.terms.get_term_in(&mut *conn, term_id).await?;
        if term.status != TermStatus::Pending {
            return Err(ReviewError::TermNotPending {
                status: term.status,
            });
        }

        let cast_at = Utc::now();
        debug!("Recording {} vote from {} on {}", value, voter_id, term_id);

        sqlx::query(
            r#"
            INSERT INTO votes (term_id, voter_id, value, cast_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(term_id, voter_id) DO UPDATE SET
                value = excluded.value,
                cast_at = excluded.cast_at
            "#,
        )
        .bind(term_id)
        .bind(voter_id)
        .bind(value.as_str())
        .bind(cast_at)
        .execute(&mut *conn)
        .await?;

        Ok(Vote {
            term_id: term_id.to_string(),
            voter_id: voter_id.to_string(),
            value,
            cast_at,
        })
    }

    /// Current tally for a term
    pub async fn tally(&self, term_id: &str) -> ReviewResult<Tally> {
        let mut conn = self.terms.acquire().await?;
        self.tally_in(&mut conn, term_id).await
    }

    pub async fn tally_in(&self, conn: &mut SqliteConnection, term_id: &str) -> ReviewResult<Tally> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN value = 'approve' THEN 1 ELSE 0 END), 0) AS approve_count,
                COALESCE(SUM(CASE WHEN value = 'reject' THEN 1 ELSE 0 END), 0) AS reject_count,
                COUNT(*) AS total_voters
            FROM votes
            WHERE term_id = ?
            "#,
        )
        .bind(term_id)
        .fetch_one(&mut *conn)
        .await?;

        let count = |column: &str| -> Result<u32, StorageError> {
            let value: i64 = row.try_get(column).map_err(StorageError::Sqlx)?;
            u32::try_from(value)
                .map_err(|_| StorageError::Database(format!("{} out of range: {}", column, value)))
        };

        Ok(Tally {
            approve_count: count("approve_count")?,
            reject_count: count("reject_count")?,
            total_voters: count("total_voters")?,
        })
    }

    /// All votes on a term, oldest first
    pub async fn votes(&self, term_id: &str) -> ReviewResult<Vec<Vote>> {
        let rows = sqlx::query(
            "SELECT term_id, voter_id, value, cast_at FROM votes WHERE term_id = ? ORDER BY cast_at, voter_id",
        )
        .bind(term_id)
        .fetch_all(self.terms.pool())
        .await?;

        let votes = rows
            .iter()
            .map(|row| -> Result<Vote, StorageError> {
                let value: String = row.try_get("value").map_err(StorageError::Sqlx)?;
                Ok(Vote {
                    term_id: row.try_get("term_id").map_err(StorageError::Sqlx)?,
                    voter_id: row.try_get("voter_id").map_err(StorageError::Sqlx)?,
                    value: value.parse().map_err(StorageError::Database)?,
                    cast_at: row.try_get("cast_at").map_err(StorageError::Sqlx)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(votes)
    }
}
