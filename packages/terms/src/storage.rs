// ABOUTME: Term storage layer using SQLite
// ABOUTME: Creates terms, looks them up by id or folded text, and guards status transitions

use chrono::Utc;
use sqlx::pool::PoolConnection;
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool};
use thiserror::Error;
use tracing::debug;

use super::types::{
    HistoryEvent, Term, TermCreateInput, TermHistoryEntry, TermSense, TermStatus,
};
use hellafresh_core::{generate_term_id, normalize_text};
use hellafresh_storage::StorageError;

#[derive(Error, Debug)]
pub enum TermError {
    #[error("Term not found: {0}")]
    NotFound(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: TermStatus, to: TermStatus },

    #[error("Term is not pending (status: {0})")]
    NotPending(TermStatus),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<sqlx::Error> for TermError {
    fn from(err: sqlx::Error) -> Self {
        TermError::Storage(StorageError::Sqlx(err))
    }
}

const TERM_COLUMNS: &str = "id, text, normalized_text, definition, status, submitted_by, \
     canonical_ref, usage_example, origin_location, category, tags, version, created_at, resolved_at";

pub struct TermStorage {
    pool: SqlitePool,
}

impl TermStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>, StorageError> {
        self.pool.acquire().await.map_err(StorageError::Sqlx)
    }

    /// Create a new pending term and record its submission
    pub async fn create_term(&self, input: TermCreateInput) -> Result<Term, TermError> {
        let mut tx = self.pool.begin().await?;
        let term = self.insert_term(&mut tx, input).await?;
        tx.commit().await?;
        Ok(term)
    }

    /// Insert a pending term on an open connection or transaction
    pub async fn insert_term(
        &self,
        conn: &mut SqliteConnection,
        input: TermCreateInput,
    ) -> Result<Term, TermError> {
        let term_id = generate_term_id();
        let normalized = normalize_text(&input.text);
        let tags = serde_json::to_string(&input.tags).map_err(StorageError::Json)?;
        let now = Utc::now();

        debug!("Creating term: {} (text: {})", term_id, normalized);

        sqlx::query(
            r#"
            INSERT INTO terms (id, text, normalized_text, definition, status, submitted_by,
                               usage_example, origin_location, category, tags, created_at)
            VALUES (?, ?, ?, ?, 'pending', ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&term_id)
        .bind(&input.text)
        .bind(&normalized)
        .bind(&input.definition)
        .bind(&input.submitted_by)
        .bind(&input.usage_example)
        .bind(&input.origin_location)
        .bind(&input.category)
        .bind(&tags)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        self.append_history(&mut *conn, &term_id, HistoryEvent::Submitted, None, None)
            .await?;

        self.get_term_in(conn, &term_id).await
    }

    /// Get a single term by ID
    pub async fn get_term(&self, term_id: &str) -> Result<Term, TermError> {
        let mut conn = self.acquire().await?;
        self.get_term_in(&mut conn, term_id).await
    }

    pub async fn get_term_in(
        &self,
        conn: &mut SqliteConnection,
        term_id: &str,
    ) -> Result<Term, TermError> {
        debug!("Fetching term: {}", term_id);

        let query = format!("SELECT {} FROM terms WHERE id = ?", TERM_COLUMNS);
        let row = sqlx::query(&query)
            .bind(term_id)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(r) => Ok(row_to_term(&r)?),
            None => Err(TermError::NotFound(term_id.to_string())),
        }
    }

    /// Find the canonical term for an already-normalized text
    pub async fn find_canonical_by_text(
        &self,
        normalized_text: &str,
    ) -> Result<Option<Term>, StorageError> {
        let mut conn = self.acquire().await?;
        self.find_canonical_by_text_in(&mut conn, normalized_text)
            .await
    }

    pub async fn find_canonical_by_text_in(
        &self,
        conn: &mut SqliteConnection,
        normalized_text: &str,
    ) -> Result<Option<Term>, StorageError> {
        debug!("Fetching canonical term by text: {}", normalized_text);

        let query = format!(
            "SELECT {} FROM terms WHERE normalized_text = ? AND status = 'canonical'",
            TERM_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(normalized_text)
            .fetch_optional(&mut *conn)
            .await
            .map_err(StorageError::Sqlx)?;

        row.as_ref().map(row_to_term).transpose()
    }

    /// All pending terms sharing an already-normalized text, oldest first
    pub async fn find_pending_by_text_in(
        &self,
        conn: &mut SqliteConnection,
        normalized_text: &str,
    ) -> Result<Vec<Term>, StorageError> {
        let query = format!(
            "SELECT {} FROM terms WHERE normalized_text = ? AND status = 'pending' \
             ORDER BY created_at, rowid",
            TERM_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(normalized_text)
            .fetch_all(&mut *conn)
            .await
            .map_err(StorageError::Sqlx)?;

        rows.iter().map(row_to_term).collect()
    }

    /// Pending and canonical terms whose folded text length is within
    /// `max_length_delta` characters of `normalized_text`.
    ///
    /// Length difference is a lower bound on edit distance, so this narrows
    /// the near-duplicate scan without missing candidates.
    pub async fn find_length_neighbors_in(
        &self,
        conn: &mut SqliteConnection,
        normalized_text: &str,
        max_length_delta: u32,
    ) -> Result<Vec<Term>, StorageError> {
        let query = format!(
            "SELECT {} FROM terms \
             WHERE status IN ('pending', 'canonical') \
               AND normalized_text != ? \
               AND ABS(LENGTH(normalized_text) - ?) <= ? \
             ORDER BY created_at, rowid",
            TERM_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(normalized_text)
            .bind(normalized_text.chars().count() as i64)
            .bind(max_length_delta as i64)
            .fetch_all(&mut *conn)
            .await
            .map_err(StorageError::Sqlx)?;

        rows.iter().map(row_to_term).collect()
    }

    /// List all pending terms, oldest first
    pub async fn list_pending(&self) -> Result<Vec<Term>, StorageError> {
        let (terms, _) = self.list_pending_paginated(None, None).await?;
        Ok(terms)
    }

    /// List pending terms with pagination, oldest first
    pub async fn list_pending_paginated(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<(Vec<Term>, i64), StorageError> {
        debug!("Fetching pending terms (limit: {:?}, offset: {:?})", limit, offset);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM terms WHERE status = 'pending'")
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::Sqlx)?;

        let query = format!(
            "SELECT {} FROM terms WHERE status = 'pending' ORDER BY created_at, rowid \
             LIMIT ? OFFSET ?",
            TERM_COLUMNS
        );

        // SQLite treats a negative LIMIT as "no limit"
        let rows = sqlx::query(&query)
            .bind(limit.unwrap_or(-1))
            .bind(offset.unwrap_or(0))
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::Sqlx)?;

        let terms = rows.iter().map(row_to_term).collect::<Result<Vec<_>, _>>()?;

        Ok((terms, count))
    }

    /// Move a term to `new_status`.
    ///
    /// Fails with `InvalidTransition` when the current status is terminal or
    /// the target is unreachable. The write is a compare-and-swap on the
    /// status read just before, so a concurrent transition cannot be
    /// overwritten.
    pub async fn update_status(
        &self,
        term_id: &str,
        new_status: TermStatus,
    ) -> Result<Term, TermError> {
        let mut tx = self.pool.begin().await?;
        let term = self.update_status_in(&mut tx, term_id, new_status).await?;
        tx.commit().await?;
        Ok(term)
    }

    pub async fn update_status_in(
        &self,
        conn: &mut SqliteConnection,
        term_id: &str,
        new_status: TermStatus,
    ) -> Result<Term, TermError> {
        let current = self.get_term_in(&mut *conn, term_id).await?;

        if !current.status.can_transition_to(new_status) {
            return Err(TermError::InvalidTransition {
                from: current.status,
                to: new_status,
            });
        }

        debug!(
            "Transitioning term {}: {} -> {}",
            term_id, current.status, new_status
        );

        let result = sqlx::query(
            r#"
            UPDATE terms
            SET status = ?, resolved_at = ?, version = version + 1
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(new_status.as_str())
        .bind(Utc::now())
        .bind(term_id)
        .bind(current.status.as_str())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            let latest = self.get_term_in(&mut *conn, term_id).await?;
            return Err(TermError::InvalidTransition {
                from: latest.status,
                to: new_status,
            });
        }

        self.get_term_in(conn, term_id).await
    }

    /// Bump the term's version counter and return the new value.
    ///
    /// Issued as the first statement of a write transaction so SQLite takes
    /// the write lock before anything about the term is read.
    pub async fn bump_version_in(
        &self,
        conn: &mut SqliteConnection,
        term_id: &str,
    ) -> Result<i64, TermError> {
        let version: Option<i64> =
            sqlx::query_scalar("UPDATE terms SET version = version + 1 WHERE id = ? RETURNING version")
                .bind(term_id)
                .fetch_optional(&mut *conn)
                .await?;

        version.ok_or_else(|| TermError::NotFound(term_id.to_string()))
    }

    /// Take the database write lock for the open transaction.
    ///
    /// Must run before any read in the transaction; a statement that writes
    /// acquires the lock even when it touches no rows, so later reads see
    /// every committed term and stay current until commit.
    pub async fn reserve_write_in(&self, conn: &mut SqliteConnection) -> Result<(), StorageError> {
        sqlx::query("UPDATE terms SET version = version WHERE 0")
            .execute(&mut *conn)
            .await
            .map_err(StorageError::Sqlx)?;
        Ok(())
    }

    /// Point a pending term at the canonical entry it collides with
    pub async fn set_canonical_ref_in(
        &self,
        conn: &mut SqliteConnection,
        term_id: &str,
        canonical_id: &str,
    ) -> Result<(), TermError> {
        debug!("Linking term {} to canonical {}", term_id, canonical_id);

        let result = sqlx::query(
            "UPDATE terms SET canonical_ref = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(canonical_id)
        .bind(term_id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_term_in(&mut *conn, term_id).await?;
            return Err(TermError::NotPending(current.status));
        }

        Ok(())
    }

    pub async fn append_history(
        &self,
        conn: &mut SqliteConnection,
        term_id: &str,
        event: HistoryEvent,
        related_term_id: Option<&str>,
        detail: Option<&str>,
    ) -> Result<(), StorageError> {
        debug!("Recording {} for term {}", event.as_str(), term_id);

        sqlx::query(
            r#"
            INSERT INTO term_history (term_id, event, related_term_id, detail, recorded_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(term_id)
        .bind(event.as_str())
        .bind(related_term_id)
        .bind(detail)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await
        .map_err(StorageError::Sqlx)?;

        Ok(())
    }

    /// Lifecycle history for a term, in recording order
    pub async fn history(&self, term_id: &str) -> Result<Vec<TermHistoryEntry>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, term_id, event, related_term_id, detail, recorded_at \
             FROM term_history WHERE term_id = ? ORDER BY id",
        )
        .bind(term_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Sqlx)?;

        rows.iter()
            .map(|row| -> Result<TermHistoryEntry, StorageError> {
                let event: String = row.try_get("event").map_err(StorageError::Sqlx)?;
                Ok(TermHistoryEntry {
                    id: row.try_get("id").map_err(StorageError::Sqlx)?,
                    term_id: row.try_get("term_id").map_err(StorageError::Sqlx)?,
                    event: event.parse().map_err(StorageError::Database)?,
                    related_term_id: row.try_get("related_term_id").map_err(StorageError::Sqlx)?,
                    detail: row.try_get("detail").map_err(StorageError::Sqlx)?,
                    recorded_at: row.try_get("recorded_at").map_err(StorageError::Sqlx)?,
                })
            })
            .collect()
    }

    /// Append a sense contributed by `source_term_id` to a canonical term
    pub async fn append_sense_in(
        &self,
        conn: &mut SqliteConnection,
        term_id: &str,
        source_term_id: &str,
        definition: &str,
    ) -> Result<(), StorageError> {
        debug!("Adding sense from {} to {}", source_term_id, term_id);

        sqlx::query(
            r#"
            INSERT INTO term_senses (term_id, source_term_id, definition, added_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(term_id)
        .bind(source_term_id)
        .bind(definition)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await
        .map_err(StorageError::Sqlx)?;

        Ok(())
    }

    /// Senses merged into a canonical term, oldest first
    pub async fn senses(&self, term_id: &str) -> Result<Vec<TermSense>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, term_id, source_term_id, definition, added_at \
             FROM term_senses WHERE term_id = ? ORDER BY id",
        )
        .bind(term_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Sqlx)?;

        rows.iter()
            .map(|row| -> Result<TermSense, StorageError> {
                Ok(TermSense {
                    id: row.try_get("id").map_err(StorageError::Sqlx)?,
                    term_id: row.try_get("term_id").map_err(StorageError::Sqlx)?,
                    source_term_id: row.try_get("source_term_id").map_err(StorageError::Sqlx)?,
                    definition: row.try_get("definition").map_err(StorageError::Sqlx)?,
                    added_at: row.try_get("added_at").map_err(StorageError::Sqlx)?,
                })
            })
            .collect()
    }
}

/// Convert a database row to a Term
fn row_to_term(row: &sqlx::sqlite::SqliteRow) -> Result<Term, StorageError> {
    let status: String = row.try_get("status").map_err(StorageError::Sqlx)?;
    let tags: String = row.try_get("tags").map_err(StorageError::Sqlx)?;

    Ok(Term {
        id: row.try_get("id").map_err(StorageError::Sqlx)?,
        text: row.try_get("text").map_err(StorageError::Sqlx)?,
        normalized_text: row.try_get("normalized_text").map_err(StorageError::Sqlx)?,
        definition: row.try_get("definition").map_err(StorageError::Sqlx)?,
        status: status.parse().map_err(StorageError::Database)?,
        submitted_by: row.try_get("submitted_by").map_err(StorageError::Sqlx)?,
        canonical_ref: row.try_get("canonical_ref").map_err(StorageError::Sqlx)?,
        usage_example: row.try_get("usage_example").map_err(StorageError::Sqlx)?,
        origin_location: row.try_get("origin_location").map_err(StorageError::Sqlx)?,
        category: row.try_get("category").map_err(StorageError::Sqlx)?,
        tags: serde_json::from_str(&tags).map_err(StorageError::Json)?,
        version: row.try_get("version").map_err(StorageError::Sqlx)?,
        created_at: row.try_get("created_at").map_err(StorageError::Sqlx)?,
        resolved_at: row.try_get("resolved_at").map_err(StorageError::Sqlx)?,
    })
}
