// ABOUTME: Error type for the review workflow
// ABOUTME: Folds term, storage, validation and deadline failures into one caller-facing enum

use thiserror::Error;

use hellafresh_core::{DeadlineExceeded, ValidationError};
use hellafresh_storage::StorageError;
use hellafresh_terms::{ConflictCheck, TermError, TermStatus};

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Term not found: {0}")]
    NotFound(String),

    /// Submission collides with existing terms and was not sent as a variant
    #[error("Submission conflicts with existing terms")]
    Conflict(ConflictCheck),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: TermStatus, to: TermStatus },

    #[error("Term is not pending (status: {status})")]
    TermNotPending { status: TermStatus },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Operation deadline exceeded")]
    DeadlineExceeded,

    #[error("Invalid review policy: {0}")]
    InvalidPolicy(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<TermError> for ReviewError {
    fn from(err: TermError) -> Self {
        match err {
            TermError::NotFound(id) => ReviewError::NotFound(id),
            TermError::InvalidTransition { from, to } => ReviewError::InvalidTransition { from, to },
            TermError::NotPending(status) => ReviewError::TermNotPending { status },
            TermError::Storage(e) => ReviewError::Storage(e),
        }
    }
}

impl From<sqlx::Error> for ReviewError {
    fn from(err: sqlx::Error) -> Self {
        ReviewError::Storage(StorageError::Sqlx(err))
    }
}

impl From<DeadlineExceeded> for ReviewError {
    fn from(_: DeadlineExceeded) -> Self {
        ReviewError::DeadlineExceeded
    }
}

pub type ReviewResult<T> = Result<T, ReviewError>;
