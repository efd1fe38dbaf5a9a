// ABOUTME: HTTP request handlers for term submission and lookup
// ABOUTME: Submissions run conflict detection; lookups return history, senses and the live tally

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use hellafresh_review::{SubmissionRequest, TermDetail};
use hellafresh_terms::Term;

use crate::error::ApiResult;
use crate::response::ApiResponse;
use crate::state::AppState;

/// Submit a new term for community review
pub async fn submit_word(
    State(state): State<AppState>,
    payload: Result<Json<SubmissionRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Term>>)> {
    let Json(request) = payload?;
    info!("Submitting term: {}", request.text);

    let submission = state
        .review
        .submit(request, state.deadline())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(submission.term)),
    ))
}

/// Get a term with its review context
pub async fn get_word(
    State(state): State<AppState>,
    Path(term_id): Path<String>,
) -> ApiResult<Json<ApiResponse<TermDetail>>> {
    info!("Getting term: {}", term_id);

    let detail = state.review.term_detail(&term_id).await?;
    Ok(Json(ApiResponse::success(detail)))
}
