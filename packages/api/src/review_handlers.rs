// ABOUTME: HTTP request handlers for the review queue and voting
// ABOUTME: Votes may address the term in the path or in the body

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

use hellafresh_review::{VoteReceipt, VoteValue};
use hellafresh_terms::Term;

use crate::error::ApiResult;
use crate::pagination::{PaginatedResponse, PaginationParams};
use crate::response::ApiResponse;
use crate::state::AppState;

/// List pending terms, oldest first
pub async fn review_queue(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<Json<ApiResponse<PaginatedResponse<Term>>>> {
    info!(
        "Listing review queue (page: {}, limit: {})",
        params.page(),
        params.limit()
    );

    let (terms, total) = state
        .review
        .pending_queue(Some(params.limit()), Some(params.offset()))
        .await?;

    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        terms, &params, total,
    ))))
}

/// Request body for voting on the term named in the path
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermVoteRequest {
    pub voter_id: String,
    pub value: VoteValue,
}

/// Request body for voting with the term in the body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteRequest {
    pub term_id: String,
    pub voter_id: String,
    pub value: VoteValue,
}

/// Vote on a pending term
pub async fn vote_on_term(
    State(state): State<AppState>,
    Path(term_id): Path<String>,
    payload: Result<Json<TermVoteRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<VoteReceipt>>> {
    let Json(request) = payload?;
    record_vote(&state, &term_id, &request.voter_id, request.value).await
}

/// Vote on a pending term named in the body
pub async fn cast_vote(
    State(state): State<AppState>,
    payload: Result<Json<CastVoteRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<VoteReceipt>>> {
    let Json(request) = payload?;
    record_vote(&state, &request.term_id, &request.voter_id, request.value).await
}

async fn record_vote(
    state: &AppState,
    term_id: &str,
    voter_id: &str,
    value: VoteValue,
) -> ApiResult<Json<ApiResponse<VoteReceipt>>> {
    info!("Recording {} vote on term {}", value, term_id);

    let receipt = state
        .review
        .cast_vote(term_id, voter_id, value, state.deadline())
        .await?;

    Ok(Json(ApiResponse::success(receipt)))
}
