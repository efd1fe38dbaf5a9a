// ABOUTME: Shared state handed to every handler
// ABOUTME: Holds the review service, configured API tokens and the per-request time budget

use std::sync::Arc;
use std::time::Duration;

use hellafresh_core::Deadline;
use hellafresh_review::ReviewService;

use crate::auth::ApiTokens;

#[derive(Clone)]
pub struct AppState {
    pub review: Arc<ReviewService>,
    pub tokens: Arc<ApiTokens>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(review: ReviewService, tokens: ApiTokens, request_timeout: Duration) -> Self {
        Self {
            review: Arc::new(review),
            tokens: Arc::new(tokens),
            request_timeout,
        }
    }

    /// Deadline for a write starting now
    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.request_timeout)
    }
}
