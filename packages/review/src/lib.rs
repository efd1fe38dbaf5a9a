// ABOUTME: Community review workflow for submitted slang terms
// ABOUTME: Vote ledger, promotion policy, per-term locking and the request-level review service

pub mod error;
pub mod ledger;
pub mod locks;
pub mod promotion;
pub mod service;
pub mod types;

// Re-export main types
pub use error::ReviewError;
pub use ledger::ReviewLedger;
pub use locks::{TermGuard, TermLocks};
pub use promotion::{Decision, PromotionEngine};
pub use service::ReviewService;
pub use types::{
    PromotionPolicy, Submission, SubmissionRequest, Tally, TermDetail, Transition, Vote,
    VoteReceipt, VoteValue,
};
