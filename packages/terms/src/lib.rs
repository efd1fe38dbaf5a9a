// ABOUTME: Slang term registry: durable term storage and submission conflict detection
// ABOUTME: Provides the Term Store and Conflict Detector used by the review workflow

pub mod conflict;
pub mod storage;
pub mod types;

// Re-export main types
pub use conflict::{ConflictCheck, ConflictDetector, SimilarMatch};
pub use storage::{TermError, TermStorage};
pub use types::{
    HistoryEvent, Term, TermCreateInput, TermHistoryEntry, TermSense, TermStatus,
};
