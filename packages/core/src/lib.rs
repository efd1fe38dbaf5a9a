// ABOUTME: Core types and utilities for the HellaFresh slang registry
// ABOUTME: Foundational package providing text folding, validation and ids to all packages

pub mod constants;
pub mod deadline;
pub mod text;
pub mod utils;
pub mod validation;

// Re-export constants
pub use constants::{database_file, hellafresh_dir, API_VERSION, SERVICE_NAME};

// Re-export deadline handling
pub use deadline::{Deadline, DeadlineExceeded};

// Re-export text helpers
pub use text::{edit_distance, normalize_text};

// Re-export utilities
pub use utils::generate_term_id;

// Re-export validation
pub use validation::{
    validate_definition, validate_identity, validate_optional_field, validate_tags,
    validate_term_text, ValidationError,
};
