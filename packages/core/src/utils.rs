// ABOUTME: Shared utility functions for HellaFresh
// ABOUTME: Identifier generation for stored records

/// Prefix carried by every term identifier
pub const TERM_ID_PREFIX: &str = "term-";

/// Generate a unique, URL-safe term ID
pub fn generate_term_id() -> String {
    format!("{}{}", TERM_ID_PREFIX, nanoid::nanoid!())
}
