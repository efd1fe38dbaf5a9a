// ABOUTME: Input validation for term submissions and votes
// ABOUTME: Field-specific size limits, emptiness and control character checks

use thiserror::Error;

use crate::text::normalize_text;

/// Maximum size of a slang expression (in characters, after folding)
pub const MAX_TERM_TEXT_SIZE: usize = 100;

/// Maximum size of a definition or usage example
pub const MAX_DEFINITION_SIZE: usize = 2000;

/// Maximum size for opaque submitter/voter identifiers
pub const MAX_IDENTITY_SIZE: usize = 255;

/// Maximum size of short optional metadata (origin location, category)
pub const MAX_METADATA_SIZE: usize = 100;

/// Maximum number of tags on a single term
pub const MAX_TAGS: usize = 10;

/// Maximum size of a single tag
pub const MAX_TAG_SIZE: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    #[error("{field} exceeds maximum size of {max} characters (got {actual})")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    #[error("{field} contains invalid control characters")]
    ControlCharacters { field: &'static str },

    #[error("Too many tags: at most {max} allowed (got {actual})")]
    TooManyTags { max: usize, actual: usize },
}

impl ValidationError {
    /// Name of the offending field
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Empty { field }
            | ValidationError::TooLong { field, .. }
            | ValidationError::ControlCharacters { field } => field,
            ValidationError::TooManyTags { .. } => "tags",
        }
    }
}

fn validate_field(
    value: &str,
    field: &'static str,
    max: usize,
    allow_newlines: bool,
) -> Result<String, ValidationError> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }

    let size = trimmed.chars().count();
    if size > max {
        return Err(ValidationError::TooLong {
            field,
            max,
            actual: size,
        });
    }

    let bad_control = trimmed
        .chars()
        .any(|c| c.is_control() && !(allow_newlines && matches!(c, '\n' | '\r' | '\t')));
    if bad_control {
        return Err(ValidationError::ControlCharacters { field });
    }

    Ok(trimmed.to_string())
}

/// Validate a slang expression. Returns the trimmed display form.
pub fn validate_term_text(text: &str) -> Result<String, ValidationError> {
    // Tabs and newlines inside a term are folded away, not rejected
    let validated = validate_field(text, "text", MAX_TERM_TEXT_SIZE * 4, true)?;

    let size = normalize_text(&validated).chars().count();
    if size > MAX_TERM_TEXT_SIZE {
        return Err(ValidationError::TooLong {
            field: "text",
            max: MAX_TERM_TEXT_SIZE,
            actual: size,
        });
    }

    Ok(validated)
}

pub fn validate_definition(definition: &str) -> Result<String, ValidationError> {
    validate_field(definition, "definition", MAX_DEFINITION_SIZE, true)
}

/// Validate an opaque identity reference (submitter or voter)
pub fn validate_identity(identity: &str, field: &'static str) -> Result<String, ValidationError> {
    validate_field(identity, field, MAX_IDENTITY_SIZE, false)
}

/// Validate optional free-form metadata; blank values are treated as absent
pub fn validate_optional_field(
    value: Option<&str>,
    field: &'static str,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => validate_field(v, field, max, true).map(Some),
        _ => Ok(None),
    }
}

/// Validate and fold tags: lowercased, deduplicated, blanks dropped
pub fn validate_tags(tags: &[String]) -> Result<Vec<String>, ValidationError> {
    let mut folded: Vec<String> = Vec::new();

    for tag in tags {
        let tag = normalize_text(tag);
        if tag.is_empty() || folded.contains(&tag) {
            continue;
        }
        let tag = validate_field(&tag, "tags", MAX_TAG_SIZE, false)?;
        folded.push(tag);
    }

    if folded.len() > MAX_TAGS {
        return Err(ValidationError::TooManyTags {
            max: MAX_TAGS,
            actual: folded.len(),
        });
    }

    Ok(folded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_text_is_trimmed() {
        assert_eq!(validate_term_text("  Yeet ").unwrap(), "Yeet");
    }

    #[test]
    fn test_empty_term_text_rejected() {
        assert_eq!(
            validate_term_text("   "),
            Err(ValidationError::Empty { field: "text" })
        );
    }

    #[test]
    fn test_term_text_length_counts_folded_form() {
        let spaced = format!("a{}b", " ".repeat(150));
        assert!(validate_term_text(&spaced).is_ok());

        let long = "a".repeat(MAX_TERM_TEXT_SIZE + 1);
        assert!(matches!(
            validate_term_text(&long),
            Err(ValidationError::TooLong { field: "text", .. })
        ));
    }

    #[test]
    fn test_null_bytes_rejected() {
        assert_eq!(
            validate_definition("bad\0value"),
            Err(ValidationError::ControlCharacters {
                field: "definition"
            })
        );
    }

    #[test]
    fn test_identity_rejects_newlines() {
        assert!(validate_identity("user\n42", "voterId").is_err());
        assert_eq!(validate_identity(" user-42 ", "voterId").unwrap(), "user-42");
    }

    #[test]
    fn test_optional_field_blank_is_none() {
        assert_eq!(
            validate_optional_field(Some("  "), "category", MAX_METADATA_SIZE).unwrap(),
            None
        );
        assert_eq!(
            validate_optional_field(None, "category", MAX_METADATA_SIZE).unwrap(),
            None
        );
    }

    #[test]
    fn test_tags_are_folded_and_deduplicated() {
        let tags = vec![
            "Gen Z".to_string(),
            "gen   z".to_string(),
            " ".to_string(),
            "Internet".to_string(),
        ];
        assert_eq!(validate_tags(&tags).unwrap(), vec!["gen z", "internet"]);
    }

    #[test]
    fn test_too_many_tags() {
        let tags: Vec<String> = (0..=MAX_TAGS).map(|i| format!("tag{}", i)).collect();
        assert_eq!(
            validate_tags(&tags),
            Err(ValidationError::TooManyTags {
                max: MAX_TAGS,
                actual: MAX_TAGS + 1
            })
        );
    }

    #[test]
    fn test_error_field_name() {
        let err = validate_definition("").unwrap_err();
        assert_eq!(err.field(), "definition");
    }
}
