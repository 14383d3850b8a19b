//! Input shape validation shared by stores and the hierarchy service.
//!
//! Empty strings are valid values. Only malformed ids and text that cannot be
//! stored or displayed safely are rejected.

use crate::model::portfolio::EntityKind;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Upper bound for any free-text field, counted in chars.
pub const MAX_TEXT_CHARS: usize = 2048;

/// Input shape errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Ids are assigned by storage and are always positive.
    InvalidId { kind: EntityKind, id: i64 },
    /// Text field exceeds `MAX_TEXT_CHARS`.
    FieldTooLong {
        field: &'static str,
        max_chars: usize,
    },
    /// Text field contains a control character other than tab.
    ControlCharacter { field: &'static str },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidId { kind, id } => write!(f, "invalid {kind} id: {id}"),
            Self::FieldTooLong { field, max_chars } => {
                write!(f, "field `{field}` exceeds {max_chars} characters")
            }
            Self::ControlCharacter { field } => {
                write!(f, "field `{field}` contains control characters")
            }
        }
    }
}

impl Error for ValidationError {}

/// Rejects non-positive ids.
pub fn validate_id(kind: EntityKind, id: i64) -> Result<(), ValidationError> {
    if id <= 0 {
        return Err(ValidationError::InvalidId { kind, id });
    }
    Ok(())
}

/// Rejects overlong text and embedded control characters.
pub fn validate_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.chars().count() > MAX_TEXT_CHARS {
        return Err(ValidationError::FieldTooLong {
            field,
            max_chars: MAX_TEXT_CHARS,
        });
    }
    if value.chars().any(|ch| ch.is_control() && ch != '\t') {
        return Err(ValidationError::ControlCharacter { field });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{validate_id, validate_text, ValidationError, MAX_TEXT_CHARS};
    use crate::model::portfolio::EntityKind;

    #[test]
    fn empty_text_is_valid() {
        assert!(validate_text("name", "").is_ok());
    }

    #[test]
    fn text_at_limit_is_valid_and_one_more_is_rejected() {
        let at_limit = "a".repeat(MAX_TEXT_CHARS);
        assert!(validate_text("name", &at_limit).is_ok());

        let over = "a".repeat(MAX_TEXT_CHARS + 1);
        assert_eq!(
            validate_text("name", &over),
            Err(ValidationError::FieldTooLong {
                field: "name",
                max_chars: MAX_TEXT_CHARS
            })
        );
    }

    #[test]
    fn control_characters_are_rejected_except_tab() {
        assert!(validate_text("url", "a\tb").is_ok());
        assert_eq!(
            validate_text("url", "http://x.com\n"),
            Err(ValidationError::ControlCharacter { field: "url" })
        );
    }

    #[test]
    fn non_positive_ids_are_rejected() {
        assert!(validate_id(EntityKind::Page, 1).is_ok());
        assert!(matches!(
            validate_id(EntityKind::Page, 0),
            Err(ValidationError::InvalidId {
                kind: EntityKind::Page,
                id: 0
            })
        ));
        assert!(validate_id(EntityKind::Version, -4).is_err());
    }
}
