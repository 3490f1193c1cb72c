use thiserror::Error;

/// Validation errors for free-text and bounded fields.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// When a value does not match the required pattern.
    #[error("{field} ('{value}') is not allowed")]
    PatternMismatch {
        /// Field name that failed validation.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// When a numeric value exceeds its bounds.
    #[error("{field} ({value}) is out of bounds")]
    OutOfBounds {
        /// Field name that is out of bounds.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// A required text field was empty.
    #[error("{field} must not be empty")]
    Empty {
        /// Field name.
        field: &'static str,
    },
    /// A text field exceeded its maximum length in characters.
    #[error("{field} exceeds {max} characters ({len})")]
    TooLong {
        /// Field name.
        field: &'static str,
        /// Actual length.
        len: usize,
        /// Maximum length.
        max: usize,
    },
    /// A text field contained a control character.
    #[error("{field} contains control character U+{code:04X}")]
    ControlCharacter {
        /// Field name.
        field: &'static str,
        /// Code point of the offending character.
        code: u32,
    },
}

/// Returns `true` for C0 controls and DEL.
pub fn is_control(ch: char) -> bool {
    (ch as u32) < 0x20 || ch as u32 == 0x7F
}

/// Checks that `value` is non-empty, at most `max` characters and free of
/// control characters.
pub fn check_text(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    let len = value.chars().count();
    if len > max {
        return Err(ValidationError::TooLong { field, len, max });
    }
    if let Some(ch) = value.chars().find(|c| is_control(*c)) {
        return Err(ValidationError::ControlCharacter {
            field,
            code: ch as u32,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_text_reports_first_problem() {
        assert_eq!(
            check_text("name", "", 4),
            Err(ValidationError::Empty { field: "name" })
        );
        assert_eq!(
            check_text("name", "abcde", 4),
            Err(ValidationError::TooLong {
                field: "name",
                len: 5,
                max: 4
            })
        );
        assert_eq!(
            check_text("name", "a\u{7f}", 4),
            Err(ValidationError::ControlCharacter {
                field: "name",
                code: 0x7F
            })
        );
        assert!(check_text("name", "ok/é", 4).is_ok());
    }
}
