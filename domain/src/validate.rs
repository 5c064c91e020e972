//! Lightweight input validation helpers. Keep logic minimal and deterministic.

use crate::CoreError;

/// Upper bound on a user name, counted in characters.
pub const MAX_NAME_LEN: usize = 128;

/// Validate a user name and return it trimmed.
pub fn validate_name(s: &str) -> Result<String, CoreError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidName("empty".into()));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(CoreError::InvalidName("too long".into()));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(CoreError::InvalidName("contains control characters".into()));
    }
    Ok(trimmed.to_string())
}
