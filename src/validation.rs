//! Identifier validation for group names and world ids.
//!
//! Both kinds of name end up embedded in storage keys and log lines, so the
//! accepted character set excludes the `:` key separator, path separators,
//! and control characters.

/// Validation errors with operator-facing messages.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NameError {
    #[error("{kind} is empty")]
    Empty { kind: &'static str },

    #[error("{kind} is too long (maximum {max} characters)")]
    TooLong { kind: &'static str, max: usize },

    #[error("{kind} contains invalid characters: {chars}")]
    InvalidCharacters { kind: &'static str, chars: String },
}

const GROUP_NAME_MAX: usize = 32;
const WORLD_ID_MAX: usize = 64;

fn collect_invalid(value: &str, allowed: impl Fn(char) -> bool) -> String {
    let mut seen = String::new();
    for ch in value.chars() {
        if !allowed(ch) && !seen.contains(ch) {
            seen.push(ch);
        }
    }
    seen
}

/// Group names: lowercase alphanumerics plus `_` and `-`. They show up in
/// config keys, storage keys, and chat feedback, so keep them boring.
pub fn validate_group_name(name: &str) -> Result<(), NameError> {
    const KIND: &str = "group name";
    if name.is_empty() {
        return Err(NameError::Empty { kind: KIND });
    }
    if name.chars().count() > GROUP_NAME_MAX {
        return Err(NameError::TooLong {
            kind: KIND,
            max: GROUP_NAME_MAX,
        });
    }
    let invalid = collect_invalid(name, |c| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-'
    });
    if !invalid.is_empty() {
        return Err(NameError::InvalidCharacters {
            kind: KIND,
            chars: invalid,
        });
    }
    Ok(())
}

/// World ids come from the server and may be mixed case; `.` is allowed for
/// dimension-suffixed names like `world.nether` on some hosts.
pub fn validate_world_id(world: &str) -> Result<(), NameError> {
    const KIND: &str = "world id";
    if world.is_empty() {
        return Err(NameError::Empty { kind: KIND });
    }
    if world.chars().count() > WORLD_ID_MAX {
        return Err(NameError::TooLong {
            kind: KIND,
            max: WORLD_ID_MAX,
        });
    }
    let invalid = collect_invalid(world, |c| {
        c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.'
    });
    if !invalid.is_empty() {
        return Err(NameError::InvalidCharacters {
            kind: KIND,
            chars: invalid,
        });
    }
    Ok(())
}
