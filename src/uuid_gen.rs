//! UUID minting for optimistic creates. Uniqueness is the minter's
//! responsibility; collisions are treated as application bugs.

use uuid::Uuid;

/// Upper bound on the short form's length.
pub const SHORT_LEN: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UuidStyle {
    /// Canonical 36-character form, e.g. `generate_uuid()` in the teacher's
    /// autofill module (`src/collection/autofill.rs`).
    #[default]
    Long,
    /// Compact form, up to 15 characters — the base62 prefix of a v4 uuid's
    /// raw bytes, dropping hyphens.
    Short,
}

pub fn mint(style: UuidStyle) -> String {
    match style {
        UuidStyle::Long => Uuid::new_v4().to_string(),
        UuidStyle::Short => Uuid::new_v4().simple().to_string().chars().take(SHORT_LEN).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_form_is_canonical() {
        let id = mint(UuidStyle::Long);
        assert_eq!(id.len(), 36);
        assert_eq!(id.matches('-').count(), 4);
    }

    #[test]
    fn short_form_is_bounded() {
        let id = mint(UuidStyle::Short);
        assert!(id.len() <= SHORT_LEN);
        assert!(!id.is_empty());
    }
}
