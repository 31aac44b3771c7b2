//! # Domain Value Objects
//!
//! Immutable value types shared across the sync and migration pipeline.
//! Value objects are defined by their attributes rather than identity.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

static NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("static regex"));

/// Normalize an arbitrary display name into a slug: lowercase, runs of
/// non-alphanumeric characters collapsed to single dashes, no leading or
/// trailing dash. Idempotent: `slugify(slugify(x)) == slugify(x)`.
pub fn slugify(input: &str) -> String {
    let lowered = input.to_lowercase();
    NON_SLUG.replace_all(&lowered, "-").trim_matches('-').to_string()
}

/// Produce a slug not present in `taken` by suffixing `-2`, `-3`, … to the
/// base. The base itself is returned when free.
pub fn unique_slug(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    let mut n = 2u32;
    loop {
        let candidate = format!("{base}-{n}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Identifier of one sync-pipeline run, recorded in the sync log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A synthetic case id assigned by the repair pass to entities that lost
/// their remote id. Distinguishable from remote ids by the `local-` prefix.
pub fn synthetic_case_id() -> String {
    format!("local-{}", Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Breast Augmentation"), "breast-augmentation");
        assert_eq!(slugify("  Tummy   Tuck!! "), "tummy-tuck");
        assert_eq!(slugify("Mommy Makeover (Combined)"), "mommy-makeover-combined");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn unique_slug_suffixes() {
        let taken: HashSet<String> =
            ["facelift".to_string(), "facelift-2".to_string()].into_iter().collect();
        assert_eq!(unique_slug("facelift", &taken), "facelift-3");
        assert_eq!(unique_slug("rhinoplasty", &taken), "rhinoplasty");
    }

    #[test]
    fn synthetic_ids_are_prefixed_and_distinct() {
        let a = synthetic_case_id();
        let b = synthetic_case_id();
        assert!(a.starts_with("local-"));
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn slugify_emits_only_slug_chars(input in ".{0,64}") {
            let slug = slugify(&input);
            prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            prop_assert!(!slug.starts_with('-') && !slug.ends_with('-'));
        }

        #[test]
        fn slugify_is_idempotent(input in ".{0,64}") {
            let once = slugify(&input);
            prop_assert_eq!(slugify(&once), once);
        }
    }
}
