//! Document ID generation.
//!
//! IDs are generated from a human label (task title, category name) by:
//! 1. Converting to lowercase
//! 2. Replacing non-alphanumeric characters with hyphens
//! 3. Collapsing multiple hyphens
//! 4. Trimming leading/trailing hyphens
//! 5. Appending 8 random hex characters

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Global counter for deterministic ID generation in tests.
static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Whether to use deterministic IDs (for testing).
static USE_DETERMINISTIC_IDS: AtomicBool = AtomicBool::new(false);

/// Maximum slug length kept in an ID.
const MAX_SLUG_LEN: usize = 40;

/// Enable deterministic ID generation for testing.
///
/// When enabled, IDs will use a counter instead of random hex.
pub fn enable_deterministic_ids() {
    USE_DETERMINISTIC_IDS.store(true, Ordering::SeqCst);
    TEST_COUNTER.store(0, Ordering::SeqCst);
}

/// Disable deterministic ID generation.
pub fn disable_deterministic_ids() {
    USE_DETERMINISTIC_IDS.store(false, Ordering::SeqCst);
}

/// Convert a label to a slug of at most `max_len` characters.
#[must_use]
pub fn slugify(label: &str, max_len: usize) -> String {
    let mut slug = String::with_capacity(label.len());
    let mut last_was_hyphen = true; // Start true to avoid leading hyphen

    for c in label.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }

    if slug.len() > max_len {
        slug.truncate(max_len);
    }
    while slug.ends_with('-') {
        slug.pop();
    }

    slug
}

/// Generate a random 8-character hex suffix.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn random_suffix() -> String {
    if USE_DETERMINISTIC_IDS.load(Ordering::SeqCst) {
        let count = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        format!("{count:08x}")
    } else {
        use std::collections::hash_map::RandomState;
        use std::hash::{BuildHasher, Hasher};

        let mut hasher = RandomState::new().build_hasher();
        // Truncation is intentional - we only need entropy, not precision
        hasher.write_u64(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map_or(0, |d| d.as_nanos() as u64),
        );
        hasher.write_u64(TEST_COUNTER.fetch_add(1, Ordering::Relaxed));
        format!("{:08x}", hasher.finish() & 0xFFFF_FFFF)
    }
}

/// Generate a document ID from a label.
///
/// `fallback` is used as the prefix when the label has no usable characters.
#[must_use]
pub fn generate_id(label: &str, fallback: &str) -> String {
    let slug = slugify(label, MAX_SLUG_LEN);
    let suffix = random_suffix();

    if slug.is_empty() {
        format!("{fallback}-{suffix}")
    } else {
        format!("{slug}-{suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Buy milk", 40), "buy-milk");
        assert_eq!(slugify("Call Mom!", 40), "call-mom");
        assert_eq!(slugify("  spaced   out  ", 40), "spaced-out");
    }

    #[test]
    fn test_slugify_non_ascii() {
        assert_eq!(slugify("Études", 40), "tudes");
        assert_eq!(slugify("日本語", 40), "");
    }

    #[test]
    fn test_slugify_truncation_drops_trailing_hyphen() {
        let slug = slugify("abc  d", 4);
        assert_eq!(slug, "abc");
    }

    #[test]
    #[serial]
    fn test_generate_id_format() {
        enable_deterministic_ids();

        let id = generate_id("Buy milk", "task");
        assert_eq!(id, "buy-milk-00000000");

        disable_deterministic_ids();
    }

    #[test]
    #[serial]
    fn test_generate_id_fallback_prefix() {
        enable_deterministic_ids();

        let id = generate_id("!!!", "task");
        assert!(id.starts_with("task-"));
        assert_eq!(id.len(), "task-".len() + 8);

        disable_deterministic_ids();
    }

    #[test]
    #[serial]
    fn test_deterministic_ids_increment() {
        enable_deterministic_ids();

        let id1 = generate_id("x", "task");
        let id2 = generate_id("x", "task");

        assert!(id1.ends_with("-00000000"));
        assert!(id2.ends_with("-00000001"));

        disable_deterministic_ids();
    }

    #[test]
    #[serial]
    fn test_random_ids_differ() {
        disable_deterministic_ids();

        let id1 = generate_id("same", "task");
        let id2 = generate_id("same", "task");
        assert!(id1.starts_with("same-"));
        assert_ne!(id1, id2);
    }
}
