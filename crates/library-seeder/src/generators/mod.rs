//! Fake data generators for seeded entities.
//!
//! - [`UserGenerator`]: borrower accounts with unique usernames and emails
//! - [`CategoryNameGenerator`]: capitalized single-word category names
//! - [`ReviewGenerator`]: ratings and review comments

pub mod category;
pub mod review;
pub mod user;

use std::collections::HashSet;

pub use category::CategoryNameGenerator;
pub use review::{GeneratedReview, ReviewGenerator};
pub use user::{GeneratedUser, UserGenerator};

/// Fresh draws tried before falling back to a numeric suffix.
const MAX_UNIQUE_ATTEMPTS: usize = 100;

/// Remembers every value handed out so none repeats within a run.
#[derive(Debug, Default)]
pub struct UniqueValues {
    seen: HashSet<String>,
}

impl UniqueValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draws until `draw` yields an unseen value, then suffixes the last
    /// draw with a counter.
    pub fn next(&mut self, mut draw: impl FnMut() -> String) -> String {
        let mut candidate = String::new();
        for _ in 0..MAX_UNIQUE_ATTEMPTS {
            candidate = draw();
            if self.seen.insert(candidate.clone()) {
                return candidate;
            }
        }

        let mut suffix = 2;
        loop {
            let suffixed = format!("{candidate}{suffix}");
            if self.seen.insert(suffixed.clone()) {
                return suffixed;
            }
            suffix += 1;
        }
    }
}
