//! Category name generation.

use fake::Fake;
use fake::faker::lorem::en::Word;
use rand::Rng;

use super::UniqueValues;

/// Generates capitalized single-word names, never the same one twice.
#[derive(Debug, Default)]
pub struct CategoryNameGenerator {
    used: UniqueValues,
}

impl CategoryNameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate(&mut self, rng: &mut impl Rng) -> String {
        self.used.next(|| {
            let word: String = Word().fake_with_rng(rng);
            capitalize(&word)
        })
    }
}

/// Upper-cases the first character and lower-cases the rest.
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
