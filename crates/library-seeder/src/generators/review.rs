//! Review content generation.

use fake::Fake;
use fake::faker::lorem::en::Sentence;
use rand::Rng;

/// Rating and comment for one review.
#[derive(Debug, Clone)]
pub struct GeneratedReview {
    /// 1 to 5 stars.
    pub rating: u8,
    pub comment: String,
}

/// Generates review ratings and comments.
#[derive(Debug, Clone, Default)]
pub struct ReviewGenerator;

impl ReviewGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, rng: &mut impl Rng) -> GeneratedReview {
        let rating = rng.gen_range(1..=5);
        // Around a dozen words, the service only requires a non-blank comment.
        let comment: String = Sentence(8..17).fake_with_rng(rng);
        GeneratedReview { rating, comment }
    }
}
