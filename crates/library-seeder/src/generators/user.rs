//! Borrower account generation.

use fake::Fake;
use fake::faker::internet::en::{SafeEmail, Username};
use fake::faker::name::en::{FirstName, LastName};
use rand::Rng;

use super::UniqueValues;

/// Longest username the service accepts.
pub const MAX_USERNAME_CHARS: usize = 24;

/// Generated account data ready for registration.
#[derive(Debug, Clone)]
pub struct GeneratedUser {
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
}

/// Generates borrower accounts with run-unique usernames and emails.
#[derive(Debug, Default)]
pub struct UserGenerator {
    usernames: UniqueValues,
    emails: UniqueValues,
}

impl UserGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a single user.
    pub fn generate(&mut self, rng: &mut impl Rng) -> GeneratedUser {
        let username = self.usernames.next(|| {
            let raw: String = Username().fake_with_rng(rng);
            raw.chars().take(MAX_USERNAME_CHARS).collect()
        });
        let firstname: String = FirstName().fake_with_rng(rng);
        let lastname: String = LastName().fake_with_rng(rng);
        let email = self.emails.next(|| SafeEmail().fake_with_rng(rng));

        GeneratedUser {
            username,
            firstname,
            lastname,
            email,
        }
    }
}
