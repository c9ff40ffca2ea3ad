//! Request and response bodies of the library service.

use serde::{Deserialize, Serialize};

/// Loan lengths offered when borrowing, in days.
pub const BORROW_DURATIONS_DAYS: [u32; 4] = [7, 14, 21, 28];

/// Loan length used by notification scenarios.
pub const SCENARIO_BORROW_DAYS: u32 = 14;

/// ISO-8601 duration in hours, the format the service expects.
pub fn borrow_duration(days: u32) -> String {
    format!("PT{}H", days * 24)
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryResponse {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorResponse {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookResponse {
    pub id: i64,
    pub title: String,
    /// Number of copies owned by the library.
    #[serde(default)]
    pub count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppUserResponse {
    pub id: i64,
    pub username: String,
}

/// Reference to a nested entity, only the id is read.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct IdRef {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowResponse {
    pub id: i64,
    #[serde(default)]
    pub app_user: Option<IdRef>,
    #[serde(default)]
    pub book: Option<IdRef>,
}

impl BorrowResponse {
    /// `(user id, book id)` when the service echoed both.
    pub fn pairing(&self) -> Option<(i64, i64)> {
        Some((self.app_user?.id, self.book?.id))
    }
}

#[derive(Debug, Serialize)]
pub struct NewCategory<'a> {
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub struct NewAuthor<'a> {
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBook<'a> {
    pub title: &'a str,
    pub count: u32,
    pub author_id: i64,
    pub category_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct Registration<'a> {
    pub username: &'a str,
    pub firstname: &'a str,
    pub lastname: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBorrow {
    pub borrow_duration: String,
    pub book_id: i64,
    pub app_user_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview<'a> {
    pub rating: u8,
    pub comment: &'a str,
    pub app_user_id: i64,
    pub book_id: i64,
}
