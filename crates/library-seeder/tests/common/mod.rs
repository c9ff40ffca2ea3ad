//! In-process stand-in for the library service.
//!
//! Enforces the rules the seeder has to cope with: unique names, a borrow
//! needs a free copy, reviews need a prior borrow, queue joins authenticate
//! as the joining user.

#![allow(dead_code)]

use std::path::Path as FsPath;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use library_seeder::api::{BasicAuth, ClientConfig, RetryPolicy};
use library_seeder::config::{AttemptCaps, DatasetConfig, ReadinessPolicy, SeedConfig, SeedTargets};
use library_seeder::dataset::TextEncoding;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub count: i64,
    pub author_id: i64,
    pub category_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct Borrow {
    pub id: i64,
    pub user_id: i64,
    pub book_id: i64,
    pub duration: String,
    pub returned: bool,
}

/// Queue head told that a returned book is free again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub book_id: i64,
    pub user_id: i64,
    /// Whoever returned the book.
    pub borrower_id: i64,
}

#[derive(Debug, Default)]
pub struct Library {
    next_id: i64,
    pub categories: Vec<(i64, String)>,
    pub authors: Vec<(i64, String)>,
    pub books: Vec<Book>,
    pub users: Vec<User>,
    pub borrows: Vec<Borrow>,
    /// (user id, book id)
    pub reviews: Vec<(i64, i64)>,
    /// (book id, user id), oldest first
    pub queue: Vec<(i64, i64)>,
    pub notified: Vec<Notification>,
    pub mutating_requests: usize,
    /// Login checks answered with 503 before the service comes up.
    pub unavailable_logins: usize,
}

impl Library {
    pub fn with_admin() -> Self {
        let mut library = Self::default();
        let id = library.next_id();
        library.users.push(User {
            id,
            username: "admin".to_string(),
            password: "admin".to_string(),
            email: "admin@biblioteka.local".to_string(),
        });
        library
    }

    pub fn with_categories(mut self, names: &[&str]) -> Self {
        for name in names {
            let id = self.next_id();
            self.categories.push((id, name.to_string()));
        }
        self
    }

    /// Registers borrowers sharing one password; returns username to id.
    pub fn with_users(mut self, usernames: &[&str], password: &str) -> Self {
        for username in usernames {
            let id = self.next_id();
            self.users.push(User {
                id,
                username: username.to_string(),
                password: password.to_string(),
                email: format!("{username}@example.com"),
            });
        }
        self
    }

    /// Adds a book, and its author if new.
    pub fn with_book(mut self, title: &str, author: &str, count: i64) -> Self {
        let author_id = match self.authors.iter().find(|(_, n)| n == author) {
            Some((id, _)) => *id,
            None => {
                let id = self.next_id();
                self.authors.push((id, author.to_string()));
                id
            }
        };
        let id = self.next_id();
        self.books.push(Book {
            id,
            title: title.to_string(),
            count,
            author_id,
            category_ids: Vec::new(),
        });
        self
    }

    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn active_borrows(&self, book_id: i64) -> i64 {
        self.borrows
            .iter()
            .filter(|b| b.book_id == book_id && !b.returned)
            .count() as i64
    }

    fn has_open_borrow(&self, user_id: i64, book_id: i64) -> bool {
        self.borrows
            .iter()
            .any(|b| b.user_id == user_id && b.book_id == book_id && !b.returned)
    }

    fn authenticate(&self, headers: &HeaderMap) -> Option<&User> {
        let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
        let encoded = header.strip_prefix("Basic ")?;
        let decoded = String::from_utf8(STANDARD.decode(encoded).ok()?).ok()?;
        let (username, password) = decoded.split_once(':')?;
        self.users
            .iter()
            .find(|u| u.username == username && u.password == password)
    }
}

pub type Shared = Arc<Mutex<Library>>;

/// A running mock service on an ephemeral port, stopped on drop.
pub struct MockService {
    pub base_url: String,
    library: Shared,
    handle: JoinHandle<()>,
}

impl MockService {
    pub async fn start(library: Library) -> Self {
        let library = Arc::new(Mutex::new(library));
        let app = router(library.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            library,
            handle,
        }
    }

    pub fn library(&self) -> MutexGuard<'_, Library> {
        self.library.lock().unwrap()
    }
}

impl Drop for MockService {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn router(library: Shared) -> Router {
    Router::new()
        .route("/auth/login", get(login))
        .route("/auth/register", post(register))
        .route("/appusers", get(list_users))
        .route("/categories", get(list_categories).post(create_category))
        .route("/authors", get(list_authors).post(create_author))
        .route("/books", get(list_books).post(create_book))
        .route("/books/{id}/queue/join", post(join_queue))
        .route("/borrows", post(create_borrow))
        .route("/borrows/{id}/return", post(return_borrow))
        .route("/review", post(create_review))
        .with_state(library)
}

fn mutate(library: &Shared) -> MutexGuard<'_, Library> {
    let mut guard = library.lock().unwrap();
    guard.mutating_requests += 1;
    guard
}

fn reject(status: StatusCode, message: &str) -> Response {
    (status, message.to_string()).into_response()
}

async fn login(State(library): State<Shared>, headers: HeaderMap) -> Response {
    let mut lib = library.lock().unwrap();
    if lib.unavailable_logins > 0 {
        lib.unavailable_logins -= 1;
        return reject(StatusCode::SERVICE_UNAVAILABLE, "starting");
    }
    match lib.authenticate(&headers) {
        Some(user) if user.username == "admin" => {
            (StatusCode::OK, format!("Logged in as {}", user.username)).into_response()
        }
        _ => reject(StatusCode::UNAUTHORIZED, "bad credentials"),
    }
}

async fn register(State(library): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut lib = mutate(&library);
    let (Some(username), Some(email), Some(password)) = (
        body["username"].as_str(),
        body["email"].as_str(),
        body["password"].as_str(),
    ) else {
        return reject(StatusCode::BAD_REQUEST, "missing fields");
    };
    if body["firstname"].as_str().is_none() || body["lastname"].as_str().is_none() {
        return reject(StatusCode::BAD_REQUEST, "missing name");
    }
    if lib
        .users
        .iter()
        .any(|u| u.username == username || u.email == email)
    {
        return reject(StatusCode::CONFLICT, "user exists");
    }

    let id = lib.next_id();
    lib.users.push(User {
        id,
        username: username.to_string(),
        password: password.to_string(),
        email: email.to_string(),
    });
    StatusCode::OK.into_response()
}

fn user_json(user: &User) -> Value {
    json!({"id": user.id, "username": user.username, "email": user.email})
}

async fn list_users(State(library): State<Shared>) -> Json<Value> {
    let lib = library.lock().unwrap();
    Json(lib.users.iter().map(user_json).collect())
}

async fn list_categories(State(library): State<Shared>) -> Json<Value> {
    let lib = library.lock().unwrap();
    Json(
        lib.categories
            .iter()
            .map(|(id, name)| json!({"id": id, "name": name}))
            .collect(),
    )
}

async fn create_category(State(library): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut lib = mutate(&library);
    let Some(name) = body["name"].as_str().filter(|n| !n.is_empty()) else {
        return reject(StatusCode::BAD_REQUEST, "name required");
    };
    if lib.categories.iter().any(|(_, n)| n == name) {
        return reject(StatusCode::CONFLICT, "category exists");
    }
    let id = lib.next_id();
    lib.categories.push((id, name.to_string()));
    (StatusCode::CREATED, Json(json!({"id": id, "name": name}))).into_response()
}

async fn list_authors(State(library): State<Shared>) -> Json<Value> {
    let lib = library.lock().unwrap();
    Json(
        lib.authors
            .iter()
            .map(|(id, name)| json!({"id": id, "name": name}))
            .collect(),
    )
}

async fn create_author(State(library): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut lib = mutate(&library);
    let Some(name) = body["name"].as_str().filter(|n| !n.is_empty()) else {
        return reject(StatusCode::BAD_REQUEST, "name required");
    };
    if lib.authors.iter().any(|(_, n)| n == name) {
        return reject(StatusCode::CONFLICT, "author exists");
    }
    let id = lib.next_id();
    lib.authors.push((id, name.to_string()));
    (StatusCode::CREATED, Json(json!({"id": id, "name": name}))).into_response()
}

async fn list_books(State(library): State<Shared>) -> Json<Value> {
    let lib = library.lock().unwrap();
    Json(
        lib.books
            .iter()
            .map(|b| {
                let categories: Vec<Value> =
                    b.category_ids.iter().map(|id| json!({"id": id})).collect();
                json!({
                    "id": b.id,
                    "title": b.title,
                    "count": b.count,
                    "author": {"id": b.author_id},
                    "categories": categories,
                })
            })
            .collect(),
    )
}

async fn create_book(State(library): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut lib = mutate(&library);
    let (Some(title), Some(count), Some(author_id)) = (
        body["title"].as_str(),
        body["count"].as_i64(),
        body["authorId"].as_i64(),
    ) else {
        return reject(StatusCode::BAD_REQUEST, "missing fields");
    };
    if count < 1 {
        return reject(StatusCode::BAD_REQUEST, "count must be positive");
    }
    if !lib.authors.iter().any(|(id, _)| *id == author_id) {
        return reject(StatusCode::BAD_REQUEST, "unknown author");
    }
    let category_ids: Vec<i64> = body["categoryIds"]
        .as_array()
        .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default();
    if category_ids
        .iter()
        .any(|cid| !lib.categories.iter().any(|(id, _)| id == cid))
    {
        return reject(StatusCode::BAD_REQUEST, "unknown category");
    }
    if lib.books.iter().any(|b| b.title == title) {
        return reject(StatusCode::CONFLICT, "book exists");
    }

    let id = lib.next_id();
    lib.books.push(Book {
        id,
        title: title.to_string(),
        count,
        author_id,
        category_ids,
    });
    (
        StatusCode::CREATED,
        Json(json!({"id": id, "title": title, "count": count})),
    )
        .into_response()
}

async fn create_borrow(State(library): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut lib = mutate(&library);
    let (Some(duration), Some(book_id), Some(user_id)) = (
        body["borrowDuration"].as_str(),
        body["bookId"].as_i64(),
        body["appUserId"].as_i64(),
    ) else {
        return reject(StatusCode::BAD_REQUEST, "missing fields");
    };
    if !(duration.starts_with("PT") && duration.ends_with('H')) {
        return reject(StatusCode::BAD_REQUEST, "bad duration");
    }
    let Some(user) = lib.users.iter().find(|u| u.id == user_id).cloned() else {
        return reject(StatusCode::BAD_REQUEST, "unknown user");
    };
    let Some(book) = lib.books.iter().find(|b| b.id == book_id).cloned() else {
        return reject(StatusCode::BAD_REQUEST, "unknown book");
    };
    if lib.active_borrows(book_id) >= book.count {
        return reject(StatusCode::BAD_REQUEST, "no copies available");
    }
    if lib.has_open_borrow(user_id, book_id) {
        return reject(StatusCode::BAD_REQUEST, "already borrowed");
    }

    let id = lib.next_id();
    lib.borrows.push(Borrow {
        id,
        user_id,
        book_id,
        duration: duration.to_string(),
        returned: false,
    });
    (
        StatusCode::CREATED,
        Json(json!({
            "id": id,
            "borrowDuration": duration,
            "appUser": {"id": user.id, "username": user.username},
            "book": {"id": book.id, "title": book.title},
        })),
    )
        .into_response()
}

async fn return_borrow(State(library): State<Shared>, Path(id): Path<i64>) -> Response {
    let mut lib = mutate(&library);
    let Some(borrow) = lib.borrows.iter_mut().find(|b| b.id == id) else {
        return reject(StatusCode::NOT_FOUND, "no such borrow");
    };
    if borrow.returned {
        return reject(StatusCode::BAD_REQUEST, "already returned");
    }
    borrow.returned = true;
    let (book_id, borrower_id) = (borrow.book_id, borrow.user_id);

    if let Some(pos) = lib.queue.iter().position(|(b, _)| *b == book_id) {
        let (_, user_id) = lib.queue.remove(pos);
        lib.notified.push(Notification {
            book_id,
            user_id,
            borrower_id,
        });
    }
    StatusCode::OK.into_response()
}

async fn create_review(State(library): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut lib = mutate(&library);
    let (Some(rating), Some(user_id), Some(book_id)) = (
        body["rating"].as_i64(),
        body["appUserId"].as_i64(),
        body["bookId"].as_i64(),
    ) else {
        return reject(StatusCode::BAD_REQUEST, "missing fields");
    };
    if !(1..=5).contains(&rating) || body["comment"].as_str().is_none() {
        return reject(StatusCode::BAD_REQUEST, "invalid review");
    }
    if !lib
        .borrows
        .iter()
        .any(|b| b.user_id == user_id && b.book_id == book_id)
    {
        return reject(StatusCode::BAD_REQUEST, "book was never borrowed");
    }
    if lib.reviews.contains(&(user_id, book_id)) {
        return reject(StatusCode::CONFLICT, "already reviewed");
    }
    lib.reviews.push((user_id, book_id));
    let id = lib.next_id();
    (StatusCode::CREATED, Json(json!({"id": id, "rating": rating}))).into_response()
}

async fn join_queue(
    State(library): State<Shared>,
    Path(book_id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let mut lib = mutate(&library);
    let Some(user_id) = lib.authenticate(&headers).map(|u| u.id) else {
        return reject(StatusCode::UNAUTHORIZED, "bad credentials");
    };
    if !lib.books.iter().any(|b| b.id == book_id) {
        return reject(StatusCode::NOT_FOUND, "no such book");
    }
    if lib.queue.contains(&(book_id, user_id)) {
        return reject(StatusCode::CONFLICT, "already queued");
    }
    lib.queue.push((book_id, user_id));
    let position = lib.queue.iter().filter(|(b, _)| *b == book_id).count();
    (StatusCode::CREATED, Json(json!({"position": position}))).into_response()
}

/// Client settings for the mock: admin credentials and near-instant retries.
pub fn client_config(base_url: &str, dry_run: bool) -> ClientConfig {
    ClientConfig {
        base_url: base_url.to_string(),
        default_auth: Some(BasicAuth::new("admin", "admin")),
        dry_run,
        timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            base_delay: Duration::from_millis(5),
            ..Default::default()
        },
    }
}

/// Small seeding targets against a dataset directory.
pub fn seed_config(dataset_dir: &FsPath, state_file: &FsPath) -> SeedConfig {
    SeedConfig {
        dataset: DatasetConfig {
            path: Some(dataset_dir.to_path_buf()),
            encoding: TextEncoding::Latin1,
            ..Default::default()
        },
        targets: SeedTargets {
            extra_categories: 3,
            authors: 8,
            books: 12,
            users: 6,
            borrows: 10,
            returns: 3,
            reviews: 6,
            queue_joins: 4,
            queue_scenarios: 2,
        },
        caps: AttemptCaps::default(),
        readiness: ReadinessPolicy {
            timeout: Duration::from_secs(5),
            interval: Duration::from_millis(20),
        },
        random_seed: 42,
        state_file: state_file.to_path_buf(),
        ..Default::default()
    }
}

/// Writes a Latin-1 `Books.csv` in the layout of the public book-crossing dump.
pub fn write_dataset(dir: &FsPath) {
    let authors = [
        "Jane Austen",
        "Charles Dickens",
        "George Eliot",
        "Leo Tolstoy",
        "Virginia Woolf",
        "Mark Twain",
        "Herman Melville",
        "Emily Bront\u{eb}",
        "Gabriel Garc\u{ed}a M\u{e1}rquez",
        "Fyodor Dostoevsky",
    ];

    let mut text = String::from(
        "ISBN,Book-Title,Book-Author,Year-Of-Publication,Publisher,\
         Image-URL-S,Image-URL-M,Image-URL-L\n",
    );
    for i in 0..30 {
        let author = authors[i % authors.len()];
        text.push_str(&format!(
            "{:010},\"Volume {} of  the Caf\u{e9} Series\",{},{},Penguin,,,\n",
            1_000_000 + i,
            i + 1,
            author,
            1900 + i
        ));
    }
    text.push_str("0000000001,,Nobody,2000,Penguin,,,\n");
    text.push_str("0000000002,Untitled Manuscript,,2000,Penguin,,,\n");

    let latin1: Vec<u8> = text.chars().map(|c| c as u32 as u8).collect();
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join("Books.csv"), latin1).unwrap();
}
