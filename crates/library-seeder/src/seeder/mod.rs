//! Seeding orchestration.
//!
//! [`Seeder::run`] reconciles one entity type at a time, in dependency order:
//! categories, authors, books, users, borrows, returns, reviews, queue joins
//! and finally notification scenarios. Every stage lists what the service
//! already has and only creates the difference.

pub mod catalog;
pub mod circulation;
pub mod members;

use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use reqwest::Method;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::config::{AttemptCaps, SeedConfig};
use crate::dataset::{DatasetBook, DatasetError, iter_books, resolve_dataset_dir};
use crate::generators::{CategoryNameGenerator, ReviewGenerator, UserGenerator};
use crate::state::{SeedState, StateError, Summary};

/// Endpoint polled for readiness and used to verify admin credentials.
pub const LOGIN_PATH: &str = "/auth/login";

#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(
        "Service not ready after {timeout:?} (base_url={base_url}): {last_error}"
    )]
    NotReady {
        timeout: Duration,
        base_url: String,
        last_error: String,
    },
}

/// Mutable state shared by the stages of one run.
pub struct SeedContext<'a> {
    pub client: &'a ApiClient,
    /// Seeded once per run; every random choice draws from it.
    pub rng: StdRng,
    pub caps: AttemptCaps,
    pub user_gen: UserGenerator,
    pub category_names: CategoryNameGenerator,
    pub review_gen: ReviewGenerator,
}

impl<'a> SeedContext<'a> {
    pub fn new(client: &'a ApiClient, random_seed: u64, caps: AttemptCaps) -> Self {
        Self {
            client,
            rng: StdRng::seed_from_u64(random_seed),
            caps,
            user_gen: UserGenerator::new(),
            category_names: CategoryNameGenerator::new(),
            review_gen: ReviewGenerator::new(),
        }
    }
}

/// Turns an HTTP failure inside a bulk loop into a skipped item.
///
/// 400 and 409 mean "already exists" or "invalid pairing" and are expected;
/// other statuses are logged. Transport failures still propagate.
pub(crate) fn tolerate_http<T>(
    result: Result<T, ApiError>,
    action: &str,
) -> Result<Option<T>, ApiError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_conflict() => {
            debug!(
                "{} skipped ({}): {}",
                action,
                e.status().unwrap_or_default(),
                e.body().unwrap_or_default()
            );
            Ok(None)
        }
        Err(e) if e.is_http() => {
            warn!(
                "{} failed ({}): {}",
                action,
                e.status().unwrap_or_default(),
                e.body().unwrap_or_default()
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Drives a full seeding run against one service.
pub struct Seeder {
    client: ApiClient,
    config: SeedConfig,
}

impl Seeder {
    pub fn new(client: ApiClient, config: SeedConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Runs every stage and writes the state file.
    ///
    /// Nothing is rolled back on failure; the state file is only written
    /// once all stages have finished.
    pub async fn run(&self) -> Result<Summary, SeedError> {
        self.wait_for_service().await?;
        self.login_admin().await?;

        let state_file = &self.config.state_file;
        let mut state = SeedState::load(state_file);

        let mut ctx = SeedContext::new(&self.client, self.config.random_seed, self.config.caps);
        let mut dataset_books = self.load_dataset().await?;
        dataset_books.shuffle(&mut ctx.rng);
        info!("Loaded {} dataset books", dataset_books.len());

        let targets = self.config.targets;
        let password = self.config.user_password.as_str();

        let categories = catalog::ensure_categories(&mut ctx, targets.extra_categories).await?;
        let category_ids: Vec<i64> = categories.values().copied().collect();
        let authors = catalog::ensure_authors(&mut ctx, &dataset_books, targets.authors).await?;
        let books = catalog::ensure_books(
            &mut ctx,
            &dataset_books,
            &authors,
            &category_ids,
            targets.books,
        )
        .await?;
        let users = members::ensure_users(&mut ctx, targets.users, password).await?;

        let book_ids: Vec<i64> = books.values().copied().collect();
        let mut borrows =
            circulation::create_borrows(&mut ctx, &users, &book_ids, targets.borrows).await?;
        let returned = circulation::return_some(&mut ctx, &mut borrows, targets.returns).await?;
        let reviews = circulation::create_reviews(&mut ctx, &borrows, targets.reviews).await?;
        let queue_joins = circulation::create_queue_joins(
            &mut ctx,
            &users,
            password,
            &book_ids,
            targets.queue_joins,
        )
        .await?;
        let scenarios = circulation::create_notification_scenarios(
            &mut ctx,
            &users,
            password,
            &book_ids,
            targets.queue_scenarios,
        )
        .await?;

        let summary = Summary {
            categories: categories.len(),
            authors: authors.len(),
            books: books.len(),
            users: users.len(),
            created_borrows: borrows.len(),
            returned_borrows: returned,
            created_reviews: reviews,
            queue_joins,
            queue_scenarios: scenarios,
        };

        state.categories = categories;
        state.authors = authors;
        state.books = books;
        state.users = users;
        state.user_password_hint = Some(self.config.user_password.clone());
        state.summary = Some(summary);
        state.save(state_file)?;
        info!("Wrote seeding state to {}", state_file.display());

        Ok(summary)
    }

    async fn load_dataset(&self) -> Result<Vec<DatasetBook>, SeedError> {
        let dataset = &self.config.dataset;
        let dir = resolve_dataset_dir(&dataset.id, dataset.path.as_deref()).await?;
        Ok(iter_books(&dir, dataset.encoding)?
            .with_limit(dataset.limit)
            .collect())
    }

    /// Polls the login endpoint until it answers 200 or the policy times out.
    pub async fn wait_for_service(&self) -> Result<(), SeedError> {
        let policy = self.config.readiness;
        let deadline = Instant::now() + policy.timeout;
        let mut last_error = None;

        while Instant::now() < deadline {
            match self.check_login().await {
                Ok(()) => {
                    info!("Service ready at {}", self.client.base_url());
                    return Ok(());
                }
                Err(e) => {
                    debug!("Service not ready yet: {}", e);
                    last_error = Some(e);
                    tokio::time::sleep(policy.interval).await;
                }
            }
        }

        Err(SeedError::NotReady {
            timeout: policy.timeout,
            base_url: self.client.base_url().to_string(),
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no response".to_string()),
        })
    }

    async fn login_admin(&self) -> Result<(), SeedError> {
        self.check_login().await?;
        Ok(())
    }

    async fn check_login(&self) -> Result<(), ApiError> {
        self.client
            .request(Method::GET, LOGIN_PATH, None, None, Some(&[200]))
            .await?;
        Ok(())
    }
}
