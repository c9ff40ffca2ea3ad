//! Command-line interface. Every flag can also come from the environment.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::api::{BasicAuth, ClientConfig};
use crate::config::{
    AttemptCaps, DEFAULT_DATASET_ID, DatasetConfig, ReadinessPolicy, SeedConfig, SeedTargets,
};
use crate::dataset::TextEncoding;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "library-seeder",
    about = "Seed the Biblioteka service via HTTP endpoints."
)]
pub struct Cli {
    /// Service base URL
    #[arg(long, env = "BASE_URL", default_value = "http://localhost:8080")]
    pub base_url: String,

    /// Admin username for HTTP Basic
    #[arg(long, env = "ADMIN_USERNAME", default_value = "admin")]
    pub admin_username: String,

    /// Admin password for HTTP Basic
    #[arg(long, env = "ADMIN_PASSWORD", default_value = "admin")]
    pub admin_password: String,

    /// Local dataset directory; skips the dataset hub
    #[arg(long, env = "DATASET_PATH")]
    pub dataset_path: Option<PathBuf>,

    /// Dataset hub id, `<owner>/<name>`
    #[arg(long, env = "DATASET_ID", default_value = DEFAULT_DATASET_ID)]
    pub dataset_id: String,

    /// Encoding of the dataset CSV
    #[arg(long, env = "DATASET_ENCODING", default_value = "ISO-8859-1")]
    pub dataset_encoding: TextEncoding,

    /// Read at most this many dataset rows
    #[arg(long, env = "DATASET_LIMIT")]
    pub dataset_limit: Option<usize>,

    /// Extra categories to create
    #[arg(long, env = "SEED_CATEGORIES", default_value_t = 0)]
    pub categories: usize,

    /// Authors wanted in total, created from the dataset
    #[arg(long, env = "SEED_AUTHORS", default_value_t = 200)]
    pub authors: usize,

    /// Books wanted in total, created from the dataset
    #[arg(long, env = "SEED_BOOKS", default_value_t = 500)]
    pub books: usize,

    /// Borrower users to register
    #[arg(long, env = "SEED_USERS", default_value_t = 100)]
    pub users: usize,

    /// Borrow records to create
    #[arg(long, env = "SEED_BORROWS", default_value_t = 200)]
    pub borrows: usize,

    /// How many of the created borrows to return
    #[arg(long, env = "SEED_RETURNS", default_value_t = 50)]
    pub returns: usize,

    /// Reviews to create (requires borrows)
    #[arg(long, env = "SEED_REVIEWS", default_value_t = 200)]
    pub reviews: usize,

    /// Queue joins to create as regular users
    #[arg(long, env = "SEED_QUEUE_JOINS", default_value_t = 50)]
    pub queue_joins: usize,

    /// "Borrow out + queue + return" rounds that should notify a user
    #[arg(long, env = "SEED_QUEUE_SCENARIOS", default_value_t = 10)]
    pub queue_scenarios: usize,

    /// Attempts per target item for borrows, reviews and queue joins
    #[arg(long, env = "SEED_ATTEMPT_MULTIPLIER", default_value_t = 6)]
    pub attempt_multiplier: usize,

    /// Attempts per target item for notification scenarios
    #[arg(long, env = "SEED_SCENARIO_ATTEMPT_MULTIPLIER", default_value_t = 10)]
    pub scenario_attempt_multiplier: usize,

    /// Password for created borrower users
    #[arg(long, env = "USER_PASSWORD", default_value = "password")]
    pub user_password: String,

    /// Where to persist seeding state
    #[arg(long, env = "SEED_STATE_FILE", default_value = "seed-state.json")]
    pub state_file: PathBuf,

    /// Deterministic random seed
    #[arg(long, env = "RANDOM_SEED", default_value_t = 42)]
    pub random_seed: u64,

    /// Don't send mutating requests, only log planned operations
    #[arg(long, env = "DRY_RUN")]
    pub dry_run: bool,

    /// Log level, used when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Seconds to wait for the service to accept the admin login
    #[arg(long, env = "READY_TIMEOUT_SECS", default_value_t = 180)]
    pub ready_timeout_secs: u64,
}

impl Cli {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            default_auth: Some(BasicAuth::new(
                self.admin_username.clone(),
                self.admin_password.clone(),
            )),
            dry_run: self.dry_run,
            ..Default::default()
        }
    }

    pub fn seed_config(&self) -> SeedConfig {
        SeedConfig {
            dataset: DatasetConfig {
                id: self.dataset_id.clone(),
                path: self.dataset_path.clone(),
                encoding: self.dataset_encoding,
                limit: self.dataset_limit,
            },
            targets: SeedTargets {
                extra_categories: self.categories,
                authors: self.authors,
                books: self.books,
                users: self.users,
                borrows: self.borrows,
                returns: self.returns,
                reviews: self.reviews,
                queue_joins: self.queue_joins,
                queue_scenarios: self.queue_scenarios,
            },
            caps: AttemptCaps {
                multiplier: self.attempt_multiplier,
                scenario_multiplier: self.scenario_attempt_multiplier,
            },
            readiness: ReadinessPolicy {
                timeout: Duration::from_secs(self.ready_timeout_secs),
                ..Default::default()
            },
            user_password: self.user_password.clone(),
            random_seed: self.random_seed,
            state_file: self.state_file.clone(),
        }
    }

    /// `tracing` filter directive for `--log-level`.
    ///
    /// Accepts the `logging` level names too (`WARNING`, `CRITICAL`), which
    /// `EnvFilter` would otherwise read as target names.
    pub fn log_filter(&self) -> String {
        let level = self.log_level.trim().to_ascii_lowercase();
        match level.as_str() {
            "warning" => "warn".to_string(),
            "critical" | "fatal" => "error".to_string(),
            "notset" => "trace".to_string(),
            _ => level,
        }
    }
}
