//! Configuration types for seeding runs.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dataset::TextEncoding;

/// Dataset used when no local path is given.
pub const DEFAULT_DATASET_ID: &str = "arashnic/book-recommendation-dataset";

/// How many entities of each kind a run should end up with (or create).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedTargets {
    /// Extra categories to create on top of whatever exists.
    pub extra_categories: usize,
    /// Total authors wanted, pre-existing ones included.
    pub authors: usize,
    /// Total books wanted, pre-existing ones included.
    pub books: usize,
    /// Registration attempts for new borrower accounts.
    pub users: usize,
    /// Successful borrows to create.
    pub borrows: usize,
    /// How many of the created borrows to return.
    pub returns: usize,
    /// Reviews to create for borrowed books.
    pub reviews: usize,
    /// Queue joins to create as regular users.
    pub queue_joins: usize,
    /// "Borrow out, queue, return" rounds meant to trigger notifications.
    pub queue_scenarios: usize,
}

impl Default for SeedTargets {
    fn default() -> Self {
        Self {
            extra_categories: 0,
            authors: 200,
            books: 500,
            users: 100,
            borrows: 200,
            returns: 50,
            reviews: 200,
            queue_joins: 50,
            queue_scenarios: 10,
        }
    }
}

/// Upper bounds on retry loops that pick random pairings.
///
/// A loop aiming at `target` successes gives up after `target * multiplier`
/// attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptCaps {
    /// Used by borrows, reviews and queue joins.
    pub multiplier: usize,
    /// Used by notification scenarios.
    pub scenario_multiplier: usize,
}

impl AttemptCaps {
    pub fn for_target(&self, target: usize) -> usize {
        target.saturating_mul(self.multiplier)
    }

    pub fn for_scenarios(&self, target: usize) -> usize {
        target.saturating_mul(self.scenario_multiplier)
    }
}

impl Default for AttemptCaps {
    fn default() -> Self {
        Self {
            multiplier: 6,
            scenario_multiplier: 10,
        }
    }
}

/// How long to wait for the service to answer the login check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(180),
            interval: Duration::from_secs(2),
        }
    }
}

/// Where the book dataset comes from.
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    /// Dataset-hub identifier, `owner/name`.
    pub id: String,
    /// Local directory; takes precedence over `id` when set.
    pub path: Option<PathBuf>,
    pub encoding: TextEncoding,
    /// Read at most this many CSV rows.
    pub limit: Option<usize>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            id: DEFAULT_DATASET_ID.to_string(),
            path: None,
            encoding: TextEncoding::default(),
            limit: None,
        }
    }
}

/// Full configuration for a [`Seeder`](crate::seeder::Seeder) run.
#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub dataset: DatasetConfig,
    pub targets: SeedTargets,
    pub caps: AttemptCaps,
    pub readiness: ReadinessPolicy,

    /// Shared password for every registered borrower.
    pub user_password: String,

    /// Seed for the run's random generator.
    pub random_seed: u64,

    /// Where the JSON snapshot of created ids is written.
    pub state_file: PathBuf,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            dataset: DatasetConfig::default(),
            targets: SeedTargets::default(),
            caps: AttemptCaps::default(),
            readiness: ReadinessPolicy::default(),
            user_password: "password".to_string(),
            random_seed: 42,
            state_file: PathBuf::from("seed-state.json"),
        }
    }
}
