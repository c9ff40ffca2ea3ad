//! Demo data seeding for the Biblioteka library service.
//!
//! The seeder drives the service's HTTP API to create categories, authors,
//! books, users, borrows, reviews and hold-queue entries. Each stage lists
//! what already exists and creates only what is missing, so runs can be
//! repeated against the same service.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use library_seeder::prelude::*;
//!
//! let client = ApiClient::new(ClientConfig {
//!     base_url: "http://localhost:8080".into(),
//!     ..Default::default()
//! })?;
//! let summary = Seeder::new(client, SeedConfig::default()).run().await?;
//! println!("{}", serde_json::to_string_pretty(&summary)?);
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod generators;
pub mod seeder;
pub mod state;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::api::{ApiClient, ApiError, BasicAuth, ClientConfig, RequestStats, RetryPolicy};
    pub use crate::cli::Cli;
    pub use crate::config::{AttemptCaps, DatasetConfig, ReadinessPolicy, SeedConfig, SeedTargets};
    pub use crate::dataset::{
        DatasetBook, DatasetError, TextEncoding, iter_books, resolve_dataset_dir,
    };
    pub use crate::generators::{CategoryNameGenerator, ReviewGenerator, UserGenerator};
    pub use crate::seeder::{SeedContext, SeedError, Seeder};
    pub use crate::state::{SeedState, Summary};
}
