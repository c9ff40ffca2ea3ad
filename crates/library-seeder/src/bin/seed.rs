//! Seeds a running Biblioteka service with demo data.
//!
//! Run with:
//! ```
//! cargo run -p library-seeder --bin seed -- --dataset-path ./data --users 20
//! ```

use clap::Parser;
use library_seeder::api::ApiClient;
use library_seeder::cli::Cli;
use library_seeder::seeder::Seeder;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    let client = ApiClient::new(cli.client_config())?;
    if client.is_dry_run() {
        tracing::info!("Seeding {} (dry run)", client.base_url());
    } else {
        tracing::info!("Seeding {}", client.base_url());
    }

    let seeder = Seeder::new(client, cli.seed_config());
    let summary = seeder.run().await?;

    let stats = seeder.client().stats();
    tracing::info!(
        "Seed completed: {} requests sent, {} mutating, {} suppressed",
        stats.sent,
        stats.mutating_sent,
        stats.suppressed
    );

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
