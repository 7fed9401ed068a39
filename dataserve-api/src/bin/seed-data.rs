//! Test Data Seeder
//!
//! Inserts users with the `user` access level and a batch of records for
//! each, using a fixed number of concurrent workers. Database settings come
//! from the service configuration (`CONFIG_PATH` and `DATASERVE_DB_*`).
//!
//! Usage:
//!   cargo run -p dataserve-api --bin seed-data -- --users 1000 --data 5 --workers 6 --migrate

use std::time::Instant;

use clap::Parser;
use dataserve_api::telemetry::{init_tracing, TelemetryConfig};
use dataserve_api::{ApiError, ApiResult, DbClient, ServiceConfig};
use rand::seq::IndexedRandom;
use tokio::task::JoinSet;

const LOREM: &[&str] = &[
    "Lorem ipsum dolor sit amet, consectetur adipiscing elit.",
    "Sed do eiusmod tempor incididunt ut labore et dolore magna aliqua.",
    "Ut enim ad minim veniam, quis nostrud exercitation ullamco laboris.",
    "Duis aute irure dolor in reprehenderit in voluptate velit esse cillum.",
    "Excepteur sint occaecat cupidatat non proident, sunt in culpa qui officia.",
];

#[derive(Parser)]
#[command(name = "seed-data")]
#[command(about = "Fill the dataserve database with test users and records", long_about = None)]
struct Cli {
    /// Number of users to create
    #[arg(long, default_value_t = 1000)]
    users: usize,

    /// Records per user
    #[arg(long, default_value_t = 5)]
    data: usize,

    /// Concurrent workers
    #[arg(long, default_value_t = 6)]
    workers: usize,

    /// Create the tables first
    #[arg(long)]
    migrate: bool,
}

fn payloads(count: usize) -> Vec<String> {
    let mut rng = rand::rng();
    (0..count)
        .map(|_| LOREM.choose(&mut rng).copied().unwrap_or_default().to_string())
        .collect()
}

/// Users handled by worker `worker` out of `workers`.
fn share(users: usize, workers: usize, worker: usize) -> usize {
    users / workers + usize::from(worker < users % workers)
}

async fn seed_worker(db: DbClient, users: usize, records_per_user: usize) -> ApiResult<u64> {
    let mut inserted = 0;
    for _ in 0..users {
        let user_id = db.create_user("user").await?;
        inserted += db.insert_records(user_id, &payloads(records_per_user)).await?;
    }
    Ok(inserted)
}

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(&TelemetryConfig::default())?;
    let cli = Cli::parse();

    if cli.workers == 0 {
        return Err(ApiError::invalid_input("--workers must be at least 1"));
    }

    let config = ServiceConfig::load()?;
    let db = DbClient::from_config(&config.db.to_db_config())?;

    if cli.migrate {
        db.apply_schema().await?;
    }

    let started = Instant::now();
    let mut workers = JoinSet::new();
    for worker in 0..cli.workers {
        let users = share(cli.users, cli.workers, worker);
        workers.spawn(seed_worker(db.clone(), users, cli.data));
    }

    let mut inserted = 0;
    while let Some(joined) = workers.join_next().await {
        let result = joined
            .map_err(|e| ApiError::internal_error(format!("Seed worker panicked: {}", e)))?;
        inserted += result?;
    }

    tracing::info!(
        users = cli.users,
        records = inserted,
        elapsed_ms = started.elapsed().as_millis(),
        "Seeding complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shares_cover_every_user() {
        for (users, workers) in [(1000, 6), (5, 6), (0, 3), (7, 1)] {
            let total: usize = (0..workers).map(|w| share(users, workers, w)).sum();
            assert_eq!(total, users);
        }
    }

    #[test]
    fn test_payloads_come_from_lorem() {
        let generated = payloads(10);
        assert_eq!(generated.len(), 10);
        assert!(generated.iter().all(|p| LOREM.contains(&p.as_str())));
    }
}
