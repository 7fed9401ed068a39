//! HTTP Load Generator
//!
//! Fires authenticated `GET /data` requests at a fixed rate, each for a
//! random user id, and prints how many responses came back per status.
//!
//! Usage:
//!   cargo run -p dataserve-api --bin load-generator -- --rps 100 --duration-secs 30

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use dataserve_api::telemetry::{init_tracing, TelemetryConfig};
use dataserve_api::{generate_jwt_token, ApiError, ApiResult, AuthConfig, JwtSecret};
use dataserve_core::OwnerId;
use rand::Rng;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

const TOKEN_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Parser)]
#[command(name = "load-generator")]
#[command(about = "Generate steady GET /data traffic against a dataserve instance", long_about = None)]
struct Cli {
    /// Base URL of the service
    #[arg(long, default_value = "http://localhost:8080")]
    host: String,

    /// Requests per second
    #[arg(long, default_value_t = 100)]
    rps: u32,

    /// How long to run
    #[arg(long, default_value_t = 60)]
    duration_secs: u64,

    /// Upper bound (inclusive) for random user ids
    #[arg(long, default_value_t = 500_000)]
    max_user_id: OwnerId,

    /// JWT code phrase the server is configured with
    #[arg(long, default_value = "example-phrase", env = "DATASERVE_JWT_CODE_PHRASE")]
    phrase: String,
}

/// Outcome of one request: the status code, or `None` on a transport error.
type Outcome = Option<u16>;

async fn send_request(
    client: reqwest::Client,
    auth: Arc<AuthConfig>,
    url: Arc<str>,
    user_id: OwnerId,
) -> Outcome {
    let token = match generate_jwt_token(&auth, user_id, TOKEN_TTL) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!(error = %e, "Failed to sign token");
            return None;
        }
    };

    match client.get(url.as_ref()).bearer_auth(token).send().await {
        Ok(response) => Some(response.status().as_u16()),
        Err(e) => {
            tracing::warn!(user_id, error = %e, "Request failed");
            None
        }
    }
}

fn summarize(outcomes: &[Outcome]) -> BTreeMap<String, u64> {
    let mut summary = BTreeMap::new();
    for outcome in outcomes {
        let label = match outcome {
            Some(status) => status.to_string(),
            None => "transport_error".to_string(),
        };
        *summary.entry(label).or_insert(0) += 1;
    }
    summary
}

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(&TelemetryConfig::default())?;
    let cli = Cli::parse();

    if cli.rps == 0 || cli.max_user_id < 1 {
        return Err(ApiError::invalid_input("--rps and --max-user-id must be positive"));
    }

    let auth = Arc::new(AuthConfig::new(JwtSecret::new(cli.phrase.clone())?));
    let url: Arc<str> = format!("{}/data", cli.host.trim_end_matches('/')).into();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| ApiError::internal_error(format!("Failed to build HTTP client: {}", e)))?;

    let period = Duration::from_secs(1) / cli.rps;
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(url = %url, rps = cli.rps, duration_secs = cli.duration_secs, "Starting load");

    let started = Instant::now();
    let deadline = started + Duration::from_secs(cli.duration_secs);
    let mut in_flight = JoinSet::new();

    while Instant::now() < deadline {
        ticker.tick().await;
        let user_id = rand::rng().random_range(1..=cli.max_user_id);
        in_flight.spawn(send_request(
            client.clone(),
            Arc::clone(&auth),
            Arc::clone(&url),
            user_id,
        ));
    }

    let mut outcomes = Vec::with_capacity(in_flight.len());
    while let Some(joined) = in_flight.join_next().await {
        outcomes.push(joined.unwrap_or(None));
    }

    tracing::info!(
        requests = outcomes.len(),
        elapsed_ms = started.elapsed().as_millis(),
        "Load complete"
    );
    for (status, count) in summarize(&outcomes) {
        println!("{}: {}", status, count);
    }

    Ok(())
}
