//! Bearer Token Generator
//!
//! Prints a signed token for one user, for manual requests against `/data`.
//!
//! Usage:
//!   cargo run -p dataserve-api --bin generate-token -- --user-id 100 --phrase example-phrase

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dataserve_api::{generate_jwt_token, ApiResult, AuthConfig, JwtSecret, SystemClock};
use dataserve_core::OwnerId;

#[derive(Parser)]
#[command(name = "generate-token")]
#[command(about = "Print a bearer token for a dataserve user", long_about = None)]
struct Cli {
    /// User id carried in the token
    #[arg(long, default_value_t = 100)]
    user_id: OwnerId,

    /// JWT code phrase the server is configured with
    #[arg(long, default_value = "example-phrase", env = "DATASERVE_JWT_CODE_PHRASE")]
    phrase: String,

    /// Token lifetime in hours
    #[arg(long, default_value_t = 24)]
    ttl_hours: u64,
}

fn run(cli: &Cli) -> ApiResult<String> {
    let secret = JwtSecret::new(cli.phrase.clone())?;
    let config = AuthConfig::new(secret).with_clock(Arc::new(SystemClock));
    let ttl = Duration::from_secs(cli.ttl_hours.saturating_mul(3600));
    generate_jwt_token(&config, cli.user_id, ttl)
}

fn main() {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(token) => println!("{}", token),
        Err(e) => {
            eprintln!("Failed to generate token: {}", e);
            std::process::exit(1);
        }
    }
}
