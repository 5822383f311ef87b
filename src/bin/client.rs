//! Ristretto Client - command line access to a running cache server
//!
//! Every command prints the server's JSON answer, pretty-printed.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ristretto::client::{CacheClient, DEFAULT_SERVER_URL};
use ristretto::models::{GetResponse, SetRequest};

#[derive(Parser)]
#[command(name = "ristretto-client")]
#[command(about = "Talk to a ristretto cache server")]
#[command(version)]
struct Cli {
    /// Server base URL
    #[arg(short, long, global = true, default_value = DEFAULT_SERVER_URL)]
    server: String,

    /// Retries on connection failure
    #[arg(short, long, global = true, default_value = "3")]
    retries: u32,

    /// Base delay between retries, in milliseconds
    #[arg(long, global = true, default_value = "200")]
    backoff_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a value
    Get { key: String },

    /// Store a value
    Set {
        key: String,
        value: String,

        /// Cost in capacity units (default: key + value length)
        #[arg(short, long)]
        cost: Option<u64>,

        /// Time to live in seconds
        #[arg(short, long)]
        ttl: Option<u64>,
    },

    /// Delete a key
    Del { key: String },

    /// Remove every entry
    Clear,

    /// Show cache statistics
    Stats,

    /// Check server health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays pure JSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ristretto=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let client = CacheClient::new(&cli.server)?
        .with_retries(cli.retries, Duration::from_millis(cli.backoff_ms));

    match cli.command {
        Commands::Get { key } => match client.get(&key).await? {
            Some(value) => print_json(&GetResponse::new(key, value)),
            None => bail!("key '{}' not found", key),
        },
        Commands::Set {
            key,
            value,
            cost,
            ttl,
        } => {
            let request = SetRequest {
                cost,
                ttl,
                ..SetRequest::new(key, value)
            };
            print_json(&client.set(&request).await?)
        }
        Commands::Del { key } => print_json(&client.delete(&key).await?),
        Commands::Clear => print_json(&client.clear().await?),
        Commands::Stats => print_json(&client.stats().await?),
        Commands::Health => print_json(&client.health().await?),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to format response")?;
    println!("{}", json);
    Ok(())
}
