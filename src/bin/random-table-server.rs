//! Random table server binary.
//!
//! # Usage
//!
//! ```bash
//! # Local randomness on the default port
//! random-table-server
//!
//! # Remote entropy, falling back to local randomness when it fails
//! random-table-server --entropy-url http://entropy-proxy/integers/ --entropy-fallback
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use random_table::randomness::{
    LocalRandomSource, RandomnessSource, RemoteEntropySource, SeededRandomSource,
};
use random_table::transport::session::{
    DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_INVALID_REQUESTS, DEFAULT_MAX_RANGE_LEN,
    DEFAULT_WRITE_TIMEOUT,
};
use random_table::{EntropyPolicy, ServerConfig, SessionPolicy, TableServer};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Random table server
#[derive(Parser, Debug)]
#[command(name = "random-table-server")]
#[command(about = "Serves tables of unique random integers over TCP")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:3215")]
    bind: SocketAddr,

    /// Maximum concurrent sessions
    #[arg(long, default_value_t = random_table::transport::DEFAULT_MAX_SESSIONS)]
    max_sessions: usize,

    /// Consecutive invalid requests before a session is closed
    #[arg(long, default_value_t = DEFAULT_MAX_INVALID_REQUESTS)]
    max_invalid_requests: u32,

    /// Seconds a session may sit idle between requests
    #[arg(long, default_value_t = DEFAULT_IDLE_TIMEOUT.as_secs())]
    idle_timeout_secs: u64,

    /// Seconds allowed to write one response
    #[arg(long, default_value_t = DEFAULT_WRITE_TIMEOUT.as_secs())]
    write_timeout_secs: u64,

    /// Largest range (max - min + 1) served
    #[arg(long, default_value_t = DEFAULT_MAX_RANGE_LEN)]
    max_range: u64,

    /// HTTP endpoint of a remote entropy service
    #[arg(long, env = "RANDOM_ENTROPY_URL")]
    entropy_url: Option<String>,

    /// Timeout for one remote entropy request, in milliseconds
    #[arg(long, default_value = "5000")]
    entropy_timeout_ms: u64,

    /// Fall back to local randomness when the remote service fails
    #[arg(long)]
    entropy_fallback: bool,

    /// Seed for reproducible tables (debugging only)
    #[arg(long, conflicts_with = "entropy_url")]
    seed: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn source(&self) -> random_table::Result<Arc<dyn RandomnessSource>> {
        if let Some(url) = &self.entropy_url {
            let remote =
                RemoteEntropySource::new(url, Duration::from_millis(self.entropy_timeout_ms))?;
            let policy = if self.entropy_fallback {
                EntropyPolicy::FallbackToLocal
            } else {
                EntropyPolicy::Strict
            };
            return Ok(policy.apply(remote));
        }

        let source: Arc<dyn RandomnessSource> = match self.seed {
            Some(seed) => {
                tracing::warn!(seed, "Seeded randomness: tables are reproducible");
                Arc::new(SeededRandomSource::new(seed))
            }
            None => Arc::new(LocalRandomSource::new()),
        };
        Ok(source)
    }

    fn config(&self) -> ServerConfig {
        ServerConfig::default()
            .with_bind_addr(self.bind)
            .with_max_sessions(self.max_sessions)
            .with_session_policy(SessionPolicy {
                max_invalid_requests: self.max_invalid_requests,
                idle_timeout: Duration::from_secs(self.idle_timeout_secs),
                write_timeout: Duration::from_secs(self.write_timeout_secs),
                max_range_len: self.max_range,
            })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Random table server starting");

    let server = TableServer::bind(args.config(), args.source()?).await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown requested");
        })
        .await?;

    Ok(())
}
