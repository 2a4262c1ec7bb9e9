//! Random table client binary.
//!
//! # Usage
//!
//! ```bash
//! # Type min,max,cols at the prompt
//! random-table-client --server random-server
//!
//! # Parameters from a mounted ConfigMap, re-read before every table
//! RANDOM_SERVER=random-server random-table-client --config-dir /etc/random-table
//!
//! # Operators connect with a line-based TCP tool and press Enter
//! random-table-client --config-dir /etc/random-table --listen 0.0.0.0:4000
//! ```

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use random_table::client::{
    ClientOptions, ConfigPolicy, OutputFormat, ParameterSource, SERVER_ENV, TableClient, render,
    run_interactive,
};
use random_table::config::{ConfigStore, ConfigWatcher, DirectoryStore, JsonFileStore};
use random_table::{Result, TableRequest};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// What to do when the configuration store cannot be read
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OnConfigError {
    /// Fail the cycle
    Abort,
    /// Reuse the last parameters that were read successfully
    ReuseLast,
}

/// Random table client
#[derive(Parser, Debug)]
#[command(name = "random-table-client")]
#[command(about = "Fetches tables of unique random integers from a random table server")]
#[command(version)]
struct Args {
    /// Server as host or host:port (port defaults to 3215)
    #[arg(short, long, env = SERVER_ENV)]
    server: String,

    /// Fixed lower bound
    #[arg(long, requires_all = ["max", "cols"], allow_hyphen_values = true)]
    min: Option<i64>,

    /// Fixed upper bound
    #[arg(long, requires_all = ["min", "cols"], allow_hyphen_values = true)]
    max: Option<i64>,

    /// Fixed column count
    #[arg(long, requires_all = ["min", "max"])]
    cols: Option<i64>,

    /// Directory with one file per key (min, max, table-size)
    #[arg(long, conflicts_with_all = ["config_file", "min"])]
    config_dir: Option<String>,

    /// JSON file with keys min, max, table-size
    #[arg(long, conflicts_with = "min")]
    config_file: Option<String>,

    /// Behavior when the configuration store cannot be read
    #[arg(long, value_enum, default_value = "abort")]
    on_config_error: OnConfigError,

    /// Timeout for reading one configuration key, in milliseconds
    #[arg(long, default_value = "2000")]
    config_timeout_ms: u64,

    /// Output format (grid or json)
    #[arg(long, default_value = "grid")]
    format: OutputFormat,

    /// Fetch one table and exit
    #[arg(long, conflicts_with = "listen")]
    once: bool,

    /// Accept operator connections on this address instead of using stdin
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Args {
    fn parameter_source(&self) -> Result<ParameterSource> {
        if let (Some(min), Some(max), Some(cols)) = (self.min, self.max, self.cols) {
            return Ok(ParameterSource::Fixed(TableRequest::new(min, max, cols)?));
        }

        let store: Arc<dyn ConfigStore> = match (&self.config_dir, &self.config_file) {
            (Some(dir), _) => Arc::new(DirectoryStore::new(dir)),
            (None, Some(file)) => Arc::new(JsonFileStore::new(file)),
            (None, None) => return Ok(ParameterSource::Prompted),
        };

        let watcher = ConfigWatcher::new(store)
            .with_timeout(Duration::from_millis(self.config_timeout_ms));
        Ok(ParameterSource::Watched(watcher))
    }

    fn options(&self) -> ClientOptions {
        let policy = match self.on_config_error {
            OnConfigError::Abort => ConfigPolicy::Abort,
            OnConfigError::ReuseLast => ConfigPolicy::ReuseLastKnownGood,
        };
        ClientOptions::new(self.server.clone()).with_config_policy(policy)
    }
}

/// Runs a single cycle; a prompted source reads its one line from stdin.
async fn run_once(client: &mut TableClient, format: OutputFormat) -> Result<ExitCode> {
    let mut trigger = String::new();
    if matches!(client.source(), ParameterSource::Prompted) {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(client.source().prompt().as_bytes()).await?;
        stdout.flush().await?;
        BufReader::new(tokio::io::stdin())
            .read_line(&mut trigger)
            .await?;
    }

    let code = match client.cycle(&trigger).await {
        Ok(report) => {
            if report.is_stale() {
                eprintln!("(configuration unavailable, using last known good parameters)");
            }
            print!("{}", render(&report, format)?);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e.report());
            ExitCode::FAILURE
        }
    };

    let _ = client.disconnect().await;
    Ok(code)
}

/// Serves operators one at a time on `addr`.
async fn run_relay(client: &mut TableClient, addr: SocketAddr, format: OutputFormat) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Waiting for operators");

    loop {
        let (stream, peer) = listener.accept().await?;
        tracing::info!(%peer, "Operator connected");

        let (read, mut write) = stream.into_split();
        let mut reader = BufReader::new(read);
        match run_interactive(client, &mut reader, &mut write, format).await {
            Ok(stats) => tracing::info!(
                %peer,
                succeeded = stats.succeeded,
                failed = stats.failed,
                "Operator disconnected"
            ),
            Err(e) => tracing::warn!(%peer, error = %e, "Operator connection failed"),
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let mut client = TableClient::new(args.options(), args.parameter_source()?)?;
    tracing::info!(server = %client.options().server_addr(), "Random table client starting");

    if args.once {
        return run_once(&mut client, args.format).await;
    }

    if let Some(addr) = args.listen {
        tokio::select! {
            result = run_relay(&mut client, addr, args.format) => result?,
            _ = tokio::signal::ctrl_c() => tracing::info!("Shutdown requested"),
        }
        return Ok(ExitCode::SUCCESS);
    }

    let mut input = BufReader::new(tokio::io::stdin());
    let mut output = tokio::io::stdout();
    tokio::select! {
        result = run_interactive(&mut client, &mut input, &mut output, args.format) => {
            let stats = result?;
            tracing::info!(succeeded = stats.succeeded, failed = stats.failed, "Input closed");
        }
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutdown requested"),
    }

    let _ = client.disconnect().await;
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.report());
            ExitCode::FAILURE
        }
    }
}
