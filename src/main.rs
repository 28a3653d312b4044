use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::BufReader;

use bulkdns::application::execution::{
    ScanContext, ScanRequest, Strategy, WorkerCommand, run_scan, serve_shards,
};
use bulkdns::application::services::ShardProcessor;
use bulkdns::config::{self, Config};
use bulkdns::domain::entities::ScanMode;
use bulkdns::domain::registry::Protocol;
use bulkdns::infrastructure::persistence::StoreRetryPolicy;
use bulkdns::infrastructure::registry::client_for;
use bulkdns::telemetry::init_tracing;

/// Bulk domain availability scanner.
#[derive(Parser)]
#[command(name = "bulkdns")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every due domain of the given tables
    Scan(ScanArgs),

    /// Query a single domain and print the outcome
    Lookup {
        domain: String,

        #[arg(short, long, default_value = "whois")]
        protocol: Protocol,
    },

    /// Serve shards over stdin/stdout (started by the process strategy)
    #[command(hide = true)]
    Worker(WorkerArgs),
}

#[derive(Args)]
struct StoreRetryArgs {
    /// Repeated attempts on transient database errors (overrides DB_RETRY_LIMIT)
    #[arg(long)]
    db_retry_limit: Option<u32>,

    /// Seconds between database attempts (overrides DB_RETRY_BACKOFF_SECS)
    #[arg(long)]
    db_retry_backoff: Option<u64>,
}

impl StoreRetryArgs {
    fn policy(&self, config: &Config) -> StoreRetryPolicy {
        StoreRetryPolicy::new(
            self.db_retry_limit.unwrap_or(config.db_retry_limit),
            Duration::from_secs(self.db_retry_backoff.unwrap_or(config.db_retry_backoff_secs)),
        )
    }
}

#[derive(Args)]
struct ScanArgs {
    /// Table categories, e.g. two_letter,three_digit
    #[arg(short, long, value_delimiter = ',', required = true)]
    tables: Vec<String>,

    /// Top level domain the tables belong to
    #[arg(long, default_value = "com")]
    tld: String,

    /// expiring | recheck
    #[arg(short, long, default_value = "expiring")]
    mode: ScanMode,

    /// whois | rdap
    #[arg(short, long, default_value = "whois")]
    protocol: Protocol,

    /// sequential | process | thread
    #[arg(short, long, default_value = "sequential")]
    strategy: Strategy,

    /// Pool size for the process and thread strategies
    #[arg(long)]
    workers: Option<usize>,

    #[command(flatten)]
    retry: StoreRetryArgs,
}

#[derive(Args)]
struct WorkerArgs {
    #[arg(long)]
    protocol: Protocol,

    #[arg(long, default_value_t = 0)]
    worker_id: usize,

    #[command(flatten)]
    retry: StoreRetryArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = config::load_from_env().context("Invalid configuration")?;

    init_tracing(&config.log_level, &config.log_format);

    match cli.command {
        Commands::Scan(args) => scan(config, args).await,
        Commands::Lookup { domain, protocol } => lookup(config, domain, protocol).await,
        Commands::Worker(args) => worker(config, args).await,
    }
}

async fn scan(config: Config, args: ScanArgs) -> Result<()> {
    config.print_summary();

    let policy = args.retry.policy(&config);
    let store = config.connect_store(policy)?;
    let client = client_for(args.protocol, &config);

    let worker_args = vec![
        "worker".to_string(),
        "--protocol".to_string(),
        args.protocol.to_string(),
        "--db-retry-limit".to_string(),
        policy.limit.to_string(),
        "--db-retry-backoff".to_string(),
        policy.backoff.as_secs().to_string(),
    ];
    let worker_command = WorkerCommand::current_exe(worker_args, config.worker_recycle_after)
        .context("Failed to resolve worker executable")?;

    let ctx = ScanContext {
        store,
        client,
        lookup_retry_limit: config.lookup_retry_limit,
        worker_command: Some(worker_command),
        pool_size: args.workers,
    };
    let request = ScanRequest::for_categories(&args.tables, &args.tld, args.mode, args.strategy);

    let summary = run_scan(&ctx, &request, interrupted()).await?;

    println!(
        "shards: {}/{} completed, {} failed | domains: {} checked, {} failed, {} updated{}",
        summary.completed,
        summary.shards,
        summary.failed_shards,
        summary.processed,
        summary.failed,
        summary.updated,
        if summary.cancelled { " | cancelled" } else { "" }
    );

    Ok(())
}

async fn lookup(config: Config, domain: String, protocol: Protocol) -> Result<()> {
    let client = client_for(protocol, &config);
    let outcome = client.lookup(&domain, config.lookup_retry_limit).await;

    println!("domain:    {}", outcome.domain);
    println!("protocol:  {protocol}");
    println!(
        "available: {}",
        outcome.available.as_flag().unwrap_or("unknown")
    );
    if let Some(expiry) = outcome.expiry {
        println!("expiry:    {expiry}");
    }
    if let Some(kind) = outcome.error_kind {
        println!("error:     {kind}");
    }
    println!("retries:   {}", outcome.retries_used);

    Ok(())
}

async fn worker(config: Config, args: WorkerArgs) -> Result<()> {
    let store = config.connect_store(args.retry.policy(&config))?;
    let client = client_for(args.protocol, &config);
    let processor = ShardProcessor::new(
        store,
        client,
        config.lookup_retry_limit,
        format!("process-{}", args.worker_id),
    );

    serve_shards(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        &processor,
    )
    .await?;

    Ok(())
}

/// Resolves on the first Ctrl-C.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for Ctrl-C, scan is not interruptible");
        std::future::pending::<()>().await;
    }
    tracing::warn!("interrupt received, stopping scan");
}
