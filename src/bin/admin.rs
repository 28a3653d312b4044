//! CLI administration tool for bulkdns.
//!
//! Creates and fills domain tables, shows scan progress per table and checks
//! the database connection.
//!
//! # Usage
//!
//! ```bash
//! # Create the tables of two categories and fill them with candidates
//! cargo run --bin admin -- init --tld com --seed two_letter three_digit
//!
//! # Show Y / N / unchecked counts
//! cargo run --bin admin -- stats --tld com two_letter three_digit
//!
//! # Move taken domains expiring after the window into the archive store
//! cargo run --bin admin -- archive --tld com three_letter
//!
//! # Bring them back once they come close to expiry
//! cargo run --bin admin -- restore --tld com three_letter
//!
//! # Replace the backup store's copy with live plus archive
//! cargo run --bin admin -- backup --tld com three_letter
//!
//! # Seed dict_brands_com from a word list, plus every two-word pair
//! cargo run --bin admin -- dict --file brands.txt --name dict_brands --pairs
//!
//! # Check database connection
//! cargo run --bin admin -- db check
//! ```
//!
//! # Environment Variables
//!
//! Same as the scanner: `DB_TYPE`, `SQLITE_PATH` or `DATABASE_URL`, ...
//! plus `ARCHIVE_*` and `BACKUP_*` for the secondary stores.
//!
//! # Features
//!
//! - **Table Setup**: Create `<category>_<tld>` tables, optionally seeded
//! - **Statistics**: Availability counts per table
//! - **Lifecycle**: Archive, restore and backup between stores
//! - **Dictionaries**: Tables seeded from word lists
//! - **Database Tools**: Connection checks and backend info
//! - **Interactive Prompts**: Confirmation before writing
//! - **Colored Output**: Terminal-friendly formatting using `colored` crate

use bulkdns::application::services::{Transfer, backup, import_names, transfer};
use bulkdns::config::{self, Config};
use bulkdns::domain::candidates::{CATEGORIES, CandidateSet};
use bulkdns::domain::dictionary::Dictionary;
use bulkdns::domain::entities::Availability;
use bulkdns::domain::repositories::{Backend, Store};
use bulkdns::infrastructure::persistence::{
    StoreRetryPolicy, create_domain_table, seed_domain_table, table_name,
};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Confirm;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// CLI tool for managing bulkdns tables.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// Create domain tables
    Init {
        /// Top level domain
        #[arg(long, default_value = "com")]
        tld: String,

        /// Fill character-combination tables with every candidate name
        #[arg(long)]
        seed: bool,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,

        /// Categories (default: all character-combination categories)
        categories: Vec<String>,
    },

    /// Show availability counts per table
    Stats {
        #[arg(long, default_value = "com")]
        tld: String,

        /// Categories (default: all character-combination categories)
        categories: Vec<String>,
    },

    /// Move taken domains expiring after the window to the archive store
    Archive {
        #[arg(long, default_value = "com")]
        tld: String,

        #[arg(short = 'y', long)]
        yes: bool,

        categories: Vec<String>,
    },

    /// Move archived domains expiring within the window back to the live store
    Restore {
        #[arg(long, default_value = "com")]
        tld: String,

        #[arg(short = 'y', long)]
        yes: bool,

        categories: Vec<String>,
    },

    /// Replace the backup store's tables with live plus archive records
    Backup {
        #[arg(long, default_value = "com")]
        tld: String,

        /// Copy the live store only
        #[arg(long)]
        no_archive: bool,

        #[arg(short = 'y', long)]
        yes: bool,

        categories: Vec<String>,
    },

    /// Seed a table from a word list, one term per line
    Dict {
        /// Word list file
        #[arg(short, long)]
        file: PathBuf,

        /// Table name without the TLD (default: file name)
        #[arg(short, long)]
        name: Option<String>,

        #[arg(long, default_value = "com")]
        tld: String,

        /// Seed every two-term concatenation into `<name>_comb_<tld>` as well
        #[arg(long)]
        pairs: bool,

        /// Do not consult the archive store for names already archived
        #[arg(long)]
        no_archive: bool,

        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

/// Database operation subcommands.
#[derive(Subcommand)]
enum DbAction {
    /// Check database connection
    Check,

    /// Show database info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = config::load_from_env().context("Invalid configuration")?;

    // Fail fast instead of retrying for minutes
    let store = config
        .connect_store(admin_policy())
        .context("Failed to open database")?;

    match cli.command {
        Commands::Init {
            tld,
            seed,
            yes,
            categories,
        } => init_tables(store.as_ref(), &tld, with_default(categories), seed, yes).await?,
        Commands::Stats { tld, categories } => {
            handle_stats(store.as_ref(), &tld, with_default(categories)).await?
        }
        Commands::Archive {
            tld,
            yes,
            categories,
        } => {
            let categories = with_default(categories);
            handle_transfer(&config, store.as_ref(), Transfer::Archive, &tld, categories, yes).await?
        }
        Commands::Restore {
            tld,
            yes,
            categories,
        } => {
            let categories = with_default(categories);
            handle_transfer(&config, store.as_ref(), Transfer::Restore, &tld, categories, yes).await?
        }
        Commands::Backup {
            tld,
            no_archive,
            yes,
            categories,
        } => {
            let categories = with_default(categories);
            handle_backup(&config, store.as_ref(), &tld, categories, !no_archive, yes).await?
        }
        Commands::Dict {
            file,
            name,
            tld,
            pairs,
            no_archive,
            yes,
        } => {
            let options = DictOptions {
                file,
                name,
                pairs,
                with_archive: !no_archive,
            };
            handle_dict(&config, store.as_ref(), options, &tld, yes).await?
        }
        Commands::Db { action } => handle_db_action(action, store, &config).await?,
    }

    Ok(())
}

/// Fail-fast retry policy for one-shot admin commands.
fn admin_policy() -> StoreRetryPolicy {
    StoreRetryPolicy::new(0, Duration::ZERO)
}

/// Asks before writing, unless `--yes` was given. Returns false if declined.
fn confirm(skip: bool) -> Result<bool> {
    if skip {
        return Ok(true);
    }
    let confirmed = Confirm::new()
        .with_prompt("Proceed?")
        .default(true)
        .interact()?;
    if !confirmed {
        println!("{}", "Cancelled".red());
    }
    Ok(confirmed)
}

fn with_default(categories: Vec<String>) -> Vec<String> {
    if categories.is_empty() {
        CATEGORIES.iter().map(|c| c.to_string()).collect()
    } else {
        categories
    }
}

/// Creates (and optionally seeds) one table per category.
///
/// # Flow
///
/// 1. Show the tables that will be created
/// 2. Confirm (unless `--yes` flag)
/// 3. Create each table if missing
/// 4. With `--seed`, insert every candidate name not yet present
async fn init_tables(
    store: &dyn Store,
    tld: &str,
    categories: Vec<String>,
    seed: bool,
    skip_confirm: bool,
) -> Result<()> {
    println!("{}", "Initialize domain tables".bright_blue().bold());
    println!();

    for category in &categories {
        let note = match (seed, CandidateSet::for_category(category)) {
            (true, Some(_)) => "create + seed".green(),
            (true, None) => "create only (no generator)".yellow(),
            (false, _) => "create".normal(),
        };
        println!("  {:<30} {}", table_name(category, tld).cyan(), note);
    }
    println!();

    if !confirm(skip_confirm)? {
        return Ok(());
    }

    for category in &categories {
        let table = table_name(category, tld);
        create_domain_table(store, &table)
            .await
            .with_context(|| format!("Cannot create {table}"))?;

        if let (true, Some(set)) = (seed, CandidateSet::for_category(category)) {
            let offered = seed_domain_table(store, &table, tld, set.names()).await?;
            println!(
                "  {} {} ({} names)",
                "seeded".green(),
                table.cyan(),
                offered.to_string().bright_white()
            );
        } else {
            println!("  {} {}", "ready".green(), table.cyan());
        }
    }

    println!();
    println!("{}", "Done".green().bold());

    Ok(())
}

/// Displays availability counts per table.
///
/// # Output Format
///
/// ```text
/// Statistics
///
///   Table                              Free     Taken  Unchecked
///   two_letter_com                        0       676          0
/// ```
async fn handle_stats(store: &dyn Store, tld: &str, categories: Vec<String>) -> Result<()> {
    println!("{}", "Statistics".bright_blue().bold());
    println!();

    println!(
        "  {:<30} {:>10} {:>10} {:>10}",
        "Table".bright_white().bold(),
        "Free".bright_white().bold(),
        "Taken".bright_white().bold(),
        "Unchecked".bright_white().bold()
    );
    println!("  {}", "-".repeat(63).bright_black());

    for category in &categories {
        let table = table_name(category, tld);
        bulkdns::domain::entities::validate_table_name(&table)?;

        let rows = store
            .run_query(&format!(
                "SELECT avail, count(*) FROM {table} GROUP BY avail"
            ))
            .await;
        if rows.is_empty() {
            println!("  {:<30} {}", table.bright_black(), "missing or empty".bright_black());
            continue;
        }

        let (mut free, mut taken, mut unchecked) = (0, 0, 0);
        for row in &rows {
            let count = row.get(1).and_then(|v| v.as_i64()).unwrap_or(0);
            match Availability::from_flag(row.first().and_then(|v| v.as_str())) {
                Availability::Yes => free += count,
                Availability::No => taken += count,
                Availability::Unknown => unchecked += count,
            }
        }

        println!(
            "  {:<30} {:>10} {:>10} {:>10}",
            table.cyan(),
            free.to_string().bright_green().bold(),
            taken.to_string().red(),
            unchecked.to_string().yellow()
        );
    }
    println!();

    Ok(())
}

/// Moves records between the live and archive stores, one table per
/// category.
///
/// # Output Format
///
/// ```text
/// Archive live -> archive
///
///   Table                          Selected Duplicates  Inserted   Removed
///   three_letter_com                    120          2       118       120
/// ```
async fn handle_transfer(
    config: &Config,
    live: &dyn Store,
    direction: Transfer,
    tld: &str,
    categories: Vec<String>,
    skip_confirm: bool,
) -> Result<()> {
    let archive = config
        .connect_target(&config.archive, admin_policy())
        .context("Failed to open archive database")?;
    let (from, to, title) = match direction {
        Transfer::Archive => (live, archive.as_ref(), "Archive live -> archive"),
        Transfer::Restore => (archive.as_ref(), live, "Restore archive -> live"),
    };

    println!("{}", title.bright_blue().bold());
    println!();
    if !confirm(skip_confirm)? {
        return Ok(());
    }

    println!(
        "  {:<30} {:>9} {:>10} {:>9} {:>9}",
        "Table".bright_white().bold(),
        "Selected".bright_white().bold(),
        "Duplicates".bright_white().bold(),
        "Inserted".bright_white().bold(),
        "Removed".bright_white().bold()
    );
    println!("  {}", "-".repeat(71).bright_black());

    let now = Utc::now().naive_utc();
    for category in &categories {
        let table = table_name(category, tld);
        let report = transfer(from, to, &table, direction, now)
            .await
            .with_context(|| format!("Cannot {direction} {table}"))?;

        println!(
            "  {:<30} {:>9} {:>10} {:>9} {:>9}",
            table.cyan(),
            report.selected.to_string().bright_white(),
            report.duplicates.to_string().yellow(),
            report.inserted.to_string().green(),
            report.removed.to_string().bright_white()
        );
    }
    println!();

    Ok(())
}

/// Rebuilds the backup store's copy of every category table.
async fn handle_backup(
    config: &Config,
    live: &dyn Store,
    tld: &str,
    categories: Vec<String>,
    with_archive: bool,
    skip_confirm: bool,
) -> Result<()> {
    let archive = if with_archive {
        Some(
            config
                .connect_target(&config.archive, admin_policy())
                .context("Failed to open archive database")?,
        )
    } else {
        None
    };
    let target = config
        .connect_target(&config.backup, admin_policy())
        .context("Failed to open backup database")?;

    println!("{}", "Backup".bright_blue().bold());
    println!("  {}", "Existing backup tables are replaced".yellow());
    println!();
    if !confirm(skip_confirm)? {
        return Ok(());
    }

    for category in &categories {
        let table = table_name(category, tld);
        let report = backup(live, archive.as_deref(), target.as_ref(), &table)
            .await
            .with_context(|| format!("Cannot back up {table}"))?;

        println!(
            "  {:<30} {} live + {} archive -> {} rows",
            table.cyan(),
            report.live_rows.to_string().bright_white(),
            report.archive_rows.to_string().bright_white(),
            report.written.to_string().green().bold()
        );
    }
    println!();

    Ok(())
}

struct DictOptions {
    file: PathBuf,
    name: Option<String>,
    pairs: bool,
    with_archive: bool,
}

/// Seeds `<name>_<tld>` from a word list and, with `--pairs`,
/// `<name>_comb_<tld>` from every pair of its terms.
async fn handle_dict(
    config: &Config,
    live: &dyn Store,
    options: DictOptions,
    tld: &str,
    skip_confirm: bool,
) -> Result<()> {
    let DictOptions {
        file,
        name,
        pairs,
        with_archive,
    } = options;

    let text = std::fs::read_to_string(&file)
        .with_context(|| format!("Cannot read {}", file.display()))?;
    let dictionary = Dictionary::parse(&text);

    let name = match name {
        Some(name) => name,
        None => file
            .file_stem()
            .and_then(|s| s.to_str())
            .context("Cannot derive a table name from the file name, use --name")?
            .to_string(),
    };

    println!("{}", "Dictionary import".bright_blue().bold());
    println!();
    println!("  Terms:    {}", dictionary.terms.len().to_string().bright_white());
    for (line, content) in &dictionary.rejected {
        println!("  {} line {}: {}", "skipped".yellow(), line, content.bright_black());
    }

    let mut tables = vec![(table_name(&name, tld), dictionary.terms.clone())];
    if pairs {
        tables.push((table_name(&format!("{name}_comb"), tld), dictionary.pairs()));
    }
    for (table, names) in &tables {
        println!("  {:<30} {} names", table.cyan(), names.len().to_string().bright_white());
    }
    println!();

    if !confirm(skip_confirm)? {
        return Ok(());
    }

    // Names already archived are not offered again
    let archive = if with_archive {
        Some(
            config
                .connect_target(&config.archive, admin_policy())
                .context("Failed to open archive database")?,
        )
    } else {
        None
    };

    for (table, names) in tables {
        let report = import_names(live, archive.as_deref(), &table, tld, names)
            .await
            .with_context(|| format!("Cannot import into {table}"))?;

        println!(
            "  {} {} ({} offered, {} archived)",
            "seeded".green(),
            table.cyan(),
            report.offered.to_string().bright_white(),
            report.archived.to_string().bright_black()
        );
    }
    println!();
    println!("{}", "Done".green().bold());

    Ok(())
}

/// Handles database diagnostic commands.
async fn handle_db_action(action: DbAction, store: Arc<dyn Store>, config: &Config) -> Result<()> {
    match action {
        DbAction::Check => {
            println!("{}", "Checking database connection...".bright_blue());

            let rows = store.run_query("SELECT 1").await;
            anyhow::ensure!(!rows.is_empty(), "Database did not answer");

            println!("{}", "Database connection OK".green().bold());
        }
        DbAction::Info => {
            println!("{}", "Database Information".bright_blue().bold());
            println!();

            let sql = match store.backend() {
                Backend::Sqlite => "SELECT sqlite_version()",
                Backend::Postgres => "SELECT version()",
            };
            let version = store
                .run_query(sql)
                .await
                .first()
                .and_then(|row| row.first())
                .and_then(|v| v.as_str().map(str::to_string))
                .context("Database did not answer")?;

            println!("  Backend: {}", store.backend().to_string().bright_white());
            if store.backend() == Backend::Sqlite {
                println!("  File:    {}", config.sqlite_path.bright_white());
            }
            println!("  Version: {}", version.bright_white());
            println!();
        }
    }

    Ok(())
}
