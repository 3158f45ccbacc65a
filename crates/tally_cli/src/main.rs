//! Tally CLI
//!
//! Command-line client for the Tally finance tracker.
//!
//! # Commands
//!
//! - `sync` - Run one sync attempt against the server
//! - `status` - Show the sync ledger and pending uploads
//! - `list` - List local records
//! - `add-category` / `add-transaction` - Create local records
//! - `delete` - Tombstone a local record
//! - `watch` - Sync on a timer until Ctrl-C

mod commands;

use clap::{Parser, Subcommand};
use commands::{CategoryKindArg, Settings, TransactionKindArg};
use std::path::PathBuf;
use std::time::Duration;
use tally_core::EntityType;
use tally_sync_protocol::ConflictPolicy;
use tracing_subscriber::EnvFilter;

/// Offline-first finance records with server sync.
#[derive(Parser)]
#[command(name = "tally")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the local records and sync ledger
    #[arg(global = true, short, long, env = "TALLY_DATA_DIR", default_value = ".tally")]
    data_dir: PathBuf,

    /// Base URL of the records server
    #[arg(global = true, short, long, env = "TALLY_SERVER_URL")]
    server: Option<String>,

    /// Access token sent to the server
    #[arg(global = true, long, env = "TALLY_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Owner recorded on new records
    #[arg(global = true, long, env = "TALLY_OWNER", default_value = "local")]
    owner: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload local changes and download server changes
    Sync {
        /// Download the complete server set instead of changes only
        #[arg(long, conflicts_with = "force")]
        full: bool,

        /// Replace local records with the server's set
        #[arg(long)]
        force: bool,

        /// Conflict policy (server-wins, client-wins, merge, manual)
        #[arg(short, long, default_value = "server-wins")]
        policy: ConflictPolicy,
    },

    /// Show the sync ledger and pending uploads
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List local records
    List {
        /// Only this entity type (transaction, category, budget)
        #[arg(short = 't', long = "type")]
        entity_type: Option<EntityType>,

        /// Include tombstones
        #[arg(short, long)]
        all: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Create a category
    AddCategory {
        /// Display name
        name: String,

        /// Category kind
        #[arg(short, long, value_enum, default_value = "expense")]
        kind: CategoryKindArg,

        /// Display color, e.g. #4caf50
        #[arg(short, long)]
        color: Option<String>,
    },

    /// Create a transaction
    AddTransaction {
        /// Amount in major units, e.g. -12.50
        #[arg(allow_hyphen_values = true)]
        amount: String,

        /// Free-text description
        description: String,

        /// ISO 4217 currency code
        #[arg(long, default_value = "USD")]
        currency: String,

        /// Transaction kind
        #[arg(short, long, value_enum, default_value = "expense")]
        kind: TransactionKindArg,

        /// ID of the category to file it under
        #[arg(long)]
        category: Option<String>,
    },

    /// Tombstone a record so the deletion syncs
    Delete {
        /// Record ID
        id: String,
    },

    /// Sync on a timer and on reconnect until Ctrl-C
    ///
    /// The data directory stays locked while watching, so `add-category`,
    /// `add-transaction`, `delete`, `list` and `status` fail until the watch
    /// is stopped.
    Watch {
        /// Seconds between timed syncs
        #[arg(short, long, default_value = "300")]
        interval: u64,

        /// Conflict policy (server-wins, client-wins, merge, manual)
        #[arg(short, long, default_value = "server-wins")]
        policy: ConflictPolicy,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = Settings {
        data_dir: cli.data_dir,
        server: cli.server,
        token: cli.token,
        owner: cli.owner,
    };

    match cli.command {
        Commands::Sync {
            full,
            force,
            policy,
        } => {
            commands::sync::run(&settings, full, force, policy).await?;
        }
        Commands::Status { format } => {
            commands::status::run(&settings, &format)?;
        }
        Commands::List {
            entity_type,
            all,
            format,
        } => {
            commands::list::run(&settings, entity_type, all, &format)?;
        }
        Commands::AddCategory { name, kind, color } => {
            commands::add::category(&settings, &name, kind, color)?;
        }
        Commands::AddTransaction {
            amount,
            description,
            currency,
            kind,
            category,
        } => {
            commands::add::transaction(
                &settings,
                &amount,
                &description,
                &currency,
                kind,
                category.as_deref(),
            )?;
        }
        Commands::Delete { id } => {
            commands::delete::run(&settings, &id)?;
        }
        Commands::Watch { interval, policy } => {
            commands::watch::run(&settings, Duration::from_secs(interval.max(1)), policy).await?;
        }
    }

    Ok(())
}
