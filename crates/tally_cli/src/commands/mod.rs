//! CLI command implementations.

pub mod add;
pub mod delete;
pub mod list;
pub mod status;
pub mod sync;
pub mod watch;

use clap::ValueEnum;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tally_core::{CategoryKind, CoreError, FileRecordStore, TransactionKind};
use tally_sync_engine::{
    FileLedgerStore, HttpRemoteApi, RemoteConfig, SharedConnectivity, StaticTokenStore,
    SyncConfig, SyncEngine,
};

/// The engine as the CLI wires it.
pub type CliEngine = SyncEngine<HttpRemoteApi, FileRecordStore>;

/// Global options shared by every command.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding the records and the ledger.
    pub data_dir: PathBuf,
    /// Server base URL.
    pub server: Option<String>,
    /// Access token.
    pub token: Option<String>,
    /// Owner recorded on new records.
    pub owner: String,
}

impl Settings {
    fn records_dir(&self) -> PathBuf {
        self.data_dir.join("records")
    }

    fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("ledger.json")
    }
}

/// Category kind as accepted on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CategoryKindArg {
    /// Money coming in.
    Income,
    /// Money going out.
    Expense,
}

impl From<CategoryKindArg> for CategoryKind {
    fn from(arg: CategoryKindArg) -> Self {
        match arg {
            CategoryKindArg::Income => CategoryKind::Income,
            CategoryKindArg::Expense => CategoryKind::Expense,
        }
    }
}

/// Transaction kind as accepted on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TransactionKindArg {
    /// Money coming in.
    Income,
    /// Money going out.
    Expense,
    /// Movement between own accounts.
    Transfer,
}

impl From<TransactionKindArg> for TransactionKind {
    fn from(arg: TransactionKindArg) -> Self {
        match arg {
            TransactionKindArg::Income => TransactionKind::Income,
            TransactionKindArg::Expense => TransactionKind::Expense,
            TransactionKindArg::Transfer => TransactionKind::Transfer,
        }
    }
}

/// Opens the local record store.
///
/// The store is single-writer: it stays locked for as long as another tally
/// process (typically `tally watch`) has it open.
pub fn open_store(settings: &Settings) -> Result<FileRecordStore, Box<dyn std::error::Error>> {
    match FileRecordStore::open(&settings.records_dir()) {
        Ok(store) => Ok(store),
        Err(CoreError::StoreLocked) => Err(format!(
            "{} is in use by another tally process; stop `tally watch` first",
            settings.data_dir.display()
        )
        .into()),
        Err(e) => Err(e.into()),
    }
}

/// Opens the ledger store.
pub fn ledger_store(settings: &Settings) -> FileLedgerStore {
    FileLedgerStore::new(settings.ledger_path())
}

/// Builds and initializes an engine over the local data directory.
pub fn build_engine(
    settings: &Settings,
    config: SyncConfig,
) -> Result<Arc<CliEngine>, Box<dyn std::error::Error>> {
    let server = settings
        .server
        .as_deref()
        .ok_or("Server URL required (--server or TALLY_SERVER_URL)")?;

    let tokens = Arc::new(StaticTokenStore::new(settings.token.clone()));
    let remote = HttpRemoteApi::new(RemoteConfig::new(server), tokens.clone())?;
    let store = open_store(settings)?;

    let engine = SyncEngine::new(
        config,
        Arc::new(remote),
        Arc::new(store),
        Arc::new(ledger_store(settings)),
        Arc::new(SharedConnectivity::online()),
        tokens,
    );
    engine.init()?;
    Ok(Arc::new(engine))
}

/// Parses a decimal amount in major units into minor units.
///
/// Accepts up to two fractional digits: `12`, `-4.5`, `0.99`.
pub fn parse_amount(input: &str) -> Result<i64, String> {
    let invalid = || format!("invalid amount: {input}");
    let trimmed = input.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if fraction.len() > 2 || !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let cents: i64 = format!("{fraction:0<2}").parse().map_err(|_| invalid())?;

    let minor = whole
        .checked_mul(100)
        .and_then(|v| v.checked_add(cents))
        .ok_or_else(invalid)?;
    Ok(if negative { -minor } else { minor })
}

/// Formats minor units as a decimal amount.
pub fn format_amount(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

fn data_dir_exists(path: &Path) -> bool {
    path.join("records").is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts() {
        assert_eq!(parse_amount("12").unwrap(), 1200);
        assert_eq!(parse_amount("-4.5").unwrap(), -450);
        assert_eq!(parse_amount("0.99").unwrap(), 99);
        assert_eq!(parse_amount(".5").unwrap(), 50);
        assert!(parse_amount("1.234").is_err());
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("-").is_err());
        assert!(parse_amount("1e3").is_err());
    }

    #[test]
    fn locked_store_points_at_watch() {
        let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let settings = Settings {
            data_dir: dir.path().to_path_buf(),
            server: None,
            token: None,
            owner: "me".into(),
        };

        let held = open_store(&settings).unwrap();
        let err = open_store(&settings).unwrap_err();
        assert!(err.to_string().contains("tally watch"), "{err}");

        drop(held);
        open_store(&settings).unwrap();
    }

    #[test]
    fn amounts_format_back() {
        assert_eq!(format_amount(1200), "12.00");
        assert_eq!(format_amount(-450), "-4.50");
        assert_eq!(format_amount(7), "0.07");
    }
}
