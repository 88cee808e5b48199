//! mrr-ledger - Music royalty report ledger
//!
//! Command line front-end over [`RoyaltyLedger`]: imports distributor reports
//! into the SQLite ledger in the root folder, edits per-track settings and
//! writes payout exports.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mrr_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig};
use mrr_common::{CurrencyFormat, Error};
use mrr_ledger::export::ExportFile;
use mrr_ledger::normalizer::SynonymTable;
use mrr_ledger::{
    ExportFormat, PeriodFilter, ReportFilter, RoyaltyLedger, SettingsInput, SqliteStore, TaxRate,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command-line arguments for mrr-ledger
#[derive(Parser, Debug)]
#[command(name = "mrr-ledger")]
#[command(about = "Music royalty report ledger")]
#[command(version)]
struct Args {
    /// Folder holding royalties.db (overrides MRR_ROOT_FOLDER)
    #[arg(long, global = true)]
    root_folder: Option<PathBuf>,

    /// TOML configuration file (overrides MRR_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Filters shared by report and export commands
#[derive(clap::Args, Debug)]
struct FilterArgs {
    /// Report period, or "all"
    #[arg(long, default_value = "all")]
    period: String,

    /// Artist substring, ASCII case-insensitive
    #[arg(long)]
    artist: Option<String>,

    /// Deduct tax from revenue
    #[arg(long)]
    apply_tax: bool,

    /// Only tracks without settings
    #[arg(long)]
    only_new: bool,
}

impl FilterArgs {
    fn filter(&self) -> ReportFilter {
        ReportFilter {
            period: PeriodFilter::parse(&self.period),
            artist: self.artist.clone(),
            apply_tax: self.apply_tax,
            only_new: self.only_new,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum FormatArg {
    Csv,
    Xlsx,
}

impl From<FormatArg> for ExportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Xlsx => ExportFormat::Xlsx,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a CSV/XLS/XLSX report under a period label
    Import {
        file: PathBuf,
        #[arg(long)]
        period: String,
    },
    /// Print computed rows and totals as JSON
    Report {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// List known periods
    Periods,
    /// List tracks of a period without settings
    NewTracks {
        #[arg(long)]
        period: String,
    },
    /// Read or write settings of the track behind a record
    TrackSettings {
        #[command(subcommand)]
        action: TrackSettingsAction,
    },
    /// Apply one share and royalty percent to several records
    BulkSettings {
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<i64>,
        #[arg(long)]
        share: String,
        #[arg(long)]
        royalty: String,
    },
    /// Set the royalty percent of "artist - track" lines read from a file
    BulkRoyalty {
        file: PathBuf,
        #[arg(long)]
        royalty: String,
    },
    /// List stored overrides
    Settings,
    /// Export a period report
    Export {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, value_enum, default_value = "csv")]
        format: FormatArg,
        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Export one artist's statement
    ExportArtist {
        artist: String,
        #[arg(long)]
        period: String,
        #[arg(long)]
        apply_tax: bool,
        #[arg(long)]
        only_new: bool,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum TrackSettingsAction {
    Get {
        id: i64,
    },
    Set {
        id: i64,
        #[arg(long)]
        share: String,
        #[arg(long)]
        royalty: String,
    },
}

fn init_logging(config: &TomlConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn write_export(out: &Path, file: &ExportFile) -> Result<()> {
    std::fs::create_dir_all(out)
        .with_context(|| format!("Failed to create {}", out.display()))?;
    let path = out.join(&file.file_name);
    std::fs::write(&path, &file.bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("{} ({} rows)", path.display(), file.row_count);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Step 1: Bootstrap configuration (CLI > env > TOML > defaults)
    let config = TomlConfig::resolve(args.config.as_deref())?;
    init_logging(&config)?;
    info!("Starting mrr-ledger {}", env!("CARGO_PKG_VERSION"));

    // Step 2: Root folder and database
    let root_folder = RootFolderResolver::new()
        .with_cli_arg(args.root_folder.clone())
        .with_toml(&config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let pool = mrr_common::db::init_database(&db_path).await?;

    // Step 3: Ledger with configured tax, currency and header synonyms
    let ledger = RoyaltyLedger::new(SqliteStore::new(pool))
        .with_synonyms(SynonymTable::with_extra(&config.normalizer.synonyms)?)
        .with_tax(TaxRate::new(config.calculation.tax_percent)?)
        .with_currency(CurrencyFormat::new(&config.calculation.currency_suffix));

    if let Err(e) = run(&ledger, args.command).await {
        // "Nothing to export" and similar are reported, not failures
        if let Some(notice) = e.downcast_ref::<Error>().filter(|e| e.is_notice()) {
            println!("{}", notice);
            return Ok(());
        }
        return Err(e);
    }
    Ok(())
}

async fn run(ledger: &RoyaltyLedger<SqliteStore>, command: Command) -> Result<()> {
    match command {
        Command::Import { file, period } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let outcome = ledger.import_report(&file, &bytes, &period).await?;
            print_json(&outcome)?;
        }
        Command::Report { filter } => {
            print_json(&ledger.report_view(&filter.filter()).await?)?;
        }
        Command::Periods => {
            for period in ledger.distinct_periods().await? {
                println!("{}", period);
            }
        }
        Command::NewTracks { period } => {
            print_json(&ledger.new_tracks(&PeriodFilter::parse(&period)).await?)?;
        }
        Command::TrackSettings { action } => match action {
            TrackSettingsAction::Get { id } => {
                print_json(&ledger.track_settings(id).await?)?;
            }
            TrackSettingsAction::Set { id, share, royalty } => {
                let input = SettingsInput::parse(&share, &royalty)?;
                print_json(&ledger.set_track_settings(id, input).await?)?;
            }
        },
        Command::BulkSettings { ids, share, royalty } => {
            let input = SettingsInput::parse(&share, &royalty)?;
            let updated = ledger.bulk_by_ids(&ids, input).await?;
            println!("Updated {} tracks", updated);
        }
        Command::BulkRoyalty { file, royalty } => {
            let text = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            print_json(&ledger.bulk_by_text(&text, &royalty).await?)?;
        }
        Command::Settings => {
            print_json(&ledger.list_overrides().await?)?;
        }
        Command::Export {
            filter,
            format,
            out,
        } => {
            let file = ledger.export(&filter.filter(), format.into()).await?;
            write_export(&out, &file)?;
        }
        Command::ExportArtist {
            artist,
            period,
            apply_tax,
            only_new,
            out,
        } => {
            let file = ledger
                .export_artist(&artist, &PeriodFilter::parse(&period), apply_tax, only_new)
                .await?;
            write_export(&out, &file)?;
        }
    }
    Ok(())
}
