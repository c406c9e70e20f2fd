use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;
use shopify_tools::MAX_PAGE_SIZE;

mod command_handler;
mod config;
mod formatting;

use command_handler::{handle_diagnose, handle_find, handle_ledger_command, handle_sync};

#[derive(Parser, Debug)]
#[command(version, about = "Push supplier tracking numbers into Shopify orders")]
pub struct Arguments {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fulfill the Shopify orders listed in a supplier CSV export or Google sheet with their tracking numbers
    Sync(SyncArgs),
    /// Look up the Shopify order for a supplier order reference, without changing anything
    Find {
        #[arg(required = true, index = 1)]
        external_id: String,
    },
    /// List recent orders with their notes, tags and custom attributes, to see where supplier references are kept
    Diagnose {
        /// Number of recent orders to show
        #[arg(
            short = 'n',
            long = "limit",
            default_value = "5",
            value_parser = clap::value_parser!(u32).range(1..=MAX_PAGE_SIZE as i64)
        )]
        limit: u32,
    },
    #[command(subcommand)]
    /// Inspect or edit the list of references that have already been synced
    Ledger(LedgerCommand),
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// The CSV export from the supplier. Without it, the Google sheet set in TRACKSYNC_SHEETS_SPREADSHEET_ID is read
    #[arg(index = 1)]
    pub csv: Option<PathBuf>,
    /// Find matching orders but do not fulfill them
    #[arg(short = 'd', long = "dry-run")]
    pub dry_run: bool,
    /// The ledger file. Overrides TRACKSYNC_LEDGER_PATH
    #[arg(short = 'l', long = "ledger")]
    pub ledger: Option<PathBuf>,
    /// Directory for the CSV report. Overrides TRACKSYNC_REPORT_DIR
    #[arg(short = 'r', long = "report-dir")]
    pub report_dir: Option<PathBuf>,
    /// Do not write a CSV report
    #[arg(long = "no-report")]
    pub no_report: bool,
}

#[derive(Debug, Subcommand)]
pub enum LedgerCommand {
    /// Print every reference in the ledger
    List {
        #[arg(short = 'l', long = "ledger")]
        ledger: Option<PathBuf>,
    },
    /// Remove a reference so that it is synced again on the next run
    Forget {
        #[arg(required = true, index = 1)]
        external_id: String,
        #[arg(short = 'l', long = "ledger")]
        ledger: Option<PathBuf>,
    },
}

#[cfg(test)]
mod test {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_line_is_consistent() {
        Arguments::command().debug_assert();
    }

    #[test]
    fn diagnose_limit_must_be_a_valid_page_size() {
        let args = Arguments::try_parse_from(["tracksync", "diagnose", "-n", "250"]).unwrap();
        assert!(matches!(args.command, Command::Diagnose { limit: 250 }));
        assert!(Arguments::try_parse_from(["tracksync", "diagnose", "--limit", "0"]).is_err());
        assert!(Arguments::try_parse_from(["tracksync", "diagnose", "--limit", "251"]).is_err());
    }

    #[test]
    fn sync_input_file_is_optional() {
        let args = Arguments::try_parse_from(["tracksync", "sync", "--dry-run"]).unwrap();
        let Command::Sync(sync) = args.command else { panic!("expected the sync command") };
        assert!(sync.csv.is_none());
        assert!(sync.dry_run);
        let args = Arguments::try_parse_from(["tracksync", "sync", "orders.csv"]).unwrap();
        let Command::Sync(sync) = args.command else { panic!("expected the sync command") };
        assert_eq!(sync.csv, Some(PathBuf::from("orders.csv")));
    }
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    let cli = Arguments::parse();
    let result = match cli.command {
        Command::Sync(args) => handle_sync(args).await,
        Command::Find { external_id } => handle_find(external_id).await,
        Command::Diagnose { limit } => handle_diagnose(limit).await,
        Command::Ledger(cmd) => handle_ledger_command(cmd).await,
    };
    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
