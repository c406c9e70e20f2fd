use std::{
    path::{Path, PathBuf},
    sync::atomic::Ordering,
    time::Duration,
};

use anyhow::{anyhow, bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::*;
use tracksync_engine::{
    report::save_report,
    sheet::{
        google::{GoogleSheetsConfig, GoogleSheetsSource},
        Sheet,
    },
    sync_types::ExternalOrderRef,
    JsonFileLedger,
    OrderPlatform,
    OrderResolver,
    ProcessedLedger,
    ShopifyPlatform,
    SyncOrchestrator,
};

use crate::{
    config::{shopify_config_from_env, SyncSettings},
    formatting::{format_ledger, format_orders, format_outcome, format_resolved, format_summary},
    LedgerCommand,
    SyncArgs,
};

/// Builds the Shopify platform and checks the credentials with one cheap call, so that a bad token fails the command
/// before any rows are touched.
async fn connect(notify_customer: bool) -> Result<ShopifyPlatform> {
    let config = shopify_config_from_env()?;
    let shop = config.shop.clone();
    let platform = ShopifyPlatform::new(config, notify_customer)?;
    let pb = spinner(format!("Connecting to {shop}..."));
    let name = platform.shop_name().await;
    pb.finish_and_clear();
    let name = name.with_context(|| format!("Could not connect to {shop}"))?;
    println!("Connected to {name} ({shop})");
    Ok(platform)
}

fn spinner(msg: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(Duration::from_millis(100));
    if let Ok(style) = ProgressStyle::with_template("{spinner:5} {msg} [{elapsed}]") {
        pb.set_style(
            style.tick_strings(&["🕛 ", "🕐 ", "🕑 ", "🕒 ", "🕓 ", "🕔 ", "🕕 ", "🕖 ", "🕗 ", "🕘 ", "🕙 ", "🕚 "]),
        );
    }
    pb.set_message(msg);
    pb
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}") {
        pb.set_style(style);
    }
    pb
}

pub async fn handle_sync(args: SyncArgs) -> Result<()> {
    let settings = SyncSettings::from_env().with_overrides(&args);
    let (sheet, source) = load_sheet(args.csv.as_deref()).await?;
    let rows = sheet.sync_rows(&settings.columns)?;
    if rows.is_empty() {
        println!("{source} has no data rows. Nothing to do.");
        return Ok(());
    }
    if settings.dry_run {
        println!("Dry run. Orders will be matched but not fulfilled.");
    }
    let platform = connect(settings.notify_customer).await?;
    let ledger = JsonFileLedger::new(&settings.ledger_path);
    let mut sync = SyncOrchestrator::new(platform, ledger, settings.resolver.clone(), settings.sync_options());
    sync.prepare().await?;

    let abort = sync.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🔄️ Ctrl-C received. Stopping after the current row.");
            eprintln!("Stopping after the current row. Press Ctrl-C again to quit immediately.");
            abort.store(true, Ordering::SeqCst);
            // The first signal stays captured by tokio, so a second one has to be handled here
            if tokio::signal::ctrl_c().await.is_ok() {
                error!("🔄️ Second Ctrl-C received. Exiting without finishing the current row.");
                std::process::exit(130);
            }
        }
    });

    let pb = progress_bar(rows.len());
    let summary = sync
        .run_with(rows, |outcome| {
            pb.println(format_outcome(outcome));
            pb.inc(1);
        })
        .await;
    pb.finish_and_clear();

    let report = if settings.write_report {
        match save_report(&settings.report_dir, &summary.outcomes) {
            Ok(path) => Some(path),
            Err(e) => {
                error!("📄️ Could not save the report. {e}");
                eprintln!("Could not save the report. {e}");
                None
            },
        }
    } else {
        None
    };
    println!("{}", format_summary(&summary, report.as_deref())?);
    Ok(())
}

/// Reads the supplier rows from the CSV file if one was given, otherwise from the configured Google sheet.
async fn load_sheet(csv: Option<&Path>) -> Result<(Sheet, String)> {
    if let Some(path) = csv {
        return Ok((Sheet::from_path(path)?, path.display().to_string()));
    }
    let Some(config) = GoogleSheetsConfig::from_env()? else {
        bail!("No input given. Pass a CSV export, or set TRACKSYNC_SHEETS_SPREADSHEET_ID to read a Google sheet.");
    };
    let source_name = format!("Spreadsheet {} ({})", config.spreadsheet_id, config.range);
    let source = GoogleSheetsSource::new(config)?;
    let pb = spinner(format!("Reading {source_name}..."));
    let sheet = source.fetch().await;
    pb.finish_and_clear();
    let sheet = sheet.with_context(|| format!("Could not read {source_name}"))?;
    Ok((sheet, source_name))
}

pub async fn handle_find(external_id: String) -> Result<()> {
    let settings = SyncSettings::from_env();
    let platform = connect(false).await?;
    let id = ExternalOrderRef::new(&external_id);
    if id.is_empty() {
        return Err(anyhow!("The order reference is empty"));
    }
    let resolver = OrderResolver::new(platform, settings.resolver);
    let pb = spinner(format!("Looking for {id}..."));
    let resolved = resolver.resolve(&id).await;
    pb.finish_and_clear();
    println!("{}", format_resolved(id.as_str(), resolved?.as_ref())?);
    Ok(())
}

pub async fn handle_diagnose(limit: u32) -> Result<()> {
    let platform = connect(false).await?;
    let orders = platform.search_orders_by_query("", limit).await?;
    println!("The {} most recent orders:", orders.len());
    println!("{}", format_orders(&orders));
    println!("Check where the supplier order number appears: a tag, the note or one of the attributes.");
    Ok(())
}

pub async fn handle_ledger_command(command: LedgerCommand) -> Result<()> {
    match command {
        LedgerCommand::List { ledger } => {
            let ledger = open_ledger(ledger).await?;
            let entries = ledger.entries().await?;
            println!("{}", format_ledger(&entries, ledger.path()));
        },
        LedgerCommand::Forget { external_id, ledger } => {
            let mut ledger = open_ledger(ledger).await?;
            let id = ExternalOrderRef::new(&external_id);
            if ledger.remove(&id).await? {
                println!("{id} removed from {}. It will be synced again on the next run.", ledger.path().display());
            } else {
                println!("{id} is not in {}", ledger.path().display());
            }
        },
    }
    Ok(())
}

async fn open_ledger(path: Option<PathBuf>) -> Result<JsonFileLedger> {
    let settings = SyncSettings::from_env().with_ledger(path);
    let ledger = JsonFileLedger::open(&settings.ledger_path).await?;
    Ok(ledger)
}
