use std::path::PathBuf;

use anyhow::{bail, Result};
use log::*;
use shopify_tools::{ShopifyConfig, MAX_PAGE_SIZE};
use tracksync_common::{env_flag, env_in_range, env_or_default};
use tracksync_engine::{
    ledger::DEFAULT_LEDGER_PATH,
    report::DEFAULT_REPORT_DIR,
    resolver::{DEFAULT_DEEP_SCAN_WINDOW, DEFAULT_SEARCH_LIMIT},
    sheet::ColumnMapping,
    sync_types::DEFAULT_CARRIER,
    ResolverConfig,
    SyncOptions,
};

use crate::SyncArgs;

const REQUIRED_SHOPIFY_VARS: [&str; 2] = ["TRACKSYNC_SHOPIFY_SHOP", "TRACKSYNC_SHOPIFY_ACCESS_TOKEN"];

/// Loads the Shopify credentials, naming every missing variable rather than just the first.
pub fn shopify_config_from_env() -> Result<ShopifyConfig> {
    let missing = REQUIRED_SHOPIFY_VARS.iter().filter(|v| env_or_default(v).is_none()).copied().collect::<Vec<_>>();
    if !missing.is_empty() {
        bail!(
            "Shopify credentials are not configured. Set {} in the environment or in a .env file.",
            missing.join(" and ")
        );
    }
    Ok(ShopifyConfig::try_from_env()?)
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub ledger_path: PathBuf,
    pub report_dir: PathBuf,
    pub write_report: bool,
    pub dry_run: bool,
    pub default_carrier: String,
    pub notify_customer: bool,
    pub resolver: ResolverConfig,
    pub columns: ColumnMapping,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            ledger_path: PathBuf::from(DEFAULT_LEDGER_PATH),
            report_dir: PathBuf::from(DEFAULT_REPORT_DIR),
            write_report: true,
            dry_run: false,
            default_carrier: DEFAULT_CARRIER.to_string(),
            notify_customer: false,
            resolver: ResolverConfig::default(),
            columns: ColumnMapping::default(),
        }
    }
}

impl SyncSettings {
    pub fn from_env() -> Self {
        let ledger_path = env_or_default("TRACKSYNC_LEDGER_PATH").unwrap_or_else(|| {
            debug!("🪛️ TRACKSYNC_LEDGER_PATH not set, using {DEFAULT_LEDGER_PATH}");
            DEFAULT_LEDGER_PATH.to_string()
        });
        let report_dir = env_or_default("TRACKSYNC_REPORT_DIR").unwrap_or_else(|| DEFAULT_REPORT_DIR.to_string());
        let resolver = ResolverConfig {
            search_limit: env_in_range("TRACKSYNC_SEARCH_LIMIT", DEFAULT_SEARCH_LIMIT, 1..=MAX_PAGE_SIZE),
            deep_scan_window: env_in_range("TRACKSYNC_DEEP_SCAN_WINDOW", DEFAULT_DEEP_SCAN_WINDOW, 1..=MAX_PAGE_SIZE),
            attribute_key: env_or_default("TRACKSYNC_ATTRIBUTE_KEY"),
        };
        let columns = ColumnMapping {
            external_id: env_or_default("TRACKSYNC_ID_COLUMN"),
            tracking_number: env_or_default("TRACKSYNC_TRACKING_COLUMN"),
            carrier: env_or_default("TRACKSYNC_CARRIER_COLUMN"),
        };
        Self {
            ledger_path: PathBuf::from(ledger_path),
            report_dir: PathBuf::from(report_dir),
            write_report: true,
            dry_run: env_flag("TRACKSYNC_DRY_RUN", false),
            default_carrier: env_or_default("TRACKSYNC_DEFAULT_CARRIER").unwrap_or_else(|| DEFAULT_CARRIER.to_string()),
            notify_customer: env_flag("TRACKSYNC_NOTIFY_CUSTOMER", false),
            resolver,
            columns,
        }
    }

    /// Command line flags take precedence over the environment.
    pub fn with_overrides(mut self, args: &SyncArgs) -> Self {
        if args.dry_run {
            self.dry_run = true;
        }
        if let Some(path) = &args.ledger {
            self.ledger_path = path.clone();
        }
        if let Some(dir) = &args.report_dir {
            self.report_dir = dir.clone();
        }
        if args.no_report {
            self.write_report = false;
        }
        self
    }

    pub fn with_ledger(mut self, ledger: Option<PathBuf>) -> Self {
        if let Some(path) = ledger {
            self.ledger_path = path;
        }
        self
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions { dry_run: self.dry_run, default_carrier: self.default_carrier.clone() }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flags_override_settings() {
        let args = SyncArgs {
            csv: Some(PathBuf::from("orders.csv")),
            dry_run: true,
            ledger: Some(PathBuf::from("/tmp/ledger.json")),
            report_dir: None,
            no_report: true,
        };
        let settings = SyncSettings::default().with_overrides(&args);
        assert!(settings.dry_run);
        assert!(!settings.write_report);
        assert_eq!(settings.ledger_path, PathBuf::from("/tmp/ledger.json"));
        assert_eq!(settings.report_dir, PathBuf::from("logs"));
        assert_eq!(settings.sync_options().default_carrier, "Other");
    }

    #[test]
    fn env_dry_run_survives_missing_flag() {
        let args =
            SyncArgs { csv: Some(PathBuf::from("orders.csv")), dry_run: false, ledger: None, report_dir: None, no_report: false };
        let settings = SyncSettings { dry_run: true, ..Default::default() }.with_overrides(&args);
        assert!(settings.dry_run);
        assert!(settings.write_report);
        assert_eq!(settings.ledger_path, PathBuf::from("processed_orders.json"));
    }
}
