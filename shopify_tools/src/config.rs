use std::time::Duration;

use log::*;
use tracksync_common::{env_in_range, env_or_default, env_parsed, required_env, ConfigError, Secret};

pub const DEFAULT_API_VERSION: &str = "2024-04";
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// The largest page Shopify returns for a connection (`first` argument).
pub const MAX_PAGE_SIZE: u32 = 250;

#[derive(Debug, Clone)]
pub struct ShopifyConfig {
    /// The storefront domain, e.g. "my-shop.myshopify.com", without scheme or trailing slash.
    pub shop: String,
    pub admin_access_token: Secret<String>,
    pub api_version: String,
    /// How many times a throttled request is retried before the error is returned to the caller.
    pub max_retries: u32,
    /// Upper bound on a single HTTP request, including reading the response.
    pub request_timeout: Duration,
}

impl Default for ShopifyConfig {
    fn default() -> Self {
        Self::new("", Secret::default())
    }
}

impl ShopifyConfig {
    pub fn new(shop: &str, admin_access_token: Secret<String>) -> Self {
        Self {
            shop: normalize_shop(shop),
            admin_access_token,
            api_version: DEFAULT_API_VERSION.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Loads the configuration from `TRACKSYNC_SHOPIFY_*` variables. The shop and access token are mandatory.
    pub fn try_from_env() -> Result<Self, ConfigError> {
        let shop = required_env("TRACKSYNC_SHOPIFY_SHOP")?;
        let admin_access_token = Secret::new(required_env("TRACKSYNC_SHOPIFY_ACCESS_TOKEN")?);
        let api_version = env_or_default("TRACKSYNC_SHOPIFY_API_VERSION").unwrap_or_else(|| {
            debug!("🪛️ TRACKSYNC_SHOPIFY_API_VERSION not set, using {DEFAULT_API_VERSION} as default");
            DEFAULT_API_VERSION.to_string()
        });
        let max_retries = env_parsed("TRACKSYNC_SHOPIFY_MAX_RETRIES", DEFAULT_MAX_RETRIES);
        let timeout_secs = env_in_range("TRACKSYNC_SHOPIFY_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS, 1..=600);
        Ok(Self {
            shop: normalize_shop(&shop),
            admin_access_token,
            api_version,
            max_retries,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn with_api_version(mut self, api_version: &str) -> Self {
        self.api_version = api_version.to_string();
        self
    }
}

/// Accepts the shop in any of the forms people paste it in ("https://shop.myshopify.com/", "shop.myshopify.com").
pub fn normalize_shop(shop: &str) -> String {
    let shop = shop.trim();
    let shop = shop.strip_prefix("https://").or_else(|| shop.strip_prefix("http://")).unwrap_or(shop);
    shop.trim_end_matches('/').to_string()
}
