//! Finds the platform order that an external (supplier) reference belongs to.
//!
//! The reference can live in several places on an order: a tag, the order name, a custom attribute. The
//! [`OrderResolver`] runs its [`MatchStrategy`] list in order and returns the first verified match.
mod strategies;
mod verification;

use log::*;
pub use strategies::{MatchStrategy, DEFAULT_STRATEGIES, OPEN_ORDERS_QUERY};
pub use verification::{attribute_matches, verify_candidate};

use crate::{
    sync_types::{ExternalOrderRef, ResolvedOrder},
    traits::{OrderPlatform, PlatformError},
};

pub const DEFAULT_SEARCH_LIMIT: u32 = 5;
pub const DEFAULT_DEEP_SCAN_WINDOW: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Number of candidates requested from the tag and text searches
    pub search_limit: u32,
    /// Number of recent open orders inspected by the deep scan
    pub deep_scan_window: u32,
    /// If set, only custom attributes with this key are compared against the reference
    pub attribute_key: Option<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { search_limit: DEFAULT_SEARCH_LIMIT, deep_scan_window: DEFAULT_DEEP_SCAN_WINDOW, attribute_key: None }
    }
}

pub struct OrderResolver<P> {
    platform: P,
    config: ResolverConfig,
    strategies: Vec<MatchStrategy>,
}

impl<P> OrderResolver<P>
where P: OrderPlatform
{
    pub fn new(platform: P, config: ResolverConfig) -> Self {
        Self { platform, config, strategies: DEFAULT_STRATEGIES.to_vec() }
    }

    /// Replaces the default strategy list. Strategies are tried in the given order.
    pub fn with_strategies(mut self, strategies: Vec<MatchStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Returns the order for `id`, or `None` if no strategy produced a verified match. Platform errors abort the
    /// search and are returned as-is; a failed tier is never treated as "no match".
    pub async fn resolve(&self, id: &ExternalOrderRef) -> Result<Option<ResolvedOrder>, PlatformError> {
        if id.is_empty() {
            warn!("🔎️ Refusing to resolve an empty order reference");
            return Ok(None);
        }
        for strategy in &self.strategies {
            trace!("🔎️ Trying {} for {id}", strategy.tier());
            if let Some(order) = strategy.try_match(&self.platform, id, &self.config).await? {
                info!("🔎️ {id} matched order {} via {}", order.display_name, strategy.tier());
                return Ok(Some(ResolvedOrder { order, tier: strategy.tier() }));
            }
        }
        info!("🔎️ No order found for {id}");
        Ok(None)
    }
}
