use log::*;
use shopify_tools::helpers::{search_term, tag_query};

use super::{
    verification::{attribute_matches, verify_candidate},
    ResolverConfig,
};
use crate::{
    sync_types::{ExternalOrderRef, MatchTier, PlatformOrder},
    traits::{OrderPlatform, PlatformError},
};

pub const OPEN_ORDERS_QUERY: &str = "status:open";

/// One way of finding the platform order for an external reference. The resolver tries strategies in order, cheapest
/// and most reliable first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Orders tagged with the reference. Tags are set deliberately, so the first hit is accepted as-is.
    TagMatch,
    /// Free-text search for the reference, keeping only candidates that pass verification.
    TextSearchMatch,
    /// Scan a bounded window of recent open orders for a custom attribute with the reference as its value. Search
    /// does not reliably index custom attributes, so this catches orders the other tiers cannot see.
    DeepScanMatch,
}

impl MatchStrategy {
    pub fn tier(&self) -> MatchTier {
        match self {
            Self::TagMatch => MatchTier::Tag,
            Self::TextSearchMatch => MatchTier::TextSearch,
            Self::DeepScanMatch => MatchTier::DeepScan,
        }
    }

    pub async fn try_match<P: OrderPlatform>(
        &self,
        platform: &P,
        id: &ExternalOrderRef,
        config: &ResolverConfig,
    ) -> Result<Option<PlatformOrder>, PlatformError> {
        let attribute_key = config.attribute_key.as_deref();
        match self {
            Self::TagMatch => {
                let orders = platform.search_orders_by_query(&tag_query(id.as_str()), config.search_limit).await?;
                Ok(orders.into_iter().next())
            },
            Self::TextSearchMatch => {
                let candidates =
                    platform.search_orders_by_query(&search_term(id.as_str()), config.search_limit).await?;
                let count = candidates.len();
                let found = candidates.into_iter().find(|o| verify_candidate(o, id, attribute_key));
                if found.is_none() && count > 0 {
                    debug!("🔎️ Text search for {id} returned {count} candidates, none of which verified");
                }
                Ok(found)
            },
            Self::DeepScanMatch => {
                let orders = platform.search_orders_by_query(OPEN_ORDERS_QUERY, config.deep_scan_window).await?;
                trace!("🔎️ Deep scanning {} open orders for {id}", orders.len());
                Ok(orders.into_iter().find(|o| attribute_matches(o, id, attribute_key)))
            },
        }
    }
}

pub const DEFAULT_STRATEGIES: [MatchStrategy; 3] =
    [MatchStrategy::TagMatch, MatchStrategy::TextSearchMatch, MatchStrategy::DeepScanMatch];
