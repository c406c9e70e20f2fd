use std::sync::{Arc, Mutex, MutexGuard};

use log::*;

use crate::{
    resolver::OPEN_ORDERS_QUERY,
    sync_types::{FulfillmentOrder, FulfillmentOrderStatus, PlatformOrder, TrackingInfo},
    traits::{OrderPlatform, PlatformError},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillmentCall {
    pub fulfillment_order_id: String,
    pub tracking: TrackingInfo,
}

#[derive(Debug, Default)]
struct FakeStore {
    /// Most recent first, like the real search
    orders: Vec<PlatformOrder>,
    searches: Vec<String>,
    fulfillments: Vec<FulfillmentCall>,
    fail_fulfillments_with: Option<PlatformError>,
}

/// An in-memory store that understands just enough of the Shopify search syntax for the resolver:
///
/// * `tag:X` returns orders carrying tag `X`.
/// * `status:open` returns orders with an open fulfillment order.
/// * Anything else is a free-text search over order names, tags and notes. Custom attributes are *not* indexed, like
///   on the real platform.
///
/// Clones share the same store, so a test can keep a handle while the orchestrator owns another.
#[derive(Debug, Clone, Default)]
pub struct FakePlatform {
    store: Arc<Mutex<FakeStore>>,
}

impl FakePlatform {
    pub fn new(orders: Vec<PlatformOrder>) -> Self {
        let store = FakeStore { orders, ..Default::default() };
        Self { store: Arc::new(Mutex::new(store)) }
    }

    fn store(&self) -> MutexGuard<'_, FakeStore> {
        match self.store.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn fail_fulfillments_with(&self, err: PlatformError) {
        self.store().fail_fulfillments_with = Some(err);
    }

    pub fn searches(&self) -> Vec<String> {
        self.store().searches.clone()
    }

    pub fn fulfillments(&self) -> Vec<FulfillmentCall> {
        self.store().fulfillments.clone()
    }

    pub fn order(&self, name: &str) -> Option<PlatformOrder> {
        self.store().orders.iter().find(|o| o.display_name == name).cloned()
    }
}

fn unquote(term: &str) -> &str {
    term.trim().trim_matches('"')
}

fn matches_query(order: &PlatformOrder, query: &str) -> bool {
    if query == OPEN_ORDERS_QUERY {
        return order.first_open_fulfillment_order().is_some();
    }
    if let Some(tag) = query.strip_prefix("tag:") {
        return order.has_tag(unquote(tag));
    }
    let term = unquote(query);
    order.display_name.contains(term) || order.note.contains(term) || order.tags.iter().any(|t| t.contains(term))
}

impl OrderPlatform for FakePlatform {
    async fn search_orders_by_query(&self, query: &str, limit: u32) -> Result<Vec<PlatformOrder>, PlatformError> {
        let mut store = self.store();
        store.searches.push(query.to_string());
        let found = store
            .orders
            .iter()
            .filter(|o| matches_query(o, query))
            .take(limit as usize)
            .cloned()
            .collect::<Vec<_>>();
        trace!("Fake search '{query}' found {} orders", found.len());
        Ok(found)
    }

    async fn list_fulfillment_orders(
        &self,
        order_id: &str,
    ) -> Result<Vec<FulfillmentOrder>, PlatformError> {
        self.store()
            .orders
            .iter()
            .find(|o| o.platform_id == order_id)
            .map(|o| o.fulfillment_orders.clone())
            .ok_or_else(|| PlatformError::NotFound(order_id.to_string()))
    }

    async fn create_fulfillment(
        &self,
        fulfillment_order_id: &str,
        tracking: &TrackingInfo,
    ) -> Result<String, PlatformError> {
        let mut store = self.store();
        if let Some(err) = store.fail_fulfillments_with.clone() {
            return Err(err);
        }
        let order = store
            .orders
            .iter_mut()
            .find(|o| o.fulfillment_orders.iter().any(|fo| fo.id == fulfillment_order_id))
            .ok_or_else(|| PlatformError::NotFound(fulfillment_order_id.to_string()))?;
        let fo = order
            .fulfillment_orders
            .iter_mut()
            .find(|fo| fo.id == fulfillment_order_id && fo.is_open())
            .ok_or_else(|| PlatformError::Rejected(format!("Fulfillment order {fulfillment_order_id} is not open")))?;
        fo.status = FulfillmentOrderStatus::Closed;
        order.tracking_numbers.push(tracking.tracking_number.clone());
        store.fulfillments.push(FulfillmentCall {
            fulfillment_order_id: fulfillment_order_id.to_string(),
            tracking: tracking.clone(),
        });
        Ok(format!("gid://shopify/Fulfillment/{}", store.fulfillments.len()))
    }
}
