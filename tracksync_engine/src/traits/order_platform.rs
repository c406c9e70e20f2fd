use std::sync::Arc;

use thiserror::Error;

use crate::sync_types::{FulfillmentOrder, PlatformOrder, TrackingInfo};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Authentication with the platform failed: {0}")]
    Unauthorized(String),
    #[error("The platform is rate limiting requests: {0}")]
    RateLimited(String),
    #[error("The platform rejected the request: {0}")]
    Rejected(String),
    #[error("The requested resource does not exist: {0}")]
    NotFound(String),
    #[error("Platform API error: {0}")]
    ApiError(String),
}

/// Request/response primitives against the commerce platform. Implementations must not retry mutations on their
/// own account; a failed call is reported to the caller, which treats it as having had no effect.
#[allow(async_fn_in_trait)]
pub trait OrderPlatform {
    /// Runs a platform search query (e.g. `tag:8123456789`, `status:open`) and returns at most `limit` orders, most
    /// recent first.
    async fn search_orders_by_query(&self, query: &str, limit: u32) -> Result<Vec<PlatformOrder>, PlatformError>;

    async fn list_fulfillment_orders(&self, order_id: &str) -> Result<Vec<FulfillmentOrder>, PlatformError>;

    /// Fulfills the given fulfillment order with the tracking info. Returns the id of the new fulfillment.
    async fn create_fulfillment(
        &self,
        fulfillment_order_id: &str,
        tracking: &TrackingInfo,
    ) -> Result<String, PlatformError>;
}

impl<T: OrderPlatform> OrderPlatform for Arc<T> {
    async fn search_orders_by_query(&self, query: &str, limit: u32) -> Result<Vec<PlatformOrder>, PlatformError> {
        self.as_ref().search_orders_by_query(query, limit).await
    }

    async fn list_fulfillment_orders(&self, order_id: &str) -> Result<Vec<FulfillmentOrder>, PlatformError> {
        self.as_ref().list_fulfillment_orders(order_id).await
    }

    async fn create_fulfillment(
        &self,
        fulfillment_order_id: &str,
        tracking: &TrackingInfo,
    ) -> Result<String, PlatformError> {
        self.as_ref().create_fulfillment(fulfillment_order_id, tracking).await
    }
}
