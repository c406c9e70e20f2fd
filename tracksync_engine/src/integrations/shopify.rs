use log::*;
use shopify_tools::{
    NewTrackingInfo,
    ShopifyApi,
    ShopifyApiError,
    ShopifyConfig,
    ShopifyFulfillmentOrder,
    ShopifyOrder,
};

use crate::{
    sync_types::{CustomAttribute, FulfillmentOrder, FulfillmentOrderStatus, PlatformOrder, TrackingInfo},
    traits::{OrderPlatform, PlatformError},
};

/// [`OrderPlatform`] backed by the Shopify Admin GraphQL API.
#[derive(Clone)]
pub struct ShopifyPlatform {
    api: ShopifyApi,
    notify_customer: bool,
}

impl ShopifyPlatform {
    pub fn new(config: ShopifyConfig, notify_customer: bool) -> Result<Self, PlatformError> {
        let api = ShopifyApi::new(config).map_err(PlatformError::from)?;
        Ok(Self { api, notify_customer })
    }

    /// Makes a cheap authenticated call. Run this before a batch so bad credentials fail the run up front instead of
    /// failing every row.
    pub async fn shop_name(&self) -> Result<String, PlatformError> {
        Ok(self.api.fetch_shop_name().await?)
    }
}

impl OrderPlatform for ShopifyPlatform {
    async fn search_orders_by_query(&self, query: &str, limit: u32) -> Result<Vec<PlatformOrder>, PlatformError> {
        let orders = self.api.search_orders(query, limit).await?;
        Ok(orders.into_iter().map(PlatformOrder::from).collect())
    }

    async fn list_fulfillment_orders(&self, order_id: &str) -> Result<Vec<FulfillmentOrder>, PlatformError> {
        let fulfillment_orders = self.api.fetch_fulfillment_orders(order_id).await?;
        Ok(fulfillment_orders.into_iter().map(FulfillmentOrder::from).collect())
    }

    async fn create_fulfillment(
        &self,
        fulfillment_order_id: &str,
        tracking: &TrackingInfo,
    ) -> Result<String, PlatformError> {
        let tracking = NewTrackingInfo { number: tracking.tracking_number.clone(), company: tracking.carrier.clone() };
        let fulfillment = self.api.create_fulfillment(fulfillment_order_id, &tracking, self.notify_customer).await?;
        match fulfillment.id {
            Some(id) => Ok(id),
            None => {
                warn!("🛍️ Shopify created a fulfillment for {fulfillment_order_id} but did not return its id");
                Ok(String::default())
            },
        }
    }
}

impl From<ShopifyApiError> for PlatformError {
    fn from(e: ShopifyApiError) -> Self {
        if e.is_auth_failure() {
            return PlatformError::Unauthorized(e.to_string());
        }
        if e.is_rate_limited() {
            return PlatformError::RateLimited(e.to_string());
        }
        match e {
            ShopifyApiError::UserErrors(msg) => PlatformError::Rejected(msg),
            ShopifyApiError::EmptyResponse => PlatformError::NotFound(e.to_string()),
            ShopifyApiError::QueryError { status: 404, message } => PlatformError::NotFound(message),
            _ => PlatformError::ApiError(e.to_string()),
        }
    }
}

impl From<ShopifyFulfillmentOrder> for FulfillmentOrder {
    fn from(fo: ShopifyFulfillmentOrder) -> Self {
        let status = fo.status.parse::<FulfillmentOrderStatus>().unwrap_or_else(|e| match e {});
        FulfillmentOrder { id: fo.id, status }
    }
}

impl From<ShopifyOrder> for PlatformOrder {
    fn from(order: ShopifyOrder) -> Self {
        let tracking_numbers = order.tracking_numbers();
        let custom_attributes = order
            .custom_attributes
            .into_iter()
            .map(|a| CustomAttribute::new(a.key, a.value.unwrap_or_default()))
            .collect();
        let fulfillment_orders = order.fulfillment_orders.nodes.into_iter().map(FulfillmentOrder::from).collect();
        PlatformOrder {
            platform_id: order.id,
            legacy_id: order.legacy_resource_id,
            display_name: order.name,
            tags: order.tags.into_iter().map(|t| t.trim().to_string()).collect(),
            note: order.note.unwrap_or_default(),
            custom_attributes,
            fulfillment_orders,
            tracking_numbers,
        }
    }
}
