use mockall::mock;

use crate::{
    sync_types::{FulfillmentOrder, PlatformOrder, TrackingInfo},
    traits::{OrderPlatform, PlatformError},
};

mock! {
    pub Platform {}
    impl OrderPlatform for Platform {
        async fn search_orders_by_query(&self, query: &str, limit: u32) -> Result<Vec<PlatformOrder>, PlatformError>;
        async fn list_fulfillment_orders(&self, order_id: &str) -> Result<Vec<FulfillmentOrder>, PlatformError>;
        async fn create_fulfillment(&self, fulfillment_order_id: &str, tracking: &TrackingInfo) -> Result<String, PlatformError>;
    }
}
