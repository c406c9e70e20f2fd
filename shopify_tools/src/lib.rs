//! A thin client for the parts of the Shopify Admin GraphQL API that tracking sync needs: searching orders,
//! listing fulfillment orders and creating fulfillments with tracking information.
mod api;
mod config;
mod error;

pub mod data_objects;
pub mod helpers;

pub use api::ShopifyApi;
pub use config::{ShopifyConfig, MAX_PAGE_SIZE};
pub use data_objects::{
    Attribute,
    NewTrackingInfo,
    ShopifyFulfillment,
    ShopifyFulfillmentOrder,
    ShopifyOrder,
    ShopifyTrackingInfo,
};
pub use error::ShopifyApiError;
