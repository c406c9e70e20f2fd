use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The order fields requested by every order query. Keeping one definition means every search tier sees the same
/// shape of order.
pub const ORDER_DEF: &str = "{ id legacyResourceId name note tags createdAt displayFulfillmentStatus customAttributes \
                             { key value } fulfillments(first: 10) { id status trackingInfo(first: 10) { number \
                             company } } fulfillmentOrders(first: 10) { nodes { id status } } }";

pub const FULFILLMENT_DEF: &str = "{ id status trackingInfo(first: 10) { number company } }";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopifyOrder {
    /// GraphQL global id, e.g. `gid://shopify/Order/5501234567890`
    pub id: String,
    #[serde(default)]
    pub legacy_resource_id: String,
    pub name: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub display_fulfillment_status: Option<String>,
    #[serde(default)]
    pub custom_attributes: Vec<Attribute>,
    #[serde(default)]
    pub fulfillments: Vec<ShopifyFulfillment>,
    #[serde(default)]
    pub fulfillment_orders: Connection<ShopifyFulfillmentOrder>,
}

impl ShopifyOrder {
    /// All tracking numbers already recorded against this order's fulfillments.
    pub fn tracking_numbers(&self) -> Vec<String> {
        self.fulfillments
            .iter()
            .flat_map(|f| f.tracking_info.iter())
            .filter_map(|t| t.number.clone())
            .collect()
    }
}

/// A note attribute. Shopify allows the value to be null.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attribute {
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection<T> {
    pub nodes: Vec<T>,
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShopifyFulfillmentOrder {
    pub id: String,
    /// One of OPEN, IN_PROGRESS, SCHEDULED, ON_HOLD, INCOMPLETE, CLOSED, CANCELLED
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopifyFulfillment {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tracking_info: Vec<ShopifyTrackingInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShopifyTrackingInfo {
    pub number: Option<String>,
    pub company: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewTrackingInfo {
    pub number: String,
    pub company: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserError {
    #[serde(default)]
    pub field: Option<Vec<String>>,
    pub message: String,
}

impl UserError {
    pub fn describe(errors: &[UserError]) -> String {
        errors
            .iter()
            .map(|e| match &e.field {
                Some(field) => format!("{}: {}", field.join("."), e.message),
                None => e.message.clone(),
            })
            .collect::<Vec<String>>()
            .join(", ")
    }
}
