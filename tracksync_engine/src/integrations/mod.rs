//! Commerce platform backends for [`OrderPlatform`](crate::traits::OrderPlatform).
pub mod shopify;
