use log::*;
use thiserror::Error;

use crate::{
    sync_types::{FulfillmentOrderStatus, PlatformOrder, TrackingInfo},
    traits::{OrderPlatform, PlatformError},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FulfillmentResult {
    Fulfilled { fulfillment_order_id: String, fulfillment_id: String },
    /// The tracking number is already on the order. Nothing was changed.
    AlreadyFulfilled,
    /// Dry run. Nothing was changed; `would_fulfill` is the open fulfillment order that would have been used, if the
    /// order data already listed one.
    DryRun { would_fulfill: Option<String> },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FulfillmentError {
    #[error("Order {0} has no open fulfillment orders. It may already be fulfilled or cancelled.")]
    NoOpenFulfillment(String),
    #[error("{0}")]
    ApiError(#[from] PlatformError),
}

/// Marks resolved orders as fulfilled with a tracking number, at most once per tracking number.
pub struct FulfillmentUpdater<P> {
    platform: P,
}

impl<P> FulfillmentUpdater<P>
where P: OrderPlatform
{
    pub fn new(platform: P) -> Self {
        Self { platform }
    }

    /// Fulfills the first open fulfillment order of `order` with `tracking`.
    ///
    /// If the tracking number is already recorded on the order, this is a no-op that returns
    /// [`FulfillmentResult::AlreadyFulfilled`]. On success, `order` is updated in place (the tracking number is added
    /// and the fulfillment order is closed) so that a repeated call with the same order is also a no-op.
    ///
    /// The creation call is made exactly once; errors are returned to the caller and not retried.
    pub async fn fulfill(
        &self,
        order: &mut PlatformOrder,
        tracking: &TrackingInfo,
        dry_run: bool,
    ) -> Result<FulfillmentResult, FulfillmentError> {
        let name = order.display_name.clone();
        if dry_run {
            let would_fulfill = order.first_open_fulfillment_order().map(|fo| fo.id.clone());
            info!("📦️ [Dry run] Would fulfill order {name} with tracking {} ({})", tracking.tracking_number, tracking.carrier);
            return Ok(FulfillmentResult::DryRun { would_fulfill });
        }
        if order.has_tracking_number(&tracking.tracking_number) {
            info!("📦️ Order {name} already has tracking {}. Skipping.", tracking.tracking_number);
            return Ok(FulfillmentResult::AlreadyFulfilled);
        }
        if order.fulfillment_orders.is_empty() {
            debug!("📦️ Order {name} was loaded without fulfillment orders. Fetching them.");
            order.fulfillment_orders = self.platform.list_fulfillment_orders(&order.platform_id).await?;
        }
        let fulfillment_order_id = match order.first_open_fulfillment_order() {
            Some(fo) => fo.id.clone(),
            None => {
                warn!("📦️ Order {name} has no open fulfillment orders");
                return Err(FulfillmentError::NoOpenFulfillment(name));
            },
        };
        let fulfillment_id = self.platform.create_fulfillment(&fulfillment_order_id, tracking).await.map_err(|e| {
            error!("📦️ Failed to fulfill order {name} ({fulfillment_order_id}). {e}");
            e
        })?;
        info!("📦️ Order {name} fulfilled with tracking {} ({})", tracking.tracking_number, tracking.carrier);
        order.tracking_numbers.push(tracking.tracking_number.clone());
        if let Some(fo) = order.fulfillment_orders.iter_mut().find(|fo| fo.id == fulfillment_order_id) {
            fo.status = FulfillmentOrderStatus::Closed;
        }
        Ok(FulfillmentResult::Fulfilled { fulfillment_order_id, fulfillment_id })
    }
}

#[cfg(test)]
mod test {
    use mockall::predicate::*;

    use super::*;
    use crate::{mocks::MockPlatform, sync_types::FulfillmentOrder};

    fn open_order() -> PlatformOrder {
        PlatformOrder {
            platform_id: "gid://shopify/Order/1042".into(),
            display_name: "#1042".into(),
            fulfillment_orders: vec![
                FulfillmentOrder::new("gid://shopify/FulfillmentOrder/1", FulfillmentOrderStatus::Closed),
                FulfillmentOrder::new("gid://shopify/FulfillmentOrder/2", FulfillmentOrderStatus::Open),
            ],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn fulfills_first_open_fulfillment_order() {
        let _ = env_logger::try_init();
        let mut platform = MockPlatform::new();
        platform.expect_list_fulfillment_orders().never();
        platform
            .expect_create_fulfillment()
            .withf(|fo, t| fo == "gid://shopify/FulfillmentOrder/2" && t.tracking_number == "LP000111222CN" && t.carrier == "Other")
            .times(1)
            .returning(|_, _| Ok("gid://shopify/Fulfillment/9".into()));
        let updater = FulfillmentUpdater::new(platform);
        let mut order = open_order();
        let result = updater.fulfill(&mut order, &TrackingInfo::new("LP000111222CN"), false).await.unwrap();
        assert_eq!(result, FulfillmentResult::Fulfilled {
            fulfillment_order_id: "gid://shopify/FulfillmentOrder/2".into(),
            fulfillment_id: "gid://shopify/Fulfillment/9".into()
        });
        assert!(order.has_tracking_number("LP000111222CN"));
        assert!(order.first_open_fulfillment_order().is_none());
    }

    #[tokio::test]
    async fn second_call_with_same_tracking_is_a_no_op() {
        let mut platform = MockPlatform::new();
        platform.expect_create_fulfillment().times(1).returning(|_, _| Ok("gid://shopify/Fulfillment/9".into()));
        let updater = FulfillmentUpdater::new(platform);
        let mut order = open_order();
        let tracking = TrackingInfo::new("LP000111222CN");
        updater.fulfill(&mut order, &tracking, false).await.unwrap();
        let second = updater.fulfill(&mut order, &tracking, false).await.unwrap();
        assert_eq!(second, FulfillmentResult::AlreadyFulfilled);
    }

    #[tokio::test]
    async fn existing_tracking_number_is_not_fulfilled_again() {
        let mut platform = MockPlatform::new();
        platform.expect_create_fulfillment().never();
        let updater = FulfillmentUpdater::new(platform);
        let mut order = open_order();
        order.tracking_numbers.push("LP000111222CN".into());
        let result = updater.fulfill(&mut order, &TrackingInfo::new("LP000111222CN"), false).await.unwrap();
        assert_eq!(result, FulfillmentResult::AlreadyFulfilled);
    }

    #[tokio::test]
    async fn dry_run_never_creates_fulfillments() {
        let mut platform = MockPlatform::new();
        platform.expect_create_fulfillment().never();
        platform.expect_list_fulfillment_orders().never();
        let updater = FulfillmentUpdater::new(platform);
        let mut order = open_order();
        let result = updater.fulfill(&mut order, &TrackingInfo::new("LP000111222CN"), true).await.unwrap();
        assert_eq!(result, FulfillmentResult::DryRun { would_fulfill: Some("gid://shopify/FulfillmentOrder/2".into()) });
        assert_eq!(order, open_order());
    }

    #[tokio::test]
    async fn no_open_fulfillment_orders() {
        let mut platform = MockPlatform::new();
        platform.expect_create_fulfillment().never();
        let updater = FulfillmentUpdater::new(platform);
        let mut order = open_order();
        order.fulfillment_orders.retain(|fo| !fo.is_open());
        let err = updater.fulfill(&mut order, &TrackingInfo::new("LP000111222CN"), false).await.unwrap_err();
        assert_eq!(err, FulfillmentError::NoOpenFulfillment("#1042".into()));
    }

    #[tokio::test]
    async fn fetches_fulfillment_orders_when_not_loaded() {
        let mut platform = MockPlatform::new();
        platform
            .expect_list_fulfillment_orders()
            .with(eq("gid://shopify/Order/1042"))
            .times(1)
            .returning(|_| Ok(vec![FulfillmentOrder::new("gid://shopify/FulfillmentOrder/5", FulfillmentOrderStatus::Open)]));
        platform
            .expect_create_fulfillment()
            .withf(|fo, t| fo == "gid://shopify/FulfillmentOrder/5" && t.carrier == "China Post")
            .times(1)
            .returning(|_, _| Ok("gid://shopify/Fulfillment/10".into()));
        let updater = FulfillmentUpdater::new(platform);
        let mut order = PlatformOrder { fulfillment_orders: vec![], ..open_order() };
        let tracking = TrackingInfo::new("LP000111222CN").with_carrier(Some("China Post"));
        let result = updater.fulfill(&mut order, &tracking, false).await.unwrap();
        assert!(matches!(result, FulfillmentResult::Fulfilled { .. }));
    }

    #[tokio::test]
    async fn api_errors_are_returned_without_retrying() {
        let mut platform = MockPlatform::new();
        platform
            .expect_create_fulfillment()
            .times(1)
            .returning(|_, _| Err(PlatformError::Rejected("Fulfillment order is closed".into())));
        let updater = FulfillmentUpdater::new(platform);
        let mut order = open_order();
        let err = updater.fulfill(&mut order, &TrackingInfo::new("LP000111222CN"), false).await.unwrap_err();
        assert_eq!(err.to_string(), "The platform rejected the request: Fulfillment order is closed");
        assert!(order.tracking_numbers.is_empty());
    }
}
