//! Test helpers shared by unit and integration tests. Enabled with the `test_utils` feature.
mod fake_platform;

pub use fake_platform::{FakePlatform, FulfillmentCall};

pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
