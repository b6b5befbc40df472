//! gcare-testkit
//!
//! Deterministic in-process harness for order and payment scenarios:
//! an in-memory `Store` with fault injection, plus gateway fixtures that sign
//! callbacks with a known secret.

mod fixtures;
mod memory_store;

pub use fixtures::{
    callback_params, callback_params_with_amount, sign_params, signed_callback, test_gateway,
    test_gateway_settings, to_query_string, TEST_HASH_SECRET, TEST_TIMEZONE, TEST_TMN_CODE,
};
pub use memory_store::MemoryStore;

/// Zone the test gateway expresses `vnp_PayDate` in.
pub fn test_tz() -> chrono_tz::Tz {
    chrono_tz::Asia::Ho_Chi_Minh
}
