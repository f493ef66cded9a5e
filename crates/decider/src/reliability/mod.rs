//! Retry scheduling for failed actions

mod retry;

pub(crate) use retry::RETRY_CONTROL;
pub use retry::{RetryPolicy, RetryPolicyError};
