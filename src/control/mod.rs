//! Control paths that mutate the work an in-flight orchestration is
//! responsible for: targeted retry of failed or stuck operations, and
//! campaign cancellation.

pub mod canceler;
pub mod retryer;

pub use canceler::Canceler;
pub use retryer::{RejectedOperation, RetryResponse, Retryer};
