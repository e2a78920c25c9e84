//! Failure handling around external AI calls: bounded exponential-backoff
//! [`retry`] and the rolling [`health`] monitor.

pub mod health;
pub mod retry;
