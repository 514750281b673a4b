//! Shared building blocks for the ZooKeeper test harness crates.
//!
//! Every error type in the workspace carries an [`ErrorLocation`] so a failing
//! lifecycle call can be traced back to the exact line that raised it.

pub mod error;

pub use error::error_location::ErrorLocation;
