//! Data models for the ZooKeeper test harness.
//!
//! Pure data passed between the harness layers: the correlation token a test
//! framework hands to `before`/`after`, and a snapshot of a running instance.
//! No process management lives here.

pub mod error;
pub mod instance_info;
pub mod test_context;

pub use common::ErrorLocation;
pub use error::model_error::ModelError;
pub use instance_info::InstanceInfo;
pub use instance_info::builder::InstanceInfoBuilder;
pub use test_context::TestContext;
