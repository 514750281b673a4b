pub mod config;
pub mod lifecycle;
pub mod logger;
pub mod server;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Lifecycle(#[from] lifecycle::LifecycleError),

    #[error(transparent)]
    Logger(#[from] logger::LoggerError),

    #[error(transparent)]
    Server(#[from] server::ServerError),
}
