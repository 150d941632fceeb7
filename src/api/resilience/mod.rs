//! Retry and request-logging layer shared by the Forms, Drive and Sheets gateways

pub mod config;
pub mod logging;
pub mod retry;

pub use config::{RetryConfig, RetryConfigBuilder};
pub use logging::{ApiLogger, OperationContext};
pub use retry::RetryPolicy;
