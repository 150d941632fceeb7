//! Google Forms, Drive and Sheets API gateway
//!
//! Typed capability traits over the three REST surfaces, built on a shared
//! authenticated client with a retry layer for idempotent calls.

pub mod client;
pub mod constants;
pub mod drive;
pub mod errors;
pub mod forms;
pub mod models;
pub mod resilience;
pub mod sheets;

pub use client::{ApiCall, GoogleClient};
pub use drive::{DriveApi, HttpDriveApi};
pub use errors::ApiError;
pub use forms::{FormsApi, HttpFormsApi};
pub use resilience::{ApiLogger, OperationContext, RetryConfig, RetryPolicy};
pub use sheets::{HttpSheetsApi, SheetsApi};
