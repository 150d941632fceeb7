pub mod app;
pub mod commands;
pub mod files;
pub mod output;

pub use app::{Cli, Commands};
pub use commands::run;
