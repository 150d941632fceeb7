pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod form;
pub mod import_id;
