pub mod client;
pub mod credentials;

pub use client::{StaticTokenSource, TokenInfo, TokenSource};
pub use credentials::{CredentialMaterial, CredentialsFile};
