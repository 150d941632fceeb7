use anyhow::{Context, Result};
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::client::{
    AuthorizedUserTokenSource, MetadataServerTokenSource, ServiceAccountTokenSource,
    StaticTokenSource, TokenSource,
};
use crate::api::constants::scopes;
use crate::config::CredentialsConfig;

pub const ENV_GOOGLE_CREDENTIALS: &str = "GOOGLE_CREDENTIALS";
pub const ENV_ACCESS_TOKEN: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";
pub const ENV_APPLICATION_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUserSecret {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

/// Contents of a credentials JSON document, keyed by its `type` field
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialsFile {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUserSecret),
}

impl CredentialsFile {
    pub fn parse(json: &str, origin: &str) -> Result<Self> {
        serde_json::from_str(json).with_context(|| {
            format!(
                "Failed to parse credentials from {} (expected type service_account or authorized_user)",
                origin
            )
        })
    }
}

/// Credential material found by [`resolve`], before any token is fetched
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialMaterial {
    Json { origin: String, content: String },
    AccessToken(String),
    MetadataServer,
}

/// Walk the resolution chain: inline JSON, file path, `GOOGLE_CREDENTIALS`,
/// then ambient sources (static token, `GOOGLE_APPLICATION_CREDENTIALS`,
/// the gcloud well-known file, the metadata server).
pub fn resolve<E>(config: &CredentialsConfig, env: E) -> Result<CredentialMaterial>
where
    E: Fn(&str) -> Option<String>,
{
    if let Some(json) = config.json.as_ref().filter(|s| !s.trim().is_empty()) {
        debug!("Using inline credentials");
        return Ok(CredentialMaterial::Json {
            origin: "inline credentials".to_string(),
            content: json.clone(),
        });
    }

    if let Some(path) = &config.file {
        return read_credentials_file(path, "credentials file");
    }

    if let Some(value) = env(ENV_GOOGLE_CREDENTIALS).filter(|s| !s.trim().is_empty()) {
        if value.trim_start().starts_with('{') {
            return Ok(CredentialMaterial::Json {
                origin: ENV_GOOGLE_CREDENTIALS.to_string(),
                content: value,
            });
        }
        return read_credentials_file(Path::new(value.trim()), ENV_GOOGLE_CREDENTIALS);
    }

    let static_token = config
        .access_token
        .clone()
        .or_else(|| env(ENV_ACCESS_TOKEN))
        .filter(|s| !s.trim().is_empty());
    if let Some(token) = static_token {
        return Ok(CredentialMaterial::AccessToken(token));
    }

    if let Some(path) = env(ENV_APPLICATION_CREDENTIALS).filter(|s| !s.trim().is_empty()) {
        return read_credentials_file(Path::new(path.trim()), ENV_APPLICATION_CREDENTIALS);
    }

    if let Some(path) = well_known_file().filter(|p| p.exists()) {
        return read_credentials_file(&path, "gcloud application default credentials");
    }

    Ok(CredentialMaterial::MetadataServer)
}

fn read_credentials_file(path: &Path, origin: &str) -> Result<CredentialMaterial> {
    debug!("Reading credentials from {} ({:?})", origin, path);
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read credentials from {} ({:?})", origin, path))?;
    Ok(CredentialMaterial::Json {
        origin: format!("{} ({})", origin, path.display()),
        content,
    })
}

/// `~/.config/gcloud/application_default_credentials.json` on Linux/macOS,
/// `%APPDATA%\gcloud\...` on Windows
fn well_known_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("gcloud").join("application_default_credentials.json"))
}

/// Turn resolved material into a token source
pub fn token_source(
    material: CredentialMaterial,
    impersonate_user: Option<String>,
    client: Client,
) -> Result<Arc<dyn TokenSource>> {
    let source: Arc<dyn TokenSource> = match material {
        CredentialMaterial::Json { origin, content } => match CredentialsFile::parse(&content, &origin)? {
            CredentialsFile::ServiceAccount(key) => Arc::new(ServiceAccountTokenSource::new(
                key,
                &scopes::ALL,
                impersonate_user,
                client,
            )),
            CredentialsFile::AuthorizedUser(secret) => {
                Arc::new(AuthorizedUserTokenSource::new(secret, client))
            }
        },
        CredentialMaterial::AccessToken(token) => Arc::new(StaticTokenSource::new(token)),
        CredentialMaterial::MetadataServer => Arc::new(MetadataServerTokenSource::new(client)),
    };
    info!("Authenticating with {}", source.describe());
    Ok(source)
}

/// Resolve from the process environment and build a token source
pub fn from_config(config: &CredentialsConfig, client: Client) -> Result<Arc<dyn TokenSource>> {
    let material = resolve(config, |name| std::env::var(name).ok())?;
    token_source(material, config.impersonate_user.clone(), client)
}
