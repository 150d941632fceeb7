//! OAuth access-token sources for Google APIs

use anyhow::{Context, Result};
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

use super::credentials::{AuthorizedUserSecret, ServiceAccountKey};
use crate::api::constants::{self, headers};

/// Tokens are refreshed this long before they expire
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Lifetime requested for self-signed service-account assertions
const ASSERTION_LIFETIME_SECS: u64 = 3600;

/// Supplies bearer tokens for outbound requests
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;

    /// Human-readable origin, for logs
    fn describe(&self) -> String;
}

/// Cached token information
#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub access_token: String,
    pub expires_at: SystemTime,
}

impl TokenInfo {
    fn is_fresh(&self) -> bool {
        SystemTime::now() + EXPIRY_MARGIN < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

impl From<TokenResponse> for TokenInfo {
    fn from(response: TokenResponse) -> Self {
        Self {
            access_token: response.access_token,
            expires_at: SystemTime::now() + Duration::from_secs(response.expires_in),
        }
    }
}

async fn read_token_response(response: reqwest::Response, what: &str) -> Result<TokenInfo> {
    let status = response.status();
    if status.is_success() {
        let token: TokenResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} token response", what))?;
        Ok(token.into())
    } else {
        let error_text = response.text().await.unwrap_or_default();
        anyhow::bail!("{} token request failed with status {}: {}", what, status, error_text)
    }
}

/// A fixed bearer token, e.g. from `GOOGLE_OAUTH_ACCESS_TOKEN`
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }

    fn describe(&self) -> String {
        "static access token".to_string()
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: u64,
    exp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<&'a str>,
}

/// JWT-bearer grant signed with a service-account key
pub struct ServiceAccountTokenSource {
    key: ServiceAccountKey,
    scopes: Vec<String>,
    subject: Option<String>,
    client: Client,
    cache: Mutex<Option<TokenInfo>>,
}

impl ServiceAccountTokenSource {
    pub fn new(key: ServiceAccountKey, scopes: &[&str], subject: Option<String>, client: Client) -> Self {
        Self {
            key,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            subject,
            client,
            cache: Mutex::new(None),
        }
    }

    fn token_uri(&self) -> &str {
        self.key.token_uri.as_deref().unwrap_or(constants::TOKEN_URL)
    }

    /// Build the signed assertion exchanged for an access token
    pub fn signed_assertion(&self, now: u64) -> Result<String> {
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: self.scopes.join(" "),
            aud: self.token_uri(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
            sub: self.subject.as_deref(),
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        let signing_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .context("Service account private_key is not a valid RSA PEM key")?;

        jsonwebtoken::encode(&header, &claims, &signing_key).context("Failed to sign token assertion")
    }

    async fn fetch(&self) -> Result<TokenInfo> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("System clock is before the Unix epoch")?
            .as_secs();
        let assertion = self.signed_assertion(now)?;

        debug!("Requesting service account token for {}", self.key.client_email);

        let response = self
            .client
            .post(self.token_uri())
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .context("Service account token request failed")?;

        read_token_response(response, "Service account").await
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<String> {
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        let token = self.fetch().await?;
        info!("Obtained access token for service account {}", self.key.client_email);
        let access_token = token.access_token.clone();
        *cache = Some(token);
        Ok(access_token)
    }

    fn describe(&self) -> String {
        format!("service account {}", self.key.client_email)
    }
}

/// Refresh-token grant for `gcloud auth application-default login` credentials
pub struct AuthorizedUserTokenSource {
    secret: AuthorizedUserSecret,
    token_url: String,
    client: Client,
    cache: Mutex<Option<TokenInfo>>,
}

impl AuthorizedUserTokenSource {
    pub fn new(secret: AuthorizedUserSecret, client: Client) -> Self {
        Self {
            secret,
            token_url: constants::TOKEN_URL.to_string(),
            client,
            cache: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TokenSource for AuthorizedUserTokenSource {
    async fn access_token(&self) -> Result<String> {
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        debug!("Refreshing authorized user token for client {}", self.secret.client_id);

        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.secret.client_id.as_str()),
                ("client_secret", self.secret.client_secret.as_str()),
                ("refresh_token", self.secret.refresh_token.as_str()),
            ])
            .send()
            .await
            .context("Refresh token request failed")?;

        let token = read_token_response(response, "Authorized user").await?;
        let access_token = token.access_token.clone();
        *cache = Some(token);
        Ok(access_token)
    }

    fn describe(&self) -> String {
        format!("authorized user (client {})", self.secret.client_id)
    }
}

/// Default service account of the GCE/GKE/Cloud Run host
pub struct MetadataServerTokenSource {
    url: String,
    client: Client,
    cache: Mutex<Option<TokenInfo>>,
}

impl MetadataServerTokenSource {
    pub fn new(client: Client) -> Self {
        Self {
            url: constants::METADATA_TOKEN_URL.to_string(),
            client,
            cache: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TokenSource for MetadataServerTokenSource {
    async fn access_token(&self) -> Result<String> {
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        let response = self
            .client
            .get(&self.url)
            .query(&[("scopes", constants::scopes::ALL.join(","))])
            .header(headers::METADATA_FLAVOR, "Google")
            .send()
            .await
            .context("No credentials configured and the metadata server is unreachable")?;

        let token = read_token_response(response, "Metadata server").await?;
        let access_token = token.access_token.clone();
        *cache = Some(token);
        Ok(access_token)
    }

    fn describe(&self) -> String {
        "metadata server".to_string()
    }
}
