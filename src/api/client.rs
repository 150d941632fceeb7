use super::constants::headers;
use super::errors::ApiError;
use super::resilience::{ApiLogger, OperationContext, RetryConfig, RetryPolicy};
use crate::auth::TokenSource;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Identifies a call for error classification and logging
#[derive(Debug, Clone)]
pub struct ApiCall {
    /// e.g. `forms.batchUpdate`
    pub operation: &'static str,
    /// Resource noun used in `NotFound` errors, e.g. `form`
    pub resource: &'static str,
    pub id: String,
}

impl ApiCall {
    pub fn new(operation: &'static str, resource: &'static str, id: impl Into<String>) -> Self {
        Self {
            operation,
            resource,
            id: id.into(),
        }
    }
}

/// Authenticated HTTP plumbing shared by the Forms, Drive and Sheets gateways
#[derive(Clone)]
pub struct GoogleClient {
    http_client: reqwest::Client,
    tokens: Arc<dyn TokenSource>,
    retry_policy: RetryPolicy,
    api_logger: ApiLogger,
}

impl GoogleClient {
    pub fn new(tokens: Arc<dyn TokenSource>, retry_config: RetryConfig, timeout: Duration) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("gforms-provider/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::with_http_client(http_client, tokens, RetryPolicy::new(retry_config)))
    }

    /// Create a client around an existing HTTP client
    pub fn with_http_client(http_client: reqwest::Client, tokens: Arc<dyn TokenSource>, retry_policy: RetryPolicy) -> Self {
        Self {
            http_client,
            tokens,
            retry_policy,
            api_logger: ApiLogger::default(),
        }
    }

    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.api_logger = ApiLogger::new(enabled);
        self
    }

    /// Send a non-idempotent request exactly once. The in-flight request is
    /// not raced against `cancel`: dropping it could leave a created resource
    /// that nobody tracks.
    pub async fn send_once<T, F>(&self, cancel: &CancellationToken, call: &ApiCall, build: F) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled { last: None });
        }
        let context = self.api_logger.start_operation(call.operation, &call.id);
        let outcome = self.attempt(call, &context, 1, &build).await;
        self.api_logger.complete_operation(&context, 1, outcome.is_ok());
        decode(call, &outcome?)
    }

    /// Send an idempotent request through the retry policy
    pub async fn send<T, F>(&self, cancel: &CancellationToken, call: &ApiCall, build: F) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let body = self.send_raw(cancel, call, build).await?;
        decode(call, &body)
    }

    /// Like [`send`](Self::send) but discards the response body
    pub async fn send_empty<F>(&self, cancel: &CancellationToken, call: &ApiCall, build: F) -> Result<(), ApiError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        self.send_raw(cancel, call, build).await.map(|_| ())
    }

    async fn send_raw<F>(&self, cancel: &CancellationToken, call: &ApiCall, build: F) -> Result<String, ApiError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let context = self.api_logger.start_operation(call.operation, &call.id);
        let attempts = AtomicU32::new(0);

        let this = self;
        let build = &build;
        let shared = &context;
        let counter = &attempts;
        let outcome = self
            .retry_policy
            .execute(cancel, call.operation, move || {
                let attempt = counter.fetch_add(1, Ordering::Relaxed) + 1;
                this.attempt(call, shared, attempt, build)
            })
            .await;

        self.api_logger
            .complete_operation(&context, attempts.load(Ordering::Relaxed), outcome.is_ok());
        outcome
    }

    async fn attempt<F>(&self, call: &ApiCall, context: &OperationContext, attempt: u32, build: &F) -> Result<String, ApiError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let token = self.tokens.access_token().await.map_err(ApiError::Auth)?;

        let request = build(&self.http_client)
            .bearer_auth(token)
            .header("Accept", headers::CONTENT_TYPE_JSON)
            .header(headers::X_CORRELATION_ID, &context.correlation_id)
            .build()?;
        self.api_logger.log_request(context, attempt, &request);

        let sent_at = Instant::now();
        let response = match self.http_client.execute(request).await {
            Ok(response) => response,
            Err(error) => {
                self.api_logger.log_transport_failure(context, attempt, &error);
                return Err(ApiError::Transport(error));
            }
        };

        let status = response.status();
        self.api_logger
            .log_response(context, attempt, status.as_u16(), sent_at.elapsed());

        let body = response.text().await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(ApiError::from_status(status.as_u16(), call.resource, &call.id, &body))
        }
    }
}

fn decode<T: DeserializeOwned>(call: &ApiCall, body: &str) -> Result<T, ApiError> {
    let body = if body.trim().is_empty() { "{}" } else { body };
    serde_json::from_str(body).map_err(|source| ApiError::Decode {
        context: format!("{} response for {} {}", call.operation, call.resource, call.id),
        source,
    })
}
