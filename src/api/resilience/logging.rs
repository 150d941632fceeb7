//! Per-call request logging
//!
//! A logical call keeps one correlation ID across all of its attempts. The ID
//! is sent as `X-Correlation-ID` and repeated on every line logged for the call.

use log::{debug, info, warn};
use reqwest::header::{AUTHORIZATION, HeaderMap};
use serde_json::{Map, Value, json};
use std::time::{Duration, Instant};

const REDACTED: &str = "[REDACTED]";

#[derive(Debug, Clone)]
pub struct ApiLogger {
    request_logging: bool,
}

/// One logical call, shared by its retries
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub correlation_id: String,
    /// e.g. `forms.batchUpdate`
    pub operation: &'static str,
    /// Form, file or spreadsheet ID the call targets
    pub resource_id: String,
    started: Instant,
}

impl OperationContext {
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn event(&self, event: &str, attempt: u32) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("event".to_string(), json!(event));
        fields.insert("correlation_id".to_string(), json!(self.correlation_id));
        fields.insert("operation".to_string(), json!(self.operation));
        fields.insert("resource_id".to_string(), json!(self.resource_id));
        fields.insert("attempt".to_string(), json!(attempt));
        fields.insert("timestamp".to_string(), json!(chrono::Utc::now().to_rfc3339()));
        fields
    }
}

impl ApiLogger {
    pub fn new(request_logging: bool) -> Self {
        Self { request_logging }
    }

    pub fn start_operation(&self, operation: &'static str, resource_id: &str) -> OperationContext {
        OperationContext {
            correlation_id: uuid::Uuid::new_v4().to_string(),
            operation,
            resource_id: resource_id.to_string(),
            started: Instant::now(),
        }
    }

    pub fn log_request(&self, context: &OperationContext, attempt: u32, request: &reqwest::Request) {
        if !self.request_logging {
            return;
        }
        let mut fields = context.event("http_request", attempt);
        fields.insert("method".to_string(), json!(request.method().as_str()));
        fields.insert("url".to_string(), json!(request.url().as_str()));
        fields.insert("headers".to_string(), Value::Object(redact_headers(request.headers())));
        debug!("HTTP request: {}", Value::Object(fields));
    }

    pub fn log_response(&self, context: &OperationContext, attempt: u32, status: u16, elapsed: Duration) {
        if !self.request_logging {
            return;
        }
        let mut fields = context.event("http_response", attempt);
        fields.insert("status".to_string(), json!(status));
        fields.insert("duration_ms".to_string(), json!(elapsed.as_millis() as u64));

        if status >= 400 {
            warn!("HTTP response: {}", Value::Object(fields));
        } else {
            debug!("HTTP response: {}", Value::Object(fields));
        }
    }

    /// No response arrived (connect error, timeout, reset)
    pub fn log_transport_failure(&self, context: &OperationContext, attempt: u32, error: &reqwest::Error) {
        warn!(
            "{} for {} attempt {} got no response [{}]: {}",
            context.operation, context.resource_id, attempt, context.correlation_id, error
        );
    }

    pub fn complete_operation(&self, context: &OperationContext, attempts: u32, success: bool) {
        let mut fields = context.event("operation_completed", attempts);
        fields.insert("duration_ms".to_string(), json!(context.elapsed().as_millis() as u64));
        fields.insert("success".to_string(), json!(success));

        if success {
            debug!("API call completed: {}", Value::Object(fields));
        } else {
            info!("API call failed: {}", Value::Object(fields));
        }
    }
}

impl Default for ApiLogger {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Header map for logging with credentials replaced
fn redact_headers(headers: &HeaderMap) -> Map<String, Value> {
    headers
        .iter()
        .map(|(name, value)| {
            let lower = name.as_str();
            let secret = *name == AUTHORIZATION || lower.contains("token") || lower.contains("api-key");
            let shown = if secret {
                REDACTED
            } else {
                value.to_str().unwrap_or("<binary>")
            };
            (lower.to_string(), json!(shown))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{CONTENT_TYPE, HeaderValue};

    #[test]
    fn test_each_call_gets_its_own_correlation_id() {
        let logger = ApiLogger::new(true);
        let first = logger.start_operation("forms.get", "form-123");
        let second = logger.start_operation("forms.get", "form-123");

        assert_eq!(first.operation, "forms.get");
        assert_eq!(first.resource_id, "form-123");
        assert_ne!(first.correlation_id, second.correlation_id);
    }

    #[test]
    fn test_event_fields_carry_attempt() {
        let logger = ApiLogger::new(false);
        let context = logger.start_operation("files.delete", "file-9");
        let fields = context.event("http_response", 3);

        assert_eq!(fields["attempt"], 3);
        assert_eq!(fields["correlation_id"], json!(context.correlation_id));
        assert_eq!(fields["resource_id"], "file-9");
    }

    #[test]
    fn test_credentials_are_redacted() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer ya29.secret"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-goog-api-key", HeaderValue::from_static("secret-key"));

        let redacted = redact_headers(&headers);

        assert_eq!(redacted["authorization"], REDACTED);
        assert_eq!(redacted["content-type"], "application/json");
        assert_eq!(redacted["x-goog-api-key"], REDACTED);
    }
}
