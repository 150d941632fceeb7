//! Sheets API v4 gateway

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::client::{ApiCall, GoogleClient};
use super::constants;
use super::errors::ApiError;
use super::models::sheets::{
    BatchUpdateSpreadsheetRequest, BatchUpdateSpreadsheetResponse, Spreadsheet,
    UpdateValuesResponse, ValueRange,
};

#[async_trait]
pub trait SheetsApi: Send + Sync {
    /// `spreadsheets.create`. Never retried.
    async fn create(&self, cancel: &CancellationToken, spreadsheet: &Spreadsheet) -> Result<Spreadsheet, ApiError>;

    async fn get(&self, cancel: &CancellationToken, spreadsheet_id: &str) -> Result<Spreadsheet, ApiError>;

    async fn batch_update(
        &self,
        cancel: &CancellationToken,
        spreadsheet_id: &str,
        requests: Vec<Value>,
    ) -> Result<BatchUpdateSpreadsheetResponse, ApiError>;

    async fn values_get(&self, cancel: &CancellationToken, spreadsheet_id: &str, range: &str) -> Result<ValueRange, ApiError>;

    /// Overwrite `range`; values are parsed as if typed by a user
    async fn values_update(
        &self,
        cancel: &CancellationToken,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<Value>>,
    ) -> Result<UpdateValuesResponse, ApiError>;

    async fn values_clear(&self, cancel: &CancellationToken, spreadsheet_id: &str, range: &str) -> Result<(), ApiError>;
}

pub struct HttpSheetsApi {
    client: GoogleClient,
    base_url: String,
}

impl HttpSheetsApi {
    pub fn new(client: GoogleClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SheetsApi for HttpSheetsApi {
    async fn create(&self, cancel: &CancellationToken, spreadsheet: &Spreadsheet) -> Result<Spreadsheet, ApiError> {
        let url = constants::spreadsheets(&self.base_url);
        let call = ApiCall::new("spreadsheets.create", "spreadsheet", "(new)");
        self.client
            .send_once(cancel, &call, |http| http.post(&url).json(spreadsheet))
            .await
    }

    async fn get(&self, cancel: &CancellationToken, spreadsheet_id: &str) -> Result<Spreadsheet, ApiError> {
        let url = constants::spreadsheet(&self.base_url, spreadsheet_id);
        let call = ApiCall::new("spreadsheets.get", "spreadsheet", spreadsheet_id);
        self.client.send(cancel, &call, |http| http.get(&url)).await
    }

    async fn batch_update(
        &self,
        cancel: &CancellationToken,
        spreadsheet_id: &str,
        requests: Vec<Value>,
    ) -> Result<BatchUpdateSpreadsheetResponse, ApiError> {
        let body = BatchUpdateSpreadsheetRequest {
            requests,
            include_spreadsheet_in_response: false,
        };
        let url = constants::spreadsheet_batch_update(&self.base_url, spreadsheet_id);
        let call = ApiCall::new("spreadsheets.batchUpdate", "spreadsheet", spreadsheet_id);
        self.client
            .send(cancel, &call, |http| http.post(&url).json(&body))
            .await
    }

    async fn values_get(&self, cancel: &CancellationToken, spreadsheet_id: &str, range: &str) -> Result<ValueRange, ApiError> {
        let url = constants::spreadsheet_values(&self.base_url, spreadsheet_id, range);
        let call = ApiCall::new("spreadsheets.values.get", "range", format!("{}#{}", spreadsheet_id, range));
        self.client.send(cancel, &call, |http| http.get(&url)).await
    }

    async fn values_update(
        &self,
        cancel: &CancellationToken,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<Value>>,
    ) -> Result<UpdateValuesResponse, ApiError> {
        let body = ValueRange {
            range: Some(range.to_string()),
            major_dimension: Some("ROWS".to_string()),
            values,
        };
        let url = constants::spreadsheet_values(&self.base_url, spreadsheet_id, range);
        let call = ApiCall::new("spreadsheets.values.update", "range", format!("{}#{}", spreadsheet_id, range));
        self.client
            .send(cancel, &call, |http| {
                http.put(&url)
                    .query(&[("valueInputOption", "USER_ENTERED")])
                    .json(&body)
            })
            .await
    }

    async fn values_clear(&self, cancel: &CancellationToken, spreadsheet_id: &str, range: &str) -> Result<(), ApiError> {
        let url = format!(
            "{}:clear",
            constants::spreadsheet_values(&self.base_url, spreadsheet_id, range)
        );
        let call = ApiCall::new("spreadsheets.values.clear", "range", format!("{}#{}", spreadsheet_id, range));
        self.client
            .send_empty(cancel, &call, |http| http.post(&url).json(&serde_json::json!({})))
            .await
    }
}
