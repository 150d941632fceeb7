//! Forms API v1 gateway

use async_trait::async_trait;
use log::debug;
use tokio_util::sync::CancellationToken;

use super::client::{ApiCall, GoogleClient};
use super::constants::{self, masks};
use super::errors::ApiError;
use super::models::forms::{
    BatchUpdateFormRequest, BatchUpdateFormResponse, Form, PublishSettings, PublishState,
    SetPublishSettingsRequest,
};

/// Capability interface over `forms.*`
#[async_trait]
pub trait FormsApi: Send + Sync {
    /// `forms.create`. Never retried.
    async fn create(&self, cancel: &CancellationToken, form: &Form) -> Result<Form, ApiError>;

    async fn get(&self, cancel: &CancellationToken, form_id: &str) -> Result<Form, ApiError>;

    /// `forms.batchUpdate`; the reply always carries the post-update form
    async fn batch_update(
        &self,
        cancel: &CancellationToken,
        form_id: &str,
        batch: BatchUpdateFormRequest,
    ) -> Result<BatchUpdateFormResponse, ApiError>;

    async fn set_publish_settings(
        &self,
        cancel: &CancellationToken,
        form_id: &str,
        published: bool,
        accepting_responses: bool,
    ) -> Result<(), ApiError>;
}

pub struct HttpFormsApi {
    client: GoogleClient,
    base_url: String,
}

impl HttpFormsApi {
    pub fn new(client: GoogleClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl FormsApi for HttpFormsApi {
    async fn create(&self, cancel: &CancellationToken, form: &Form) -> Result<Form, ApiError> {
        let url = constants::forms_collection(&self.base_url);
        let call = ApiCall::new("forms.create", "form", "(new)");
        self.client
            .send_once(cancel, &call, |http| http.post(&url).json(form))
            .await
    }

    async fn get(&self, cancel: &CancellationToken, form_id: &str) -> Result<Form, ApiError> {
        let url = constants::form_endpoint(&self.base_url, form_id);
        let call = ApiCall::new("forms.get", "form", form_id);
        self.client.send(cancel, &call, |http| http.get(&url)).await
    }

    async fn batch_update(
        &self,
        cancel: &CancellationToken,
        form_id: &str,
        mut batch: BatchUpdateFormRequest,
    ) -> Result<BatchUpdateFormResponse, ApiError> {
        batch.include_form_in_response = true;
        debug!(
            "Submitting batchUpdate for form {} with {} requests",
            form_id,
            batch.requests.len()
        );

        let url = constants::form_batch_update_endpoint(&self.base_url, form_id);
        let call = ApiCall::new("forms.batchUpdate", "form", form_id);
        self.client
            .send(cancel, &call, |http| http.post(&url).json(&batch))
            .await
    }

    async fn set_publish_settings(
        &self,
        cancel: &CancellationToken,
        form_id: &str,
        published: bool,
        accepting_responses: bool,
    ) -> Result<(), ApiError> {
        let body = SetPublishSettingsRequest {
            publish_settings: PublishSettings {
                publish_state: Some(PublishState {
                    is_published: published,
                    is_accepting_responses: accepting_responses,
                }),
            },
            update_mask: masks::PUBLISH_STATE.to_string(),
        };

        let url = constants::form_publish_settings_endpoint(&self.base_url, form_id);
        let call = ApiCall::new("forms.setPublishSettings", "form", form_id);
        self.client
            .send_empty(cancel, &call, |http| http.post(&url).json(&body))
            .await
    }
}
