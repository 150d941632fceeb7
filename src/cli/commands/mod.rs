pub mod lifecycle;
pub mod validate;

use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::app::{Cli, Commands};
use crate::api::{DriveApi, FormsApi, GoogleClient, HttpDriveApi, HttpFormsApi};
use crate::auth::credentials;
use crate::config::Config;
use crate::form::FormReconciler;

/// Authenticated gateways for one invocation
pub struct Session {
    pub forms: Arc<dyn FormsApi>,
    pub drive: Arc<dyn DriveApi>,
    allow_missing_navigation: bool,
}

impl Session {
    pub fn connect(config: &Config) -> Result<Self> {
        let tokens = credentials::from_config(&config.credentials, reqwest::Client::new())?;
        let client = GoogleClient::new(tokens, config.retry.to_retry_config(), config.request_timeout())?
            .with_request_logging(config.behavior.request_logging);

        Ok(Self::from_gateways(
            Arc::new(HttpFormsApi::new(client.clone(), config.endpoints.forms.clone())),
            Arc::new(HttpDriveApi::new(client, config.endpoints.drive.clone())),
            config.behavior.allow_missing_navigation,
        ))
    }

    pub fn from_gateways(forms: Arc<dyn FormsApi>, drive: Arc<dyn DriveApi>, allow_missing_navigation: bool) -> Self {
        Self {
            forms,
            drive,
            allow_missing_navigation,
        }
    }

    pub fn reconciler(&self) -> FormReconciler {
        FormReconciler::new(self.forms.clone(), self.drive.clone())
            .with_allow_missing_navigation(self.allow_missing_navigation)
    }

    pub fn allow_missing_navigation(mut self, allow: bool) -> Self {
        self.allow_missing_navigation |= allow;
        self
    }
}

pub async fn run(cli: Cli, config: Config, cancel: CancellationToken) -> Result<()> {
    match cli.command {
        Commands::Validate { form } => validate::validate_command(&form),
        Commands::Plan { form, state } => {
            let session = Session::connect(&config)?;
            lifecycle::plan_command(&session, &cancel, &form, &state.state).await
        }
        Commands::Apply {
            form,
            state,
            allow_missing_navigation,
        } => {
            let session = Session::connect(&config)?.allow_missing_navigation(allow_missing_navigation);
            lifecycle::apply_command(&session, &cancel, &form, &state.state).await
        }
        Commands::Refresh { state } => {
            let session = Session::connect(&config)?;
            lifecycle::refresh_command(&session, &cancel, &state.state).await
        }
        Commands::Import { form_id, state } => {
            let session = Session::connect(&config)?;
            lifecycle::import_command(&session, &cancel, &form_id, &state.state).await
        }
        Commands::Destroy { state } => {
            let session = Session::connect(&config)?;
            lifecycle::destroy_command(&session, &cancel, &state.state).await
        }
        Commands::BatchUpdate {
            form_id,
            requests,
            required_revision_id,
        } => {
            let session = Session::connect(&config)?;
            lifecycle::batch_update_command(&session, &cancel, &form_id, &requests, required_revision_id.as_deref())
                .await
        }
    }
}
