//! Form lifecycle: Create, Read, Update, Delete, Import
//!
//! Remote failures never escape as `Err`. Each call returns the state the
//! host should persist together with diagnostics. Once a form exists
//! remotely every failure path still returns a state carrying its ID, so a
//! later apply can converge it or a destroy can remove it.

use log::{debug, error, info, warn};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::content_json;
use super::identity::IdentityMap;
use super::model::FormModel;
use super::navigation::NavigationResolver;
use super::plan::ReconciliationPlan;
use super::translate;
use super::validate::{self, SUMMARY as INVALID_CONFIGURATION};
use crate::api::constants;
use crate::api::models::forms::{BatchUpdateFormRequest, BatchUpdateFormResponse, Form, Request, WriteControl};
use crate::api::{DriveApi, FormsApi};
use crate::diagnostics::Diagnostics;
use crate::import_id::ImportId;

/// Receives the partial state written right after a form is created
pub trait StateSink: Send + Sync {
    fn checkpoint(&self, state: &FormModel) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LifecycleResponse {
    /// `None` removes the resource from state
    pub state: Option<FormModel>,
    pub diagnostics: Diagnostics,
}

impl LifecycleResponse {
    fn removed() -> Self {
        Self::default()
    }

    fn failed(state: Option<FormModel>, diagnostics: Diagnostics) -> Self {
        Self { state, diagnostics }
    }

    pub fn has_error(&self) -> bool {
        self.diagnostics.has_error()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBatchResponse {
    pub revision_id: Option<String>,
    pub reply_count: usize,
    pub diagnostics: Diagnostics,
}

/// State and diagnostics accumulated after the form exists remotely
struct Progress {
    summary: &'static str,
    prefix: String,
    state: FormModel,
    diagnostics: Diagnostics,
}

impl Progress {
    fn fail(mut self, step: &str, err: impl fmt::Display) -> LifecycleResponse {
        let detail = format!("{} but {} failed: {}", self.prefix, step, err);
        error!("{}", detail);
        self.diagnostics.add_error(self.summary, detail);
        LifecycleResponse::failed(Some(self.state), self.diagnostics)
    }
}

/// What remains after the structural batch has been applied
struct Followup<'a> {
    form_id: &'a str,
    plan: &'a FormModel,
    batch: &'a ReconciliationPlan,
    identity: Option<IdentityMap>,
    publish: bool,
    move_to: Option<&'a str>,
}

pub struct FormReconciler {
    forms: Arc<dyn FormsApi>,
    drive: Arc<dyn DriveApi>,
    allow_missing_navigation: bool,
    sink: Option<Arc<dyn StateSink>>,
}

impl FormReconciler {
    pub fn new(forms: Arc<dyn FormsApi>, drive: Arc<dyn DriveApi>) -> Self {
        Self {
            forms,
            drive,
            allow_missing_navigation: false,
            sink: None,
        }
    }

    /// Skip navigation targets that cannot be resolved instead of failing
    pub fn with_allow_missing_navigation(mut self, allow: bool) -> Self {
        self.allow_missing_navigation = allow;
        self
    }

    pub fn with_state_sink(mut self, sink: Arc<dyn StateSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn validate(&self, config: &FormModel) -> Diagnostics {
        validate::validate(config)
    }

    /// Plan modifiers, run after validation.
    ///
    /// Computed attributes keep their stored values, items keep their Google
    /// IDs by key, and a `content_json` that is semantically the stored one
    /// is replaced by the stored text.
    pub fn modify_plan(&self, plan: &mut FormModel, state: Option<&FormModel>) {
        let Some(state) = state else {
            return;
        };

        plan.id = plan.id.take().or_else(|| state.id.clone());
        plan.responder_uri = plan.responder_uri.take().or_else(|| state.responder_uri.clone());
        plan.edit_uri = plan.edit_uri.take().or_else(|| state.edit_uri.clone());
        plan.document_title = plan.document_title.take().or_else(|| state.document_title.clone());
        plan.revision_id = plan.revision_id.take().or_else(|| state.revision_id.clone());
        plan.linked_sheet_id = plan.linked_sheet_id.take().or_else(|| state.linked_sheet_id.clone());
        if plan.parent_ids.is_empty() && (plan.folder_id.is_none() || plan.folder_id == state.folder_id) {
            plan.parent_ids = state.parent_ids.clone();
        }

        for item in &mut plan.items {
            if item.google_item_id.is_none() {
                item.google_item_id = state.item(&item.item_key).and_then(|s| s.google_item_id.clone());
            }
        }

        if content_json::suppress_equivalent_diff(plan, state) {
            debug!("content_json is semantically unchanged; keeping stored text");
        }
    }

    pub async fn create(&self, cancel: &CancellationToken, plan: &FormModel) -> LifecycleResponse {
        let mut diagnostics = validate::validate(plan);
        if diagnostics.has_error() {
            return LifecycleResponse::failed(None, diagnostics);
        }
        let batch = match ReconciliationPlan::for_create(plan) {
            Ok(batch) => batch,
            Err(err) => {
                diagnostics.add_attribute_error("content_json", INVALID_CONFIGURATION, err.to_string());
                return LifecycleResponse::failed(None, diagnostics);
            }
        };

        let created = match self.forms.create(cancel, &translate::new_form(&plan.title)).await {
            Ok(form) => form,
            Err(err) => {
                diagnostics.add_error("Error creating form", format!("forms.create failed: {}", err));
                return LifecycleResponse::failed(None, diagnostics);
            }
        };
        let Some(form_id) = created.form_id.clone().filter(|id| !id.is_empty()) else {
            diagnostics.add_error("Error creating form", "forms.create returned no form ID");
            return LifecycleResponse::failed(None, diagnostics);
        };
        info!("Created form {}", form_id);

        // The form exists remotely and must be tracked from here on
        let mut partial = plan.clone();
        partial.id = Some(form_id.clone());
        partial.edit_uri = Some(constants::edit_uri(&form_id));
        partial.responder_uri = created.responder_uri.clone();
        self.checkpoint(&partial, &mut diagnostics);

        let mut progress = Progress {
            summary: "Error creating form",
            prefix: format!("form was created (ID: {})", form_id),
            state: partial,
            diagnostics,
        };

        let reply = match self.forms.batch_update(cancel, &form_id, batch.batch()).await {
            Ok(reply) => reply,
            Err(err) => return progress.fail("batchUpdate", err),
        };
        info!("Applied {} requests to form {}", batch.requests.len(), form_id);

        let identity = correlate(&batch, &reply);
        if let Some(form) = &reply.form {
            progress.state = interim_state(form, identity.as_ref(), &batch, plan);
        }

        self.follow_up(
            cancel,
            Followup {
                form_id: &form_id,
                plan,
                batch: &batch,
                identity,
                publish: plan.published || plan.accepting_responses,
                move_to: plan.folder_id.as_deref(),
            },
            progress,
        )
        .await
    }

    pub async fn read(&self, cancel: &CancellationToken, state: &FormModel) -> LifecycleResponse {
        let mut diagnostics = Diagnostics::new();
        let Some(form_id) = state.id.as_deref() else {
            diagnostics.add_error("Error reading form", "state has no form ID");
            return LifecycleResponse::failed(Some(state.clone()), diagnostics);
        };

        let form = match self.forms.get(cancel, form_id).await {
            Ok(form) => form,
            Err(err) if err.is_not_found() => {
                info!("Form {} no longer exists; removing it from state", form_id);
                return LifecycleResponse::removed();
            }
            Err(err) => {
                diagnostics.add_error("Error reading form", format!("forms.get for form {} failed: {}", form_id, err));
                return LifecycleResponse::failed(Some(state.clone()), diagnostics);
            }
        };

        let identity = IdentityMap::from_state(state);
        debug!("Refreshing form {} with {} known item IDs", form_id, identity.len());
        let mut refreshed = translate::form_to_state(&form, &identity, Some(state));

        match self.drive.get_parents(cancel, form_id).await {
            Ok(parents) => {
                if let Some(folder) = &state.folder_id {
                    if !parents.contains(folder) {
                        refreshed.folder_id = parents.first().cloned();
                    }
                }
                refreshed.parent_ids = parents;
            }
            Err(err) => parents_warning(&mut diagnostics, form_id, err),
        }

        LifecycleResponse {
            state: Some(refreshed),
            diagnostics,
        }
    }

    /// Replace-all update: every existing item is deleted and the desired
    /// set recreated in one batch.
    pub async fn update(&self, cancel: &CancellationToken, plan: &FormModel, state: &FormModel) -> LifecycleResponse {
        let mut diagnostics = validate::validate(plan);
        if diagnostics.has_error() {
            return LifecycleResponse::failed(Some(state.clone()), diagnostics);
        }
        let Some(form_id) = state.id.clone().or_else(|| plan.id.clone()) else {
            diagnostics.add_error("Error updating form", "state has no form ID");
            return LifecycleResponse::failed(Some(state.clone()), diagnostics);
        };

        let current = match self.forms.get(cancel, &form_id).await {
            Ok(form) => form,
            Err(err) => {
                diagnostics.add_error("Error updating form", format!("forms.get for form {} failed: {}", form_id, err));
                return LifecycleResponse::failed(Some(state.clone()), diagnostics);
            }
        };

        let batch = match ReconciliationPlan::for_update(plan, &current) {
            Ok(batch) => batch,
            Err(err) => {
                diagnostics.add_attribute_error("content_json", INVALID_CONFIGURATION, err.to_string());
                return LifecycleResponse::failed(Some(state.clone()), diagnostics);
            }
        };
        debug!(
            "Update of form {}: deleting {} items, creating {}",
            form_id,
            current.items.len(),
            batch.create_count()
        );

        let reply = match self.forms.batch_update(cancel, &form_id, batch.batch()).await {
            Ok(reply) => reply,
            Err(err) => {
                diagnostics.add_error("Error updating form", format!("batchUpdate for form {} failed: {}", form_id, err));
                return LifecycleResponse::failed(Some(state.clone()), diagnostics);
            }
        };
        info!("Applied {} requests to form {}", batch.requests.len(), form_id);

        let identity = correlate(&batch, &reply);
        let interim = match &reply.form {
            Some(form) => interim_state(form, identity.as_ref(), &batch, plan),
            None => FormModel {
                id: Some(form_id.clone()),
                ..plan.clone()
            },
        };

        let (current_published, current_accepting) = current
            .publish_settings
            .as_ref()
            .and_then(|p| p.publish_state.as_ref())
            .map(|p| (p.is_published, p.is_accepting_responses))
            .unwrap_or((state.published, state.accepting_responses));
        let publish = plan.published != current_published || plan.accepting_responses != current_accepting;
        let move_to = plan.folder_id.as_deref().filter(|folder| state.folder_id.as_deref() != Some(*folder));

        let progress = Progress {
            summary: "Error updating form",
            prefix: format!("form {} was updated", form_id),
            state: interim,
            diagnostics,
        };

        self.follow_up(
            cancel,
            Followup {
                form_id: &form_id,
                plan,
                batch: &batch,
                identity,
                publish,
                move_to,
            },
            progress,
        )
        .await
    }

    /// Delete the backing Drive file. An already-missing file counts as deleted.
    pub async fn delete(&self, cancel: &CancellationToken, state: &FormModel) -> LifecycleResponse {
        let Some(form_id) = state.id.as_deref() else {
            return LifecycleResponse::removed();
        };

        match self.drive.delete(cancel, form_id).await {
            Ok(()) => {
                info!("Deleted form {}", form_id);
                LifecycleResponse::removed()
            }
            Err(err) => {
                let mut diagnostics = Diagnostics::new();
                diagnostics.add_error("Error deleting form", format!("files.delete for form {} failed: {}", form_id, err));
                LifecycleResponse::failed(Some(state.clone()), diagnostics)
            }
        }
    }

    /// Only the ID is recorded; the next read fills in the rest with
    /// synthesized `item_N` keys.
    pub fn import(&self, import_id: &str) -> LifecycleResponse {
        let mut diagnostics = Diagnostics::new();
        let parsed = match ImportId::parse(import_id) {
            Ok(parsed) => parsed,
            Err(err) => {
                diagnostics.add_error("Invalid Import ID", err.to_string());
                return LifecycleResponse::failed(None, diagnostics);
            }
        };
        let Some(form_id) = parsed.as_bare() else {
            diagnostics.add_error(
                "Invalid Import ID",
                format!("forms are imported by bare form ID, got {:?}", import_id),
            );
            return LifecycleResponse::failed(None, diagnostics);
        };

        LifecycleResponse {
            state: Some(FormModel {
                id: Some(form_id.to_string()),
                ..Default::default()
            }),
            diagnostics,
        }
    }

    /// Submit arbitrary Forms requests, optionally gated on a revision
    pub async fn raw_batch_update(
        &self,
        cancel: &CancellationToken,
        form_id: &str,
        requests_json: &str,
        required_revision_id: Option<&str>,
    ) -> RawBatchResponse {
        let mut response = RawBatchResponse::default();

        let requests: Vec<serde_json::Value> = match serde_json::from_str(requests_json) {
            Ok(requests) => requests,
            Err(err) => {
                response.diagnostics.add_attribute_error(
                    "requests_json",
                    INVALID_CONFIGURATION,
                    format!("requests_json must be a JSON array of Forms requests: {}", err),
                );
                return response;
            }
        };

        let mut batch = BatchUpdateFormRequest::new(requests.into_iter().map(Request::Raw).collect());
        batch.write_control = required_revision_id.map(|revision| WriteControl {
            required_revision_id: Some(revision.to_string()),
            target_revision_id: None,
        });

        match self.forms.batch_update(cancel, form_id, batch).await {
            Ok(reply) => {
                response.reply_count = reply.replies.len();
                response.revision_id = reply
                    .write_control
                    .as_ref()
                    .and_then(|w| w.required_revision_id.clone())
                    .or_else(|| reply.form.as_ref().and_then(|f| f.revision_id.clone()));
            }
            Err(err) => response.diagnostics.add_error(
                "Error applying batch update",
                format!("batchUpdate for form {} failed: {}", form_id, err),
            ),
        }
        response
    }

    fn checkpoint(&self, state: &FormModel, diagnostics: &mut Diagnostics) {
        let Some(sink) = &self.sink else {
            return;
        };
        if let Err(err) = sink.checkpoint(state) {
            warn!("Failed to checkpoint state: {:#}", err);
            diagnostics.add_warning("Unable to checkpoint state", format!("{:#}", err));
        }
    }

    /// Publish, folder placement, navigation and the final read
    async fn follow_up(&self, cancel: &CancellationToken, next: Followup<'_>, mut progress: Progress) -> LifecycleResponse {
        let Followup {
            form_id,
            plan,
            batch,
            mut identity,
            publish,
            move_to,
        } = next;

        if publish {
            if let Err(err) = self
                .forms
                .set_publish_settings(cancel, form_id, plan.published, plan.accepting_responses)
                .await
            {
                return progress.fail("setPublishSettings", err);
            }
            info!(
                "Form {} published={} accepting_responses={}",
                form_id, plan.published, plan.accepting_responses
            );
        }

        let mut parent_ids = None;
        if let Some(folder) = move_to {
            match self.drive.move_to_folder(cancel, form_id, folder).await {
                Ok(parents) => parent_ids = Some(parents),
                Err(err) => return progress.fail(&format!("moving it to folder {}", folder), err),
            }
        }

        if !batch.pending_navigation.is_empty() {
            let form = match self.forms.get(cancel, form_id).await {
                Ok(form) => form,
                Err(err) => return progress.fail("reading it back for navigation", err),
            };
            let known = identity.get_or_insert_with(|| positional(&form, batch));

            let resolver = NavigationResolver::new(&form, known, self.allow_missing_navigation);
            let pass = match resolver.resolve(&plan.items, &batch.pending_navigation) {
                Ok(pass) => pass,
                Err(err) => return progress.fail("resolving navigation", err),
            };
            for skipped in &pass.skipped {
                progress
                    .diagnostics
                    .add_warning("Navigation target skipped", skipped.to_string());
            }
            if let Some(second) = pass.batch() {
                if let Err(err) = self.forms.batch_update(cancel, form_id, second).await {
                    return progress.fail("navigation batchUpdate", err);
                }
                info!("Applied navigation to {} items of form {}", pass.requests.len(), form_id);
            }
        }

        let form = match self.forms.get(cancel, form_id).await {
            Ok(form) => form,
            Err(err) => return progress.fail("reading it back", err),
        };
        let identity = identity.unwrap_or_else(|| positional(&form, batch));
        let mut state = translate::form_to_state(&form, &identity, Some(plan));

        state.parent_ids = match parent_ids {
            Some(parents) => parents,
            None => match self.drive.get_parents(cancel, form_id).await {
                Ok(parents) => parents,
                Err(err) => {
                    parents_warning(&mut progress.diagnostics, form_id, err);
                    Vec::new()
                }
            },
        };

        LifecycleResponse {
            state: Some(state),
            diagnostics: progress.diagnostics,
        }
    }
}

/// Reply correlation when possible; `None` leaves it to positional fallback
fn correlate(batch: &ReconciliationPlan, reply: &BatchUpdateFormResponse) -> Option<IdentityMap> {
    if batch.create_index.is_empty() {
        return Some(IdentityMap::new());
    }
    match IdentityMap::from_create_replies(&batch.create_index, &reply.replies) {
        Some(map) => {
            debug!("Correlated {} items from createItem replies", map.len());
            Some(map)
        }
        None => {
            warn!("createItem replies could not be correlated; falling back to item positions");
            None
        }
    }
}

fn positional(form: &Form, batch: &ReconciliationPlan) -> IdentityMap {
    debug!("Correlating {} items by position", form.items.len());
    IdentityMap::positional(&form.items, batch.create_index.keys())
}

fn interim_state(form: &Form, identity: Option<&IdentityMap>, batch: &ReconciliationPlan, plan: &FormModel) -> FormModel {
    match identity {
        Some(identity) => translate::form_to_state(form, identity, Some(plan)),
        None => translate::form_to_state(form, &positional(form, batch), Some(plan)),
    }
}

fn parents_warning(diagnostics: &mut Diagnostics, form_id: &str, err: impl fmt::Display) {
    warn!("Unable to read parent folders of form {}: {}", form_id, err);
    diagnostics.add_warning(
        "Unable to read parent folders",
        format!("files.get for form {} failed: {}", form_id, err),
    );
}
