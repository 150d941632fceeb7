//! In-memory Forms and Drive backends for reconciler tests
//!
//! Batches are interpreted from their wire JSON with index-sensitive
//! semantics and applied atomically. The server assigns fresh item IDs and
//! refuses to turn quiz mode off while graded questions remain, or to accept
//! graded questions on a form that is not a quiz.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use gforms_provider::api::models::drive::{DriveFile, Permission};
use gforms_provider::api::models::forms::{
    BatchUpdateFormRequest, BatchUpdateFormResponse, CreateItemResponse, Form, FormSettings, Item,
    PublishSettings, PublishState, QuizSettings, Response, WriteControl,
};
use gforms_provider::api::{ApiError, DriveApi, FormsApi};
use gforms_provider::form::{FormReconciler, FormModel, StateSink};

const ROOT_FOLDER: &str = "root";

#[derive(Default)]
struct FakeState {
    forms: HashMap<String, Form>,
    parents: HashMap<String, Vec<String>>,
    next_id: usize,
    calls: Vec<String>,
    batches: Vec<Value>,
    /// operation, calls to let through first, status
    failures: Vec<(String, usize, u16)>,
    withhold_create_replies: bool,
    reorder_items: bool,
    omit_reflection: bool,
}

impl FakeState {
    fn fresh(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn record(&mut self, operation: &str) -> Result<(), ApiError> {
        self.calls.push(operation.to_string());
        let Some(index) = self.failures.iter().position(|(op, _, _)| op == operation) else {
            return Ok(());
        };
        if self.failures[index].1 > 0 {
            self.failures[index].1 -= 1;
            return Ok(());
        }
        let (_, _, status) = self.failures.remove(index);
        Err(ApiError::from_status(status, "form", "(injected)", "injected failure"))
    }
}

#[derive(Clone, Default)]
pub struct FakeGoogle {
    state: Arc<Mutex<FakeState>>,
}

fn rejected(message: impl Into<String>) -> ApiError {
    ApiError::Api {
        status: 400,
        message: message.into(),
        cause: None,
    }
}

fn is_graded(item: &Item) -> bool {
    item.question_item
        .as_ref()
        .map(|q| q.question.grading.is_some())
        .unwrap_or(false)
}

fn check_navigation(form: &Form, item: &Item) -> Result<(), String> {
    let Some(choice) = item
        .question_item
        .as_ref()
        .and_then(|q| q.question.choice_question.as_ref())
    else {
        return Ok(());
    };
    for option in &choice.options {
        if let Some(target) = &option.go_to_section_id {
            let exists = form
                .items
                .iter()
                .any(|i| i.page_break_item.is_some() && i.item_id.as_deref() == Some(target.as_str()));
            if !exists {
                return Err(format!("goToSectionId {} is not a section of this form", target));
            }
        }
    }
    Ok(())
}

fn index_of(request: &Value) -> Result<usize, String> {
    request["location"]["index"]
        .as_u64()
        .map(|i| i as usize)
        .ok_or_else(|| "location.index is required".to_string())
}

fn is_quiz(form: &Form) -> bool {
    form.settings
        .as_ref()
        .and_then(|s| s.quiz_settings.as_ref())
        .map(|q| q.is_quiz)
        .unwrap_or(false)
}

impl FakeGoogle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reconciler(&self) -> FormReconciler {
        let shared = Arc::new(self.clone());
        FormReconciler::new(shared.clone(), shared)
    }

    /// Fail the next call of `operation` (e.g. `forms.batchUpdate`) with `status`
    pub fn fail_next(&self, operation: &str, status: u16) {
        self.fail_after(operation, 0, status);
    }

    /// Let `skip` calls of `operation` succeed, then fail one with `status`
    pub fn fail_after(&self, operation: &str, skip: usize, status: u16) {
        self.state
            .lock()
            .unwrap()
            .failures
            .push((operation.to_string(), skip, status));
    }

    /// Reply to batches without createItem payloads
    pub fn withhold_create_replies(&self) {
        self.state.lock().unwrap().withhold_create_replies = true;
    }

    /// Store items in reverse after each batch, so the reflected form and
    /// later reads list them in a different order than they were created
    pub fn reorder_reflected_items(&self) {
        self.state.lock().unwrap().reorder_items = true;
    }

    /// Reply to batches without the form, whatever the request asked for
    pub fn omit_reflected_form(&self) {
        self.state.lock().unwrap().omit_reflection = true;
    }

    pub fn form(&self, form_id: &str) -> Option<Form> {
        self.state.lock().unwrap().forms.get(form_id).cloned()
    }

    pub fn form_count(&self) -> usize {
        self.state.lock().unwrap().forms.len()
    }

    pub fn parents(&self, form_id: &str) -> Vec<String> {
        self.state.lock().unwrap().parents.get(form_id).cloned().unwrap_or_default()
    }

    /// Delete the form behind the reconciler's back
    pub fn remove_out_of_band(&self, form_id: &str) {
        let mut state = self.state.lock().unwrap();
        state.forms.remove(form_id);
        state.parents.remove(form_id);
    }

    /// Mutate the stored form behind the reconciler's back
    pub fn edit_out_of_band(&self, form_id: &str, edit: impl FnOnce(&mut Form)) {
        let mut state = self.state.lock().unwrap();
        if let Some(form) = state.forms.get_mut(form_id) {
            edit(form);
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == operation).count()
    }

    /// Wire JSON of every batch received, in order
    pub fn batches(&self) -> Vec<Value> {
        self.state.lock().unwrap().batches.clone()
    }

    fn apply(form: &mut Form, request: &Value, state: &mut FakeState) -> Result<Response, String> {
        let (kind, body) = request
            .as_object()
            .and_then(|o| o.iter().next())
            .ok_or_else(|| "empty request".to_string())?;

        match kind.as_str() {
            "updateFormInfo" => {
                let mask = body["updateMask"].as_str().unwrap_or_default();
                for field in mask.split(',') {
                    let value = body["info"][field].as_str().map(str::to_string);
                    match field {
                        "title" => form.info.title = value,
                        "description" => form.info.description = value,
                        other => return Err(format!("unsupported info mask {}", other)),
                    }
                }
            }
            "updateSettings" => {
                let settings = form.settings.get_or_insert_with(FormSettings::default);
                match body["updateMask"].as_str().unwrap_or_default() {
                    "quizSettings.isQuiz" => {
                        let wanted = body["settings"]["quizSettings"]["isQuiz"].as_bool().unwrap_or(false);
                        if !wanted && form.items.iter().any(is_graded) {
                            return Err("quiz mode cannot be disabled while graded questions remain".to_string());
                        }
                        settings.quiz_settings = Some(QuizSettings { is_quiz: wanted });
                    }
                    "emailCollectionType" => {
                        settings.email_collection_type =
                            body["settings"]["emailCollectionType"].as_str().map(str::to_string);
                    }
                    other => return Err(format!("unsupported settings mask {}", other)),
                }
            }
            "deleteItem" => {
                let index = index_of(body)?;
                if index >= form.items.len() {
                    return Err(format!("deleteItem index {} out of range ({} items)", index, form.items.len()));
                }
                form.items.remove(index);
            }
            "createItem" => {
                let index = index_of(body)?;
                if index > form.items.len() {
                    return Err(format!("createItem index {} out of range ({} items)", index, form.items.len()));
                }
                let mut item: Item = serde_json::from_value(body["item"].clone()).map_err(|e| e.to_string())?;
                if is_graded(&item) && !is_quiz(form) {
                    return Err("grading requires a quiz".to_string());
                }
                check_navigation(form, &item)?;

                let item_id = state.fresh("item");
                item.item_id = Some(item_id.clone());
                let mut question_id = Vec::new();
                if let Some(question) = item.question_item.as_mut() {
                    let id = state.fresh("question");
                    question.question.question_id = Some(id.clone());
                    question_id.push(id);
                }
                form.items.insert(index, item);

                if !state.withhold_create_replies {
                    return Ok(Response {
                        create_item: Some(CreateItemResponse { item_id, question_id }),
                    });
                }
            }
            "updateItem" => {
                let index = index_of(body)?;
                if index >= form.items.len() {
                    return Err(format!("updateItem index {} out of range", index));
                }
                if body["updateMask"].as_str() != Some("*") {
                    return Err("only the * mask is supported".to_string());
                }
                let mut item: Item = serde_json::from_value(body["item"].clone()).map_err(|e| e.to_string())?;
                check_navigation(form, &item)?;
                item.item_id = form.items[index].item_id.clone();
                form.items[index] = item;
            }
            other => return Err(format!("unsupported request {}", other)),
        }
        Ok(Response::default())
    }
}

#[async_trait]
impl FormsApi for FakeGoogle {
    async fn create(&self, _cancel: &CancellationToken, form: &Form) -> Result<Form, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.record("forms.create")?;

        let form_id = state.fresh("form");
        let created = Form {
            form_id: Some(form_id.clone()),
            info: gforms_provider::api::models::forms::Info {
                title: form.info.title.clone(),
                description: None,
                document_title: form.info.title.clone(),
            },
            revision_id: Some(state.fresh("rev")),
            responder_uri: Some(format!("https://docs.google.com/forms/d/e/{}/viewform", form_id)),
            ..Default::default()
        };
        state.forms.insert(form_id.clone(), created.clone());
        state.parents.insert(form_id, vec![ROOT_FOLDER.to_string()]);
        Ok(created)
    }

    async fn get(&self, _cancel: &CancellationToken, form_id: &str) -> Result<Form, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.record("forms.get")?;
        state.forms.get(form_id).cloned().ok_or_else(|| ApiError::NotFound {
            resource: "form".to_string(),
            id: form_id.to_string(),
        })
    }

    async fn batch_update(
        &self,
        _cancel: &CancellationToken,
        form_id: &str,
        batch: BatchUpdateFormRequest,
    ) -> Result<BatchUpdateFormResponse, ApiError> {
        let mut state = self.state.lock().unwrap();
        let wire = serde_json::to_value(&batch).map_err(|e| rejected(e.to_string()))?;
        state.batches.push(wire.clone());
        state.record("forms.batchUpdate")?;

        let Some(current) = state.forms.get(form_id).cloned() else {
            return Err(ApiError::NotFound {
                resource: "form".to_string(),
                id: form_id.to_string(),
            });
        };
        if let Some(required) = wire["writeControl"]["requiredRevisionId"].as_str() {
            if current.revision_id.as_deref() != Some(required) {
                return Err(rejected(format!("revision {} is stale", required)));
            }
        }

        let mut working = current;
        let mut replies = Vec::new();
        for (position, request) in wire["requests"].as_array().cloned().unwrap_or_default().iter().enumerate() {
            let reply = Self::apply(&mut working, request, &mut state)
                .map_err(|message| rejected(format!("requests[{}]: {}", position, message)))?;
            replies.push(reply);
        }
        let revision = state.fresh("rev");
        working.revision_id = Some(revision.clone());
        if state.reorder_items {
            working.items.reverse();
        }
        state.forms.insert(form_id.to_string(), working.clone());

        Ok(BatchUpdateFormResponse {
            form: (batch.include_form_in_response && !state.omit_reflection).then_some(working),
            replies,
            write_control: Some(WriteControl {
                required_revision_id: Some(revision),
                target_revision_id: None,
            }),
        })
    }

    async fn set_publish_settings(
        &self,
        _cancel: &CancellationToken,
        form_id: &str,
        published: bool,
        accepting_responses: bool,
    ) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.record("forms.setPublishSettings")?;
        let form = state.forms.get_mut(form_id).ok_or_else(|| ApiError::NotFound {
            resource: "form".to_string(),
            id: form_id.to_string(),
        })?;
        form.publish_settings = Some(PublishSettings {
            publish_state: Some(PublishState {
                is_published: published,
                is_accepting_responses: accepting_responses,
            }),
        });
        Ok(())
    }
}

#[async_trait]
impl DriveApi for FakeGoogle {
    async fn delete(&self, _cancel: &CancellationToken, file_id: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.record("files.delete")?;
        state.forms.remove(file_id);
        state.parents.remove(file_id);
        Ok(())
    }

    async fn get(&self, _cancel: &CancellationToken, file_id: &str) -> Result<DriveFile, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.record("files.get")?;
        let form = state.forms.get(file_id).ok_or_else(|| ApiError::NotFound {
            resource: "file".to_string(),
            id: file_id.to_string(),
        })?;
        Ok(DriveFile {
            id: Some(file_id.to_string()),
            name: form.info.document_title.clone(),
            parents: state.parents.get(file_id).cloned().unwrap_or_default(),
            ..Default::default()
        })
    }

    async fn update(&self, _cancel: &CancellationToken, file_id: &str, metadata: &DriveFile) -> Result<DriveFile, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.record("files.update")?;
        let form = state.forms.get_mut(file_id).ok_or_else(|| ApiError::NotFound {
            resource: "file".to_string(),
            id: file_id.to_string(),
        })?;
        if let Some(name) = &metadata.name {
            form.info.document_title = Some(name.clone());
        }
        Ok(DriveFile {
            id: Some(file_id.to_string()),
            name: metadata.name.clone(),
            ..Default::default()
        })
    }

    async fn move_to_folder(&self, _cancel: &CancellationToken, file_id: &str, folder_id: &str) -> Result<Vec<String>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.record("files.move")?;
        if !state.forms.contains_key(file_id) {
            return Err(ApiError::NotFound {
                resource: "file".to_string(),
                id: file_id.to_string(),
            });
        }
        let parents = vec![folder_id.to_string()];
        state.parents.insert(file_id.to_string(), parents.clone());
        Ok(parents)
    }

    async fn get_parents(&self, _cancel: &CancellationToken, file_id: &str) -> Result<Vec<String>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.record("files.getParents")?;
        state.parents.get(file_id).cloned().ok_or_else(|| ApiError::NotFound {
            resource: "file".to_string(),
            id: file_id.to_string(),
        })
    }

    async fn create_file(&self, _cancel: &CancellationToken, metadata: &DriveFile) -> Result<DriveFile, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.record("files.create")?;
        Ok(DriveFile {
            id: Some(state.fresh("file")),
            ..metadata.clone()
        })
    }

    async fn create_permission(
        &self,
        _cancel: &CancellationToken,
        _file_id: &str,
        permission: &Permission,
        _send_notification_email: bool,
    ) -> Result<Permission, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.record("permissions.create")?;
        Ok(Permission {
            id: Some(state.fresh("perm")),
            ..permission.clone()
        })
    }

    async fn get_permission(&self, _cancel: &CancellationToken, file_id: &str, permission_id: &str) -> Result<Permission, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.record("permissions.get")?;
        Err(ApiError::NotFound {
            resource: "permission".to_string(),
            id: format!("{}/{}", file_id, permission_id),
        })
    }

    async fn delete_permission(&self, _cancel: &CancellationToken, _file_id: &str, _permission_id: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.record("permissions.delete")
    }
}

/// Records every checkpoint the reconciler writes
#[derive(Default)]
pub struct RecordingSink {
    pub states: Mutex<Vec<FormModel>>,
}

impl StateSink for RecordingSink {
    fn checkpoint(&self, state: &FormModel) -> anyhow::Result<()> {
        self.states.lock().unwrap().push(state.clone());
        Ok(())
    }
}
