//! Batch composition for Create and Update
//!
//! Request order within a batch is significant. Item deletions run from the
//! highest index down, and the quiz toggle follows the deletions so graded
//! items are gone before quiz mode is switched off, while still preceding
//! the creation of new graded items.

use super::content_json::{self, ContentJsonError};
use super::identity::CreateIndex;
use super::model::{FormModel, ItemModel};
use super::translate::{self, SectionIds};
use crate::api::models::forms::{BatchUpdateFormRequest, Form, Request};

/// A batch plus what is needed to interpret its reply. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationPlan {
    pub requests: Vec<Request>,
    /// request index → `item_key` for every CreateItem
    pub create_index: CreateIndex,
    /// Keys of desired items whose navigation targets are resolved after creation
    pub pending_navigation: Vec<String>,
}

impl ReconciliationPlan {
    /// Batch that configures a freshly created (empty) form
    pub fn for_create(desired: &FormModel) -> Result<Self, ContentJsonError> {
        let builder = PlanBuilder::new()
            .update_form_info(&desired.title, desired.description.as_deref())
            .quiz_when(desired.quiz, true)
            .email_collection(desired.email_collection_type.as_deref());
        Ok(builder.create_desired_items(desired)?.build())
    }

    /// Replace-all batch: every existing item is deleted and the desired set
    /// recreated. Settings are compared against the fetched form.
    pub fn for_update(desired: &FormModel, current: &Form) -> Result<Self, ContentJsonError> {
        let current_settings = current.settings.as_ref();
        let current_quiz = current_settings
            .and_then(|s| s.quiz_settings.as_ref())
            .map(|q| q.is_quiz)
            .unwrap_or(false);
        let current_email = current_settings.and_then(|s| s.email_collection_type.as_deref());

        let email_change = desired
            .email_collection_type
            .as_deref()
            .filter(|wanted| Some(*wanted) != current_email);

        let builder = PlanBuilder::new()
            .update_form_info(&desired.title, desired.description.as_deref())
            .delete_items(current.items.len())
            .quiz_when(desired.quiz != current_quiz, desired.quiz)
            .email_collection(email_change);
        Ok(builder.create_desired_items(desired)?.build())
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn batch(&self) -> BatchUpdateFormRequest {
        BatchUpdateFormRequest::new(self.requests.clone())
    }

    pub fn create_count(&self) -> usize {
        self.create_index.len()
    }
}

/// Builds a [`ReconciliationPlan`] request by request
#[derive(Debug, Default)]
pub struct PlanBuilder {
    requests: Vec<Request>,
    create_index: CreateIndex,
    pending_navigation: Vec<String>,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_form_info(mut self, title: &str, description: Option<&str>) -> Self {
        self.requests.push(translate::form_info_request(title, description));
        self
    }

    pub fn quiz(mut self, is_quiz: bool) -> Self {
        self.requests.push(translate::quiz_settings_request(is_quiz));
        self
    }

    fn quiz_when(self, needed: bool, is_quiz: bool) -> Self {
        if needed {
            self.quiz(is_quiz)
        } else {
            self
        }
    }

    pub fn email_collection(mut self, collection_type: Option<&str>) -> Self {
        if let Some(kind) = collection_type {
            self.requests.push(translate::email_collection_request(kind));
        }
        self
    }

    pub fn delete_items(mut self, count: usize) -> Self {
        self.requests.extend(translate::delete_requests(count));
        self
    }

    /// CreateItem for each item at its position. Section targets given by
    /// key are not known yet; items using them are queued for phase two.
    pub fn create_items(mut self, items: &[ItemModel]) -> Self {
        for (key, request) in translate::create_item_requests(items, &SectionIds::new()) {
            self.create_index.record(self.requests.len(), key);
            self.requests.push(request);
        }
        self.pending_navigation.extend(
            items
                .iter()
                .filter(|item| item.has_pending_navigation())
                .map(|item| item.item_key.clone()),
        );
        self
    }

    pub fn create_from_content_json(mut self, content: &str) -> Result<Self, ContentJsonError> {
        self.requests.extend(content_json::create_requests(content)?);
        Ok(self)
    }

    fn create_desired_items(self, desired: &FormModel) -> Result<Self, ContentJsonError> {
        match &desired.content_json {
            Some(content) => self.create_from_content_json(content),
            None => Ok(self.create_items(&desired.items)),
        }
    }

    pub fn build(self) -> ReconciliationPlan {
        ReconciliationPlan {
            requests: self.requests,
            create_index: self.create_index,
            pending_navigation: self.pending_navigation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::model::{
        ChoiceOptionModel, ChoiceQuestionModel, GradingModel, SectionHeaderModel, TextQuestionModel,
    };
    use serde_json::{json, Value};

    fn short_answer(key: &str, text: &str) -> ItemModel {
        ItemModel {
            item_key: key.to_string(),
            short_answer: Some(TextQuestionModel {
                question_text: text.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn kinds(plan: &ReconciliationPlan) -> Vec<Value> {
        plan.requests
            .iter()
            .map(|r| {
                let wire = serde_json::to_value(r).unwrap();
                match r {
                    Request::DeleteItem(d) => json!(["deleteItem", d.location.index]),
                    Request::CreateItem(c) => json!(["createItem", c.location.index]),
                    Request::UpdateSettings(_) => json!(["updateSettings", wire["updateSettings"]["updateMask"]]),
                    other => json!([other.kind()]),
                }
            })
            .collect()
    }

    fn remote_form(items: usize, quiz: bool) -> Form {
        serde_json::from_value(json!({
            "formId": "f1",
            "info": {"title": "Old"},
            "settings": {"quizSettings": {"isQuiz": quiz}},
            "items": (0..items).map(|i| json!({"itemId": format!("old{}", i), "textItem": {}})).collect::<Vec<_>>()
        }))
        .unwrap()
    }

    #[test]
    fn test_create_without_items() {
        let desired = FormModel {
            title: "My Form".to_string(),
            description: Some("d".to_string()),
            ..Default::default()
        };
        let plan = ReconciliationPlan::for_create(&desired).unwrap();

        assert_eq!(plan.requests.len(), 1);
        assert_eq!(
            serde_json::to_value(&plan.requests[0]).unwrap(),
            json!({"updateFormInfo": {"info": {"title": "My Form", "description": "d"}, "updateMask": "title,description"}})
        );
        assert!(plan.create_index.is_empty());
    }

    #[test]
    fn test_create_records_item_keys_by_request_index() {
        let desired = FormModel {
            title: "Quiz".to_string(),
            quiz: true,
            email_collection_type: Some("VERIFIED".to_string()),
            items: vec![short_answer("name", "Name?"), short_answer("age", "Age?")],
            ..Default::default()
        };
        let plan = ReconciliationPlan::for_create(&desired).unwrap();

        assert_eq!(
            kinds(&plan),
            vec![
                json!(["updateFormInfo"]),
                json!(["updateSettings", "quizSettings.isQuiz"]),
                json!(["updateSettings", "emailCollectionType"]),
                json!(["createItem", 0]),
                json!(["createItem", 1]),
            ]
        );
        assert_eq!(plan.create_index.key_at(3), Some("name"));
        assert_eq!(plan.create_index.key_at(4), Some("age"));
        assert_eq!(plan.create_count(), 2);
    }

    #[test]
    fn test_update_replaces_single_item() {
        let desired = FormModel {
            title: "Old".to_string(),
            items: vec![short_answer("q2", "New Q?")],
            ..Default::default()
        };
        let plan = ReconciliationPlan::for_update(&desired, &remote_form(1, false)).unwrap();

        assert_eq!(
            kinds(&plan),
            vec![json!(["updateFormInfo"]), json!(["deleteItem", 0]), json!(["createItem", 0])]
        );
        let created = serde_json::to_value(&plan.requests[2]).unwrap();
        assert_eq!(created["createItem"]["item"]["title"], "New Q?");
    }

    #[test]
    fn test_update_disables_quiz_after_deletes() {
        let desired = FormModel {
            title: "Old".to_string(),
            quiz: false,
            items: vec![short_answer("fresh", "Plain?")],
            ..Default::default()
        };
        let plan = ReconciliationPlan::for_update(&desired, &remote_form(2, true)).unwrap();

        assert_eq!(
            kinds(&plan),
            vec![
                json!(["updateFormInfo"]),
                json!(["deleteItem", 1]),
                json!(["deleteItem", 0]),
                json!(["updateSettings", "quizSettings.isQuiz"]),
                json!(["createItem", 0]),
            ]
        );
        let quiz = serde_json::to_value(&plan.requests[3]).unwrap();
        assert_eq!(quiz["updateSettings"]["settings"]["quizSettings"]["isQuiz"], false);
    }

    #[test]
    fn test_update_enables_quiz_before_graded_items() {
        let mut graded = short_answer("score", "2+2?");
        if let Some(q) = graded.short_answer.as_mut() {
            q.grading = Some(GradingModel {
                points: 1,
                correct_answer: Some("4".to_string()),
                ..Default::default()
            });
        }
        let desired = FormModel {
            title: "Old".to_string(),
            quiz: true,
            items: vec![graded],
            ..Default::default()
        };
        let plan = ReconciliationPlan::for_update(&desired, &remote_form(0, false)).unwrap();
        assert_eq!(
            kinds(&plan),
            vec![
                json!(["updateFormInfo"]),
                json!(["updateSettings", "quizSettings.isQuiz"]),
                json!(["createItem", 0]),
            ]
        );
    }

    #[test]
    fn test_navigation_by_key_is_deferred() {
        let route = ItemModel {
            item_key: "route".to_string(),
            multiple_choice: Some(ChoiceQuestionModel {
                question_text: "Continue?".to_string(),
                option: vec![ChoiceOptionModel {
                    value: "Yes".to_string(),
                    go_to_section_key: Some("more".to_string()),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        };
        let more = ItemModel {
            item_key: "more".to_string(),
            section_header: Some(SectionHeaderModel {
                title: "More".to_string(),
                description: None,
            }),
            ..Default::default()
        };
        let desired = FormModel {
            title: "Nav".to_string(),
            items: vec![route, more],
            ..Default::default()
        };

        let plan = ReconciliationPlan::for_create(&desired).unwrap();
        assert_eq!(plan.pending_navigation, vec!["route".to_string()]);

        let created = serde_json::to_value(&plan.requests[1]).unwrap();
        let option = &created["createItem"]["item"]["questionItem"]["question"]["choiceQuestion"]["options"][0];
        assert_eq!(option, &json!({"value": "Yes"}));
    }

    #[test]
    fn test_json_mode_creates_raw_items() {
        let desired = FormModel {
            title: "Raw".to_string(),
            content_json: Some(r#"[{"title":"A","textItem":{}},{"title":"B","pageBreakItem":{}}]"#.to_string()),
            ..Default::default()
        };
        let plan = ReconciliationPlan::for_update(&desired, &remote_form(1, false)).unwrap();
        assert_eq!(
            kinds(&plan),
            vec![
                json!(["updateFormInfo"]),
                json!(["deleteItem", 0]),
                json!(["createItem", 0]),
                json!(["createItem", 1]),
            ]
        );
        assert!(plan.create_index.is_empty());
    }

    #[test]
    fn test_batch_always_includes_form() {
        let plan = PlanBuilder::new().delete_items(2).build();
        let batch = plan.batch();
        assert!(batch.include_form_in_response);
        assert_eq!(batch.requests.len(), 2);
    }
}
