//! Forms API v1 wire types
//!
//! Field names follow the REST representation (camelCase). Every optional
//! field is skipped when `None` so request bodies only carry what was set.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Form {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_id: Option<String>,
    #[serde(default)]
    pub info: Info,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<FormSettings>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responder_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_sheet_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_settings: Option<PublishSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Info {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_settings: Option<QuizSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_collection_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSettings {
    #[serde(default)]
    pub is_quiz: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_state: Option<PublishState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishState {
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub is_accepting_responses: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_item: Option<QuestionItem>,
    /// Kept opaque: grids are not part of the declarative model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_group_item: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_break_item: Option<PageBreakItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_item: Option<TextItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_item: Option<ImageItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_item: Option<VideoItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionItem {
    pub question: Question,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grading: Option<Grading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice_question: Option<ChoiceQuestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_question: Option<TextQuestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_question: Option<ScaleQuestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_question: Option<DateQuestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_question: Option<TimeQuestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_question: Option<RatingQuestion>,
    /// Upload questions cannot be created through the API; kept opaque
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_upload_question: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChoiceType {
    Radio,
    Checkbox,
    DropDown,
    #[serde(other)]
    Unspecified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceQuestion {
    #[serde(rename = "type")]
    pub choice_type: ChoiceType,
    #[serde(default)]
    pub options: Vec<ChoiceOption>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub shuffle: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceOption {
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_other: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub go_to_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub go_to_section_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextQuestion {
    #[serde(default)]
    pub paragraph: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleQuestion {
    #[serde(default)]
    pub low: i64,
    #[serde(default)]
    pub high: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateQuestion {
    #[serde(default)]
    pub include_time: bool,
    #[serde(default)]
    pub include_year: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeQuestion {
    #[serde(default)]
    pub duration: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingQuestion {
    #[serde(default)]
    pub rating_scale_level: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grading {
    #[serde(default)]
    pub point_value: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answers: Option<CorrectAnswers>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when_right: Option<Feedback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when_wrong: Option<Feedback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub general_feedback: Option<Feedback>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectAnswers {
    #[serde(default)]
    pub answers: Vec<CorrectAnswer>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectAnswer {
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageBreakItem {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextItem {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageItem {
    pub image: Image,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItem {
    pub video: Video,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    #[serde(default)]
    pub youtube_uri: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub index: usize,
}

/// Item body of a CreateItem request: typed from the declarative model, or a
/// raw JSON object passed through from `content_json`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ItemPayload {
    Typed(Item),
    Raw(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    pub item: ItemPayload,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteItemRequest {
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub item: Item,
    pub location: Location,
    pub update_mask: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFormInfoRequest {
    pub info: Info,
    pub update_mask: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    pub settings: FormSettings,
    pub update_mask: String,
}

/// A single entry of `forms.batchUpdate`'s `requests` array
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Request {
    UpdateFormInfo(UpdateFormInfoRequest),
    UpdateSettings(UpdateSettingsRequest),
    CreateItem(CreateItemRequest),
    DeleteItem(DeleteItemRequest),
    UpdateItem(UpdateItemRequest),
    /// Escape-hatch request passed through verbatim
    #[serde(untagged)]
    Raw(Value),
}

impl Request {
    /// Request kind as it appears on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            Request::UpdateFormInfo(_) => "updateFormInfo",
            Request::UpdateSettings(_) => "updateSettings",
            Request::CreateItem(_) => "createItem",
            Request::DeleteItem(_) => "deleteItem",
            Request::UpdateItem(_) => "updateItem",
            Request::Raw(_) => "raw",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteControl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_revision_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_revision_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateFormRequest {
    pub include_form_in_response: bool,
    pub requests: Vec<Request>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_control: Option<WriteControl>,
}

impl BatchUpdateFormRequest {
    pub fn new(requests: Vec<Request>) -> Self {
        Self {
            include_form_in_response: true,
            requests,
            write_control: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateFormResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<Form>,
    #[serde(default)]
    pub replies: Vec<Response>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_control: Option<WriteControl>,
}

/// One reply per request, in request order; only CreateItem replies carry data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_item: Option<CreateItemResponse>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemResponse {
    #[serde(default)]
    pub item_id: String,
    #[serde(default)]
    pub question_id: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPublishSettingsRequest {
    pub publish_settings: PublishSettings,
    pub update_mask: String,
}
