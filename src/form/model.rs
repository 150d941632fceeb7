//! Declarative form tree
//!
//! One schema serves both the desired configuration and the persisted state.
//! Computed attributes (`id`, `responder_uri`, `edit_uri`, ...) are `None` in
//! configuration and filled in by the reconciler.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormModel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub published: bool,
    pub accepting_responses: bool,
    pub quiz: bool,
    /// `DO_NOT_COLLECT`, `VERIFIED` or `RESPONDER_INPUT`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_collection_type: Option<String>,
    /// Raw Forms API item array; replaces `items` when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_json: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub responder_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parent_ids: Vec<String>,
    /// Response destination spreadsheet; recorded, never reconstructed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_sheet_id: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ItemModel>,
}

impl FormModel {
    pub fn is_json_mode(&self) -> bool {
        self.content_json.is_some()
    }

    pub fn item(&self, key: &str) -> Option<&ItemModel> {
        self.items.iter().find(|item| item.item_key == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    MultipleChoice,
    ShortAnswer,
    Paragraph,
    Dropdown,
    Checkbox,
    Date,
    DateTime,
    Scale,
    Time,
    Rating,
    Text,
    SectionHeader,
    Image,
    Video,
}

impl ItemKind {
    /// Attribute name of the variant block
    pub fn attribute(&self) -> &'static str {
        match self {
            ItemKind::MultipleChoice => "multiple_choice",
            ItemKind::ShortAnswer => "short_answer",
            ItemKind::Paragraph => "paragraph",
            ItemKind::Dropdown => "dropdown",
            ItemKind::Checkbox => "checkbox",
            ItemKind::Date => "date",
            ItemKind::DateTime => "date_time",
            ItemKind::Scale => "scale",
            ItemKind::Time => "time",
            ItemKind::Rating => "rating",
            ItemKind::Text => "text",
            ItemKind::SectionHeader => "section_header",
            ItemKind::Image => "image",
            ItemKind::Video => "video",
        }
    }

    pub fn is_choice(&self) -> bool {
        matches!(self, ItemKind::MultipleChoice | ItemKind::Dropdown | ItemKind::Checkbox)
    }

    /// Kinds whose options may carry section navigation
    pub fn supports_navigation(&self) -> bool {
        matches!(self, ItemKind::MultipleChoice | ItemKind::Dropdown)
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attribute())
    }
}

/// One form item: a key, the server-assigned ID, and exactly one variant block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemModel {
    pub item_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_item_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_choice: Option<ChoiceQuestionModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_answer: Option<TextQuestionModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paragraph: Option<TextQuestionModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dropdown: Option<ChoiceQuestionModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkbox: Option<ChoiceQuestionModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateQuestionModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<DateQuestionModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<ScaleQuestionModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeQuestionModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<RatingQuestionModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextItemModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_header: Option<SectionHeaderModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoModel>,
}

impl ItemModel {
    /// Every variant block that is set, in declaration order
    pub fn populated_kinds(&self) -> Vec<ItemKind> {
        let flags = [
            (self.multiple_choice.is_some(), ItemKind::MultipleChoice),
            (self.short_answer.is_some(), ItemKind::ShortAnswer),
            (self.paragraph.is_some(), ItemKind::Paragraph),
            (self.dropdown.is_some(), ItemKind::Dropdown),
            (self.checkbox.is_some(), ItemKind::Checkbox),
            (self.date.is_some(), ItemKind::Date),
            (self.date_time.is_some(), ItemKind::DateTime),
            (self.scale.is_some(), ItemKind::Scale),
            (self.time.is_some(), ItemKind::Time),
            (self.rating.is_some(), ItemKind::Rating),
            (self.text.is_some(), ItemKind::Text),
            (self.section_header.is_some(), ItemKind::SectionHeader),
            (self.image.is_some(), ItemKind::Image),
            (self.video.is_some(), ItemKind::Video),
        ];
        flags
            .into_iter()
            .filter_map(|(set, kind)| set.then_some(kind))
            .collect()
    }

    /// The single variant, or `None` when zero or several are set
    pub fn kind(&self) -> Option<ItemKind> {
        match self.populated_kinds().as_slice() {
            [kind] => Some(*kind),
            _ => None,
        }
    }

    /// The choice block for multiple-choice, dropdown or checkbox items
    pub fn choice(&self) -> Option<&ChoiceQuestionModel> {
        self.multiple_choice
            .as_ref()
            .or(self.dropdown.as_ref())
            .or(self.checkbox.as_ref())
    }

    /// Grading block, for the variants that can carry one
    pub fn grading(&self) -> Option<&GradingModel> {
        self.choice()
            .and_then(|c| c.grading.as_ref())
            .or_else(|| self.short_answer.as_ref().and_then(|q| q.grading.as_ref()))
            .or_else(|| self.paragraph.as_ref().and_then(|q| q.grading.as_ref()))
    }

    /// Whether any option targets another item by key
    pub fn has_pending_navigation(&self) -> bool {
        self.choice()
            .map(|c| c.option.iter().any(|o| o.go_to_section_key.is_some()))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChoiceQuestionModel {
    pub question_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    /// Plain option values
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Option blocks with navigation; exclusive with `options`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub option: Vec<ChoiceOptionModel>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub shuffle: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grading: Option<GradingModel>,
}

impl ChoiceQuestionModel {
    /// Option values regardless of representation
    pub fn values(&self) -> Vec<&str> {
        if self.options.is_empty() {
            self.option.iter().map(|o| o.value.as_str()).collect()
        } else {
            self.options.iter().map(String::as_str).collect()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChoiceOptionModel {
    pub value: String,
    /// `NEXT_SECTION`, `RESTART_FORM` or `SUBMIT_FORM`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub go_to_action: Option<String>,
    /// `item_key` of a section header in the same form
    #[serde(skip_serializing_if = "Option::is_none")]
    pub go_to_section_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub go_to_section_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextQuestionModel {
    pub question_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grading: Option<GradingModel>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateQuestionModel {
    pub question_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    pub include_year: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleQuestionModel {
    pub question_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    pub low: i64,
    pub high: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeQuestionModel {
    pub question_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    /// Elapsed time rather than time of day
    pub duration: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingQuestionModel {
    pub question_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    pub rating_scale_level: i64,
    /// `STAR`, `HEART` or `THUMB_UP`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextItemModel {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Rendered by the Forms API as a page break
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionHeaderModel {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageModel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub source_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoModel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub youtube_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingModel {
    pub points: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_correct: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_incorrect: Option<String>,
}
