//! Translation between the declarative item model and Forms API primitives
//!
//! Everything here is pure. Errors from the wire never pass through these
//! functions; the reconciler owns sequencing and failure handling.

use std::collections::HashMap;

use super::identity::IdentityMap;
use super::model::{
    ChoiceOptionModel, ChoiceQuestionModel, DateQuestionModel, FormModel, GradingModel, ImageModel,
    ItemKind, ItemModel, RatingQuestionModel, ScaleQuestionModel, SectionHeaderModel,
    TextItemModel, TextQuestionModel, TimeQuestionModel, VideoModel,
};
use super::validate::normalize_action;
use crate::api::constants::{self, masks};
use crate::api::models::forms::{
    ChoiceOption, ChoiceQuestion, ChoiceType, CorrectAnswer, CorrectAnswers, CreateItemRequest,
    DateQuestion, DeleteItemRequest, Feedback, Form, FormSettings, Grading, Image, ImageItem,
    Info, Item, ItemPayload, Location, PageBreakItem, Question, QuestionItem, QuizSettings,
    RatingQuestion, Request, ScaleQuestion, TextItem, TextQuestion, TimeQuestion,
    UpdateFormInfoRequest, UpdateItemRequest, UpdateSettingsRequest, Video, VideoItem,
};

/// `item_key` → Google item ID of the form's section headers
pub type SectionIds = HashMap<String, String>;

/// Body for `forms.create`; the endpoint ignores everything but the title
pub fn new_form(title: &str) -> Form {
    Form {
        info: Info {
            title: Some(title.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn form_info_request(title: &str, description: Option<&str>) -> Request {
    Request::UpdateFormInfo(UpdateFormInfoRequest {
        info: Info {
            title: Some(title.to_string()),
            description: Some(description.unwrap_or_default().to_string()),
            document_title: None,
        },
        update_mask: masks::FORM_INFO.to_string(),
    })
}

pub fn quiz_settings_request(is_quiz: bool) -> Request {
    Request::UpdateSettings(UpdateSettingsRequest {
        settings: FormSettings {
            quiz_settings: Some(QuizSettings { is_quiz }),
            email_collection_type: None,
        },
        update_mask: masks::QUIZ.to_string(),
    })
}

pub fn email_collection_request(collection_type: &str) -> Request {
    Request::UpdateSettings(UpdateSettingsRequest {
        settings: FormSettings {
            quiz_settings: None,
            email_collection_type: Some(collection_type.to_string()),
        },
        update_mask: masks::EMAIL_COLLECTION.to_string(),
    })
}

/// DeleteItem for indices `n-1` down to `0`, so each deletion leaves the
/// lower indices untouched
pub fn delete_requests(item_count: usize) -> Vec<Request> {
    (0..item_count)
        .rev()
        .map(|index| Request::DeleteItem(DeleteItemRequest {
            location: Location { index },
        }))
        .collect()
}

pub fn create_item_request(item: Item, index: usize) -> Request {
    Request::CreateItem(CreateItemRequest {
        item: ItemPayload::Typed(item),
        location: Location { index },
    })
}

/// Choice questions take per-outcome feedback; text questions only accept
/// `generalFeedback`, which carries `feedback_correct`
fn grading_to_api(grading: &GradingModel, per_outcome: bool) -> Grading {
    let feedback = |text: &Option<String>| text.as_ref().map(|text| Feedback { text: text.clone() });
    let (when_right, when_wrong, general_feedback) = if per_outcome {
        (feedback(&grading.feedback_correct), feedback(&grading.feedback_incorrect), None)
    } else {
        (None, None, feedback(&grading.feedback_correct))
    };

    Grading {
        point_value: grading.points,
        correct_answers: grading.correct_answer.as_ref().map(|value| CorrectAnswers {
            answers: vec![CorrectAnswer { value: value.clone() }],
        }),
        when_right,
        when_wrong,
        general_feedback,
    }
}

fn grading_from_api(grading: &Grading) -> GradingModel {
    GradingModel {
        points: grading.point_value,
        correct_answer: grading
            .correct_answers
            .as_ref()
            .and_then(|answers| answers.answers.first())
            .map(|answer| answer.value.clone()),
        feedback_correct: grading
            .when_right
            .as_ref()
            .or(grading.general_feedback.as_ref())
            .map(|f| f.text.clone()),
        feedback_incorrect: grading.when_wrong.as_ref().map(|f| f.text.clone()),
    }
}

fn choice_options_to_api(choice: &ChoiceQuestionModel, section_ids: &SectionIds) -> Vec<ChoiceOption> {
    if !choice.options.is_empty() {
        return choice
            .options
            .iter()
            .map(|value| ChoiceOption {
                value: value.clone(),
                ..Default::default()
            })
            .collect();
    }

    choice
        .option
        .iter()
        .map(|option| ChoiceOption {
            value: option.value.clone(),
            is_other: None,
            go_to_action: option.go_to_action.as_deref().map(normalize_action),
            go_to_section_id: option.go_to_section_id.clone().or_else(|| {
                option
                    .go_to_section_key
                    .as_ref()
                    .and_then(|key| section_ids.get(key).cloned())
            }),
        })
        .collect()
}

fn question_item(
    title: &str,
    description: Option<&String>,
    question: Question,
) -> Item {
    Item {
        title: Some(title.to_string()),
        description: description.cloned(),
        question_item: Some(QuestionItem { question }),
        ..Default::default()
    }
}

fn choice_to_api(choice: &ChoiceQuestionModel, choice_type: ChoiceType, section_ids: &SectionIds) -> Item {
    question_item(
        &choice.question_text,
        choice.description.as_ref(),
        Question {
            required: choice.required,
            grading: choice.grading.as_ref().map(|g| grading_to_api(g, true)),
            choice_question: Some(ChoiceQuestion {
                choice_type,
                options: choice_options_to_api(choice, section_ids),
                shuffle: choice.shuffle,
            }),
            ..Default::default()
        },
    )
}

fn text_to_api(text: &TextQuestionModel, paragraph: bool) -> Item {
    question_item(
        &text.question_text,
        text.description.as_ref(),
        Question {
            required: text.required,
            grading: text.grading.as_ref().map(|g| grading_to_api(g, false)),
            text_question: Some(TextQuestion { paragraph }),
            ..Default::default()
        },
    )
}

fn date_to_api(date: &DateQuestionModel, include_time: bool) -> Item {
    question_item(
        &date.question_text,
        date.description.as_ref(),
        Question {
            required: date.required,
            date_question: Some(DateQuestion {
                include_time,
                include_year: date.include_year,
            }),
            ..Default::default()
        },
    )
}

/// Build the API item for a declarative item. Navigation targets given by
/// key are resolved through `section_ids`; unresolved ones are left unset.
/// Returns `None` unless exactly one variant is set.
pub fn item_to_api(item: &ItemModel, section_ids: &SectionIds) -> Option<Item> {
    let api_item = match item.kind()? {
        ItemKind::MultipleChoice => choice_to_api(item.multiple_choice.as_ref()?, ChoiceType::Radio, section_ids),
        ItemKind::Dropdown => choice_to_api(item.dropdown.as_ref()?, ChoiceType::DropDown, section_ids),
        ItemKind::Checkbox => choice_to_api(item.checkbox.as_ref()?, ChoiceType::Checkbox, section_ids),
        ItemKind::ShortAnswer => text_to_api(item.short_answer.as_ref()?, false),
        ItemKind::Paragraph => text_to_api(item.paragraph.as_ref()?, true),
        ItemKind::Date => date_to_api(item.date.as_ref()?, false),
        ItemKind::DateTime => date_to_api(item.date_time.as_ref()?, true),
        ItemKind::Scale => {
            let scale = item.scale.as_ref()?;
            question_item(
                &scale.question_text,
                scale.description.as_ref(),
                Question {
                    required: scale.required,
                    scale_question: Some(ScaleQuestion {
                        low: scale.low,
                        high: scale.high,
                        low_label: scale.low_label.clone(),
                        high_label: scale.high_label.clone(),
                    }),
                    ..Default::default()
                },
            )
        }
        ItemKind::Time => {
            let time = item.time.as_ref()?;
            question_item(
                &time.question_text,
                time.description.as_ref(),
                Question {
                    required: time.required,
                    time_question: Some(TimeQuestion { duration: time.duration }),
                    ..Default::default()
                },
            )
        }
        ItemKind::Rating => {
            let rating = item.rating.as_ref()?;
            question_item(
                &rating.question_text,
                rating.description.as_ref(),
                Question {
                    required: rating.required,
                    rating_question: Some(RatingQuestion {
                        rating_scale_level: rating.rating_scale_level,
                        icon_type: rating.icon_type.clone(),
                    }),
                    ..Default::default()
                },
            )
        }
        ItemKind::Text => {
            let text = item.text.as_ref()?;
            Item {
                title: Some(text.title.clone()),
                description: text.description.clone(),
                text_item: Some(TextItem {}),
                ..Default::default()
            }
        }
        ItemKind::SectionHeader => {
            let section = item.section_header.as_ref()?;
            Item {
                title: Some(section.title.clone()),
                description: section.description.clone(),
                page_break_item: Some(PageBreakItem {}),
                ..Default::default()
            }
        }
        ItemKind::Image => {
            let image = item.image.as_ref()?;
            Item {
                title: image.title.clone(),
                image_item: Some(ImageItem {
                    image: Image {
                        source_uri: Some(image.source_uri.clone()),
                        content_uri: None,
                        alt_text: image.alt_text.clone(),
                    },
                }),
                ..Default::default()
            }
        }
        ItemKind::Video => {
            let video = item.video.as_ref()?;
            Item {
                title: video.title.clone(),
                video_item: Some(VideoItem {
                    video: Video {
                        youtube_uri: video.youtube_uri.clone(),
                    },
                    caption: video.caption.clone(),
                }),
                ..Default::default()
            }
        }
    };
    Some(api_item)
}

/// CreateItem requests with `location.index` set to each item's position.
/// Pair each request with the item key it creates.
pub fn create_item_requests(items: &[ItemModel], section_ids: &SectionIds) -> Vec<(String, Request)> {
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            item_to_api(item, section_ids).map(|api_item| (item.item_key.clone(), create_item_request(api_item, index)))
        })
        .collect()
}

/// The declarative variant a remote item corresponds to, if it is one we manage
pub fn remote_kind(item: &Item) -> Option<ItemKind> {
    if let Some(question_item) = &item.question_item {
        let question = &question_item.question;
        if let Some(choice) = &question.choice_question {
            return match choice.choice_type {
                ChoiceType::Radio => Some(ItemKind::MultipleChoice),
                ChoiceType::Checkbox => Some(ItemKind::Checkbox),
                ChoiceType::DropDown => Some(ItemKind::Dropdown),
                ChoiceType::Unspecified => None,
            };
        }
        if let Some(text) = &question.text_question {
            return Some(if text.paragraph { ItemKind::Paragraph } else { ItemKind::ShortAnswer });
        }
        if let Some(date) = &question.date_question {
            return Some(if date.include_time { ItemKind::DateTime } else { ItemKind::Date });
        }
        if question.scale_question.is_some() {
            return Some(ItemKind::Scale);
        }
        if question.time_question.is_some() {
            return Some(ItemKind::Time);
        }
        if question.rating_question.is_some() {
            return Some(ItemKind::Rating);
        }
        return None;
    }

    if item.text_item.is_some() {
        Some(ItemKind::Text)
    } else if item.page_break_item.is_some() {
        Some(ItemKind::SectionHeader)
    } else if item.image_item.is_some() {
        Some(ItemKind::Image)
    } else if item.video_item.is_some() {
        Some(ItemKind::Video)
    } else {
        None
    }
}

fn choice_option_from_api(
    option: &ChoiceOption,
    hint: Option<&ChoiceOptionModel>,
    section_keys: &HashMap<String, String>,
) -> ChoiceOptionModel {
    let go_to_action = option.go_to_action.as_ref().map(|action| {
        match hint.and_then(|h| h.go_to_action.as_ref()) {
            Some(spelled) if normalize_action(spelled) == *action => spelled.clone(),
            _ => action.clone(),
        }
    });

    let (go_to_section_key, go_to_section_id) = match &option.go_to_section_id {
        None => (None, None),
        Some(id) => {
            let wants_key = hint.map(|h| h.go_to_section_key.is_some()).unwrap_or(false);
            match section_keys.get(id) {
                Some(key) if wants_key => (Some(key.clone()), None),
                _ => (None, Some(id.clone())),
            }
        }
    };

    ChoiceOptionModel {
        value: option.value.clone(),
        go_to_action,
        go_to_section_key,
        go_to_section_id,
    }
}

fn choice_from_api(
    item: &Item,
    question: &Question,
    choice: &ChoiceQuestion,
    hint: Option<&ChoiceQuestionModel>,
    section_keys: &HashMap<String, String>,
) -> ChoiceQuestionModel {
    let options: Vec<&ChoiceOption> = choice
        .options
        .iter()
        .filter(|o| !o.is_other.unwrap_or(false))
        .collect();

    let navigates = options
        .iter()
        .any(|o| o.go_to_action.is_some() || o.go_to_section_id.is_some());
    let hinted_blocks = hint.map(|h| !h.option.is_empty()).unwrap_or(false);

    let (plain, blocks) = if navigates || hinted_blocks {
        let blocks = options
            .iter()
            .map(|option| {
                let option_hint = hint.and_then(|h| h.option.iter().find(|o| o.value == option.value));
                choice_option_from_api(option, option_hint, section_keys)
            })
            .collect();
        (Vec::new(), blocks)
    } else {
        (options.iter().map(|o| o.value.clone()).collect(), Vec::new())
    };

    ChoiceQuestionModel {
        question_text: item.title.clone().unwrap_or_default(),
        description: item.description.clone(),
        required: question.required,
        options: plain,
        option: blocks,
        shuffle: choice.shuffle,
        grading: question.grading.as_ref().map(grading_from_api),
    }
}

/// Convert one remote item into the declarative model under `key`.
/// `hint` is the prior or planned item with the same key; it decides the
/// option representation and whether navigation targets read back as keys.
/// Unmanaged kinds yield `None`.
pub fn item_from_api(
    item: &Item,
    key: String,
    hint: Option<&ItemModel>,
    section_keys: &HashMap<String, String>,
) -> Option<ItemModel> {
    let kind = remote_kind(item)?;
    let title = item.title.clone().unwrap_or_default();
    let description = item.description.clone();
    let question = item.question_item.as_ref().map(|q| &q.question);

    let mut model = ItemModel {
        item_key: key,
        google_item_id: item.item_id.clone(),
        ..Default::default()
    };

    match kind {
        ItemKind::MultipleChoice | ItemKind::Dropdown | ItemKind::Checkbox => {
            let question = question?;
            let choice = question.choice_question.as_ref()?;
            let choice_hint = hint.and_then(|h| match kind {
                ItemKind::MultipleChoice => h.multiple_choice.as_ref(),
                ItemKind::Dropdown => h.dropdown.as_ref(),
                _ => h.checkbox.as_ref(),
            });
            let converted = choice_from_api(item, question, choice, choice_hint, section_keys);
            match kind {
                ItemKind::MultipleChoice => model.multiple_choice = Some(converted),
                ItemKind::Dropdown => model.dropdown = Some(converted),
                _ => model.checkbox = Some(converted),
            }
        }
        ItemKind::ShortAnswer | ItemKind::Paragraph => {
            let question = question?;
            let text = TextQuestionModel {
                question_text: title,
                description,
                required: question.required,
                grading: question.grading.as_ref().map(grading_from_api),
            };
            if kind == ItemKind::Paragraph {
                model.paragraph = Some(text);
            } else {
                model.short_answer = Some(text);
            }
        }
        ItemKind::Date | ItemKind::DateTime => {
            let question = question?;
            let date = DateQuestionModel {
                question_text: title,
                description,
                required: question.required,
                include_year: question.date_question.as_ref().map(|d| d.include_year).unwrap_or(false),
            };
            if kind == ItemKind::DateTime {
                model.date_time = Some(date);
            } else {
                model.date = Some(date);
            }
        }
        ItemKind::Scale => {
            let question = question?;
            let scale = question.scale_question.as_ref()?;
            model.scale = Some(ScaleQuestionModel {
                question_text: title,
                description,
                required: question.required,
                low: scale.low,
                high: scale.high,
                low_label: scale.low_label.clone(),
                high_label: scale.high_label.clone(),
            });
        }
        ItemKind::Time => {
            let question = question?;
            model.time = Some(TimeQuestionModel {
                question_text: title,
                description,
                required: question.required,
                duration: question.time_question.as_ref().map(|t| t.duration).unwrap_or(false),
            });
        }
        ItemKind::Rating => {
            let question = question?;
            let rating = question.rating_question.as_ref()?;
            model.rating = Some(RatingQuestionModel {
                question_text: title,
                description,
                required: question.required,
                rating_scale_level: rating.rating_scale_level,
                icon_type: rating.icon_type.clone(),
            });
        }
        ItemKind::Text => model.text = Some(TextItemModel { title, description }),
        ItemKind::SectionHeader => model.section_header = Some(SectionHeaderModel { title, description }),
        ItemKind::Image => {
            let image = &item.image_item.as_ref()?.image;
            model.image = Some(ImageModel {
                title: item.title.clone(),
                source_uri: image.source_uri.clone().unwrap_or_default(),
                alt_text: image.alt_text.clone(),
            });
        }
        ItemKind::Video => {
            let video = item.video_item.as_ref()?;
            model.video = Some(VideoModel {
                title: item.title.clone(),
                youtube_uri: video.video.youtube_uri.clone(),
                caption: video.caption.clone(),
            });
        }
    }

    Some(model)
}

/// Convert a fetched form into state.
///
/// Items are keyed through `identity`; items it does not know get `item_N`
/// for their zero-based position, suffixed when a user key already holds
/// that name. Unmanaged kinds are dropped but still
/// occupy their position. In JSON mode the hint's `content_json` and stored
/// items are kept as-is.
pub fn form_to_state(form: &Form, identity: &IdentityMap, hint: Option<&FormModel>) -> FormModel {
    let form_id = form.form_id.clone().unwrap_or_default();

    let keys = identity.assign_keys(&form.items);

    let section_keys: HashMap<String, String> = form
        .items
        .iter()
        .zip(&keys)
        .filter(|(item, _)| item.page_break_item.is_some())
        .filter_map(|(item, key)| Some((item.item_id.clone()?, key.clone())))
        .collect();

    let json_mode = hint.map(FormModel::is_json_mode).unwrap_or(false);
    let items = if json_mode {
        hint.map(|h| h.items.clone()).unwrap_or_default()
    } else {
        form.items
            .iter()
            .zip(keys)
            .filter_map(|(item, key)| {
                let item_hint = hint.and_then(|h| h.item(&key));
                item_from_api(item, key, item_hint, &section_keys)
            })
            .collect()
    };

    let settings = form.settings.as_ref();
    let email_collection_type = settings
        .and_then(|s| s.email_collection_type.clone())
        .filter(|kind| {
            kind != "DO_NOT_COLLECT" || hint.map(|h| h.email_collection_type.is_some()).unwrap_or(true)
        });

    let (published, accepting_responses) = match form.publish_settings.as_ref().and_then(|p| p.publish_state.as_ref()) {
        Some(state) => (state.is_published, state.is_accepting_responses),
        None => hint
            .map(|h| (h.published, h.accepting_responses))
            .unwrap_or((false, false)),
    };

    FormModel {
        id: form.form_id.clone(),
        title: form.info.title.clone().unwrap_or_default(),
        description: form.info.description.clone().filter(|d| !d.is_empty()).or_else(|| {
            hint.and_then(|h| h.description.clone()).filter(|d| d.is_empty())
        }),
        published,
        accepting_responses,
        quiz: settings
            .and_then(|s| s.quiz_settings.as_ref())
            .map(|q| q.is_quiz)
            .unwrap_or(false),
        email_collection_type,
        content_json: hint.and_then(|h| h.content_json.clone()),
        folder_id: hint.and_then(|h| h.folder_id.clone()),
        responder_uri: form.responder_uri.clone(),
        edit_uri: (!form_id.is_empty()).then(|| constants::edit_uri(&form_id)),
        document_title: form.info.document_title.clone(),
        revision_id: form.revision_id.clone(),
        parent_ids: hint.map(|h| h.parent_ids.clone()).unwrap_or_default(),
        linked_sheet_id: form.linked_sheet_id.clone(),
        items,
    }
}

/// Outcome of comparing an existing remote item with its desired shape
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateDecision {
    /// Apply as UpdateItem, preserving the item and question IDs
    InPlace(Request),
    /// The shape changed; the item must be deleted and recreated
    ReplaceAll { reason: String },
}

/// Decide whether `desired` can be applied to `existing` (at `index`) in place.
///
/// Only identical variants qualify (radio stays radio, date stays date-only).
/// The update carries a freshly built item, so payloads of other variants are
/// absent, and it uses the `*` mask so absent fields are cleared.
pub fn decide_update(existing: &Item, desired: &ItemModel, index: usize, section_ids: &SectionIds) -> UpdateDecision {
    let Some(desired_kind) = desired.kind() else {
        return UpdateDecision::ReplaceAll {
            reason: format!("item {:?} does not set exactly one variant", desired.item_key),
        };
    };
    let Some(existing_kind) = remote_kind(existing) else {
        return UpdateDecision::ReplaceAll {
            reason: "existing item is of an unmanaged kind".to_string(),
        };
    };
    if desired_kind != existing_kind {
        return UpdateDecision::ReplaceAll {
            reason: format!("variant changes from {} to {}", existing_kind, desired_kind),
        };
    }
    let Some(item_id) = existing.item_id.clone() else {
        return UpdateDecision::ReplaceAll {
            reason: "existing item has no ID".to_string(),
        };
    };
    let Some(mut item) = item_to_api(desired, section_ids) else {
        return UpdateDecision::ReplaceAll {
            reason: format!("item {:?} cannot be translated", desired.item_key),
        };
    };

    item.item_id = Some(item_id);
    if let (Some(updated), Some(current)) = (item.question_item.as_mut(), existing.question_item.as_ref()) {
        updated.question.question_id = current.question.question_id.clone();
    }

    UpdateDecision::InPlace(Request::UpdateItem(UpdateItemRequest {
        item,
        location: Location { index },
        update_mask: masks::ALL.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::forms::{PublishSettings, PublishState};
    use serde_json::json;

    fn choice(key: &str, options: &[&str]) -> ItemModel {
        ItemModel {
            item_key: key.to_string(),
            multiple_choice: Some(ChoiceQuestionModel {
                question_text: "Colour?".to_string(),
                options: options.iter().map(|o| o.to_string()).collect(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn short_answer(key: &str, text: &str, required: bool) -> ItemModel {
        ItemModel {
            item_key: key.to_string(),
            short_answer: Some(TextQuestionModel {
                question_text: text.to_string(),
                required,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn remote(id: &str, body: serde_json::Value) -> Item {
        let mut item: Item = serde_json::from_value(body).unwrap();
        item.item_id = Some(id.to_string());
        item
    }

    #[test]
    fn test_delete_requests_reverse_order() {
        for n in 0..6 {
            let indices: Vec<usize> = delete_requests(n)
                .into_iter()
                .map(|r| match r {
                    Request::DeleteItem(d) => d.location.index,
                    other => panic!("unexpected {:?}", other),
                })
                .collect();
            let expected: Vec<usize> = (0..n).rev().collect();
            assert_eq!(indices, expected);
        }
    }

    #[test]
    fn test_reverse_deletes_empty_any_form() {
        for n in 0..8 {
            let mut items: Vec<usize> = (0..n).collect();
            for request in delete_requests(n) {
                if let Request::DeleteItem(d) = request {
                    assert!(d.location.index < items.len());
                    items.remove(d.location.index);
                }
            }
            assert!(items.is_empty());
        }
    }

    #[test]
    fn test_settings_masks() {
        let info = serde_json::to_value(form_info_request("My Form", Some("d"))).unwrap();
        assert_eq!(
            info,
            json!({"updateFormInfo": {"info": {"title": "My Form", "description": "d"}, "updateMask": "title,description"}})
        );

        let quiz = serde_json::to_value(quiz_settings_request(false)).unwrap();
        assert_eq!(
            quiz,
            json!({"updateSettings": {"settings": {"quizSettings": {"isQuiz": false}}, "updateMask": "quizSettings.isQuiz"}})
        );

        let email = serde_json::to_value(email_collection_request("VERIFIED")).unwrap();
        assert_eq!(email["updateSettings"]["updateMask"], "emailCollectionType");
    }

    #[test]
    fn test_create_requests_use_positions() {
        let items = vec![short_answer("name", "Name?", true), choice("color", &["Red", "Blue"])];
        let requests = create_item_requests(&items, &SectionIds::new());
        let wire = serde_json::to_value(requests.iter().map(|(_, r)| r).collect::<Vec<_>>()).unwrap();

        assert_eq!(requests[0].0, "name");
        assert_eq!(requests[1].0, "color");
        assert_eq!(
            wire[0],
            json!({"createItem": {
                "item": {"title": "Name?", "questionItem": {"question": {"required": true, "textQuestion": {"paragraph": false}}}},
                "location": {"index": 0}
            }})
        );
        assert_eq!(wire[1]["createItem"]["location"]["index"], 1);
        assert_eq!(
            wire[1]["createItem"]["item"]["questionItem"]["question"]["choiceQuestion"],
            json!({"type": "RADIO", "options": [{"value": "Red"}, {"value": "Blue"}]})
        );
    }

    #[test]
    fn test_navigation_key_resolution() {
        let mut item = choice("route", &[]);
        if let Some(c) = item.multiple_choice.as_mut() {
            c.option = vec![
                ChoiceOptionModel {
                    value: "Yes".to_string(),
                    go_to_section_key: Some("details".to_string()),
                    ..Default::default()
                },
                ChoiceOptionModel {
                    value: "No".to_string(),
                    go_to_action: Some("submit form".to_string()),
                    ..Default::default()
                },
            ];
        }

        let unresolved = item_to_api(&item, &SectionIds::new()).unwrap();
        let options = &unresolved.question_item.as_ref().unwrap().question.choice_question.as_ref().unwrap().options;
        assert_eq!(options[0].go_to_section_id, None);
        assert_eq!(options[1].go_to_action.as_deref(), Some("SUBMIT_FORM"));

        let ids = SectionIds::from([("details".to_string(), "pb1".to_string())]);
        let resolved = item_to_api(&item, &ids).unwrap();
        let options = &resolved.question_item.unwrap().question.choice_question.unwrap().options;
        assert_eq!(options[0].go_to_section_id.as_deref(), Some("pb1"));
    }

    #[test]
    fn test_form_to_state_synthesizes_keys_and_skips_unmanaged() {
        let form: Form = serde_json::from_value(json!({
            "formId": "f1",
            "info": {"title": "T", "documentTitle": "Untitled form"},
            "responderUri": "https://docs.google.com/forms/d/e/r/viewform",
            "revisionId": "00000005",
            "publishSettings": {"publishState": {"isPublished": true, "isAcceptingResponses": false}},
            "items": [
                {"itemId": "a", "title": "Name?", "questionItem": {"question": {"questionId": "qa", "textQuestion": {}}}},
                {"itemId": "grid", "title": "Grid", "questionGroupItem": {"questions": []}},
                {"itemId": "c", "title": "Bye", "textItem": {}}
            ]
        }))
        .unwrap();

        let mut identity = IdentityMap::new();
        identity.insert("a", "name");
        let state = form_to_state(&form, &identity, None);

        assert_eq!(state.id.as_deref(), Some("f1"));
        assert_eq!(state.edit_uri.as_deref(), Some("https://docs.google.com/forms/d/f1/edit"));
        assert_eq!(state.document_title.as_deref(), Some("Untitled form"));
        assert!(state.published);
        assert!(!state.accepting_responses);
        assert_eq!(state.items.len(), 2);
        assert_eq!(state.items[0].item_key, "name");
        assert_eq!(state.items[0].google_item_id.as_deref(), Some("a"));
        assert_eq!(state.items[1].item_key, "item_2");
        assert_eq!(state.items[1].kind(), Some(ItemKind::Text));
    }

    #[test]
    fn test_form_to_state_respects_option_representation_hint() {
        let form: Form = serde_json::from_value(json!({
            "formId": "f1",
            "info": {"title": "T"},
            "items": [
                {"itemId": "q", "title": "Go?", "questionItem": {"question": {"choiceQuestion": {
                    "type": "RADIO",
                    "options": [{"value": "Yes", "goToSectionId": "pb"}, {"value": "No", "goToAction": "SUBMIT_FORM"}]
                }}}},
                {"itemId": "pb", "title": "More", "pageBreakItem": {}}
            ]
        }))
        .unwrap();

        let mut identity = IdentityMap::new();
        identity.insert("q", "route");
        identity.insert("pb", "more");

        let mut hint_item = choice("route", &[]);
        if let Some(c) = hint_item.multiple_choice.as_mut() {
            c.question_text = "Go?".to_string();
            c.option = vec![
                ChoiceOptionModel {
                    value: "Yes".to_string(),
                    go_to_section_key: Some("more".to_string()),
                    ..Default::default()
                },
                ChoiceOptionModel {
                    value: "No".to_string(),
                    go_to_action: Some("submit form".to_string()),
                    ..Default::default()
                },
            ];
        }
        let hint = FormModel {
            title: "T".to_string(),
            items: vec![hint_item.clone()],
            ..Default::default()
        };

        let state = form_to_state(&form, &identity, Some(&hint));
        let route = state.item("route").unwrap().multiple_choice.as_ref().unwrap();
        assert_eq!(route.option, hint_item.multiple_choice.unwrap().option);

        let without_hint = form_to_state(&form, &identity, None);
        let route = without_hint.item("route").unwrap().multiple_choice.as_ref().unwrap();
        assert_eq!(route.option[0].go_to_section_id.as_deref(), Some("pb"));
        assert_eq!(route.option[0].go_to_section_key, None);
    }

    #[test]
    fn test_form_to_state_keeps_json_mode_content() {
        let form = Form {
            form_id: Some("f1".to_string()),
            items: vec![remote("x", json!({"title": "Q", "textItem": {}}))],
            publish_settings: Some(PublishSettings {
                publish_state: Some(PublishState::default()),
            }),
            ..Default::default()
        };
        let hint = FormModel {
            content_json: Some(r#"[{"title":"Q","textItem":{}}]"#.to_string()),
            ..Default::default()
        };

        let state = form_to_state(&form, &IdentityMap::new(), Some(&hint));
        assert_eq!(state.content_json, hint.content_json);
        assert!(state.items.is_empty());
    }

    #[test]
    fn test_item_round_trips_through_api_shape() {
        let items = vec![
            short_answer("name", "Name?", true),
            choice("color", &["Red", "Blue"]),
            ItemModel {
                item_key: "when".to_string(),
                date_time: Some(DateQuestionModel {
                    question_text: "When?".to_string(),
                    include_year: true,
                    ..Default::default()
                }),
                ..Default::default()
            },
            ItemModel {
                item_key: "rate".to_string(),
                scale: Some(ScaleQuestionModel {
                    question_text: "Rate".to_string(),
                    low: 1,
                    high: 5,
                    low_label: Some("bad".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ItemModel {
                item_key: "clip".to_string(),
                video: Some(VideoModel {
                    title: Some("Intro".to_string()),
                    youtube_uri: "https://youtu.be/x".to_string(),
                    caption: Some("hello".to_string()),
                }),
                ..Default::default()
            },
        ];

        for original in items {
            let api = item_to_api(&original, &SectionIds::new()).unwrap();
            assert_eq!(remote_kind(&api), original.kind());
            let back = item_from_api(&api, original.item_key.clone(), Some(&original), &HashMap::new()).unwrap();
            assert_eq!(back, original);
        }
    }

    #[test]
    fn test_text_grading_uses_general_feedback() {
        let mut item = short_answer("answer", "6 x 7?", true);
        if let Some(text) = item.short_answer.as_mut() {
            text.grading = Some(GradingModel {
                points: 3,
                correct_answer: Some("42".to_string()),
                feedback_correct: Some("Well done".to_string()),
                ..Default::default()
            });
        }

        let api = item_to_api(&item, &SectionIds::new()).unwrap();
        let wire = serde_json::to_value(&api).unwrap();
        let grading = &wire["questionItem"]["question"]["grading"];
        assert_eq!(grading["generalFeedback"]["text"], "Well done");
        assert!(grading.get("whenRight").is_none());
        assert!(grading.get("whenWrong").is_none());

        let back = item_from_api(&api, "answer".to_string(), Some(&item), &HashMap::new()).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_choice_grading_uses_per_outcome_feedback() {
        let mut item = choice("color", &["Red", "Blue"]);
        if let Some(choice) = item.multiple_choice.as_mut() {
            choice.grading = Some(GradingModel {
                points: 1,
                correct_answer: Some("Red".to_string()),
                feedback_correct: Some("Yes".to_string()),
                feedback_incorrect: Some("No".to_string()),
            });
        }

        let wire = serde_json::to_value(item_to_api(&item, &SectionIds::new()).unwrap()).unwrap();
        let grading = &wire["questionItem"]["question"]["grading"];
        assert_eq!(grading["whenRight"]["text"], "Yes");
        assert_eq!(grading["whenWrong"]["text"], "No");
        assert!(grading.get("generalFeedback").is_none());
    }

    #[test]
    fn test_in_place_same_variant_keeps_ids() {
        let existing = remote(
            "item1",
            json!({"title": "Old", "questionItem": {"question": {"questionId": "q1", "textQuestion": {}}}}),
        );
        let desired = short_answer("name", "New?", true);

        match decide_update(&existing, &desired, 3, &SectionIds::new()) {
            UpdateDecision::InPlace(Request::UpdateItem(update)) => {
                assert_eq!(update.update_mask, "*");
                assert_eq!(update.location.index, 3);
                assert_eq!(update.item.item_id.as_deref(), Some("item1"));
                let question = update.item.question_item.unwrap().question;
                assert_eq!(question.question_id.as_deref(), Some("q1"));
                assert!(question.text_question.is_some());
                assert!(question.choice_question.is_none());
                assert!(question.grading.is_none());
            }
            other => panic!("expected in-place update, got {:?}", other),
        }
    }

    #[test]
    fn test_variant_mismatch_forces_replace() {
        let paragraph = remote("p", json!({"questionItem": {"question": {"textQuestion": {"paragraph": true}}}}));
        assert!(matches!(
            decide_update(&paragraph, &short_answer("q", "Q", false), 0, &SectionIds::new()),
            UpdateDecision::ReplaceAll { .. }
        ));

        let date_only = remote("d", json!({"questionItem": {"question": {"dateQuestion": {"includeTime": false}}}}));
        let date_time = ItemModel {
            item_key: "d".to_string(),
            date_time: Some(DateQuestionModel::default()),
            ..Default::default()
        };
        match decide_update(&date_only, &date_time, 0, &SectionIds::new()) {
            UpdateDecision::ReplaceAll { reason } => assert!(reason.contains("date to date_time")),
            other => panic!("expected replace, got {:?}", other),
        }

        let checkbox = remote("c", json!({"questionItem": {"question": {"choiceQuestion": {"type": "CHECKBOX", "options": []}}}}));
        assert!(matches!(
            decide_update(&checkbox, &choice("c", &["a"]), 0, &SectionIds::new()),
            UpdateDecision::ReplaceAll { .. }
        ));
    }

    #[test]
    fn test_in_place_scale_update() {
        let existing = remote("s", json!({"questionItem": {"question": {"questionId": "qs", "scaleQuestion": {"low": 1, "high": 5}}}}));
        let desired = ItemModel {
            item_key: "s".to_string(),
            scale: Some(ScaleQuestionModel {
                question_text: "How much?".to_string(),
                low: 0,
                high: 10,
                low_label: Some("none".to_string()),
                high_label: Some("lots".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let UpdateDecision::InPlace(Request::UpdateItem(update)) = decide_update(&existing, &desired, 0, &SectionIds::new()) else {
            panic!("expected in-place update");
        };
        let question = update.item.question_item.unwrap().question;
        assert_eq!(question.scale_question.as_ref().unwrap().high, 10);
        assert!(question.grading.is_none());
    }
}
