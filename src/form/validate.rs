//! Plan-time validation
//!
//! Runs before any API call. Every violation is reported, not just the
//! first, so a single plan surfaces all configuration problems.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

use super::content_json;
use super::model::{ChoiceQuestionModel, FormModel, ItemKind, ItemModel};
use crate::diagnostics::Diagnostics;

pub const SUMMARY: &str = "Invalid Configuration";

static ITEM_KEY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]{0,63}$").expect("valid item_key pattern"));

pub const NAVIGATION_ACTIONS: [&str; 3] = ["NEXT_SECTION", "RESTART_FORM", "SUBMIT_FORM"];

pub const EMAIL_COLLECTION_TYPES: [&str; 3] = ["DO_NOT_COLLECT", "VERIFIED", "RESPONDER_INPUT"];

/// `"submit form"` / `"submit_form"` / `"SUBMIT_FORM"` all become `SUBMIT_FORM`
pub fn normalize_action(action: &str) -> String {
    action
        .trim()
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .map(str::to_uppercase)
        .collect::<Vec<_>>()
        .join("_")
}

pub fn is_valid_item_key(key: &str) -> bool {
    ITEM_KEY_PATTERN.is_match(key)
}

pub fn validate(form: &FormModel) -> Diagnostics {
    let mut diags = Diagnostics::new();

    if form.title.trim().is_empty() {
        diags.add_attribute_error("title", SUMMARY, "title must not be empty");
    }

    if !form.published && form.accepting_responses {
        diags.add_attribute_error(
            "accepting_responses",
            SUMMARY,
            "accepting_responses = true requires published = true",
        );
    }

    if let Some(kind) = &form.email_collection_type {
        if !EMAIL_COLLECTION_TYPES.contains(&kind.as_str()) {
            diags.add_attribute_error(
                "email_collection_type",
                SUMMARY,
                format!(
                    "email_collection_type must be one of {}, got {:?}",
                    EMAIL_COLLECTION_TYPES.join(", "),
                    kind
                ),
            );
        }
    }

    if let Some(content) = &form.content_json {
        if !form.items.is_empty() {
            diags.add_attribute_error(
                "content_json",
                SUMMARY,
                "content_json and items are mutually exclusive; set one or the other",
            );
        }
        if let Err(err) = content_json::parse_items(content) {
            diags.add_attribute_error("content_json", SUMMARY, err.to_string());
        }
    }

    let kinds_by_key: HashMap<&str, Option<ItemKind>> = form
        .items
        .iter()
        .map(|item| (item.item_key.as_str(), item.kind()))
        .collect();

    let mut seen = HashSet::new();
    for (index, item) in form.items.iter().enumerate() {
        let path = format!("items[{}]", index);

        if !is_valid_item_key(&item.item_key) {
            diags.add_attribute_error(
                format!("{}.item_key", path),
                SUMMARY,
                format!(
                    "item_key {:?} must start with a lowercase letter and contain only lowercase letters, digits and underscores (max 64 chars)",
                    item.item_key
                ),
            );
        }
        if !seen.insert(item.item_key.as_str()) {
            diags.add_attribute_error(
                format!("{}.item_key", path),
                SUMMARY,
                format!("duplicate item_key {:?}", item.item_key),
            );
        }

        validate_item(item, &path, form.quiz, &kinds_by_key, &mut diags);
    }

    diags
}

fn validate_item(
    item: &ItemModel,
    path: &str,
    quiz: bool,
    kinds_by_key: &HashMap<&str, Option<ItemKind>>,
    diags: &mut Diagnostics,
) {
    let kinds = item.populated_kinds();
    let kind = match kinds.as_slice() {
        [kind] => *kind,
        [] => {
            diags.add_attribute_error(
                path,
                SUMMARY,
                format!("item {:?} must set exactly one question or content block", item.item_key),
            );
            return;
        }
        many => {
            let names: Vec<&str> = many.iter().map(|k| k.attribute()).collect();
            diags.add_attribute_error(
                path,
                SUMMARY,
                format!(
                    "item {:?} sets {} blocks ({}); exactly one is allowed",
                    item.item_key,
                    many.len(),
                    names.join(", ")
                ),
            );
            return;
        }
    };

    if item.grading().is_some() && !quiz {
        diags.add_attribute_error(
            format!("{}.{}.grading", path, kind),
            SUMMARY,
            format!("item {:?} has grading but the form is not a quiz; set quiz = true", item.item_key),
        );
    }

    if !kind.is_choice() && item.grading().is_some_and(|g| g.feedback_incorrect.is_some()) {
        diags.add_attribute_error(
            format!("{}.{}.grading.feedback_incorrect", path, kind),
            SUMMARY,
            format!(
                "item {:?}: only choice questions take feedback_incorrect; use feedback_correct for general feedback",
                item.item_key
            ),
        );
    }

    if let Some(choice) = item.choice() {
        validate_choice(choice, kind, &format!("{}.{}", path, kind), kinds_by_key, diags);
    }

    if let Some(scale) = &item.scale {
        if !(0..=1).contains(&scale.low) || !(2..=10).contains(&scale.high) {
            diags.add_attribute_error(
                format!("{}.scale", path),
                SUMMARY,
                format!("scale low must be 0 or 1 and high between 2 and 10, got {}..{}", scale.low, scale.high),
            );
        }
    }

    if let Some(rating) = &item.rating {
        if !(3..=10).contains(&rating.rating_scale_level) {
            diags.add_attribute_error(
                format!("{}.rating.rating_scale_level", path),
                SUMMARY,
                format!("rating_scale_level must be between 3 and 10, got {}", rating.rating_scale_level),
            );
        }
    }
}

fn validate_choice(
    choice: &ChoiceQuestionModel,
    kind: ItemKind,
    path: &str,
    kinds_by_key: &HashMap<&str, Option<ItemKind>>,
    diags: &mut Diagnostics,
) {
    match (choice.options.is_empty(), choice.option.is_empty()) {
        (true, true) => diags.add_attribute_error(path, SUMMARY, "choice questions need at least one option"),
        (false, false) => diags.add_attribute_error(
            path,
            SUMMARY,
            "options and option blocks are mutually exclusive; use one representation",
        ),
        _ => {}
    }

    if let Some(answer) = choice.grading.as_ref().and_then(|g| g.correct_answer.as_ref()) {
        if !choice.values().contains(&answer.as_str()) {
            diags.add_attribute_error(
                format!("{}.grading.correct_answer", path),
                SUMMARY,
                format!("correct_answer {:?} is not one of the options", answer),
            );
        }
    }

    for (index, option) in choice.option.iter().enumerate() {
        let option_path = format!("{}.option[{}]", path, index);
        let has_target = option.go_to_section_key.is_some() || option.go_to_section_id.is_some();

        if (has_target || option.go_to_action.is_some()) && !kind.supports_navigation() {
            diags.add_attribute_error(
                &option_path,
                SUMMARY,
                format!("section navigation is only supported on multiple_choice and dropdown items, not {}", kind),
            );
        }

        if option.go_to_section_key.is_some() && option.go_to_section_id.is_some() {
            diags.add_attribute_error(
                &option_path,
                SUMMARY,
                "go_to_section_key and go_to_section_id are mutually exclusive",
            );
        }

        if let Some(action) = &option.go_to_action {
            if has_target {
                diags.add_attribute_error(
                    &option_path,
                    SUMMARY,
                    "go_to_action cannot be combined with go_to_section_key or go_to_section_id",
                );
            }
            if !NAVIGATION_ACTIONS.contains(&normalize_action(action).as_str()) {
                diags.add_attribute_error(
                    format!("{}.go_to_action", option_path),
                    SUMMARY,
                    format!("go_to_action must be one of {}, got {:?}", NAVIGATION_ACTIONS.join(", "), action),
                );
            }
        }

        if let Some(target) = &option.go_to_section_key {
            match kinds_by_key.get(target.as_str()) {
                Some(Some(ItemKind::SectionHeader)) => {}
                Some(_) => diags.add_attribute_error(
                    format!("{}.go_to_section_key", option_path),
                    SUMMARY,
                    format!("go_to_section_key {:?} must reference a section_header item", target),
                ),
                None => diags.add_attribute_error(
                    format!("{}.go_to_section_key", option_path),
                    SUMMARY,
                    format!("go_to_section_key {:?} does not match any item_key in this form", target),
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::model::{
        ChoiceOptionModel, GradingModel, SectionHeaderModel, TextQuestionModel,
    };

    fn short_answer(key: &str) -> ItemModel {
        ItemModel {
            item_key: key.to_string(),
            short_answer: Some(TextQuestionModel {
                question_text: "Name?".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn section(key: &str) -> ItemModel {
        ItemModel {
            item_key: key.to_string(),
            section_header: Some(SectionHeaderModel {
                title: "Part 2".to_string(),
                description: None,
            }),
            ..Default::default()
        }
    }

    fn choice_item(key: &str, option: Vec<ChoiceOptionModel>) -> ItemModel {
        ItemModel {
            item_key: key.to_string(),
            multiple_choice: Some(ChoiceQuestionModel {
                question_text: "Pick".to_string(),
                option,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn form(items: Vec<ItemModel>) -> FormModel {
        FormModel {
            title: "Form".to_string(),
            items,
            ..Default::default()
        }
    }

    fn details(diags: &Diagnostics) -> Vec<String> {
        diags.errors().map(|d| d.detail.clone()).collect()
    }

    #[test]
    fn test_valid_form_passes() {
        let diags = validate(&form(vec![short_answer("name"), section("part_two")]));
        assert!(diags.is_empty(), "{}", diags);
    }

    #[test]
    fn test_accepting_requires_published() {
        let mut config = form(vec![]);
        config.accepting_responses = true;
        config.published = false;

        let diags = validate(&config);
        let error = diags.errors().next().unwrap();
        assert_eq!(error.summary, "Invalid Configuration");
        assert_eq!(error.attribute_path.as_deref(), Some("accepting_responses"));
    }

    #[test]
    fn test_content_json_excludes_items() {
        let mut config = form(vec![short_answer("name")]);
        config.content_json = Some("[]".to_string());
        let diags = validate(&config);
        assert!(details(&diags)[0].contains("mutually exclusive"));
    }

    #[test]
    fn test_item_keys_unique_and_well_formed() {
        let diags = validate(&form(vec![short_answer("name"), short_answer("name"), short_answer("Bad-Key")]));
        let errors = details(&diags);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.contains("duplicate item_key \"name\"")));
        assert!(errors.iter().any(|e| e.contains("\"Bad-Key\"")));
    }

    #[test]
    fn test_exactly_one_variant() {
        let mut item = short_answer("q");
        item.section_header = Some(SectionHeaderModel::default());
        let empty = ItemModel {
            item_key: "e".to_string(),
            ..Default::default()
        };

        let errors = details(&validate(&form(vec![item, empty])));
        assert!(errors[0].contains("exactly one is allowed"));
        assert!(errors[1].contains("must set exactly one"));
    }

    #[test]
    fn test_choice_options_rules() {
        let none = choice_item("a", vec![]);
        let mut both = choice_item(
            "b",
            vec![ChoiceOptionModel {
                value: "x".to_string(),
                ..Default::default()
            }],
        );
        if let Some(choice) = both.multiple_choice.as_mut() {
            choice.options = vec!["y".to_string()];
        }

        let errors = details(&validate(&form(vec![none, both])));
        assert!(errors[0].contains("at least one option"));
        assert!(errors[1].contains("mutually exclusive"));
    }

    #[test]
    fn test_grading_requires_quiz_and_known_answer() {
        let mut item = choice_item(
            "color",
            vec![ChoiceOptionModel {
                value: "Red".to_string(),
                ..Default::default()
            }],
        );
        if let Some(choice) = item.multiple_choice.as_mut() {
            choice.grading = Some(GradingModel {
                points: 1,
                correct_answer: Some("Green".to_string()),
                ..Default::default()
            });
        }

        let mut config = form(vec![item]);
        let errors = details(&validate(&config));
        assert!(errors.iter().any(|e| e.contains("not a quiz")));
        assert!(errors.iter().any(|e| e.contains("\"Green\" is not one of the options")));

        config.quiz = true;
        let errors = details(&validate(&config));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_text_grading_takes_general_feedback_only() {
        let mut item = short_answer("name");
        if let Some(text) = item.short_answer.as_mut() {
            text.grading = Some(GradingModel {
                points: 1,
                feedback_correct: Some("Thanks".to_string()),
                feedback_incorrect: Some("Try again".to_string()),
                ..Default::default()
            });
        }
        let mut config = form(vec![item]);
        config.quiz = true;

        let diags = validate(&config);
        let errors = details(&diags);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("only choice questions take feedback_incorrect"));
        assert_eq!(
            diags.errors().next().unwrap().attribute_path.as_deref(),
            Some("items[0].short_answer.grading.feedback_incorrect")
        );
    }

    #[test]
    fn test_navigation_rules() {
        let both = ChoiceOptionModel {
            value: "a".to_string(),
            go_to_section_key: Some("part_two".to_string()),
            go_to_section_id: Some("abc".to_string()),
            ..Default::default()
        };
        let action_and_key = ChoiceOptionModel {
            value: "b".to_string(),
            go_to_action: Some("submit form".to_string()),
            go_to_section_key: Some("part_two".to_string()),
            ..Default::default()
        };
        let not_a_section = ChoiceOptionModel {
            value: "c".to_string(),
            go_to_section_key: Some("name".to_string()),
            ..Default::default()
        };
        let unknown_action = ChoiceOptionModel {
            value: "d".to_string(),
            go_to_action: Some("jump".to_string()),
            ..Default::default()
        };

        let config = form(vec![
            short_answer("name"),
            choice_item("pick", vec![both, action_and_key, not_a_section, unknown_action]),
            section("part_two"),
        ]);
        let errors = details(&validate(&config));

        assert_eq!(errors.len(), 4, "{:?}", errors);
        assert!(errors[0].contains("go_to_section_key and go_to_section_id are mutually exclusive"));
        assert!(errors[1].contains("go_to_action cannot be combined"));
        assert!(errors[2].contains("must reference a section_header"));
        assert!(errors[3].contains("go_to_action must be one of"));
    }

    #[test]
    fn test_checkbox_cannot_navigate() {
        let mut item = choice_item(
            "many",
            vec![ChoiceOptionModel {
                value: "a".to_string(),
                go_to_action: Some("SUBMIT_FORM".to_string()),
                ..Default::default()
            }],
        );
        item.checkbox = item.multiple_choice.take();

        let errors = details(&validate(&form(vec![item])));
        assert!(errors[0].contains("only supported on multiple_choice and dropdown"));
    }

    #[test]
    fn test_normalize_action() {
        assert_eq!(normalize_action("submit form"), "SUBMIT_FORM");
        assert_eq!(normalize_action("Next_Section"), "NEXT_SECTION");
        assert_eq!(normalize_action(" RESTART_FORM "), "RESTART_FORM");
    }
}
