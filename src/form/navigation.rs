//! Phase-two choice navigation
//!
//! Options that jump to a section by `item_key` cannot be expressed until the
//! section exists and has an ID. After phase one, the form is read back and
//! each such choice item is rewritten in place with the resolved IDs.

use log::{debug, warn};
use std::collections::HashMap;
use thiserror::Error;

use super::identity::IdentityMap;
use super::model::ItemModel;
use super::translate::{self, SectionIds, UpdateDecision};
use crate::api::models::forms::{BatchUpdateFormRequest, Form, Request};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NavigationError {
    #[error("item {item_key:?}: go_to_section_key {target:?} does not resolve to a section on the form")]
    UnresolvedTarget { item_key: String, target: String },
    #[error("item {item_key:?} was not found on the form after creation")]
    MissingItem { item_key: String },
    #[error("item {item_key:?} cannot be updated in place: {reason}")]
    NotUpdatable { item_key: String, reason: String },
}

/// UpdateItem requests for the second batch, plus anything skipped under
/// `allow_missing`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigationPass {
    pub requests: Vec<Request>,
    pub skipped: Vec<NavigationError>,
}

impl NavigationPass {
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn batch(&self) -> Option<BatchUpdateFormRequest> {
        (!self.requests.is_empty()).then(|| BatchUpdateFormRequest::new(self.requests.clone()))
    }
}

pub struct NavigationResolver<'a> {
    form: &'a Form,
    ids_by_key: HashMap<String, String>,
    section_ids: SectionIds,
    allow_missing: bool,
}

impl<'a> NavigationResolver<'a> {
    /// `form` is the post-phase-one form; `identity` maps its item IDs to keys
    pub fn new(form: &'a Form, identity: &IdentityMap, allow_missing: bool) -> Self {
        let section_ids = form
            .items
            .iter()
            .filter(|item| item.page_break_item.is_some())
            .filter_map(|item| {
                let id = item.item_id.as_deref()?;
                let key = identity.key_for(id)?;
                Some((key.to_string(), id.to_string()))
            })
            .collect();

        Self {
            form,
            ids_by_key: identity.ids_by_key(),
            section_ids,
            allow_missing,
        }
    }

    /// Build the second batch for the items named in `pending`
    pub fn resolve(&self, desired: &[ItemModel], pending: &[String]) -> Result<NavigationPass, NavigationError> {
        let mut pass = NavigationPass::default();

        for key in pending {
            let Some(item) = desired.iter().find(|item| &item.item_key == key) else {
                continue;
            };
            match self.resolve_item(item, &mut pass.skipped) {
                Ok(Some(request)) => pass.requests.push(request),
                Ok(None) => {}
                Err(err) if self.allow_missing && !matches!(err, NavigationError::NotUpdatable { .. }) => {
                    warn!("Skipping navigation: {}", err);
                    pass.skipped.push(err);
                }
                Err(err) => return Err(err),
            }
        }

        debug!(
            "Navigation pass: {} updates, {} skipped",
            pass.requests.len(),
            pass.skipped.len()
        );
        Ok(pass)
    }

    fn resolve_item(&self, item: &ItemModel, skipped: &mut Vec<NavigationError>) -> Result<Option<Request>, NavigationError> {
        let missing = || NavigationError::MissingItem {
            item_key: item.item_key.clone(),
        };
        let id = self.ids_by_key.get(&item.item_key).ok_or_else(missing)?;
        let (position, remote) = self
            .form
            .items
            .iter()
            .enumerate()
            .find(|(_, remote)| remote.item_id.as_deref() == Some(id.as_str()))
            .ok_or_else(missing)?;

        let mut resolved = 0;
        for option in item.choice().map(|c| c.option.as_slice()).unwrap_or_default() {
            let Some(target) = &option.go_to_section_key else {
                continue;
            };
            if self.section_ids.contains_key(target) {
                resolved += 1;
                continue;
            }
            let err = NavigationError::UnresolvedTarget {
                item_key: item.item_key.clone(),
                target: target.clone(),
            };
            if !self.allow_missing {
                return Err(err);
            }
            warn!("Skipping navigation: {}", err);
            skipped.push(err);
        }

        if resolved == 0 {
            return Ok(None);
        }

        match translate::decide_update(remote, item, position, &self.section_ids) {
            UpdateDecision::InPlace(request) => Ok(Some(request)),
            UpdateDecision::ReplaceAll { reason } => Err(NavigationError::NotUpdatable {
                item_key: item.item_key.clone(),
                reason,
            }),
        }
    }
}
