//! Template sidebar view-model.
//!
//! # Responsibility
//! - Mirror the store snapshot as a list with at most one active item.
//! - Track the edit field and the enabled state of edit/delete controls.
//!
//! # Invariants
//! - `selected` always names a record of the last rendered snapshot, or is
//!   `None`.
//! - Edit and delete controls are enabled exactly when something is selected.
//! - The sidebar never mutates the store itself; callers turn its requests
//!   into store operations.

use crate::model::template::{TemplateId, TemplateRecord};
use serde::Serialize;

/// One row of the template list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SidebarItem {
    pub id: TemplateId,
    pub text: String,
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TemplateSidebar {
    items: Vec<SidebarItem>,
    selected: Option<TemplateId>,
    edit_value: String,
    edit_enabled: bool,
    delete_enabled: bool,
}

impl TemplateSidebar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[SidebarItem] {
        &self.items
    }

    pub fn selected(&self) -> Option<TemplateId> {
        self.selected
    }

    pub fn edit_value(&self) -> &str {
        &self.edit_value
    }

    pub fn is_edit_enabled(&self) -> bool {
        self.edit_enabled
    }

    pub fn is_delete_enabled(&self) -> bool {
        self.delete_enabled
    }

    /// Rebuilds the list from `snapshot`, keeping the selection if it survives.
    pub fn render(&mut self, snapshot: &[TemplateRecord]) {
        if let Some(selected) = self.selected {
            if !snapshot.iter().any(|record| record.id == selected) {
                self.clear_selection();
            }
        }
        self.items = snapshot
            .iter()
            .map(|record| SidebarItem {
                id: record.id,
                text: record.text.clone(),
                active: Some(record.id) == self.selected,
            })
            .collect();
    }

    /// Selects `id` and loads its text for editing; unknown ids clear the
    /// selection.
    pub fn select(&mut self, id: TemplateId, snapshot: &[TemplateRecord]) {
        match snapshot.iter().find(|record| record.id == id) {
            Some(record) => {
                self.selected = Some(record.id);
                self.edit_value = record.text.clone();
                self.edit_enabled = true;
                self.delete_enabled = true;
            }
            None => self.clear_selection(),
        }
        self.render(snapshot);
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
        self.edit_value.clear();
        self.edit_enabled = false;
        self.delete_enabled = false;
        for item in &mut self.items {
            item.active = false;
        }
    }

    /// Updates the edit field. Ignored while editing is disabled.
    pub fn set_edit_value(&mut self, value: &str) {
        if self.edit_enabled {
            self.edit_value = value.to_string();
        }
    }

    /// Returns the `(id, text)` update the edit field asks for.
    pub fn commit_request(&self) -> Option<(TemplateId, String)> {
        let id = self.selected?;
        Some((id, self.edit_value.trim().to_string()))
    }

    /// Returns the id the delete control would remove.
    pub fn delete_request(&self) -> Option<TemplateId> {
        self.delete_enabled.then_some(self.selected).flatten()
    }
}
