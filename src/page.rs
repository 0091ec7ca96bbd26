// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! In-memory model of the form controls of a page
//!
//! The [`Page`] is the authoritative state of a form. Fields never keep their own copy of a
//! value, they read from and write to the controls of the page every time.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlKind {
    Text,
    Textarea,
    Hidden,
    Select,
    SelectMultiple,
    Checkbox,
    Radio,
}

impl ControlKind {
    /// Controls that carry their value through the `checked` flag
    pub fn is_checkable(self) -> bool {
        matches!(self, Self::Checkbox | Self::Radio)
    }
}

/// A single input control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub id: String,
    pub kind: ControlKind,
    /// Current value, or the value token of a checkbox/radio
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub checked: bool,
    /// Selected entries of a `select-multiple` control
    #[serde(default)]
    pub selected: Vec<String>,
}

impl Control {
    pub fn new(id: impl Into<String>, kind: ControlKind) -> Self {
        Self {
            id: id.into(),
            kind,
            value: String::new(),
            checked: false,
            selected: Vec::new(),
        }
    }

    pub fn text(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::new(id, ControlKind::Text)
        }
    }

    pub fn hidden(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::new(id, ControlKind::Hidden)
        }
    }

    pub fn select(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::new(id, ControlKind::Select)
        }
    }

    pub fn select_multiple<I, S>(id: impl Into<String>, selected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            selected: selected.into_iter().map(Into::into).collect(),
            ..Self::new(id, ControlKind::SelectMultiple)
        }
    }

    pub fn checkbox(id: impl Into<String>, value: impl Into<String>, checked: bool) -> Self {
        Self {
            value: value.into(),
            checked,
            ..Self::new(id, ControlKind::Checkbox)
        }
    }

    pub fn radio(id: impl Into<String>, value: impl Into<String>, checked: bool) -> Self {
        Self {
            value: value.into(),
            checked,
            ..Self::new(id, ControlKind::Radio)
        }
    }

    /// Whether the control holds something a required field would accept
    pub fn is_filled(&self) -> bool {
        match self.kind {
            kind if kind.is_checkable() => self.checked,
            ControlKind::SelectMultiple => !self.selected.is_empty(),
            _ => !self.value.is_empty(),
        }
    }
}

/// Serialized page state, used to load a page from a file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageState {
    #[serde(default)]
    pub controls: Vec<Control>,
}

/// The set of controls of one page together with the visible error indicators
#[derive(Debug, Clone, Default)]
pub struct Page {
    controls: IndexMap<String, Control>,
    visible_errors: BTreeSet<String>,
    highlighted_labels: BTreeSet<String>,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_controls<I>(controls: I) -> Self
    where
        I: IntoIterator<Item = Control>,
    {
        let mut page = Self::new();
        for control in controls {
            page.insert(control);
        }
        page
    }

    /// Adds a control, replacing a control with the same id
    pub fn insert(&mut self, control: Control) {
        self.controls.insert(control.id.clone(), control);
    }

    pub fn remove(&mut self, id: &str) -> Option<Control> {
        self.controls.shift_remove(id)
    }

    /// Removes every control whose id starts with `prefix`
    pub fn remove_prefixed(&mut self, prefix: &str) -> usize {
        let before = self.controls.len();
        self.controls.retain(|id, _| !id.starts_with(prefix));
        before - self.controls.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.controls.contains_key(id)
    }

    pub fn control(&self, id: &str) -> Option<&Control> {
        self.controls.get(id)
    }

    pub fn control_mut(&mut self, id: &str) -> Option<&mut Control> {
        self.controls.get_mut(id)
    }

    pub fn controls(&self) -> impl Iterator<Item = &Control> {
        self.controls.values()
    }

    /// Value of a control, empty when the control does not exist
    pub fn value(&self, id: &str) -> &str {
        self.controls.get(id).map(|c| c.value.as_str()).unwrap_or("")
    }

    /// Sets the value of a control, returns false if it does not exist
    pub fn set_value(&mut self, id: &str, value: impl Into<String>) -> bool {
        match self.controls.get_mut(id) {
            Some(control) => {
                control.value = value.into();
                true
            }
            None => false,
        }
    }

    pub fn is_checked(&self, id: &str) -> bool {
        self.controls.get(id).map(|c| c.checked).unwrap_or(false)
    }

    pub fn set_checked(&mut self, id: &str, checked: bool) -> bool {
        match self.controls.get_mut(id) {
            Some(control) => {
                control.checked = checked;
                true
            }
            None => false,
        }
    }

    pub fn show_error(&mut self, error_ref: Option<&str>, label: Option<&str>) {
        if let Some(error_ref) = error_ref {
            self.visible_errors.insert(error_ref.to_owned());
        }
        if let Some(label) = label {
            self.highlighted_labels.insert(label.to_owned());
        }
    }

    pub fn hide_error(&mut self, error_ref: Option<&str>, label: Option<&str>) {
        if let Some(error_ref) = error_ref {
            self.visible_errors.remove(error_ref);
        }
        if let Some(label) = label {
            self.highlighted_labels.remove(label);
        }
    }

    pub fn is_error_visible(&self, error_ref: &str) -> bool {
        self.visible_errors.contains(error_ref)
    }

    pub fn visible_errors(&self) -> impl Iterator<Item = &str> {
        self.visible_errors.iter().map(String::as_str)
    }

    pub fn is_label_highlighted(&self, label: &str) -> bool {
        self.highlighted_labels.contains(label)
    }

    pub fn state(&self) -> PageState {
        PageState {
            controls: self.controls.values().cloned().collect(),
        }
    }
}

impl From<PageState> for Page {
    fn from(state: PageState) -> Self {
        Self::with_controls(state.controls)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn filled_depends_on_kind() {
        assert!(!Control::text("title", "").is_filled());
        assert!(Control::text("title", "x").is_filled());
        assert!(!Control::checkbox("hold", "true", false).is_filled());
        assert!(Control::checkbox("hold", "true", true).is_filled());
        assert!(!Control::select_multiple("langs", Vec::<String>::new()).is_filled());
        assert!(Control::select_multiple("langs", ["de"]).is_filled());
    }

    #[test]
    fn remove_prefixed_keeps_other_controls() {
        let mut page = Page::with_controls([
            Control::checkbox("resource-screen", "screen", true),
            Control::checkbox("resource-camera", "camera", false),
            Control::text("title", ""),
        ]);

        assert_eq!(page.remove_prefixed("resource-"), 2);
        assert_eq!(
            page.controls().map(|c| c.id.as_str()).collect::<Vec<_>>(),
            vec!["title"]
        );
    }

    #[test]
    fn error_indicators() {
        let mut page = Page::new();
        page.show_error(Some("titleError"), Some("titleLabel"));
        assert!(page.is_error_visible("titleError"));
        assert!(page.is_label_highlighted("titleLabel"));

        page.hide_error(Some("titleError"), Some("titleLabel"));
        assert!(!page.is_error_visible("titleError"));
        assert!(!page.is_label_highlighted("titleLabel"));
    }
}
