// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Fields bind one logical metadata value to one or more controls of a [`Page`]

use crate::{
    document::{DocumentTree, MetadataDocument, NodeId},
    error::{FormError, Result},
    page::{Control, ControlKind, Page},
};
use parking_lot::Mutex;
use std::{collections::HashMap, fmt, sync::Arc};

/// The value of a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    /// Milliseconds since the unix epoch
    Epoch(i64),
    /// A time span in milliseconds
    Duration(i64),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Text(text) if text.is_empty())
    }

    /// Millisecond representation of epoch/duration values or of numeric text
    pub fn as_millis(&self) -> Option<i64> {
        match self {
            Self::Epoch(ms) | Self::Duration(ms) => Some(*ms),
            Self::Text(text) => text.trim().parse().ok(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Epoch(ms) | Self::Duration(ms) => write!(f, "{ms}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Values of the fields a field depends on
///
/// Only dependencies that could compute a value are present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inputs {
    values: HashMap<String, FieldValue>,
}

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn millis(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(FieldValue::as_millis)
    }
}

/// Strategy for the operations of a field
///
/// Every operation defaults to the generic control based implementation, a behavior only
/// overrides what it needs.
pub trait FieldBehavior: fmt::Debug + Send + Sync {
    fn get_value(&self, field: &Field, page: &Page, _inputs: &Inputs) -> Result<FieldValue> {
        Ok(generic_value(field, page))
    }

    fn set_value(
        &self,
        field: &Field,
        page: &mut Page,
        value: &FieldValue,
        _inputs: &Inputs,
    ) -> Result<()> {
        generic_set_value(field, page, value);
        Ok(())
    }

    fn validate(&self, field: &Field, page: &Page, _inputs: &Inputs) -> bool {
        generic_validate(field, page)
    }

    fn render(
        &self,
        field: &Field,
        page: &Page,
        _inputs: &Inputs,
        tree: &mut DocumentTree,
        parent: NodeId,
    ) -> Result<Vec<NodeId>> {
        generic_render(field, page, tree, parent)
    }

    fn as_string(&self, field: &Field, page: &Page, inputs: &Inputs) -> Result<String> {
        self.get_value(field, page, inputs).map(|value| value.to_string())
    }

    /// Reads the field back from a document produced by [`FieldBehavior::render`]
    fn populate(
        &self,
        field: &Field,
        page: &mut Page,
        document: &MetadataDocument,
        inputs: &Inputs,
    ) -> Result<()> {
        generic_populate(self, field, page, document, inputs)
    }

    /// Fields whose values this behavior reads from its [`Inputs`]
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Plain behavior without any overrides
#[derive(Debug, Clone, Copy, Default)]
pub struct Generic;

impl FieldBehavior for Generic {}

/// Declaration of a field before it is bound to a page
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    controls: Vec<String>,
    required: bool,
    label: Option<String>,
    error_ref: Option<String>,
    metadata_key: Option<String>,
    aliases: Vec<String>,
    depends_on: Vec<String>,
    behavior: Arc<dyn FieldBehavior>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            controls: Vec::new(),
            required: false,
            label: None,
            error_ref: None,
            metadata_key: None,
            aliases: Vec::new(),
            depends_on: Vec::new(),
            behavior: Arc::new(Generic),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn control(mut self, id: impl Into<String>) -> Self {
        self.controls.push(id.into());
        self
    }

    pub fn controls<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.controls.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn error_ref(mut self, error_ref: impl Into<String>) -> Self {
        self.error_ref = Some(error_ref.into());
        self
    }

    pub fn metadata_key(mut self, key: impl Into<String>) -> Self {
        self.metadata_key = Some(key.into());
        self
    }

    /// Further document key accepted when populating
    pub fn alias(mut self, key: impl Into<String>) -> Self {
        self.aliases.push(key.into());
        self
    }

    pub fn depends_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names.into_iter().map(Into::into) {
            if !self.depends_on.contains(&name) {
                self.depends_on.push(name);
            }
        }
        self
    }

    /// Sets the behavior and declares the fields it reads as dependencies
    pub fn behavior(self, behavior: impl FieldBehavior + 'static) -> Self {
        let dependencies = behavior.dependencies();
        let mut spec = self.depends_on(dependencies);
        spec.behavior = Arc::new(behavior);
        spec
    }

    /// Resolves the declared controls against the page
    ///
    /// Controls that do not exist are left out of the bound set instead of failing.
    pub fn bind(self, page: &Page) -> Field {
        let bound: Vec<String> = self
            .controls
            .iter()
            .filter(|id| page.contains(id))
            .cloned()
            .collect();

        if bound.len() != self.controls.len() {
            log::warn!(
                "field `{}` bound {} of {} controls",
                self.name,
                bound.len(),
                self.controls.len()
            );
        }

        Field {
            spec: self,
            bound,
            cached: Mutex::new(None),
        }
    }
}

/// Which of the declared controls of a field could be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding<'a> {
    pub declared: &'a [String],
    pub bound: &'a [String],
}

impl Binding<'_> {
    pub fn missing(&self) -> Vec<&str> {
        self.declared
            .iter()
            .filter(|id| !self.bound.contains(id))
            .map(String::as_str)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.declared.len() == self.bound.len()
    }

    pub fn is_unbound(&self) -> bool {
        self.bound.is_empty()
    }
}

/// A field bound to the controls of a page
#[derive(Debug)]
pub struct Field {
    spec: FieldSpec,
    bound: Vec<String>,
    cached: Mutex<Option<FieldValue>>,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Key under which the value appears in the metadata document
    ///
    /// Without a metadata key this is the first bound control, the first declared control
    /// for an unbound field, and the name for a field without controls.
    pub fn key(&self) -> &str {
        self.spec
            .metadata_key
            .as_deref()
            .or_else(|| self.bound.first().map(String::as_str))
            .or_else(|| self.spec.controls.first().map(String::as_str))
            .unwrap_or(&self.spec.name)
    }

    pub fn metadata_key(&self) -> Option<&str> {
        self.spec.metadata_key.as_deref()
    }

    pub fn aliases(&self) -> &[String] {
        &self.spec.aliases
    }

    pub fn is_required(&self) -> bool {
        self.spec.required
    }

    pub fn label(&self) -> Option<&str> {
        self.spec.label.as_deref()
    }

    pub fn error_ref(&self) -> Option<&str> {
        self.spec.error_ref.as_deref()
    }

    pub fn depends_on(&self) -> &[String] {
        &self.spec.depends_on
    }

    pub fn binding(&self) -> Binding<'_> {
        Binding {
            declared: &self.spec.controls,
            bound: &self.bound,
        }
    }

    pub fn bound_controls(&self) -> &[String] {
        &self.bound
    }

    /// Bound control at `index` of the declared order, if it resolved
    pub fn declared_control(&self, index: usize) -> Option<&str> {
        self.spec
            .controls
            .get(index)
            .filter(|id| self.bound.contains(id))
            .map(String::as_str)
    }

    /// The last value computed by [`Field::get_value`], safe to discard
    pub fn cached_value(&self) -> Option<FieldValue> {
        self.cached.lock().clone()
    }

    pub fn get_value(&self, page: &Page, inputs: &Inputs) -> Result<FieldValue> {
        let value = self.spec.behavior.get_value(self, page, inputs)?;
        *self.cached.lock() = Some(value.clone());
        Ok(value)
    }

    pub fn set_value(&self, page: &mut Page, value: &FieldValue, inputs: &Inputs) -> Result<()> {
        self.cached.lock().take();
        self.spec.behavior.set_value(self, page, value, inputs)
    }

    pub fn validate(&self, page: &Page, inputs: &Inputs) -> bool {
        self.spec.behavior.validate(self, page, inputs)
    }

    pub fn render(
        &self,
        page: &Page,
        inputs: &Inputs,
        tree: &mut DocumentTree,
        parent: NodeId,
    ) -> Result<Vec<NodeId>> {
        self.spec.behavior.render(self, page, inputs, tree, parent)
    }

    pub fn as_string(&self, page: &Page, inputs: &Inputs) -> Result<String> {
        self.spec.behavior.as_string(self, page, inputs)
    }

    pub fn populate(
        &self,
        page: &mut Page,
        document: &MetadataDocument,
        inputs: &Inputs,
    ) -> Result<()> {
        self.cached.lock().take();
        self.spec.behavior.populate(self, page, document, inputs)
    }

    fn bound<'p>(&'p self, page: &'p Page) -> impl Iterator<Item = &'p Control> + 'p {
        self.bound.iter().filter_map(move |id| page.control(id))
    }
}

fn single_control_value(control: &Control) -> String {
    match control.kind {
        ControlKind::Checkbox | ControlKind::Radio => control.checked.to_string(),
        ControlKind::SelectMultiple => control.selected.join(","),
        _ => control.value.clone(),
    }
}

fn matches_token(control: &Control, token: &str) -> bool {
    token.eq_ignore_ascii_case("true") || token == control.value
}

/// Comma joined value of the bound controls
pub fn generic_value(field: &Field, page: &Page) -> FieldValue {
    let controls: Vec<&Control> = field.bound(page).collect();

    if let [control] = controls.as_slice() {
        return FieldValue::Text(single_control_value(control));
    }

    let mut values: Vec<&str> = Vec::new();
    for control in controls {
        match control.kind {
            ControlKind::Checkbox | ControlKind::Radio => {
                if control.checked {
                    values.push(&control.value);
                }
            }
            ControlKind::SelectMultiple => {
                values.extend(control.selected.iter().map(String::as_str));
            }
            _ => {
                if !control.value.is_empty() {
                    values.push(&control.value);
                }
            }
        }
    }

    FieldValue::Text(values.join(","))
}

/// Inverse of [`single_control_value`]
fn write_control(control: &mut Control, text: &str) {
    match control.kind {
        ControlKind::Checkbox | ControlKind::Radio => {
            let checked = matches_token(control, text);
            control.checked = checked;
        }
        ControlKind::SelectMultiple => control.selected = tokens(text),
        _ => control.value = text.to_owned(),
    }
}

/// Writes a value into the bound controls, inverse of [`generic_value`]
pub fn generic_set_value(field: &Field, page: &mut Page, value: &FieldValue) {
    let text = value.to_string();

    if let [id] = field.bound.as_slice() {
        if let Some(control) = page.control_mut(id) {
            write_control(control, &text);
        }
        return;
    }

    let tokens = tokens(&text);
    let mut positional = tokens.iter();

    for id in &field.bound {
        let Some(control) = page.control_mut(id) else {
            continue;
        };

        match control.kind {
            ControlKind::Checkbox | ControlKind::Radio => {
                let checked = tokens.iter().any(|token| matches_token(control, token));
                control.checked = checked;
            }
            ControlKind::SelectMultiple => control.selected = tokens.clone(),
            _ => control.value = positional.next().cloned().unwrap_or_default(),
        }
    }
}

/// Required fields need at least one filled control
pub fn generic_validate(field: &Field, page: &Page) -> bool {
    !field.is_required() || field.bound(page).any(Control::is_filled)
}

/// One metadata pair per bound control, or a single pair when a metadata key is set
pub fn generic_render(
    field: &Field,
    page: &Page,
    tree: &mut DocumentTree,
    parent: NodeId,
) -> Result<Vec<NodeId>> {
    ensure_attachable(field, tree, parent)?;

    if let Some(key) = field.metadata_key() {
        let value = generic_value(field, page).to_string();
        return Ok(vec![render_pair(field, tree, parent, key, &value)?]);
    }

    let mut nodes = Vec::with_capacity(field.bound.len());
    for control in field.bound(page) {
        let value = single_control_value(control);
        nodes.push(render_pair(field, tree, parent, &control.id, &value)?);
    }

    Ok(nodes)
}

/// Inverse of [`generic_render`]
///
/// A field rendered per control reads every bound control from the entry keyed by its id,
/// controls without an entry keep their state. Other fields go through [`populate_by_key`].
pub fn generic_populate<B: FieldBehavior + ?Sized>(
    behavior: &B,
    field: &Field,
    page: &mut Page,
    document: &MetadataDocument,
    inputs: &Inputs,
) -> Result<()> {
    let per_control = field.metadata_key().is_none()
        && field.bound.len() > 1
        && field.bound.iter().any(|id| document.get(id).is_some());

    if !per_control {
        return populate_by_key(behavior, field, page, document, inputs);
    }

    for id in &field.bound {
        let (Some(text), Some(control)) = (document.get(id), page.control_mut(id)) else {
            continue;
        };
        write_control(control, text);
    }

    Ok(())
}

/// Sets the value found under the key, the name or an alias of the field
pub fn populate_by_key<B: FieldBehavior + ?Sized>(
    behavior: &B,
    field: &Field,
    page: &mut Page,
    document: &MetadataDocument,
    inputs: &Inputs,
) -> Result<()> {
    match document_value(field, document) {
        Some(value) => behavior.set_value(field, page, &FieldValue::text(value), inputs),
        None => Ok(()),
    }
}

pub fn document_value<'d>(field: &Field, document: &'d MetadataDocument) -> Option<&'d str> {
    document
        .get(field.key())
        .or_else(|| document.get(field.name()))
        .or_else(|| {
            field
                .aliases()
                .iter()
                .find_map(|alias| document.get(alias))
        })
}

pub fn ensure_attachable(field: &Field, tree: &DocumentTree, parent: NodeId) -> Result<()> {
    if tree.contains(parent) {
        Ok(())
    } else {
        Err(FormError::DomAttach {
            field: field.name().to_owned(),
            node: parent.index(),
        })
    }
}

/// Appends a metadata pair on behalf of `field`
pub fn render_pair(
    field: &Field,
    tree: &mut DocumentTree,
    parent: NodeId,
    key: &str,
    value: &str,
) -> Result<NodeId> {
    tree.append_metadata(parent, key, value)
        .map_err(|missing| FormError::DomAttach {
            field: field.name().to_owned(),
            node: missing.0.index(),
        })
}

fn tokens(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .collect()
}
