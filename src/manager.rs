// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Validation, serialization and population of a whole form

use crate::{
    catalog::{BuildContext, FormKind},
    document::{DocumentTree, MetadataDocument, METADATA_LIST},
    error::{FormError, Result},
    field::Field,
    page::Page,
    registry::Registry,
};

/// Field names rendered as direct children of the document root
pub const DEFAULT_PROMOTED: [&str; 2] = ["eventId", "recurrence"];

/// Outcome of validating every field of a form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Names of the failing fields in registry order
    pub failed: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Runs form level operations over one registry
#[derive(Debug)]
pub struct FormManager {
    registry: Registry,
    root: String,
    namespace: Option<String>,
    promoted: Vec<String>,
}

impl FormManager {
    pub fn new(registry: Registry, root: impl Into<String>, namespace: Option<String>) -> Self {
        Self {
            registry,
            root: root.into(),
            namespace,
            promoted: DEFAULT_PROMOTED.iter().map(|name| (*name).to_owned()).collect(),
        }
    }

    /// Builds the registry of `kind` against `page`
    pub fn for_form(
        kind: FormKind,
        page: &Page,
        context: &BuildContext,
        namespace: Option<String>,
    ) -> Result<Self> {
        let registry = Registry::build(page, kind.specs(context))?;
        Ok(Self::new(registry, kind.root_element(), namespace))
    }

    pub fn with_promoted<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.promoted = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn is_promoted(&self, field: &Field) -> bool {
        self.promoted.iter().any(|name| name == field.name())
    }

    /// Swaps in the registry of another mode, returning the previous one
    pub fn replace_registry(&mut self, registry: Registry, root: impl Into<String>) -> Registry {
        self.root = root.into();
        std::mem::replace(&mut self.registry, registry)
    }

    /// Validates every field and updates the error indicators of the page
    pub fn report(&self, page: &mut Page) -> Result<ValidationReport> {
        let mut report = ValidationReport::default();

        for field in self.registry.fields() {
            if self.registry.validate_field(field.name(), page)? {
                page.hide_error(field.error_ref(), field.label());
            } else {
                log::debug!("field `{}` failed validation", field.name());
                page.show_error(field.error_ref(), field.label());
                report.failed.push(field.name().to_owned());
            }
        }

        Ok(report)
    }

    pub fn validate(&self, page: &mut Page) -> Result<bool> {
        self.report(page).map(|report| report.is_valid())
    }

    /// Validates and renders the form
    ///
    /// Returns `None` when a field failed validation, the failing fields then have their
    /// error indicators shown.
    pub fn serialize(&self, page: &mut Page) -> Result<Option<MetadataDocument>> {
        if !self.validate(page)? {
            return Ok(None);
        }

        self.render(page).map(Some)
    }

    /// Renders the current values without validating them
    pub fn render(&self, page: &Page) -> Result<MetadataDocument> {
        let mut tree = DocumentTree::new(&self.root, self.namespace.as_deref());
        let root = tree.root();

        for field in self.registry.fields().filter(|field| self.is_promoted(field)) {
            let value = match self.registry.value_of(field.name(), page) {
                Ok(value) => value.to_string(),
                Err(err) if err.is_user_input() => {
                    log::trace!("promoted field `{}` has no value: {err}", field.name());
                    continue;
                }
                Err(err) => return Err(err),
            };

            tree.append_text_element(root, field.key(), &value)
                .map_err(|missing| FormError::DomAttach {
                    field: field.name().to_owned(),
                    node: missing.0.index(),
                })?;
        }

        let list = tree
            .append_element(root, METADATA_LIST)
            .map_err(|missing| FormError::DomAttach {
                field: METADATA_LIST.to_owned(),
                node: missing.0.index(),
            })?;

        for field in self.registry.fields().filter(|field| !self.is_promoted(field)) {
            self.registry
                .render_field(field.name(), page, &mut tree, list)?;
        }

        MetadataDocument::from_tree(&tree)
    }

    /// Writes the values of `document` into the page
    ///
    /// Fields are looked up by metadata key, name and aliases, fields rendered per control by
    /// the ids of their controls. Fields without a value in the document keep their current
    /// state, values a field cannot take are skipped.
    pub fn populate(&self, page: &mut Page, document: &MetadataDocument) -> Result<()> {
        for field in self.registry.evaluation_order() {
            match self.registry.populate_field(field.name(), page, document) {
                Ok(()) => {}
                Err(err) if err.is_user_input() => {
                    log::warn!("skipped value for `{}`: {err}", field.name());
                }
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }
}
