// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! The named set of fields active for one form mode

use crate::{
    document::{DocumentTree, MetadataDocument, NodeId},
    error::{FormError, Result},
    field::{Field, FieldSpec, FieldValue, Inputs},
    page::Page,
};
use indexmap::IndexMap;

/// Fields by name in declaration order
///
/// Declared dependencies are checked when the registry is built. Values of dependencies are
/// computed whenever a field operation runs, nothing is carried over between calls.
#[derive(Debug, Default)]
pub struct Registry {
    fields: IndexMap<String, Field>,
    order: Vec<usize>,
}

impl Registry {
    /// Binds all specs against the page
    ///
    /// Fails on duplicate names, dependencies on unknown fields and dependency cycles.
    pub fn build<I>(page: &Page, specs: I) -> Result<Self>
    where
        I: IntoIterator<Item = FieldSpec>,
    {
        let mut fields = IndexMap::new();

        for spec in specs {
            let name = spec.name().to_owned();
            if fields.contains_key(&name) {
                return Err(FormError::DuplicateField(name));
            }
            fields.insert(name, spec.bind(page));
        }

        for field in fields.values() {
            if let Some(dependency) = field
                .depends_on()
                .iter()
                .find(|dependency| !fields.contains_key(*dependency))
            {
                return Err(FormError::UnknownDependency {
                    field: field.name().to_owned(),
                    dependency: dependency.clone(),
                });
            }
        }

        let order = evaluation_order(&fields)?;

        log::debug!("built registry with {} fields", fields.len());

        Ok(Self { fields, order })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn field(&self, name: &str) -> Result<&Field> {
        self.get(name)
            .ok_or_else(|| FormError::UnknownField(name.to_owned()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Fields in declaration order, which is also the document order
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    /// Fields ordered so that every field comes after its dependencies
    pub fn evaluation_order(&self) -> impl Iterator<Item = &Field> {
        self.order
            .iter()
            .filter_map(|index| self.fields.get_index(*index).map(|(_, field)| field))
    }

    /// Current values of the dependencies of `name`
    ///
    /// Dependencies that cannot compute a value are left out.
    pub fn inputs_for(&self, name: &str, page: &Page) -> Result<Inputs> {
        let field = self.field(name)?;
        let mut inputs = Inputs::new();

        for dependency in field.depends_on() {
            match self.value_of(dependency, page) {
                Ok(value) => inputs.insert(dependency.clone(), value),
                Err(err) if err.is_user_input() => {
                    log::trace!("`{name}` evaluated without `{dependency}`: {err}");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(inputs)
    }

    pub fn value_of(&self, name: &str, page: &Page) -> Result<FieldValue> {
        let inputs = self.inputs_for(name, page)?;
        self.field(name)?.get_value(page, &inputs)
    }

    pub fn set_value(&self, name: &str, page: &mut Page, value: &FieldValue) -> Result<()> {
        let inputs = self.inputs_for(name, page)?;
        self.field(name)?.set_value(page, value, &inputs)
    }

    pub fn populate_field(
        &self,
        name: &str,
        page: &mut Page,
        document: &MetadataDocument,
    ) -> Result<()> {
        let inputs = self.inputs_for(name, page)?;
        self.field(name)?.populate(page, document, &inputs)
    }

    pub fn validate_field(&self, name: &str, page: &Page) -> Result<bool> {
        let inputs = self.inputs_for(name, page)?;
        Ok(self.field(name)?.validate(page, &inputs))
    }

    pub fn as_string(&self, name: &str, page: &Page) -> Result<String> {
        let inputs = self.inputs_for(name, page)?;
        self.field(name)?.as_string(page, &inputs)
    }

    pub fn render_field(
        &self,
        name: &str,
        page: &Page,
        tree: &mut DocumentTree,
        parent: NodeId,
    ) -> Result<Vec<NodeId>> {
        let inputs = self.inputs_for(name, page)?;
        self.field(name)?.render(page, &inputs, tree, parent)
    }
}

/// Topological order of the fields, stable with respect to declaration order
fn evaluation_order(fields: &IndexMap<String, Field>) -> Result<Vec<usize>> {
    let mut placed = vec![false; fields.len()];
    let mut order = Vec::with_capacity(fields.len());

    while order.len() < fields.len() {
        let next = fields.values().enumerate().position(|(index, field)| {
            !placed[index]
                && field.depends_on().iter().all(|dependency| {
                    fields
                        .get_index_of(dependency)
                        .map(|index| placed[index])
                        .unwrap_or(false)
                })
        });

        match next {
            Some(index) => {
                placed[index] = true;
                order.push(index);
            }
            None => return Err(FormError::DependencyCycle(find_cycle(fields, &placed))),
        }
    }

    Ok(order)
}

/// Follows unplaced dependencies until a field repeats
fn find_cycle(fields: &IndexMap<String, Field>, placed: &[bool]) -> Vec<String> {
    let Some(mut current) = placed.iter().position(|placed| !placed) else {
        return Vec::new();
    };
    let mut path: Vec<usize> = Vec::new();

    loop {
        if let Some(start) = path.iter().position(|index| *index == current) {
            let mut cycle: Vec<String> = path[start..]
                .iter()
                .filter_map(|index| fields.get_index(*index).map(|(name, _)| name.clone()))
                .collect();
            if let Some(first) = cycle.first().cloned() {
                cycle.push(first);
            }
            return cycle;
        }
        path.push(current);

        let next = fields.get_index(current).and_then(|(_, field)| {
            field
                .depends_on()
                .iter()
                .filter_map(|dependency| fields.get_index_of(dependency))
                .find(|index| !placed[*index])
        });

        match next {
            Some(next) => current = next,
            None => return Vec::new(),
        }
    }
}
