// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

use super::{control_text, set_control};
use crate::{
    document::{DocumentTree, MetadataDocument, NodeId},
    error::Result,
    field::{
        ensure_attachable, populate_by_key, render_pair, Field, FieldBehavior, FieldValue, Inputs,
    },
    page::Page,
};

const ID: usize = 0;
const NAME: usize = 1;

/// Series reference made of a hidden id and the visible series name
///
/// A name without an id means the series still has to be resolved, which makes the field
/// invalid until the id was written back.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeriesBehavior;

impl SeriesBehavior {
    fn id<'p>(field: &Field, page: &'p Page) -> &'p str {
        control_text(field, page, ID).trim()
    }

    fn name<'p>(field: &Field, page: &'p Page) -> &'p str {
        control_text(field, page, NAME).trim()
    }
}

impl FieldBehavior for SeriesBehavior {
    fn get_value(&self, field: &Field, page: &Page, _inputs: &Inputs) -> Result<FieldValue> {
        Ok(FieldValue::text(Self::id(field, page)))
    }

    fn set_value(
        &self,
        field: &Field,
        page: &mut Page,
        value: &FieldValue,
        _inputs: &Inputs,
    ) -> Result<()> {
        set_control(field, page, ID, value.to_string());
        Ok(())
    }

    fn populate(
        &self,
        field: &Field,
        page: &mut Page,
        document: &MetadataDocument,
        inputs: &Inputs,
    ) -> Result<()> {
        populate_by_key(self, field, page, document, inputs)
    }

    fn validate(&self, field: &Field, page: &Page, _inputs: &Inputs) -> bool {
        let id = Self::id(field, page);

        if id.is_empty() && !Self::name(field, page).is_empty() {
            log::debug!("series `{}` is not resolved yet", Self::name(field, page));
            return false;
        }

        !field.is_required() || !id.is_empty()
    }

    fn render(
        &self,
        field: &Field,
        page: &Page,
        _inputs: &Inputs,
        tree: &mut DocumentTree,
        parent: NodeId,
    ) -> Result<Vec<NodeId>> {
        ensure_attachable(field, tree, parent)?;

        Ok(vec![render_pair(
            field,
            tree,
            parent,
            field.key(),
            Self::id(field, page),
        )?])
    }

    fn as_string(&self, field: &Field, page: &Page, _inputs: &Inputs) -> Result<String> {
        let name = Self::name(field, page);
        if name.is_empty() {
            Ok(Self::id(field, page).to_owned())
        } else {
            Ok(name.to_owned())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{field::FieldSpec, page::Control};
    use pretty_assertions::assert_eq;

    fn page(id: &str, name: &str) -> Page {
        Page::with_controls([Control::hidden("seriesId", id), Control::text("series", name)])
    }

    fn field(page: &Page) -> Field {
        FieldSpec::new("seriesId")
            .controls(["seriesId", "series"])
            .metadata_key("seriesId")
            .behavior(SeriesBehavior)
            .bind(page)
    }

    #[test]
    fn unresolved_name_is_invalid() {
        let page = page("", "Physics 101");
        let field = field(&page);

        assert!(!field.validate(&page, &Inputs::new()));
        assert_eq!(field.as_string(&page, &Inputs::new()).unwrap(), "Physics 101");
    }

    #[test]
    fn resolved_series() {
        let mut page = page("", "Physics 101");
        let field = field(&page);

        field
            .set_value(&mut page, &"series-7".into(), &Inputs::new())
            .unwrap();

        assert!(field.validate(&page, &Inputs::new()));
        assert_eq!(
            field.get_value(&page, &Inputs::new()).unwrap(),
            FieldValue::text("series-7")
        );
        assert_eq!(page.value("series"), "Physics 101");
    }

    #[test]
    fn no_series_is_fine_unless_required() {
        let page = page("", "");

        assert!(field(&page).validate(&page, &Inputs::new()));

        let required = FieldSpec::new("seriesId")
            .controls(["seriesId", "series"])
            .required(true)
            .behavior(SeriesBehavior)
            .bind(&page);
        assert!(!required.validate(&page, &Inputs::new()));
    }
}
