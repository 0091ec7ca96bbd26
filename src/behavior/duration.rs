// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

use super::{control_number, control_text, set_control, END_DATE_KEY};
use crate::{
    document::{DocumentTree, MetadataDocument, NodeId},
    error::{FormError, Result},
    field::{
        ensure_attachable, populate_by_key, render_pair, Field, FieldBehavior, FieldValue, Inputs,
    },
    page::Page,
};

const HOURS: usize = 0;
const MINUTES: usize = 1;

const MINUTE_MS: i64 = 60 * 1000;
const HOUR_MS: i64 = 60 * MINUTE_MS;

/// Hours and minutes controls assembled into a duration in milliseconds
///
/// With a start field the end of the recording is rendered next to the duration.
#[derive(Debug, Clone, Default)]
pub struct DurationBehavior {
    start: Option<String>,
}

impl DurationBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the field holding the start instant, declared as a dependency of the field
    pub fn ending_after(start: impl Into<String>) -> Self {
        Self {
            start: Some(start.into()),
        }
    }

    fn millis(field: &Field, page: &Page) -> Result<i64> {
        if Self::is_empty(field, page) {
            return Err(FormError::not_ready(field.name(), "no duration entered"));
        }

        let hours = control_number(field, page, HOURS, u32::MAX)?;
        let minutes = control_number(field, page, MINUTES, u32::MAX)?;

        Ok(i64::from(hours) * HOUR_MS + i64::from(minutes) * MINUTE_MS)
    }

    fn is_empty(field: &Field, page: &Page) -> bool {
        control_text(field, page, HOURS).trim().is_empty()
            && control_text(field, page, MINUTES).trim().is_empty()
    }
}

impl FieldBehavior for DurationBehavior {
    fn get_value(&self, field: &Field, page: &Page, _inputs: &Inputs) -> Result<FieldValue> {
        Self::millis(field, page).map(FieldValue::Duration)
    }

    fn dependencies(&self) -> Vec<String> {
        self.start.iter().cloned().collect()
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

    fn set_value(
        &self,
        field: &Field,
        page: &mut Page,
        value: &FieldValue,
        _inputs: &Inputs,
    ) -> Result<()> {
        if value.is_empty() {
            return Ok(());
        }

        let ms = value
            .as_millis()
            .filter(|ms| *ms >= 0)
            .ok_or_else(|| {
                FormError::invalid_value(field.name(), &value.to_string(), "expected a duration")
            })?;

        set_control(field, page, HOURS, (ms / HOUR_MS).to_string());
        set_control(field, page, MINUTES, ((ms % HOUR_MS) / MINUTE_MS).to_string());

        Ok(())
    }

    fn validate(&self, field: &Field, page: &Page, _inputs: &Inputs) -> bool {
        match Self::millis(field, page) {
            Ok(ms) => !field.is_required() || ms > 0,
            Err(_) => !field.is_required() && Self::is_empty(field, page),
        }
    }

    fn render(
        &self,
        field: &Field,
        page: &Page,
        inputs: &Inputs,
        tree: &mut DocumentTree,
        parent: NodeId,
    ) -> Result<Vec<NodeId>> {
        ensure_attachable(field, tree, parent)?;

        let duration = Self::millis(field, page).ok();
        let value = duration.map(|ms| ms.to_string()).unwrap_or_default();
        let mut nodes = vec![render_pair(field, tree, parent, field.key(), &value)?];

        let start = self.start.as_deref().and_then(|start| inputs.millis(start));
        let end = start
            .zip(duration)
            .and_then(|(start, duration)| start.checked_add(duration));
        if let Some(end) = end {
            nodes.push(render_pair(field, tree, parent, END_DATE_KEY, &end.to_string())?);
        }

        Ok(nodes)
    }

    fn as_string(&self, field: &Field, page: &Page, _inputs: &Inputs) -> Result<String> {
        let ms = Self::millis(field, page)?;

        Ok(format!(
            "{} hours, {} minutes",
            ms / HOUR_MS,
            (ms % HOUR_MS) / MINUTE_MS
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{document::METADATA_LIST, field::FieldSpec, page::Control, registry::Registry};
    use pretty_assertions::assert_eq;

    fn page(hours: &str, minutes: &str) -> Page {
        Page::with_controls([
            Control::select("durationHour", hours),
            Control::select("durationMin", minutes),
        ])
    }

    fn field(page: &Page) -> Field {
        FieldSpec::new("duration")
            .controls(["durationHour", "durationMin"])
            .metadata_key("duration")
            .required(true)
            .behavior(DurationBehavior::ending_after("startDate"))
            .bind(page)
    }

    #[test]
    fn hours_and_minutes_to_millis() {
        let page = page("1", "30");
        let field = field(&page);
        let inputs = Inputs::new().with("startDate", FieldValue::Epoch(1_705_329_000_000));

        assert_eq!(
            field.get_value(&page, &inputs).unwrap(),
            FieldValue::Duration(5_400_000)
        );
        assert_eq!(
            field.as_string(&page, &inputs).unwrap(),
            "1 hours, 30 minutes"
        );
    }

    #[test]
    fn renders_end_date_from_start() {
        let page = page("1", "30");
        let field = field(&page);
        let inputs = Inputs::new().with("startDate", FieldValue::Epoch(1_705_329_000_000));

        let mut tree = DocumentTree::new("event", None);
        let list = tree.append_element(tree.root(), METADATA_LIST).unwrap();
        field.render(&page, &inputs, &mut tree, list).unwrap();

        let document = MetadataDocument::from_tree(&tree).unwrap();
        assert_eq!(document.metadata_list.len(), 2);
        assert_eq!(document.get("duration"), Some("5400000"));
        assert_eq!(document.get("endDate"), Some("1705334400000"));
    }

    #[test]
    fn no_end_date_without_start() {
        let page = page("0", "45");
        let field = field(&page);

        let mut tree = DocumentTree::new("event", None);
        let root = tree.root();
        let nodes = field.render(&page, &Inputs::new(), &mut tree, root).unwrap();

        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn end_date_out_of_range_is_left_out() {
        let page = page("1", "0");
        let field = field(&page);
        let inputs = Inputs::new().with("startDate", FieldValue::Epoch(i64::MAX));

        let mut tree = DocumentTree::new("event", None);
        let root = tree.root();
        let nodes = field.render(&page, &inputs, &mut tree, root).unwrap();

        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn start_is_a_declared_dependency() {
        let page = page("1", "0");
        assert_eq!(field(&page).depends_on().to_vec(), vec!["startDate".to_owned()]);

        let result = Registry::build(
            &page,
            [FieldSpec::new("duration")
                .controls(["durationHour", "durationMin"])
                .behavior(DurationBehavior::ending_after("begin"))],
        );
        assert!(matches!(
            result,
            Err(FormError::UnknownDependency { .. })
        ));
    }

    #[test]
    fn zero_duration_is_invalid_when_required() {
        let page = page("0", "0");
        assert!(!field(&page).validate(&page, &Inputs::new()));

        let page = self::page("", "");
        assert!(!field(&page).validate(&page, &Inputs::new()));
    }

    #[test]
    fn set_value_splits_hours_and_minutes() {
        let mut page = page("", "");
        let field = field(&page);

        field
            .set_value(&mut page, &"5400000".into(), &Inputs::new())
            .unwrap();

        assert_eq!(page.value("durationHour"), "1");
        assert_eq!(page.value("durationMin"), "30");
        assert!(field
            .set_value(&mut page, &"-1".into(), &Inputs::new())
            .is_err());
    }
}
