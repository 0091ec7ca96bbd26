// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

use super::{control_number, control_text, instant_of, parse_date, set_control, Clock, Zone};
use crate::{
    document::{DocumentTree, MetadataDocument, NodeId},
    error::{FormError, Result},
    field::{
        ensure_attachable, populate_by_key, render_pair, Field, FieldBehavior, FieldValue, Inputs,
    },
    page::Page,
};
use chrono::Timelike;

const DATE: usize = 0;
const HOUR: usize = 1;
const MINUTE: usize = 2;

/// Date, hour and minute controls assembled into one instant
///
/// The controls show local time of the capture agent, or of the configured timezone.
#[derive(Debug, Clone)]
pub struct DateTimeBehavior {
    zone: Zone,
    not_before: Option<Clock>,
}

impl DateTimeBehavior {
    pub fn new(zone: impl Into<Zone>) -> Self {
        Self {
            zone: zone.into(),
            not_before: None,
        }
    }

    /// Rejects instants before the current time of `clock`
    pub fn not_in_past(mut self, clock: Clock) -> Self {
        self.not_before = Some(clock);
        self
    }

    fn instant(&self, field: &Field, page: &Page) -> Result<i64> {
        let date_text = control_text(field, page, DATE);
        if date_text.trim().is_empty() {
            return Err(FormError::not_ready(field.name(), "no date selected"));
        }

        let date = parse_date(date_text).ok_or_else(|| {
            FormError::not_ready(field.name(), format!("cannot parse date `{date_text}`"))
        })?;
        let hour = control_number(field, page, HOUR, 23)?;
        let minute = control_number(field, page, MINUTE, 59)?;

        date.and_hms_opt(hour, minute, 0)
            .and_then(|local| self.zone.instant(&local))
            .ok_or_else(|| FormError::not_ready(field.name(), "invalid time of day"))
    }

    fn is_empty(field: &Field, page: &Page) -> bool {
        control_text(field, page, DATE).trim().is_empty()
    }
}

impl FieldBehavior for DateTimeBehavior {
    fn get_value(&self, field: &Field, page: &Page, _inputs: &Inputs) -> Result<FieldValue> {
        self.instant(field, page).map(FieldValue::Epoch)
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

        let local = instant_of(value)
            .and_then(|ms| self.zone.local(ms))
            .ok_or_else(|| {
                FormError::invalid_value(field.name(), &value.to_string(), "expected a timestamp")
            })?;

        set_control(field, page, DATE, local.format("%Y-%m-%d").to_string());
        set_control(field, page, HOUR, local.hour().to_string());
        set_control(field, page, MINUTE, local.minute().to_string());

        Ok(())
    }

    fn validate(&self, field: &Field, page: &Page, _inputs: &Inputs) -> bool {
        match self.instant(field, page) {
            Ok(ms) => match &self.not_before {
                Some(clock) => ms >= clock.now().timestamp_millis(),
                None => true,
            },
            Err(_) => !field.is_required() && Self::is_empty(field, page),
        }
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

        let value = self
            .instant(field, page)
            .map(|ms| ms.to_string())
            .unwrap_or_default();

        Ok(vec![render_pair(field, tree, parent, field.key(), &value)?])
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

    fn as_string(&self, field: &Field, page: &Page, _inputs: &Inputs) -> Result<String> {
        let ms = self.instant(field, page)?;
        let local = self
            .zone
            .local(ms)
            .ok_or_else(|| FormError::not_ready(field.name(), "timestamp out of range"))?;

        Ok(local.format("%Y-%m-%d %H:%M").to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{field::FieldSpec, page::Control};
    use chrono::{FixedOffset, TimeZone, Utc};
    use chrono_tz::Tz;
    use pretty_assertions::assert_eq;

    fn page(date: &str, hour: &str, minute: &str) -> Page {
        Page::with_controls([
            Control::text("startDate", date),
            Control::select("startTimeHour", hour),
            Control::select("startTimeMin", minute),
        ])
    }

    fn field(page: &Page, behavior: DateTimeBehavior) -> Field {
        FieldSpec::new("startDate")
            .controls(["startDate", "startTimeHour", "startTimeMin"])
            .required(true)
            .behavior(behavior)
            .bind(page)
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn local_time_to_epoch_and_back() {
        let mut page = page("2024-01-15", "14", "30");
        let field = field(&page, DateTimeBehavior::new(utc()));
        let none = Inputs::new();

        let value = field.get_value(&page, &none).unwrap();
        assert_eq!(value, FieldValue::Epoch(1_705_329_000_000));

        let mut cleared = self::page("", "", "");
        field.set_value(&mut cleared, &value, &none).unwrap();
        assert_eq!(cleared.value("startDate"), "2024-01-15");
        assert_eq!(cleared.value("startTimeHour"), "14");
        assert_eq!(cleared.value("startTimeMin"), "30");

        field.set_value(&mut page, &value, &none).unwrap();
        assert_eq!(field.get_value(&page, &none).unwrap(), value);
    }

    #[test]
    fn offset_is_applied() {
        let page = page("01/15/2024", "14", "30");
        let field = field(
            &page,
            DateTimeBehavior::new(FixedOffset::east_opt(3600).unwrap()),
        );

        assert_eq!(
            field.get_value(&page, &Inputs::new()).unwrap(),
            FieldValue::Epoch(1_705_325_400_000)
        );
        assert_eq!(
            field.as_string(&page, &Inputs::new()).unwrap(),
            "2024-01-15 14:30"
        );
    }

    #[test]
    fn named_zone_uses_the_offset_of_the_date() {
        let summer = page("2024-07-15", "14", "0");
        let field = field(&summer, DateTimeBehavior::new(Tz::Europe__Berlin));

        assert_eq!(
            field.get_value(&summer, &Inputs::new()).unwrap(),
            FieldValue::Epoch(1_721_044_800_000)
        );

        let winter = page("2024-01-15", "14", "30");
        assert_eq!(
            field.get_value(&winter, &Inputs::new()).unwrap(),
            FieldValue::Epoch(1_705_325_400_000)
        );

        let mut cleared = page("", "", "");
        field
            .set_value(&mut cleared, &FieldValue::Epoch(1_721_044_800_000), &Inputs::new())
            .unwrap();
        assert_eq!(cleared.value("startDate"), "2024-07-15");
        assert_eq!(cleared.value("startTimeHour"), "14");
    }

    #[test]
    fn missing_date_is_not_ready() {
        let page = page("", "14", "30");
        let field = field(&page, DateTimeBehavior::new(utc()));

        assert!(matches!(
            field.get_value(&page, &Inputs::new()),
            Err(FormError::NotReady { .. })
        ));
        assert!(!field.validate(&page, &Inputs::new()));
    }

    #[test]
    fn invalid_hour_is_not_ready() {
        let page = page("2024-01-15", "25", "0");
        let field = field(&page, DateTimeBehavior::new(utc()));

        assert!(field.get_value(&page, &Inputs::new()).is_err());
    }

    #[test]
    fn past_dates_are_rejected() {
        let page = page("2024-01-15", "14", "30");
        let clock = Clock::fixed(Utc.with_ymd_and_hms(2024, 1, 15, 15, 0, 0).unwrap());
        let field = field(&page, DateTimeBehavior::new(utc()).not_in_past(clock));
        assert!(!field.validate(&page, &Inputs::new()));

        let clock = Clock::fixed(Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap());
        let field = self::field(&page, DateTimeBehavior::new(utc()).not_in_past(clock));
        assert!(field.validate(&page, &Inputs::new()));
    }

    #[test]
    fn unexpected_value_is_rejected_without_change() {
        let mut page = page("2024-01-15", "14", "30");
        let field = field(&page, DateTimeBehavior::new(utc()));

        let result = field.set_value(&mut page, &"next tuesday".into(), &Inputs::new());

        assert!(matches!(result, Err(FormError::InvalidValue { .. })));
        assert_eq!(page.value("startDate"), "2024-01-15");
    }
}
