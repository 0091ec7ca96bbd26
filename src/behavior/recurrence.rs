// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

use super::{
    control_text, instant_of, parse_date, parse_weekday_code, set_control, shift_weekday,
    weekday_code, Zone, END_DATE_KEY,
};
use crate::{
    document::{DocumentTree, MetadataDocument, NodeId},
    error::{FormError, Result},
    field::{
        ensure_attachable, populate_by_key, render_pair, Field, FieldBehavior, FieldValue, Inputs,
    },
    page::Page,
};
use chrono::{FixedOffset, Offset, TimeZone, Timelike, Utc, Weekday};
use std::fmt;

const MINUTES_PER_DAY: i64 = 24 * 60;

/// A weekly recurrence rule in UTC
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub days: Vec<Weekday>,
    pub hour: u32,
    pub minute: u32,
}

impl RecurrenceRule {
    /// Parses `FREQ=WEEKLY;BYDAY=MO,WE;BYHOUR=9;BYMINUTE=0`, the `RRULE:` prefix is optional
    pub fn parse(rule: &str) -> Option<Self> {
        let rule = rule.trim();
        let rule = rule.strip_prefix("RRULE:").unwrap_or(rule);

        let mut weekly = false;
        let mut days = Vec::new();
        let mut hour = 0;
        let mut minute = 0;

        for part in rule.split(';').filter(|part| !part.is_empty()) {
            let (name, value) = part.split_once('=')?;
            match name.trim().to_ascii_uppercase().as_str() {
                "FREQ" => weekly = value.trim().eq_ignore_ascii_case("WEEKLY"),
                "BYDAY" => {
                    days = value
                        .split(',')
                        .map(parse_weekday_code)
                        .collect::<Option<Vec<_>>>()?;
                }
                "BYHOUR" => hour = value.trim().parse().ok().filter(|h| *h < 24)?,
                "BYMINUTE" => minute = value.trim().parse().ok().filter(|m| *m < 60)?,
                _ => {}
            }
        }

        weekly.then_some(Self { days, hour, minute })
    }

    /// The weekdays in the given local offset
    pub fn local_days(&self, offset: FixedOffset) -> Vec<Weekday> {
        let local_minutes = i64::from(self.hour * 60 + self.minute)
            + i64::from(offset.local_minus_utc() / 60);
        let shift = local_minutes.div_euclid(MINUTES_PER_DAY);

        self.days
            .iter()
            .map(|day| shift_weekday(*day, shift))
            .collect()
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let days: Vec<&str> = self.days.iter().copied().map(weekday_code).collect();
        write!(
            f,
            "FREQ=WEEKLY;BYDAY={};BYHOUR={};BYMINUTE={}",
            days.join(","),
            self.hour,
            self.minute
        )
    }
}

/// Weekday checkboxes combined with the start time into a weekly recurrence rule
///
/// Checkbox values are weekday codes (`MO`, `TU`, ...). The rule is expressed in UTC, so
/// the selected days move when the start time crosses midnight in UTC.
#[derive(Debug, Clone)]
pub struct RecurrenceBehavior {
    start: String,
    zone: Zone,
}

impl RecurrenceBehavior {
    pub fn new(start: impl Into<String>, zone: impl Into<Zone>) -> Self {
        Self {
            start: start.into(),
            zone: zone.into(),
        }
    }

    fn selected_days(field: &Field, page: &Page) -> Vec<Weekday> {
        field
            .bound_controls()
            .iter()
            .filter_map(|id| page.control(id))
            .filter(|control| control.checked)
            .filter_map(|control| {
                let day = parse_weekday_code(&control.value);
                if day.is_none() {
                    log::warn!(
                        "`{}` of field `{}` is not a weekday",
                        control.value,
                        field.name()
                    );
                }
                day
            })
            .collect()
    }

    fn rule(&self, field: &Field, page: &Page, inputs: &Inputs) -> Result<RecurrenceRule> {
        let start = inputs
            .millis(&self.start)
            .ok_or_else(|| FormError::not_ready(field.name(), "recurrence start is not set"))?;
        let (utc, local) = Utc
            .timestamp_millis_opt(start)
            .single()
            .zip(self.zone.local(start))
            .ok_or_else(|| FormError::not_ready(field.name(), "start out of range"))?;
        let shift = (utc.date_naive() - local.date()).num_days();

        let days: Vec<Weekday> = Self::selected_days(field, page)
            .into_iter()
            .map(|day| shift_weekday(day, shift))
            .collect();
        if days.is_empty() {
            return Err(FormError::not_ready(field.name(), "no weekday selected"));
        }

        Ok(RecurrenceRule {
            days,
            hour: utc.hour(),
            minute: utc.minute(),
        })
    }
}

impl FieldBehavior for RecurrenceBehavior {
    fn get_value(&self, field: &Field, page: &Page, inputs: &Inputs) -> Result<FieldValue> {
        self.rule(field, page, inputs)
            .map(|rule| FieldValue::Text(rule.to_string()))
    }

    fn dependencies(&self) -> Vec<String> {
        vec![self.start.clone()]
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
        inputs: &Inputs,
    ) -> Result<()> {
        let text = value.to_string();
        if text.trim().is_empty() {
            return Ok(());
        }

        let rule = RecurrenceRule::parse(&text).ok_or_else(|| {
            FormError::invalid_value(field.name(), &text, "expected a weekly recurrence rule")
        })?;
        // the epoch stands in for a missing start
        let offset = self
            .zone
            .offset_at_millis(inputs.millis(&self.start).unwrap_or(0))
            .unwrap_or_else(|| Utc.fix());
        let days = rule.local_days(offset);

        for id in field.bound_controls() {
            if let Some(control) = page.control_mut(id) {
                let checked = parse_weekday_code(&control.value)
                    .map(|day| days.contains(&day))
                    .unwrap_or(false);
                control.checked = checked;
            }
        }

        Ok(())
    }

    fn validate(&self, field: &Field, page: &Page, inputs: &Inputs) -> bool {
        if !field.is_required() && Self::selected_days(field, page).is_empty() {
            return true;
        }

        self.rule(field, page, inputs).is_ok()
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

        let value = self
            .rule(field, page, inputs)
            .map(|rule| rule.to_string())
            .unwrap_or_default();

        Ok(vec![render_pair(field, tree, parent, field.key(), &value)?])
    }
}

/// Last day of a recurring series
///
/// The end instant is the selected date at the time of day of the recurrence start plus
/// the duration of a single recording.
#[derive(Debug, Clone)]
pub struct RecurrenceEndBehavior {
    start: String,
    duration: String,
    zone: Zone,
}

impl RecurrenceEndBehavior {
    pub fn new(
        start: impl Into<String>,
        duration: impl Into<String>,
        zone: impl Into<Zone>,
    ) -> Self {
        Self {
            start: start.into(),
            duration: duration.into(),
            zone: zone.into(),
        }
    }

    fn end(&self, field: &Field, page: &Page, inputs: &Inputs) -> Result<i64> {
        let date_text = control_text(field, page, 0);
        if date_text.trim().is_empty() {
            return Err(FormError::not_ready(field.name(), "no end date selected"));
        }
        let date = parse_date(date_text).ok_or_else(|| {
            FormError::not_ready(field.name(), format!("cannot parse date `{date_text}`"))
        })?;

        let start = inputs
            .millis(&self.start)
            .and_then(|ms| self.zone.local(ms))
            .ok_or_else(|| FormError::not_ready(field.name(), "recurrence start is not set"))?;
        let duration = inputs.millis(&self.duration).unwrap_or(0);

        self.zone
            .instant(&date.and_time(start.time()))
            .and_then(|end| end.checked_add(duration))
            .ok_or_else(|| FormError::not_ready(field.name(), "invalid end date"))
    }
}

impl FieldBehavior for RecurrenceEndBehavior {
    fn get_value(&self, field: &Field, page: &Page, inputs: &Inputs) -> Result<FieldValue> {
        self.end(field, page, inputs).map(FieldValue::Epoch)
    }

    fn dependencies(&self) -> Vec<String> {
        vec![self.start.clone(), self.duration.clone()]
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
        inputs: &Inputs,
    ) -> Result<()> {
        if value.is_empty() {
            return Ok(());
        }

        let duration = inputs.millis(&self.duration).unwrap_or(0);
        let local = instant_of(value)
            .and_then(|ms| ms.checked_sub(duration))
            .and_then(|ms| self.zone.local(ms))
            .ok_or_else(|| {
                FormError::invalid_value(field.name(), &value.to_string(), "expected a timestamp")
            })?;

        set_control(field, page, 0, local.format("%Y-%m-%d").to_string());
        Ok(())
    }

    fn validate(&self, field: &Field, page: &Page, inputs: &Inputs) -> bool {
        match (self.end(field, page, inputs), inputs.millis(&self.start)) {
            (Ok(end), Some(start)) => end > start,
            (Ok(_), None) => false,
            (Err(_), _) => {
                !field.is_required() && control_text(field, page, 0).trim().is_empty()
            }
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

        let value = self
            .end(field, page, inputs)
            .map(|ms| ms.to_string())
            .unwrap_or_default();
        let key = field.metadata_key().unwrap_or(END_DATE_KEY);

        Ok(vec![render_pair(field, tree, parent, key, &value)?])
    }

    fn as_string(&self, field: &Field, page: &Page, inputs: &Inputs) -> Result<String> {
        let ms = self.end(field, page, inputs)?;
        let local = self
            .zone
            .local(ms)
            .ok_or_else(|| FormError::not_ready(field.name(), "timestamp out of range"))?;

        Ok(local.format("%Y-%m-%d").to_string())
    }
}
