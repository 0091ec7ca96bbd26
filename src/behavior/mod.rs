// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Field behaviors with derived semantics
//!
//! Each behavior replaces some of the generic operations of a field, e.g. to assemble a
//! timestamp from a date and two time controls.

use crate::{
    error::{FormError, Result},
    field::{Field, FieldValue},
    page::Page,
};
use chrono::{DateTime, NaiveDate, Utc, Weekday};
use std::{fmt, sync::Arc};

mod datetime;
mod duration;
mod recurrence;
mod resources;
mod series;
mod zone;

pub use datetime::DateTimeBehavior;
pub use duration::DurationBehavior;
pub use recurrence::{RecurrenceBehavior, RecurrenceEndBehavior, RecurrenceRule};
pub use resources::ResourcesBehavior;
pub use series::SeriesBehavior;
pub use zone::Zone;

pub const END_DATE_KEY: &str = "endDate";

/// Source of the current time for "not in the past" checks
#[derive(Clone)]
pub struct Clock(Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>);

impl Clock {
    pub fn system() -> Self {
        Self(Arc::new(Utc::now))
    }

    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self(Arc::new(move || at))
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.0)()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}

impl fmt::Debug for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Clock").field(&self.now()).finish()
    }
}

/// Accepts the ISO format of date inputs as well as the US format of the date picker
pub(crate) fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%m/%d/%Y"))
        .ok()
}

/// Value of the control at `index`, empty if it was not bound
pub(crate) fn control_text<'p>(field: &Field, page: &'p Page, index: usize) -> &'p str {
    field
        .declared_control(index)
        .map(|id| page.value(id))
        .unwrap_or("")
}

/// Numeric control value, empty counts as zero
pub(crate) fn control_number(field: &Field, page: &Page, index: usize, max: u32) -> Result<u32> {
    let text = control_text(field, page, index).trim();
    if text.is_empty() {
        return Ok(0);
    }

    text.parse::<u32>()
        .ok()
        .filter(|number| *number <= max)
        .ok_or_else(|| FormError::not_ready(field.name(), format!("invalid number `{text}`")))
}

pub(crate) fn set_control(field: &Field, page: &mut Page, index: usize, value: String) {
    if let Some(id) = field.declared_control(index) {
        page.set_value(id, value);
    }
}

/// Milliseconds since the epoch from an epoch value, numeric text or an RFC 3339 date
pub(crate) fn instant_of(value: &FieldValue) -> Option<i64> {
    match value {
        FieldValue::Epoch(ms) => Some(*ms),
        FieldValue::Duration(_) => None,
        FieldValue::Text(text) => text.trim().parse().ok().or_else(|| {
            DateTime::parse_from_rfc3339(text.trim())
                .ok()
                .map(|instant| instant.timestamp_millis())
        }),
    }
}

pub(crate) fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

pub(crate) fn parse_weekday_code(code: &str) -> Option<Weekday> {
    match code.trim().to_ascii_uppercase().as_str() {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => None,
    }
}

pub(crate) fn shift_weekday(day: Weekday, days: i64) -> Weekday {
    let mut day = day;
    for _ in 0..days.rem_euclid(7) {
        day = day.succ();
    }
    day
}
