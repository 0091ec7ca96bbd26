// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;

/// Timezone the date and time controls of a form are shown in
///
/// A named zone resolves the UTC offset per instant, so dates on either side of a daylight
/// saving change get their own offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    /// Offset reported by a capture agent
    Fixed(FixedOffset),
    Named(Tz),
}

impl Zone {
    pub fn utc() -> Self {
        Self::Fixed(Utc.fix())
    }

    /// UTC offset in effect at `instant`
    pub fn offset_at(&self, instant: DateTime<Utc>) -> FixedOffset {
        match self {
            Self::Fixed(offset) => *offset,
            Self::Named(tz) => tz.offset_from_utc_datetime(&instant.naive_utc()).fix(),
        }
    }

    /// UTC offset in effect at `ms` milliseconds since the epoch
    pub fn offset_at_millis(&self, ms: i64) -> Option<FixedOffset> {
        Utc.timestamp_millis_opt(ms)
            .single()
            .map(|instant| self.offset_at(instant))
    }

    /// Local date and time of the instant `ms`
    pub fn local(&self, ms: i64) -> Option<NaiveDateTime> {
        let instant = Utc.timestamp_millis_opt(ms).single()?;
        Some(instant.with_timezone(&self.offset_at(instant)).naive_local())
    }

    /// Milliseconds since the epoch of a local date and time
    ///
    /// Ambiguous local times resolve to the earlier instant. Local times skipped by a daylight
    /// saving change have no instant.
    pub fn instant(&self, local: &NaiveDateTime) -> Option<i64> {
        match self {
            Self::Fixed(offset) => offset
                .from_local_datetime(local)
                .earliest()
                .map(|instant| instant.timestamp_millis()),
            Self::Named(tz) => tz
                .from_local_datetime(local)
                .earliest()
                .map(|instant| instant.timestamp_millis()),
        }
    }
}

impl Default for Zone {
    fn default() -> Self {
        Self::utc()
    }
}

impl From<FixedOffset> for Zone {
    fn from(offset: FixedOffset) -> Self {
        Self::Fixed(offset)
    }
}

impl From<Tz> for Zone {
    fn from(tz: Tz) -> Self {
        Self::Named(tz)
    }
}
