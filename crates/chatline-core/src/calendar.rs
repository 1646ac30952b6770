//! Calendar-day policy and date-separator labels.

use std::{fmt, str::FromStr};

use chrono::{DateTime, FixedOffset, Local, NaiveDate, Offset, Utc};

/// Time zone used to decide which calendar day an instant falls on.
///
/// Separator placement near midnight depends on this choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayBoundary {
    /// The evaluating process's local zone.
    #[default]
    Local,
    /// A fixed UTC offset.
    Fixed(FixedOffset),
}

impl DayBoundary {
    pub fn utc() -> Self {
        Self::Fixed(Utc.fix())
    }

    /// Calendar day of `instant` under this policy.
    pub fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            Self::Local => instant.with_timezone(&Local).date_naive(),
            Self::Fixed(offset) => instant.with_timezone(offset).date_naive(),
        }
    }
}

impl fmt::Display for DayBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

/// Parse failure for [`DayBoundary`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected 'local', 'utc' or an offset like '+05:30', got '{0}'")]
pub struct ParseDayBoundaryError(String);

impl FromStr for DayBoundary {
    type Err = ParseDayBoundaryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "utc" | "z" => Ok(Self::utc()),
            _ => trimmed
                .parse::<FixedOffset>()
                .map(Self::Fixed)
                .map_err(|_| ParseDayBoundaryError(value.to_owned())),
        }
    }
}

/// Day context captured once per operation: zone policy plus "today".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayContext {
    boundary: DayBoundary,
    today: NaiveDate,
}

impl DayContext {
    pub fn new(boundary: DayBoundary, now: DateTime<Utc>) -> Self {
        Self {
            boundary,
            today: boundary.day_of(now),
        }
    }

    pub fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.boundary.day_of(instant)
    }

    pub fn same_day(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        self.day_of(a) == self.day_of(b)
    }

    /// Separator label for the day containing `instant`.
    pub fn label_for(&self, instant: DateTime<Utc>) -> String {
        separator_label(self.day_of(instant), self.today)
    }
}

/// "Today", "Yesterday", or `DD-MM-YYYY`.
pub fn separator_label(day: NaiveDate, today: NaiveDate) -> String {
    if day == today {
        "Today".to_owned()
    } else if today.pred_opt() == Some(day) {
        "Yesterday".to_owned()
    } else {
        day.format("%d-%m-%Y").to_string()
    }
}

/// Wall-clock source used for relative separator labels.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn labels_today_yesterday_and_absolute_dates() {
        let today = day(2024, 1, 2);
        assert_eq!(separator_label(day(2024, 1, 2), today), "Today");
        assert_eq!(separator_label(day(2024, 1, 1), today), "Yesterday");
        assert_eq!(separator_label(day(2023, 12, 31), today), "31-12-2023");
    }

    #[test]
    fn fixed_offset_moves_day_boundary() {
        let instant = Utc
            .with_ymd_and_hms(2024, 1, 1, 23, 30, 0)
            .single()
            .expect("valid instant");
        let utc: DayBoundary = "utc".parse().expect("utc parses");
        let plus_two: DayBoundary = "+02:00".parse().expect("offset parses");

        assert_eq!(utc.day_of(instant), day(2024, 1, 1));
        assert_eq!(plus_two.day_of(instant), day(2024, 1, 2));
    }

    #[test]
    fn rejects_unknown_boundary_names() {
        assert!("mars".parse::<DayBoundary>().is_err());
        assert_eq!("LOCAL".parse::<DayBoundary>(), Ok(DayBoundary::Local));
    }

    #[test]
    fn context_labels_relative_to_captured_now() {
        let now = Utc
            .with_ymd_and_hms(2024, 1, 2, 12, 0, 0)
            .single()
            .expect("valid instant");
        let ctx = DayContext::new(DayBoundary::utc(), now);
        let earlier = Utc
            .with_ymd_and_hms(2024, 1, 1, 10, 0, 0)
            .single()
            .expect("valid instant");
        assert_eq!(ctx.label_for(now), "Today");
        assert_eq!(ctx.label_for(earlier), "Yesterday");
        assert!(!ctx.same_day(now, earlier));
    }
}
