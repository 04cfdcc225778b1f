use chrono::Weekday;
use std::sync::Arc;

pub const MINUTES_PER_DAY: u32 = 24 * 60;
/// Extended hours (e.g. `20:00-30:00`) may run up to the end of the following day.
pub const MAX_MINUTES: u32 = 2 * MINUTES_PER_DAY;

/// Whether a matching condition denies or grants access.
///
/// The discriminants match the timed restriction types of the graph tile format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RestrictionType {
    TimedAllowed = 6,
    TimedDenied = 7,
}

impl RestrictionType {
    pub(crate) const fn into_bits(self) -> u8 {
        self as _
    }

    pub(crate) const fn from_bits(value: u8) -> Self {
        match value {
            7 => RestrictionType::TimedDenied,
            _ => RestrictionType::TimedAllowed,
        }
    }
}

/// A parsed `value @ condition; value @ condition` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalValue {
    pub clauses: Vec<Clause>,
    /// Clauses whose condition is not a time expression (e.g. `wet`, `weight>7.5`).
    pub skipped: Vec<SkippedClause>,
}

/// One `value @ condition` pair with a time-based condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub value: String,
    pub expression: Arc<TimeExpression>,
    /// The condition as written, without the value.
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedClause {
    pub value: String,
    pub condition: String,
    pub error: crate::ConditionalParseError,
}

/// A union of rules; the expression matches when any rule matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeExpression {
    pub rules: Vec<Rule>,
}

/// A single rule: date selectors, then weekday selectors, then time spans.
/// Empty selector lists match everything.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Rule {
    pub dates: Vec<DateSelector>,
    pub weekdays: Vec<WeekdaySelector>,
    pub times: Vec<TimeSpan>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSelector {
    /// An inclusive calendar range. Yearless ranges may wrap around the new year.
    Range { start: DatePoint, end: DatePoint },
    /// An inclusive ISO week range, which may wrap around the new year.
    Week { start: u32, end: u32 },
}

/// A point in the calendar; a missing day means the start (or end) of the month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatePoint {
    pub year: Option<i32>,
    pub month: u32,
    pub day: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeekdaySelector {
    /// An inclusive (possibly wrapping) weekday range,
    /// optionally limited to the nth occurrences within the month (negative counts from the end).
    Days {
        start: Weekday,
        end: Weekday,
        nth: Vec<i8>,
    },
    PublicHoliday,
}

/// Minutes since midnight. `end` may exceed a day for spans that cross midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSpan {
    pub start: u32,
    pub end: u32,
}

impl TimeExpression {
    /// Whether any rule restricts the time of day.
    pub fn has_time_of_day(&self) -> bool {
        self.rules.iter().any(|rule| !rule.times.is_empty())
    }
}

impl TimeSpan {
    /// An inclusive `24:00` end also covers midnight of the following day.
    #[inline]
    pub fn crosses_midnight(&self) -> bool {
        self.end >= MINUTES_PER_DAY
    }
}
