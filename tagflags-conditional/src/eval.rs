use crate::HolidayCalendar;
use crate::ast::{
    ConditionalValue, DatePoint, DateSelector, MINUTES_PER_DAY, RestrictionType, Rule,
    TimeExpression, WeekdaySelector,
};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use std::collections::HashSet;

/// The outcome of evaluating conditional restrictions at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessState {
    Open,
    Closed,
}

impl DatePoint {
    pub(crate) fn start_key(&self) -> u32 {
        self.month * 100 + self.day.unwrap_or(1)
    }

    /// Month-only ends cover the whole month.
    pub(crate) fn end_key(&self) -> u32 {
        self.month * 100 + self.day.unwrap_or(31)
    }
}

fn day_key(date: NaiveDate) -> u32 {
    date.month() * 100 + date.day()
}

/// Inclusive containment in a range that wraps around when `start > end`.
fn wrapping_contains(start: u32, end: u32, value: u32) -> bool {
    if start <= end {
        start <= value && value <= end
    } else {
        value >= start || value <= end
    }
}

fn days_in_month(date: NaiveDate) -> u32 {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.pred_opt())
        .map_or(31, |last| last.day())
}

fn is_nth_occurrence(nth: i8, date: NaiveDate) -> bool {
    let occurrence = if nth > 0 {
        (date.day() - 1) / 7 + 1
    } else {
        (days_in_month(date) - date.day()) / 7 + 1
    };
    u32::from(nth.unsigned_abs()) == occurrence
}

impl DateSelector {
    pub fn matches(&self, date: NaiveDate) -> bool {
        match *self {
            DateSelector::Range { start, end } => match (start.year, end.year) {
                (Some(start_year), Some(end_year)) => {
                    let key = (date.year(), day_key(date));
                    (start_year, start.start_key()) <= key && key <= (end_year, end.end_key())
                }
                _ => wrapping_contains(start.start_key(), end.end_key(), day_key(date)),
            },
            DateSelector::Week { start, end } => {
                wrapping_contains(start, end, date.iso_week().week())
            }
        }
    }
}

impl WeekdaySelector {
    pub fn matches(&self, date: NaiveDate, calendar: &dyn HolidayCalendar) -> bool {
        match self {
            WeekdaySelector::PublicHoliday => calendar.is_public_holiday(date),
            WeekdaySelector::Days { start, end, nth } => {
                wrapping_contains(
                    start.num_days_from_monday(),
                    end.num_days_from_monday(),
                    date.weekday().num_days_from_monday(),
                ) && (nth.is_empty() || nth.iter().any(|n| is_nth_occurrence(*n, date)))
            }
        }
    }
}

impl Rule {
    fn matches_day(&self, date: NaiveDate, calendar: &dyn HolidayCalendar) -> bool {
        (self.dates.is_empty() || self.dates.iter().any(|d| d.matches(date)))
            && (self.weekdays.is_empty() || self.weekdays.iter().any(|w| w.matches(date, calendar)))
    }

    /// Both ends of a time span are inclusive.
    /// Spans crossing midnight continue into the next day using the day selectors of their first day.
    pub fn matches(&self, at: NaiveDateTime, calendar: &dyn HolidayCalendar) -> bool {
        let date = at.date();
        if self.times.is_empty() {
            return self.matches_day(date, calendar);
        }

        let minute = at.hour() * 60 + at.minute();
        if self.times.iter().any(|t| t.start <= minute && minute <= t.end)
            && self.matches_day(date, calendar)
        {
            return true;
        }

        let spilled = minute + MINUTES_PER_DAY;
        self.times
            .iter()
            .any(|t| t.crosses_midnight() && spilled <= t.end)
            && date
                .pred_opt()
                .is_some_and(|yesterday| self.matches_day(yesterday, calendar))
    }
}

impl TimeExpression {
    pub fn matches(&self, at: NaiveDateTime, calendar: &dyn HolidayCalendar) -> bool {
        self.rules.iter().any(|rule| rule.matches(at, calendar))
    }
}

/// Classifies conditional values (`no`, `delivery`, `yes`, …) as denying or granting access.
#[derive(Debug, Clone)]
pub struct ValuePolicy {
    restricted: HashSet<String>,
    permitted: HashSet<String>,
}

impl ValuePolicy {
    pub fn new<R, P>(restricted: R, permitted: P) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            restricted: restricted.into_iter().map(Into::into).collect(),
            permitted: permitted.into_iter().map(Into::into).collect(),
        }
    }

    /// Values that are neither restricted nor permitted (e.g. a speed) have no access effect.
    pub fn classify(&self, value: &str) -> Option<RestrictionType> {
        if self.restricted.contains(value) {
            Some(RestrictionType::TimedDenied)
        } else if self.permitted.contains(value) {
            Some(RestrictionType::TimedAllowed)
        } else {
            None
        }
    }
}

impl Default for ValuePolicy {
    fn default() -> Self {
        Self::new(
            [
                "no",
                "private",
                "restricted",
                "military",
                "emergency",
                "agricultural",
                "forestry",
                "delivery",
            ],
            ["yes", "permissive", "designated", "destination"],
        )
    }
}

/// Denials win over grants; without any match the default applies, and without a default access is open.
pub(crate) fn resolve<'e>(
    entries: impl IntoIterator<Item = (RestrictionType, &'e TimeExpression)>,
    at: NaiveDateTime,
    calendar: &dyn HolidayCalendar,
    default: Option<AccessState>,
) -> AccessState {
    let mut permitted = false;
    for (restriction_type, expression) in entries {
        if expression.matches(at, calendar) {
            match restriction_type {
                RestrictionType::TimedDenied => return AccessState::Closed,
                RestrictionType::TimedAllowed => permitted = true,
            }
        }
    }
    if permitted {
        AccessState::Open
    } else {
        default.unwrap_or(AccessState::Open)
    }
}

impl ConditionalValue {
    /// Evaluates every clause at `at`.
    ///
    /// Any matching restrictive clause closes the way. Otherwise a matching permissive clause
    /// opens it, and without any match `default` (the unconditional access) applies.
    pub fn evaluate(
        &self,
        at: NaiveDateTime,
        calendar: &dyn HolidayCalendar,
        policy: &ValuePolicy,
        default: Option<AccessState>,
    ) -> AccessState {
        resolve(
            self.clauses.iter().filter_map(|clause| {
                policy
                    .classify(&clause.value)
                    .map(|restriction_type| (restriction_type, clause.expression.as_ref()))
            }),
            at,
            calendar,
            default,
        )
    }
}
