use crate::{
    ConditionalValue, HolidayCalendar, NoHolidays, RestrictionType, TimeExpression, ValuePolicy,
};
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// A time-dependent clause ready to be stored against the edges of a way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedRestriction {
    /// The tag the clause came from, e.g. `access:conditional`.
    pub key: String,
    pub restriction_type: RestrictionType,
    pub expression: Arc<TimeExpression>,
    /// The clause as written (`no @ (Nov-May)`).
    pub raw: Arc<str>,
}

/// Reads the conditional tags of one transportation mode.
///
/// Answers two kinds of questions:
/// static ones ("is this way closed at the reference time?") that only consider
/// conditions without a time of day, and [`timed_restrictions`](Self::timed_restrictions)
/// for the side table.
///
/// Safe to share between threads; the parse counters are atomic.
pub struct ConditionalTagInspector {
    keys: Vec<String>,
    policy: ValuePolicy,
    reference_time: NaiveDateTime,
    calendar: Arc<dyn HolidayCalendar>,
    parsed: AtomicU64,
    skipped: AtomicU64,
}

impl ConditionalTagInspector {
    pub fn new<I>(keys: I, policy: ValuePolicy, reference_time: NaiveDateTime) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            policy,
            reference_time,
            calendar: Arc::new(NoHolidays),
            parsed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn with_calendar(mut self, calendar: Arc<dyn HolidayCalendar>) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn policy(&self) -> &ValuePolicy {
        &self.policy
    }

    pub fn reference_time(&self) -> NaiveDateTime {
        self.reference_time
    }

    pub fn calendar(&self) -> &dyn HolidayCalendar {
        self.calendar.as_ref()
    }

    pub fn has_conditional(&self, tags: &HashMap<String, String>) -> bool {
        self.keys.iter().any(|key| tags.contains_key(key))
    }

    fn values<'t>(
        &self,
        tags: &'t HashMap<String, String>,
    ) -> impl Iterator<Item = (&str, &'t str, ConditionalValue)> {
        self.keys.iter().filter_map(move |key| {
            let raw = tags.get(key)?;
            match ConditionalValue::parse(raw) {
                Ok(value) => Some((key.as_str(), raw.as_str(), value)),
                Err(error) => {
                    debug!(%key, %raw, %error, "Ignoring malformed conditional tag");
                    None
                }
            }
        })
    }

    /// A permitted way is closed at the reference time by a condition without a time of day.
    pub fn permitted_way_conditionally_restricted(&self, tags: &HashMap<String, String>) -> bool {
        self.static_match(tags, RestrictionType::TimedDenied)
    }

    /// A restricted way is opened at the reference time by a condition without a time of day.
    pub fn restricted_way_conditionally_permitted(&self, tags: &HashMap<String, String>) -> bool {
        self.static_match(tags, RestrictionType::TimedAllowed)
    }

    fn static_match(&self, tags: &HashMap<String, String>, wanted: RestrictionType) -> bool {
        self.values(tags).any(|(_, _, value)| {
            value.clauses.iter().any(|clause| {
                self.policy.classify(&clause.value) == Some(wanted)
                    && !clause.expression.has_time_of_day()
                    && clause
                        .expression
                        .matches(self.reference_time, self.calendar.as_ref())
            })
        })
    }

    /// All clauses with an access meaning, including those with a time of day.
    ///
    /// Clauses with unsupported conditions are counted and dropped.
    pub fn timed_restrictions(&self, tags: &HashMap<String, String>) -> Vec<TimedRestriction> {
        let mut restrictions = Vec::new();
        for (key, raw, value) in self.values(tags) {
            self.parsed
                .fetch_add(value.clauses.len() as u64, Ordering::Relaxed);
            self.skipped
                .fetch_add(value.skipped.len() as u64, Ordering::Relaxed);
            if value.clauses.is_empty() {
                debug!(%key, %raw, "No usable condition");
            }
            for clause in value.clauses {
                let Some(restriction_type) = self.policy.classify(&clause.value) else {
                    continue;
                };
                restrictions.push(TimedRestriction {
                    key: key.to_string(),
                    restriction_type,
                    raw: Arc::from(format!("{} @ {}", clause.value, clause.condition)),
                    expression: clause.expression,
                });
            }
        }
        restrictions
    }

    /// Clauses turned into restrictions so far.
    pub fn parsed_conditions(&self) -> u64 {
        self.parsed.load(Ordering::Relaxed)
    }

    /// Clauses skipped because their condition is not a time expression.
    pub fn skipped_conditions(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ConditionalTagInspector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionalTagInspector")
            .field("keys", &self.keys)
            .field("policy", &self.policy)
            .field("reference_time", &self.reference_time)
            .field("parsed", &self.parsed)
            .field("skipped", &self.skipped)
            .finish_non_exhaustive()
    }
}
