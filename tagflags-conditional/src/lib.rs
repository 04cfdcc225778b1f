//! # Conditional access restrictions
//!
//! Parses values like `no @ (Nov-May); delivery @ (Mo-Fr 06:00-11:00)` into
//! time expressions and evaluates them at a point in time.
//!
//! Only date, weekday and time-of-day conditions are understood.
//! Anything else (`wet`, `weight>7.5`, …) is skipped and counted, never fatal.
//! When nothing matches, access falls back to the unconditional state of the way,
//! and to open when there is none.
//!
//! Restrictions that depend on the time of day can't be resolved at import time;
//! they are kept per edge in a [`ConditionalStore`].

// Private modules by default
mod ast;
mod calendar;
mod error;
mod eval;
mod inspector;
mod lexer;
mod parser;
mod store;

pub use ast::{
    Clause, ConditionalValue, DatePoint, DateSelector, MAX_MINUTES, MINUTES_PER_DAY,
    RestrictionType, Rule, SkippedClause, TimeExpression, TimeSpan, WeekdaySelector,
};
pub use calendar::{FixedHolidays, HolidayCalendar, NoHolidays};
pub use error::ConditionalParseError;
pub use eval::{AccessState, ValuePolicy};
pub use inspector::{ConditionalTagInspector, TimedRestriction};
pub use store::{ConditionalEntry, ConditionalStore};
