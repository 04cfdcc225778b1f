use chrono::NaiveDate;
use std::collections::HashSet;

/// Supplies public holidays for the `PH` weekday selector.
pub trait HolidayCalendar: Send + Sync {
    fn is_public_holiday(&self, date: NaiveDate) -> bool;
}

/// A calendar without any public holidays.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHolidays;

impl HolidayCalendar for NoHolidays {
    fn is_public_holiday(&self, _date: NaiveDate) -> bool {
        false
    }
}

/// A fixed set of holiday dates.
#[derive(Debug, Clone, Default)]
pub struct FixedHolidays {
    dates: HashSet<NaiveDate>,
}

impl FromIterator<NaiveDate> for FixedHolidays {
    fn from_iter<T: IntoIterator<Item = NaiveDate>>(iter: T) -> Self {
        Self {
            dates: iter.into_iter().collect(),
        }
    }
}

impl HolidayCalendar for FixedHolidays {
    fn is_public_holiday(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }
}
