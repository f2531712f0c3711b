use crate::models::{DateKey, DateUnit, Query};
use chrono::{Datelike, Duration, Local, NaiveDate};

/// Moves `(year, month)` by `delta` months. `month` is 1-based.
pub fn shift_month(year: i32, month: u32, delta: i64) -> (i32, u32) {
    let index = i64::from(year) * 12 + i64::from(month) - 1 + delta;
    (index.div_euclid(12) as i32, (index.rem_euclid(12) + 1) as u32)
}

fn first_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// `start` inclusive, `end_exclusive` is the first day of the following month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingWindow {
    pub month: DateKey,
    pub start: DateKey,
    pub end_exclusive: DateKey,
}

#[derive(Debug, Clone, Copy)]
pub struct DateRangeBuilder {
    today: NaiveDate,
}

impl DateRangeBuilder {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn for_today() -> Self {
        Self::new(Local::now().date_naive())
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// `count` keys ending at the current day or month, oldest first.
    pub fn build(&self, unit: DateUnit, count: i64) -> Vec<DateKey> {
        match unit {
            DateUnit::Day => self.days(count),
            DateUnit::Month => self.months(count),
        }
    }

    fn days(&self, count: i64) -> Vec<DateKey> {
        (0..count.max(0))
            .rev()
            .filter_map(|back| self.today.checked_sub_signed(Duration::days(back)))
            .map(DateKey::day)
            .collect()
    }

    fn months(&self, count: i64) -> Vec<DateKey> {
        (0..count.max(0))
            .rev()
            .map(|back| shift_month(self.today.year(), self.today.month(), -back))
            .map(|(year, month)| DateKey::month(year, month))
            .collect()
    }

    /// Every day of the calendar month `months_back` months before the current one.
    pub fn days_of_month(&self, months_back: u32) -> Vec<DateKey> {
        let (year, month) = shift_month(
            self.today.year(),
            self.today.month(),
            -i64::from(months_back),
        );
        let (next_year, next_month) = shift_month(year, month, 1);
        let (Some(first), Some(next)) = (
            first_of_month(year, month),
            first_of_month(next_year, next_month),
        ) else {
            return Vec::new();
        };
        first
            .iter_days()
            .take_while(|day| *day < next)
            .map(DateKey::day)
            .collect()
    }

    /// Day keys for the per-user view: the last N days, or all days of the selected month.
    pub fn usage_dates(&self, query: Query) -> Vec<DateKey> {
        match query.unit {
            DateUnit::Day => self.days(i64::from(query.count)),
            DateUnit::Month if query.count == 0 => Vec::new(),
            DateUnit::Month => self.days_of_month(query.count - 1),
        }
    }

    pub fn billing_window(&self, months_back: u32) -> Option<BillingWindow> {
        let (year, month) = shift_month(
            self.today.year(),
            self.today.month(),
            -i64::from(months_back),
        );
        let (next_year, next_month) = shift_month(year, month, 1);
        Some(BillingWindow {
            month: DateKey::month(year, month),
            start: DateKey::day(first_of_month(year, month)?),
            end_exclusive: DateKey::day(first_of_month(next_year, next_month)?),
        })
    }
}
