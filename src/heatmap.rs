use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::error::{AggregateError, AggregateResult};
use crate::models::{DaySummary, StatusRecord};

/// One entry per day that has at least one record, keyed by date (serialized
/// as `YYYY-MM-DD`).
///
/// Order sensitive: when a day holds several records (several subjects, or a
/// storage glitch), the last one in iteration order supplies the status and
/// `count` tracks how many were seen. Callers should pass records in a
/// stable order such as date then insertion time. Days without records are
/// left out; filling them with `no_class` is up to the calendar view.
pub fn summarize_days<'a, I>(records: I) -> BTreeMap<NaiveDate, DaySummary>
where
    I: IntoIterator<Item = &'a StatusRecord>,
{
    let mut days: BTreeMap<NaiveDate, DaySummary> = BTreeMap::new();

    for record in records {
        days.entry(record.date)
            .and_modify(|day| {
                day.count += 1;
                day.status = record.status;
            })
            .or_insert(DaySummary {
                date: record.date,
                status: record.status,
                count: 1,
            });
    }

    days
}

/// Half-open `[first day, first day of next month)` for a `YYYY-MM` string.
pub fn month_bounds(month: &str) -> AggregateResult<(NaiveDate, NaiveDate)> {
    let invalid = || AggregateError::InvalidMonth {
        value: month.to_string(),
    };

    let start = NaiveDate::parse_from_str(&format!("{}-01", month.trim()), "%Y-%m-%d")
        .map_err(|_| invalid())?;
    let end = if start.month() == 12 {
        NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
    }
    .ok_or_else(invalid)?;

    Ok((start, end))
}
