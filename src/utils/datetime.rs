use chrono::{Days, NaiveDate};

/// Every calendar date from `start` to `end` inclusive, ascending
///
/// Returns an empty vector when `start > end`.
pub fn generate_date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    if start > end {
        return Vec::new();
    }
    start.iter_days().take_while(|d| *d <= end).collect()
}

/// Split `[since, until]` into consecutive inclusive windows of at most
/// `max_days` days each
pub fn split_date_windows(
    since: NaiveDate,
    until: NaiveDate,
    max_days: u32,
) -> Vec<(NaiveDate, NaiveDate)> {
    if since > until {
        return Vec::new();
    }
    let span = Days::new(u64::from(max_days.max(1)) - 1);

    let mut windows = Vec::new();
    let mut cursor = since;
    loop {
        // Past the calendar's end the window simply runs to `until`
        let end = cursor
            .checked_add_days(span)
            .map_or(until, |end| end.min(until));
        windows.push((cursor, end));
        match end.succ_opt() {
            Some(next) if next <= until => cursor = next,
            _ => break,
        }
    }
    windows
}

/// `days` before `today`, saturating at the earliest representable date
pub fn days_before(today: NaiveDate, days: u64) -> NaiveDate {
    today.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
