use chrono::{Datelike as _, Months, NaiveDate};

/// First day of the month `date` falls in
pub fn month_of(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Last day of the month `date` falls in
pub fn end_of_month(date: NaiveDate) -> NaiveDate {
    month_of(date)
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(date)
}

/// Every month touched by `[start, end]`, as first-of-month dates
pub fn months_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut months = Vec::new();
    if start > end {
        return months;
    }

    let mut month = month_of(start);

    while month <= end {
        months.push(month);

        let Some(next) = month.checked_add_months(Months::new(1)) else {
            break;
        };
        month = next;
    }

    months
}

/// Completed years between `from` and `to`
pub fn whole_years(from: NaiveDate, to: NaiveDate) -> u32 {
    to.years_since(from).unwrap_or(0)
}

/// `1234` becomes `"12.34"`
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();

    format!("{sign}{}.{:02}", cents / 100, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_bounds() {
        assert_eq!(month_of(date(2024, 2, 17)), date(2024, 2, 1));
        assert_eq!(end_of_month(date(2024, 2, 17)), date(2024, 2, 29));
        assert_eq!(end_of_month(date(2023, 12, 1)), date(2023, 12, 31));
    }

    #[test]
    fn test_months_between() {
        assert_eq!(months_between(date(2024, 3, 1), date(2024, 3, 15)), vec![date(2024, 3, 1)]);
        assert_eq!(
            months_between(date(2023, 12, 20), date(2024, 1, 3)),
            vec![date(2023, 12, 1), date(2024, 1, 1)],
        );
        assert!(months_between(date(2024, 3, 2), date(2024, 3, 1)).is_empty());
    }

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(1234), "12.34");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(-250), "-2.50");
        assert_eq!(format_cents(0), "0.00");
    }

    #[test]
    fn test_whole_years() {
        assert_eq!(whole_years(date(2020, 6, 1), date(2024, 5, 31)), 3);
        assert_eq!(whole_years(date(2020, 6, 1), date(2024, 6, 1)), 4);
        assert_eq!(whole_years(date(2025, 1, 1), date(2024, 6, 1)), 0);
    }
}
