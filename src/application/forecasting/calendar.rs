use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Next weekday after `date`. No holiday calendar.
pub fn next_business_day(date: NaiveDate) -> NaiveDate {
    add_business_days(date, 1)
}

/// Steps `n` weekdays forward from `date`, skipping Saturday and Sunday.
pub fn add_business_days(date: NaiveDate, n: usize) -> NaiveDate {
    let mut current = date;
    let mut added = 0;
    while added < n {
        current += Duration::days(1);
        if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            added += 1;
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_next_business_day_skips_weekend() {
        // 2024-03-08 is a Friday
        assert_eq!(next_business_day(d(2024, 3, 8)), d(2024, 3, 11));
        // Saturday and Sunday both roll to Monday
        assert_eq!(next_business_day(d(2024, 3, 9)), d(2024, 3, 11));
        assert_eq!(next_business_day(d(2024, 3, 10)), d(2024, 3, 11));
        assert_eq!(next_business_day(d(2024, 3, 11)), d(2024, 3, 12));
    }

    #[test]
    fn test_add_business_days() {
        assert_eq!(add_business_days(d(2024, 3, 6), 5), d(2024, 3, 13));
        assert_eq!(add_business_days(d(2024, 3, 6), 0), d(2024, 3, 6));
    }
}
