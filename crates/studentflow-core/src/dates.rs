use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];
const DAYS_PER_YEAR: i64 = 365;

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Whole years between `birth` and `today` counted as 365-day blocks.
/// Floors towards negative infinity, so a birth date in the future yields a negative age.
pub fn age_in_years(birth: NaiveDate, today: NaiveDate) -> i64 {
    (today - birth).num_days().div_euclid(DAYS_PER_YEAR)
}

pub fn birth_year(birth: NaiveDate) -> i32 {
    birth.year()
}

fn epoch() -> NaiveDate {
    DateTime::<Utc>::UNIX_EPOCH.date_naive()
}

/// Physical representation polars uses for `Date` values.
pub fn to_epoch_days(date: NaiveDate) -> i32 {
    (date - epoch()).num_days() as i32
}

pub fn from_epoch_days(days: i32) -> Option<NaiveDate> {
    epoch().checked_add_signed(chrono::Duration::days(i64::from(days)))
}

/// Midnight UTC in the form the index expects for date fields.
pub fn to_index_timestamp(date: NaiveDate) -> String {
    date.format("%Y-%m-%dT00:00:00Z").to_string()
}
