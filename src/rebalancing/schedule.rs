//! Weekly rebalance slot arithmetic. A slot is a (weekday, hour) pair in
//! UTC; each scheduled slot fires at most once.

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};

fn occurrence_on_or_after_date(
    now: DateTime<Utc>,
    weekday: Weekday,
    hour: u32,
) -> DateTime<Utc> {
    let days_ahead = (weekday.num_days_from_monday() + 7
        - now.weekday().num_days_from_monday())
        % 7;
    let date = now.date_naive() + Duration::days(days_ahead as i64);
    let naive = date
        .and_hms_opt(hour, 0, 0)
        .expect("rebalance hour validated to 0-23");
    DateTime::from_naive_utc_and_offset(naive, Utc)
}

/// First occurrence of the slot at or after `now`. Used by Initialize.
pub fn next_occurrence_at_or_after(
    now: DateTime<Utc>,
    weekday: Weekday,
    hour: u32,
) -> DateTime<Utc> {
    let candidate = occurrence_on_or_after_date(now, weekday, hour);
    if candidate < now {
        candidate + Duration::days(7)
    } else {
        candidate
    }
}

/// First occurrence of the slot strictly after `now`. Used when advancing
/// the schedule past an executed rebalance so the same slot never fires
/// twice.
pub fn next_occurrence_after(now: DateTime<Utc>, weekday: Weekday, hour: u32) -> DateTime<Utc> {
    let candidate = occurrence_on_or_after_date(now, weekday, hour);
    if candidate <= now {
        candidate + Duration::days(7)
    } else {
        candidate
    }
}
