//! Time-bucketed "up-or-down" markets, parsed from a market title.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::America::New_York;

/// A fixed-interval "asset up or down" market window.
///
/// Titles of the shape `"<Asset> Up or Down - <Month> <Day>, <HH:MM
/// AM/PM>-<HH:MM AM/PM> ET"` parse into one of these; anything else is not a
/// window market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketWindow {
    pub asset: String,
    pub start_ts: DateTime<Utc>,
    pub end_ts: DateTime<Utc>,
    pub duration_seconds: i64,
    pub window_id: String,
}

impl MarketWindow {
    /// Seconds remaining until `end_ts`, relative to `now`. Negative once the
    /// window has closed.
    #[must_use]
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.end_ts - now).num_seconds()
    }
}

/// Parses a market title into a [`MarketWindow`]. `now` resolves the
/// ambiguous two-digit year implied by the title (none is given) and is used
/// only to pick the calendar year in US/Eastern.
#[must_use]
pub fn parse_market_window(title: &str, now: DateTime<Utc>) -> Option<MarketWindow> {
    let title = title.trim();
    let (asset, rest) = title.split_once(" Up or Down - ")?;
    let asset = asset.trim();
    if asset.is_empty() || !asset.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ') {
        return None;
    }
    let rest = rest.strip_suffix(" ET")?;
    let (date_part, range_part) = rest.split_once(", ")?;
    let (month, day) = date_part.trim().split_once(' ')?;
    let day: u32 = day.trim().parse().ok()?;
    let (start_str, end_str) = range_part.split_once('-')?;

    let year = now.with_timezone(&New_York).year();
    let start_local = parse_et_time(month, day, year, start_str)?;
    let mut end_local = parse_et_time(month, day, year, end_str)?;
    if end_local <= start_local {
        end_local += Duration::days(1);
    }
    let duration_seconds = (end_local - start_local).num_seconds();
    let window_id = format!(
        "{}:{}",
        asset.to_lowercase(),
        start_local.format("%Y%m%dT%H%M")
    );

    Some(MarketWindow {
        asset: asset.to_string(),
        start_ts: start_local.with_timezone(&Utc),
        end_ts: end_local.with_timezone(&Utc),
        duration_seconds,
        window_id,
    })
}

fn month_number(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ];
    MONTHS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(name))
        .map(|idx| idx as u32 + 1)
}

/// Parses `"H:MMAM"`/`"HH:MM PM"`-style times (no space before the meridiem,
/// matching the upstream title format) into an `America/New_York` datetime.
fn parse_et_time(
    month: &str,
    day: u32,
    year: i32,
    time_str: &str,
) -> Option<chrono::DateTime<chrono_tz::Tz>> {
    let month = month_number(month)?;
    let time_str = time_str.trim();
    let (clock, meridiem) = time_str.split_at(time_str.len().checked_sub(2)?);
    let (hour_str, minute_str) = clock.split_once(':')?;
    let mut hour: u32 = hour_str.parse().ok()?;
    let minute: u32 = minute_str.parse().ok()?;
    match meridiem.to_ascii_uppercase().as_str() {
        "AM" => {
            if hour == 12 {
                hour = 0;
            }
        }
        "PM" => {
            if hour != 12 {
                hour += 12;
            }
        }
        _ => return None,
    }
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let naive = date.and_hms_opt(hour, minute, 0)?;
    match New_York.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => Some(dt),
        chrono::LocalResult::Ambiguous(dt, _) => Some(dt),
        chrono::LocalResult::None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn parses_well_formed_window_title() {
        let window =
            parse_market_window("Bitcoin Up or Down - March 15, 9:00AM-9:15AM ET", sample_now())
                .unwrap();
        assert_eq!(window.asset, "Bitcoin");
        assert_eq!(window.duration_seconds, 15 * 60);
        assert_eq!(window.window_id, "bitcoin:20260315T0900");
        assert!(window.start_ts < window.end_ts);
    }

    #[test]
    fn non_window_title_returns_none() {
        assert!(parse_market_window("Will it rain tomorrow?", sample_now()).is_none());
    }

    #[test]
    fn rollover_past_midnight_adds_a_day() {
        let window = parse_market_window(
            "Ethereum Up or Down - March 15, 11:45PM-12:00AM ET",
            sample_now(),
        )
        .unwrap();
        assert_eq!(window.duration_seconds, 15 * 60);
    }

    #[test]
    fn remaining_seconds_counts_down_to_end() {
        let window =
            parse_market_window("Bitcoin Up or Down - March 15, 9:00AM-9:15AM ET", sample_now())
                .unwrap();
        let just_before_end = window.end_ts - Duration::seconds(30);
        assert_eq!(window.remaining_seconds(just_before_end), 30);
    }
}
