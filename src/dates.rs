use chrono::{Datelike, Days, Duration, NaiveDate, Weekday};

use crate::error::{Result, StandupError};

const WEEKDAYS: [(&str, Weekday); 7] = [
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
    ("sunday", Weekday::Sun),
];

/// Resolves a loose date query ("today", "yesterday", "3 days ago",
/// "last friday", "2024-01-10") against the team-local `today`.
pub fn parse_date_query(query: &str, today: NaiveDate) -> Result<NaiveDate> {
    let lowered = query.trim().to_lowercase();

    if lowered.contains("day before yesterday") {
        return Ok(today - Duration::days(2));
    }
    if lowered.contains("yesterday") {
        return Ok(today - Duration::days(1));
    }
    if lowered.contains("today") {
        return Ok(today);
    }

    if let Some(date) = find_iso_date(&lowered)? {
        return Ok(date);
    }

    for (name, weekday) in WEEKDAYS {
        if lowered.contains(&format!("last {name}")) {
            let mut days_back = (today.weekday().num_days_from_monday() + 7
                - weekday.num_days_from_monday())
                % 7;
            if days_back == 0 {
                days_back = 7;
            }
            return Ok(today - Duration::days(i64::from(days_back)));
        }
    }

    if let Some(days) = days_ago(&lowered) {
        return today
            .checked_sub_days(Days::new(u64::from(days)))
            .ok_or_else(|| StandupError::Validation(format!("{days} days ago is out of range")));
    }

    Err(StandupError::Validation(format!(
        "could not understand the date '{}'; try 'today', 'yesterday' or YYYY-MM-DD",
        query.trim()
    )))
}

fn find_iso_date(text: &str) -> Result<Option<NaiveDate>> {
    let bytes = text.as_bytes();
    if bytes.len() < 10 {
        return Ok(None);
    }
    for start in 0..=bytes.len() - 10 {
        let candidate = &bytes[start..start + 10];
        let shaped = candidate.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
        if shaped {
            let raw = &text[start..start + 10];
            return NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(Some)
                .map_err(|_| StandupError::Validation(format!("invalid date: {raw}")));
        }
    }
    Ok(None)
}

/// Digits only: a signed count would point into the future.
fn days_ago(text: &str) -> Option<u32> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words.windows(3).find_map(|window| match window {
        [count, unit, "ago"]
            if (*unit == "day" || *unit == "days")
                && count.bytes().all(|b| b.is_ascii_digit()) =>
        {
            count.parse().ok()
        }
        _ => None,
    })
}
