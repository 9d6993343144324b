//! Normalisation helpers for names and dates reported by sources.

use chrono::NaiveDate;

const ARTICLES: [&str; 3] = ["the ", "a ", "an "];

/// Derive a sort name by dropping a leading English article.
#[must_use]
pub fn sort_name(name: &str) -> String {
    let trimmed = name.trim();
    for article in ARTICLES {
        let Some(prefix) = trimmed.get(..article.len()) else {
            continue;
        };
        if prefix.eq_ignore_ascii_case(article) {
            let rest = trimmed[article.len()..].trim_start();
            if !rest.is_empty() {
                return rest.to_string();
            }
        }
    }
    trimmed.to_string()
}

/// Parse a release date as sources report it.
///
/// Accepts `YYYY-MM-DD`, `YYYY.MM.DD`, `YYYY-MM` and a bare `YYYY`; a bare
/// year maps to the first of January.
#[must_use]
pub fn parse_release_date(raw: &str) -> Option<NaiveDate> {
    let normalized = raw.trim().replace('.', "-");
    let mut parts = normalized.splitn(3, '-');
    let year: i32 = parts.next()?.trim().parse().ok()?;
    let month: u32 = match parts.next() {
        Some(m) => m.trim().parse().ok()?,
        None => 1,
    };
    let day: u32 = match parts.next() {
        // Trailing time components ("2001-05-03T00:00:00") are ignored.
        Some(d) => d.trim().get(..2).unwrap_or(d).parse().ok()?,
        None => 1,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Release date for a source that only reports a year.
#[must_use]
pub fn release_date_from_year(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)
}
