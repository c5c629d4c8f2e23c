//! Collection names and descriptions derived from a setlist.
//!
//! The name doubles as the dedup cache key, so it must stay stable for a
//! given setlist: `Band X [Setlist] // Tour Y (2024)`.

use jiff::civil::Date;

use crate::models::Setlist;

/// Tour name when the setlist has one, otherwise the venue.
pub fn collection_name(setlist: &Setlist) -> String {
    let occasion = setlist.tour().unwrap_or(&setlist.venue);
    format!(
        "{} [Setlist] // {} ({})",
        setlist.artist_name,
        occasion,
        setlist.event_date.year()
    )
}

pub fn collection_description(setlist: &Setlist) -> String {
    format!(
        "Setlist for {} at {} on {}.",
        setlist.artist_name,
        setlist.venue_and_city(),
        long_date(setlist.event_date)
    )
}

/// `June 1st, 2024`
pub fn long_date(date: Date) -> String {
    let day = date.day();
    format!("{} {}{}, {}", date.strftime("%B"), day, ordinal_suffix(day), date.year())
}

fn ordinal_suffix(day: i8) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}
