use std::borrow::Cow;

use chrono::{DateTime, Local, NaiveDate, TimeZone};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use ruma::MilliSecondsSinceUnixEpoch;
use unicode_segmentation::UnicodeSegmentation;

/// The characters that `encodeURIComponent` leaves untouched, which is what matrix.to links expect.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');


pub fn unix_time_millis_to_datetime(millis: &MilliSecondsSinceUnixEpoch) -> Option<DateTime<Local>> {
    let millis: i64 = millis.get().into();
    Local.timestamp_millis_opt(millis).single()
}

/// Returns the local calendar day of the given timestamp.
pub fn local_day(millis: &MilliSecondsSinceUnixEpoch) -> Option<NaiveDate> {
    unix_time_millis_to_datetime(millis).map(|dt| dt.date_naive())
}

/// Formats a timestamp as a long local date, e.g., "March 4, 2024".
pub fn format_local_date(millis: &MilliSecondsSinceUnixEpoch) -> Option<String> {
    unix_time_millis_to_datetime(millis).map(|dt| dt.format("%B %-d, %Y").to_string())
}

/// Formats a timestamp as a short local time, e.g., "9:05 PM".
pub fn format_local_time(millis: &MilliSecondsSinceUnixEpoch) -> Option<String> {
    unix_time_millis_to_datetime(millis).map(|dt| dt.format("%-I:%M %p").to_string())
}

/// Maps a user or room identifier onto one of 8 avatar colors, numbered `1..=8`.
///
/// The hash is computed over UTF-16 code units with 32-bit wrapping arithmetic,
/// so that every client of the same server picks the same color for the same ID.
pub fn identifier_color_number(id: &str) -> u8 {
    let hash = id.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(i32::from(unit))
    });
    (hash.unsigned_abs() % 8) as u8 + 1
}

/// Returns the uppercased first character of a name to be shown in an avatar,
/// skipping a leading Matrix sigil (`@`, `#` or `!`).
pub fn avatar_initials(name: &str) -> String {
    let mut graphemes = name.graphemes(true);
    let first = match graphemes.next() {
        Some("@" | "#" | "!") => graphemes.next(),
        other => other,
    };
    first.map(str::to_uppercase).unwrap_or_default()
}

/// Shortens a name containing a guest user ID (`@u_xyz:server`) to `GGxyz`.
pub fn shorten_guest_name(name: &str) -> Cow<'_, str> {
    if !name.contains("@u_") {
        return Cow::Borrowed(name);
    }
    let localpart = name.split(':').next().unwrap_or(name);
    Cow::Owned(localpart.replacen("@u_", "GG", 1))
}

/// Builds a matrix.to permalink to an event in a room.
pub fn event_permalink(room_id: &str, event_id: &str) -> String {
    format!(
        "https://matrix.to/#/{}/{}",
        utf8_percent_encode(room_id, URI_COMPONENT),
        utf8_percent_encode(event_id, URI_COMPONENT),
    )
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_number_is_stable_and_in_range() {
        let a = identifier_color_number("@alice:example.org");
        assert_eq!(a, identifier_color_number("@alice:example.org"));
        assert!((1..=8).contains(&a));
        // "a" hashes to 97, and 97 % 8 == 1.
        assert_eq!(identifier_color_number("a"), 2);
        assert_eq!(identifier_color_number(""), 1);
    }

    #[test]
    fn initials_skip_sigils() {
        assert_eq!(avatar_initials("@bob:example.org"), "B");
        assert_eq!(avatar_initials("#room:example.org"), "R");
        assert_eq!(avatar_initials("émile"), "É");
        assert_eq!(avatar_initials(""), "");
    }

    #[test]
    fn guest_names_are_shortened() {
        assert_eq!(shorten_guest_name("@u_3f9a:example.org"), "GG3f9a");
        assert_eq!(shorten_guest_name("Alice"), "Alice");
        assert!(matches!(shorten_guest_name("@bob:example.org"), Cow::Borrowed(_)));
    }

    #[test]
    fn permalink_is_percent_encoded() {
        assert_eq!(
            event_permalink("!abc:example.org", "$ev/1"),
            "https://matrix.to/#/!abc%3Aexample.org/%24ev%2F1",
        );
    }
}
