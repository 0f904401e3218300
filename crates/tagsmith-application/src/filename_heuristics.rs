// SPDX-License-Identifier: GPL-3.0-or-later

//! Filename-based heuristics for track metadata.
//!
//! Used when a file carries no usable tags: the stem is matched against
//! common naming patterns to recover a track number and title. Confidence is
//! inherently lower than tag-derived metadata, so these values only fill
//! gaps, never overwrite tags.

use lazy_static::lazy_static;
use regex::Regex;

/// Metadata extracted from a filename stem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedStem {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub track_number: Option<u32>,
}

lazy_static! {
    // Pattern: Artist - TrackNum - Title
    static ref PATTERN_ARTIST_TRACK_TITLE: Regex =
        Regex::new(r"^(?P<artist>[^-]+?)\s*-\s*(?P<track>\d{1,3})\s*-\s*(?P<title>.+)$")
            .expect("valid artist-track-title regex");

    // Pattern: TrackNum - Title
    static ref PATTERN_TRACK_TITLE: Regex =
        Regex::new(r"^(?P<track>\d{1,3})\s*[-.]\s*(?P<title>.+)$")
            .expect("valid track-title regex");

    // Pattern: TrackNum Title (no separator)
    static ref PATTERN_TRACK_TITLE_SPACE: Regex =
        Regex::new(r"^(?P<track>\d{1,3})\s+(?P<title>.+)$")
            .expect("valid track-title-space regex");
}

/// Parse a filename stem into track number and title.
///
/// Patterns are tried in order of specificity:
/// 1. `Artist - 01 - Title`
/// 2. `01 - Title` / `01. Title`
/// 3. `01 Title`
///
/// A stem matching none of them becomes the title as-is.
pub fn parse_stem(stem: &str) -> ParsedStem {
    let stem = stem.trim();

    if let Some(caps) = PATTERN_ARTIST_TRACK_TITLE.captures(stem) {
        return ParsedStem {
            artist: caps.name("artist").map(|m| m.as_str().trim().to_string()),
            title: caps.name("title").map(|m| m.as_str().trim().to_string()),
            track_number: caps
                .name("track")
                .and_then(|m| m.as_str().parse::<u32>().ok()),
        };
    }

    if let Some(caps) = PATTERN_TRACK_TITLE.captures(stem) {
        return ParsedStem {
            artist: None,
            title: caps.name("title").map(|m| m.as_str().trim().to_string()),
            track_number: caps
                .name("track")
                .and_then(|m| m.as_str().parse::<u32>().ok()),
        };
    }

    if let Some(caps) = PATTERN_TRACK_TITLE_SPACE.captures(stem) {
        return ParsedStem {
            artist: None,
            title: caps.name("title").map(|m| m.as_str().trim().to_string()),
            track_number: caps
                .name("track")
                .and_then(|m| m.as_str().parse::<u32>().ok()),
        };
    }

    ParsedStem {
        artist: None,
        title: Some(stem.to_string()).filter(|title| !title.is_empty()),
        track_number: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_artist_track_title() {
        let parsed = parse_stem("Radiohead - 02 - Paranoid Android");
        assert_eq!(parsed.artist.as_deref(), Some("Radiohead"));
        assert_eq!(parsed.track_number, Some(2));
        assert_eq!(parsed.title.as_deref(), Some("Paranoid Android"));
    }

    #[test]
    fn parses_track_dash_title() {
        let parsed = parse_stem("02 - Paranoid Android");
        assert_eq!(parsed.artist, None);
        assert_eq!(parsed.track_number, Some(2));
        assert_eq!(parsed.title.as_deref(), Some("Paranoid Android"));
    }

    #[test]
    fn parses_track_dot_title() {
        let parsed = parse_stem("02. Paranoid Android");
        assert_eq!(parsed.track_number, Some(2));
        assert_eq!(parsed.title.as_deref(), Some("Paranoid Android"));
    }

    #[test]
    fn parses_track_space_title() {
        let parsed = parse_stem("02 Paranoid Android");
        assert_eq!(parsed.track_number, Some(2));
        assert_eq!(parsed.title.as_deref(), Some("Paranoid Android"));
    }

    #[test]
    fn bare_stem_becomes_title() {
        let parsed = parse_stem("Paranoid Android");
        assert_eq!(parsed.track_number, None);
        assert_eq!(parsed.title.as_deref(), Some("Paranoid Android"));
    }

    #[test]
    fn empty_stem_has_no_title() {
        let parsed = parse_stem("   ");
        assert_eq!(parsed.title, None);
    }
}
