// SPDX-License-Identifier: GPL-3.0-or-later
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Enums
// ============================================================================

/// The metadata catalog currently queried for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    MusicBrainz,
    Discogs,
    LastFm,
    Deezer,
}

impl ProviderKind {
    /// Two-letter console shortcut that switches to this provider mid-job.
    pub fn shortcut(self) -> &'static str {
        match self {
            Self::MusicBrainz => "mb",
            Self::Discogs => "dc",
            Self::LastFm => "lf",
            Self::Deezer => "dz",
        }
    }

    pub fn from_shortcut(token: &str) -> Option<Self> {
        match token {
            "mb" => Some(Self::MusicBrainz),
            "dc" => Some(Self::Discogs),
            "lf" => Some(Self::LastFm),
            "dz" => Some(Self::Deezer),
            _ => None,
        }
    }

    pub fn all() -> [Self; 4] {
        [Self::MusicBrainz, Self::Discogs, Self::LastFm, Self::Deezer]
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MusicBrainz => write!(f, "musicbrainz"),
            Self::Discogs => write!(f, "discogs"),
            Self::LastFm => write!(f, "lastfm"),
            Self::Deezer => write!(f, "deezer"),
        }
    }
}

/// Workflow position within one album job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Artist,
    Quick,
    Album,
    Track,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Artist => write!(f, "artist search"),
            Self::Quick => write!(f, "quick search"),
            Self::Album => write!(f, "album search"),
            Self::Track => write!(f, "track matching"),
        }
    }
}

/// How a job enters the workflow: direct artist+album text search, or
/// artist-first with a separate album stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindMode {
    Quick,
    ArtistFirst,
}

impl FindMode {
    /// The stage a job (re-)enters under this mode.
    pub fn entry_stage(self) -> Stage {
        match self {
            Self::Quick => Stage::Quick,
            Self::ArtistFirst => Stage::Artist,
        }
    }
}

/// Pairing strategy used by the track aligner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchStrategy {
    Order,
    FilesystemOrder,
    TrackNumber,
    Duration,
    Name,
    Title,
    Hybrid,
    Manual,
}

impl MatchStrategy {
    /// Single-letter console token for this strategy.
    pub fn token(self) -> &'static str {
        match self {
            Self::Order => "o",
            Self::FilesystemOrder => "f",
            Self::TrackNumber => "t",
            Self::Duration => "d",
            Self::Name => "n",
            Self::Title => "l",
            Self::Hybrid => "h",
            Self::Manual => "m",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "o" => Some(Self::Order),
            "f" => Some(Self::FilesystemOrder),
            "t" => Some(Self::TrackNumber),
            "d" => Some(Self::Duration),
            "n" => Some(Self::Name),
            "l" => Some(Self::Title),
            "h" => Some(Self::Hybrid),
            "m" => Some(Self::Manual),
            _ => None,
        }
    }
}

impl std::fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Order => write!(f, "order"),
            Self::FilesystemOrder => write!(f, "filesystem-order"),
            Self::TrackNumber => write!(f, "track-number"),
            Self::Duration => write!(f, "duration"),
            Self::Name => write!(f, "name"),
            Self::Title => write!(f, "title"),
            Self::Hybrid => write!(f, "hybrid"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

// ============================================================================
// Release dates
// ============================================================================

/// A release date with year, month, and day components of varying precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseDate {
    pub year: i32,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl ReleaseDate {
    pub fn new(year: i32, month: Option<u32>, day: Option<u32>) -> Self {
        Self { year, month, day }
    }

    /// Parse a date string in various formats.
    ///
    /// Supported formats:
    /// - Year only: `2024`
    /// - Year-Month: `2024-12`, `2024/12`, `202412`
    /// - Full date: `2024-12-31`, `2024/12/31`, `20241231`
    /// - ISO 8601 with timezone: `2024-12-31T00:00:00Z`
    ///
    /// Returns `None` if the string cannot be parsed or contains invalid
    /// date values.
    pub fn parse_str(s: &str) -> Option<Self> {
        let s = s.trim();

        if (s.contains('T') || s.contains('Z') || s.contains('+')) && s.len() > 10 {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                let date = dt.date_naive();
                let year = date.year();
                Self::validate_year(year)?;
                return Some(Self {
                    year,
                    month: Some(date.month()),
                    day: Some(date.day()),
                });
            }
            if let Ok(dt) = s.parse::<DateTime<Utc>>() {
                let date = dt.date_naive();
                let year = date.year();
                Self::validate_year(year)?;
                return Some(Self {
                    year,
                    month: Some(date.month()),
                    day: Some(date.day()),
                });
            }
        }

        if !s.contains('-') && !s.contains('/') {
            return Self::parse_compact(s);
        }

        let delimiter = if s.contains('-') { '-' } else { '/' };
        let parts: Vec<&str> = s.split(delimiter).collect();

        match parts.len() {
            1 => {
                let year = parts[0].parse().ok()?;
                Self::validate_year(year)?;
                Some(Self::new(year, None, None))
            }
            2 => {
                let year = parts[0].parse().ok()?;
                let month: u32 = parts[1].parse().ok()?;
                Self::validate_year(year)?;
                Self::validate_month(month)?;
                Some(Self::new(year, Some(month), None))
            }
            3 => {
                let year = parts[0].parse().ok()?;
                let month: u32 = parts[1].parse().ok()?;
                let day: u32 = parts[2].parse().ok()?;
                Self::validate_year(year)?;
                Self::validate_month(month)?;
                Self::validate_day(year, month, day)?;
                Some(Self::new(year, Some(month), Some(day)))
            }
            _ => None,
        }
    }

    /// Parse compact date formats (YYYY, YYYYMM, or YYYYMMDD).
    fn parse_compact(s: &str) -> Option<Self> {
        match s.len() {
            4 => {
                let year = s.parse().ok()?;
                Self::validate_year(year)?;
                Some(Self::new(year, None, None))
            }
            6 => {
                let year = s[0..4].parse().ok()?;
                let month = s[4..6].parse().ok()?;
                Self::validate_year(year)?;
                Self::validate_month(month)?;
                Some(Self::new(year, Some(month), None))
            }
            8 => {
                let year = s[0..4].parse().ok()?;
                let month = s[4..6].parse().ok()?;
                let day = s[6..8].parse().ok()?;
                Self::validate_year(year)?;
                Self::validate_month(month)?;
                Self::validate_day(year, month, day)?;
                Some(Self::new(year, Some(month), Some(day)))
            }
            _ => None,
        }
    }

    fn validate_year(year: i32) -> Option<()> {
        (1900..=2100).contains(&year).then_some(())
    }

    fn validate_month(month: u32) -> Option<()> {
        (1..=12).contains(&month).then_some(())
    }

    fn validate_day(year: i32, month: u32, day: u32) -> Option<()> {
        NaiveDate::from_ymd_opt(year, month, day)?;
        Some(())
    }

    pub fn to_iso8601(&self) -> String {
        match (self.month, self.day) {
            (Some(m), Some(d)) => format!("{:04}-{:02}-{:02}", self.year, m, d),
            (Some(m), None) => format!("{:04}-{:02}", self.year, m),
            (None, _) => format!("{:04}", self.year),
        }
    }
}

impl std::fmt::Display for ReleaseDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_iso8601())
    }
}

// ============================================================================
// Canonical provider shapes
// ============================================================================

/// Provider-agnostic view of a catalog artist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderArtist {
    /// Provider-issued identifier (MBID, numeric id, or name key).
    pub id: String,
    pub name: String,
}

/// Provider-agnostic view of a catalog track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderTrack {
    pub id: String,
    pub name: String,
    pub disc_number: Option<u32>,
    pub track_number: Option<u32>,
    pub duration_ms: Option<u64>,
}

/// Provider-agnostic view of a catalog album.
///
/// A combined album is a synthetic aggregate built by merging the track lists
/// of several same-titled releases; it carries the merged tracks and the
/// titles of the releases it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAlbum {
    pub id: String,
    pub name: String,
    pub artist_name: Option<String>,
    pub release_date: Option<ReleaseDate>,
    pub cover_url: Option<String>,
    pub combined: bool,
    /// Merged track list; only populated for combined albums.
    pub tracks: Vec<ProviderTrack>,
    /// Titles of the releases merged into a combined album.
    pub album_names: Vec<String>,
}

impl ProviderAlbum {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            artist_name: None,
            release_date: None,
            cover_url: None,
            combined: false,
            tracks: Vec::new(),
            album_names: Vec::new(),
        }
    }

    /// Build a synthetic combined album from several releases and their
    /// fetched track lists. The first release supplies id, date, and cover;
    /// track lists are concatenated in the order given.
    ///
    /// Returns `None` when `parts` is empty.
    pub fn combined(parts: Vec<(ProviderAlbum, Vec<ProviderTrack>)>) -> Option<Self> {
        let first = parts.first()?.0.clone();
        let album_names: Vec<String> = parts.iter().map(|(album, _)| album.name.clone()).collect();
        let tracks: Vec<ProviderTrack> =
            parts.into_iter().flat_map(|(_, tracks)| tracks).collect();

        Some(Self {
            combined: true,
            tracks,
            album_names,
            ..first
        })
    }

    pub fn year(&self) -> Option<i32> {
        self.release_date.as_ref().map(|date| date.year)
    }
}

// ============================================================================
// Confidence
// ============================================================================

/// High/Medium/Low classification of a pair's match quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBucket {
    Low,
    Medium,
    High,
}

impl ConfidenceBucket {
    /// Bucket a 0-100 score. `high_floor` and `low_floor` come from the
    /// matching tunables; scores at or above `high_floor` are High, scores
    /// below `low_floor` are Low.
    pub fn for_score(score: u8, high_floor: u8, low_floor: u8) -> Self {
        if score >= high_floor {
            Self::High
        } else if score < low_floor {
            Self::Low
        } else {
            Self::Medium
        }
    }
}

impl std::fmt::Display for ConfidenceBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Match quality for one paired track: a 0-100 score plus its bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confidence {
    pub score: u8,
    pub bucket: ConfidenceBucket,
}

impl Confidence {
    pub fn scored(score: u8, high_floor: u8, low_floor: u8) -> Self {
        Self {
            score,
            bucket: ConfidenceBucket::for_score(score, high_floor, low_floor),
        }
    }

    /// Confidence for a pair with only one side present.
    pub fn unscored() -> Self {
        Self {
            score: 0,
            bucket: ConfidenceBucket::Low,
        }
    }
}

// ============================================================================
// Per-job state
// ============================================================================

/// Per-album-job cache of the last fetched candidate lists, the current
/// display page, and the selected provider-artist id. Enables back-navigation
/// between stages without re-querying.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionCache {
    pub artists: Vec<ProviderArtist>,
    pub albums: Vec<ProviderAlbum>,
    pub page: usize,
    pub provider_artist_id: Option<String>,
}

impl ResolutionCache {
    pub fn set_artists(&mut self, artists: Vec<ProviderArtist>) {
        self.artists = artists;
        self.page = 0;
    }

    pub fn set_albums(&mut self, albums: Vec<ProviderAlbum>) {
        self.albums = albums;
        self.page = 0;
    }

    /// Drop everything; used when the provider changes and cached candidates
    /// no longer belong to the active catalog.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Window of `items` for the current page.
    pub fn page_slice<'a, T>(&self, items: &'a [T], page_size: usize) -> &'a [T] {
        let start = (self.page * page_size).min(items.len());
        let end = (start + page_size).min(items.len());
        &items[start..end]
    }

    pub fn next_page(&mut self, item_count: usize, page_size: usize) {
        if (self.page + 1) * page_size < item_count {
            self.page += 1;
        }
    }

    pub fn prev_page(&mut self) {
        self.page = self.page.saturating_sub(1);
    }
}

/// Per-folder processing context spanning all stages of one album.
///
/// Created when the batch loop visits a folder, discarded when the user
/// skips or completes it. Mutated only by the stage machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumJob {
    pub path: PathBuf,
    pub album_name: String,
    pub artist_name: String,
    pub year: Option<i32>,
    pub track_count: usize,
    pub provider: ProviderKind,
    pub stage: Stage,
    pub find_mode: FindMode,
    pub album_artist_override: Option<String>,
    pub cache: ResolutionCache,
}

impl AlbumJob {
    /// Create a job for an album folder, deriving year/album from the folder
    /// name and the artist from the parent folder name.
    pub fn for_folder(path: PathBuf, provider: ProviderKind, find_mode: FindMode) -> Self {
        let folder_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        let (year, album_name) = split_year_and_album(folder_name);
        let artist_name = path
            .parent()
            .and_then(|parent| parent.file_name())
            .and_then(|name| name.to_str())
            .map(str::to_owned)
            .unwrap_or_default();

        Self {
            path,
            album_name,
            artist_name,
            year,
            track_count: 0,
            provider,
            stage: find_mode.entry_stage(),
            find_mode,
            album_artist_override: None,
            cache: ResolutionCache::default(),
        }
    }

    /// Switch provider mid-job: caches are cleared and the job returns to
    /// its entry stage.
    pub fn switch_provider(&mut self, provider: ProviderKind) {
        self.provider = provider;
        self.cache.clear();
        self.stage = self.find_mode.entry_stage();
    }
}

/// Split an album folder name into `(year, album)`.
///
/// Recognizes a leading `YYYY - Album` prefix and a trailing `Album (YYYY)`
/// suffix; anything else is treated as a bare album name.
pub fn split_year_and_album(folder_name: &str) -> (Option<i32>, String) {
    let trimmed = folder_name.trim();

    if let (Some(head), Some(tail)) = (trimmed.get(..4), trimmed.get(4..)) {
        if !tail.is_empty() {
            if let Ok(year) = head.parse::<i32>() {
                if (1900..=2100).contains(&year) {
                    let rest = tail.trim_start_matches([' ', '-', '.', '_']).trim();
                    if !rest.is_empty() {
                        return (Some(year), rest.to_string());
                    }
                }
            }
        }
    }

    if let Some(open) = trimmed.rfind('(') {
        if trimmed.ends_with(')') {
            let inner = &trimmed[open + 1..trimmed.len() - 1];
            if let Ok(year) = inner.parse::<i32>() {
                if (1900..=2100).contains(&year) {
                    let rest = trimmed[..open].trim();
                    if !rest.is_empty() {
                        return (Some(year), rest.to_string());
                    }
                }
            }
        }
    }

    (None, trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_date_parses_delimited_formats() {
        assert_eq!(
            ReleaseDate::parse_str("1997-05-21"),
            Some(ReleaseDate::new(1997, Some(5), Some(21)))
        );
        assert_eq!(
            ReleaseDate::parse_str("1997-05"),
            Some(ReleaseDate::new(1997, Some(5), None))
        );
        assert_eq!(
            ReleaseDate::parse_str("1997"),
            Some(ReleaseDate::new(1997, None, None))
        );
    }

    #[test]
    fn release_date_rejects_invalid_values() {
        assert_eq!(ReleaseDate::parse_str("1899"), None);
        assert_eq!(ReleaseDate::parse_str("1997-13"), None);
        assert_eq!(ReleaseDate::parse_str("1997-02-30"), None);
        assert_eq!(ReleaseDate::parse_str("not a date"), None);
    }

    #[test]
    fn release_date_parses_compact_and_iso() {
        assert_eq!(
            ReleaseDate::parse_str("19970521"),
            Some(ReleaseDate::new(1997, Some(5), Some(21)))
        );
        assert_eq!(
            ReleaseDate::parse_str("1997-05-21T00:00:00Z"),
            Some(ReleaseDate::new(1997, Some(5), Some(21)))
        );
    }

    #[test]
    fn splits_leading_year_prefix() {
        let (year, album) = split_year_and_album("1997 - OK Computer");
        assert_eq!(year, Some(1997));
        assert_eq!(album, "OK Computer");
    }

    #[test]
    fn splits_trailing_year_suffix() {
        let (year, album) = split_year_and_album("OK Computer (1997)");
        assert_eq!(year, Some(1997));
        assert_eq!(album, "OK Computer");
    }

    #[test]
    fn bare_album_name_has_no_year() {
        let (year, album) = split_year_and_album("OK Computer");
        assert_eq!(year, None);
        assert_eq!(album, "OK Computer");
    }

    #[test]
    fn numeric_album_title_is_not_a_year() {
        // "1984" alone parses as a year candidate but leaves no album name,
        // so it must stay an album title.
        let (year, album) = split_year_and_album("1984");
        assert_eq!(year, None);
        assert_eq!(album, "1984");
    }

    #[test]
    fn provider_shortcuts_round_trip() {
        for kind in ProviderKind::all() {
            assert_eq!(ProviderKind::from_shortcut(kind.shortcut()), Some(kind));
        }
        assert_eq!(ProviderKind::from_shortcut("zz"), None);
    }

    #[test]
    fn strategy_tokens_round_trip() {
        for strategy in [
            MatchStrategy::Order,
            MatchStrategy::FilesystemOrder,
            MatchStrategy::TrackNumber,
            MatchStrategy::Duration,
            MatchStrategy::Name,
            MatchStrategy::Title,
            MatchStrategy::Hybrid,
            MatchStrategy::Manual,
        ] {
            assert_eq!(MatchStrategy::from_token(strategy.token()), Some(strategy));
        }
    }

    #[test]
    fn confidence_buckets_are_monotonic() {
        let high_floor = 75;
        let low_floor = 40;
        let mut last = ConfidenceBucket::Low;
        for score in 0..=100u8 {
            let bucket = ConfidenceBucket::for_score(score, high_floor, low_floor);
            assert!(bucket >= last, "bucket regressed at score {score}");
            last = bucket;
        }
        assert_eq!(
            ConfidenceBucket::for_score(75, high_floor, low_floor),
            ConfidenceBucket::High
        );
        assert_eq!(
            ConfidenceBucket::for_score(39, high_floor, low_floor),
            ConfidenceBucket::Low
        );
    }

    #[test]
    fn combined_album_merges_tracks_and_names() {
        let disc_one = ProviderAlbum::new("1", "Live Vol. 1");
        let disc_two = ProviderAlbum::new("2", "Live Vol. 2");
        let track = |id: &str, name: &str| ProviderTrack {
            id: id.to_string(),
            name: name.to_string(),
            disc_number: None,
            track_number: None,
            duration_ms: None,
        };

        let combined = ProviderAlbum::combined(vec![
            (disc_one, vec![track("a", "Intro"), track("b", "Song")]),
            (disc_two, vec![track("c", "Outro")]),
        ])
        .expect("non-empty parts");

        assert!(combined.combined);
        assert_eq!(combined.id, "1");
        assert_eq!(combined.tracks.len(), 3);
        assert_eq!(combined.album_names, vec!["Live Vol. 1", "Live Vol. 2"]);
    }

    #[test]
    fn combined_album_requires_parts() {
        assert_eq!(ProviderAlbum::combined(Vec::new()), None);
    }

    #[test]
    fn cache_pages_without_requerying() {
        let mut cache = ResolutionCache::default();
        let items: Vec<u32> = (0..12).collect();

        assert_eq!(cache.page_slice(&items, 5), &[0, 1, 2, 3, 4]);
        cache.next_page(items.len(), 5);
        assert_eq!(cache.page_slice(&items, 5), &[5, 6, 7, 8, 9]);
        cache.next_page(items.len(), 5);
        assert_eq!(cache.page_slice(&items, 5), &[10, 11]);
        // Already on the last page.
        cache.next_page(items.len(), 5);
        assert_eq!(cache.page, 2);
        cache.prev_page();
        cache.prev_page();
        cache.prev_page();
        assert_eq!(cache.page, 0);
    }

    #[test]
    fn switching_provider_clears_cache_and_restarts_stage() {
        let mut job = AlbumJob::for_folder(
            PathBuf::from("/music/Radiohead/1997 - OK Computer"),
            ProviderKind::MusicBrainz,
            FindMode::ArtistFirst,
        );
        job.stage = Stage::Album;
        job.cache.set_artists(vec![ProviderArtist {
            id: "a1".into(),
            name: "Radiohead".into(),
        }]);

        job.switch_provider(ProviderKind::Deezer);

        assert_eq!(job.provider, ProviderKind::Deezer);
        assert_eq!(job.stage, Stage::Artist);
        assert!(job.cache.artists.is_empty());
    }

    #[test]
    fn job_derives_names_from_folder_layout() {
        let job = AlbumJob::for_folder(
            PathBuf::from("/music/Radiohead/1997 - OK Computer"),
            ProviderKind::MusicBrainz,
            FindMode::Quick,
        );
        assert_eq!(job.artist_name, "Radiohead");
        assert_eq!(job.album_name, "OK Computer");
        assert_eq!(job.year, Some(1997));
        assert_eq!(job.stage, Stage::Quick);
    }
}
