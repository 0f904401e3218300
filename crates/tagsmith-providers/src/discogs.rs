//! Discogs gateway implementation

use crate::error::{ProviderError, Result};
use crate::ratelimit::RateLimiter;
use crate::ProviderGateway;
use async_trait::async_trait;
use moka::sync::Cache;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tagsmith_domain::{ProviderAlbum, ProviderArtist, ProviderKind, ProviderTrack, ReleaseDate};
use tracing::debug;

/// Discogs API gateway.
///
/// Discogs allows 60 authenticated requests per minute (~1/sec); the rate
/// limiter enforces that interval. Search responses are cached so that
/// re-entering a stage after back-navigation does not spend quota.
pub struct DiscogsGateway {
    token: Option<String>,
    client: Client,
    rate_limiter: RateLimiter,
    /// Base URL stored without a trailing slash.
    base_url: String,
    cache_artists: Cache<String, Vec<ProviderArtist>>,
    cache_albums: Cache<String, Vec<ProviderAlbum>>,
}

impl DiscogsGateway {
    pub fn new(token: Option<String>, base_url: Option<String>) -> Self {
        let client = Client::builder()
            .user_agent(crate::user_agent())
            .build()
            .unwrap_or_else(|error| {
                debug!(
                    ?error,
                    "failed to build Discogs HTTP client with custom user agent, falling back to default client"
                );
                Client::new()
            });

        Self {
            token,
            client,
            rate_limiter: RateLimiter::new(Duration::from_secs(1)),
            // Trim trailing slash once at construction so every URL format is clean.
            base_url: base_url
                .unwrap_or_else(|| "https://api.discogs.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            cache_artists: Cache::new(10_000),
            cache_albums: Cache::new(10_000),
        }
    }

    fn request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token.as_deref() {
            Some(token) if !token.trim().is_empty() => {
                // Discogs uses its own token scheme (not Bearer):
                // "Discogs token=<value>"
                request.header("Authorization", format!("Discogs token={}", token.trim()))
            }
            _ => request,
        }
    }

    async fn get_value(&self, url: &str, query: &[(&str, &str)]) -> Result<Value> {
        self.rate_limiter.acquire().await;

        debug!(target: "discogs", url = %url, "GET");
        let response = self
            .request(self.client.get(url))
            .query(query)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        parse_discogs_body(status, &body)
    }
}

#[async_trait]
impl ProviderGateway for DiscogsGateway {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Discogs
    }

    async fn search_artist(&self, query: &str) -> Result<Vec<ProviderArtist>> {
        if let Some(cached) = self.cache_artists.get(query) {
            return Ok(cached);
        }

        let url = format!("{}/database/search", self.base_url);
        let value = self
            .get_value(&url, &[("type", "artist"), ("q", query)])
            .await?;
        let search: SearchResponse = serde_json::from_value(value)?;

        let artists: Vec<ProviderArtist> = search
            .results
            .into_iter()
            .filter_map(|item| {
                let id = item.id?;
                let name = item.title?;
                Some(ProviderArtist {
                    id: id.to_string(),
                    name,
                })
            })
            .collect();

        self.cache_artists.insert(query.to_string(), artists.clone());
        Ok(artists)
    }

    async fn search_album(&self, artist: &str, album: &str) -> Result<Vec<ProviderAlbum>> {
        let cache_key = format!("{artist}:{album}");
        if let Some(cached) = self.cache_albums.get(&cache_key) {
            return Ok(cached);
        }

        let url = format!("{}/database/search", self.base_url);
        let value = self
            .get_value(
                &url,
                &[
                    ("type", "release"),
                    ("artist", artist),
                    ("release_title", album),
                ],
            )
            .await?;
        let search: SearchResponse = serde_json::from_value(value)?;

        let albums: Vec<ProviderAlbum> = search
            .results
            .into_iter()
            .filter_map(|item| {
                let id = item.id?;
                let title = item.title?;
                // Search result titles come back as "Artist - Album".
                let (artist_name, name) = match title.split_once(" - ") {
                    Some((artist_part, album_part)) => {
                        (Some(artist_part.trim().to_string()), album_part.trim().to_string())
                    }
                    None => (None, title),
                };
                Some(ProviderAlbum {
                    id: id.to_string(),
                    name,
                    artist_name,
                    release_date: item
                        .year
                        .map(|year| ReleaseDate::new(i32::from(year), None, None)),
                    cover_url: item.cover_image,
                    combined: false,
                    tracks: Vec::new(),
                    album_names: Vec::new(),
                })
            })
            .collect();

        self.cache_albums.insert(cache_key, albums.clone());
        Ok(albums)
    }

    async fn get_artist(&self, id: &str) -> Result<ProviderArtist> {
        let url = format!("{}/artists/{}", self.base_url, id);
        let value = self.get_value(&url, &[]).await?;
        let detail: ArtistDetailResponse = serde_json::from_value(value)?;

        Ok(ProviderArtist {
            id: id.to_string(),
            name: detail.name.ok_or(ProviderError::MissingField("name"))?,
        })
    }

    async fn get_tracks(&self, album_id: &str) -> Result<Vec<ProviderTrack>> {
        let url = format!("{}/releases/{}", self.base_url, album_id);
        let value = self.get_value(&url, &[]).await?;
        let detail: ReleaseDetailResponse = serde_json::from_value(value)?;

        let mut sequence = 0u32;
        Ok(detail
            .tracklist
            .into_iter()
            .filter(|entry| entry.type_.as_deref().unwrap_or("track") == "track")
            .map(|entry| {
                sequence += 1;
                let (disc_number, track_number) = parse_position(entry.position.as_deref());
                ProviderTrack {
                    id: format!("{album_id}:{sequence}"),
                    name: entry.title.unwrap_or_default(),
                    disc_number,
                    track_number: track_number.or(Some(sequence)),
                    duration_ms: entry.duration.as_deref().and_then(parse_duration_ms),
                }
            })
            .collect())
    }
}

/// Parse a Discogs tracklist position into disc/track numbers.
///
/// Positions come in several shapes: `"5"` (plain track), `"1-5"` or `"1.5"`
/// (disc-track), and vinyl side markers like `"A1"` (no disc number).
fn parse_position(position: Option<&str>) -> (Option<u32>, Option<u32>) {
    let Some(position) = position.map(str::trim).filter(|p| !p.is_empty()) else {
        return (None, None);
    };

    if let Some((disc, track)) = position.split_once(['-', '.']) {
        if let (Ok(disc), Ok(track)) = (disc.parse::<u32>(), track.parse::<u32>()) {
            return (Some(disc), Some(track));
        }
    }

    if let Ok(track) = position.parse::<u32>() {
        return (None, Some(track));
    }

    // Vinyl side marker: strip the leading letters and keep the digits.
    let digits: String = position.chars().filter(char::is_ascii_digit).collect();
    (None, digits.parse::<u32>().ok())
}

/// Parse a `"m:ss"` or `"h:mm:ss"` duration string into milliseconds.
fn parse_duration_ms(duration: &str) -> Option<u64> {
    let duration = duration.trim();
    if duration.is_empty() {
        return None;
    }

    let mut seconds = 0u64;
    for part in duration.split(':') {
        seconds = seconds * 60 + part.trim().parse::<u64>().ok()?;
    }
    Some(seconds * 1000)
}

/// Error type helper: non-success statuses and `message` payloads both map
/// into `ProviderError`.
fn parse_discogs_body(status: StatusCode, response_body: &str) -> Result<Value> {
    if !status.is_success() {
        return Err(ProviderError::ApiError {
            status: status.as_u16(),
            message: response_body.to_string(),
        });
    }

    let value: Value = serde_json::from_str(response_body)?;
    if let Some(message) = value.get("message").and_then(|message| message.as_str()) {
        return Err(ProviderError::ApiError {
            status: status.as_u16(),
            message: message.to_string(),
        });
    }

    Ok(value)
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResultItem>,
}

#[derive(Debug, Deserialize)]
struct SearchResultItem {
    id: Option<u64>,
    title: Option<String>,
    year: Option<u16>,
    #[serde(default)]
    cover_image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArtistDetailResponse {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseDetailResponse {
    #[serde(default)]
    tracklist: Vec<TracklistEntry>,
}

#[derive(Debug, Deserialize)]
struct TracklistEntry {
    #[serde(default)]
    position: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    duration: Option<String>,
    #[serde(rename = "type_", default)]
    type_: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn parses_plain_and_disc_positions() {
        assert_eq!(parse_position(Some("5")), (None, Some(5)));
        assert_eq!(parse_position(Some("1-5")), (Some(1), Some(5)));
        assert_eq!(parse_position(Some("2.3")), (Some(2), Some(3)));
        assert_eq!(parse_position(Some("A1")), (None, Some(1)));
        assert_eq!(parse_position(Some("")), (None, None));
        assert_eq!(parse_position(None), (None, None));
    }

    #[test]
    fn parses_duration_strings() {
        assert_eq!(parse_duration_ms("4:03"), Some(243_000));
        assert_eq!(parse_duration_ms("1:02:03"), Some(3_723_000));
        assert_eq!(parse_duration_ms(""), None);
        assert_eq!(parse_duration_ms("abc"), None);
    }

    #[tokio::test]
    async fn search_album_splits_artist_prefix() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/database/search"))
            .and(query_param("type", "release"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {"id": 123, "title": "Radiohead - OK Computer", "year": 1997,
                     "cover_image": "https://img.discogs.com/x.jpg"}
                ]
            })))
            .mount(&server)
            .await;

        let gateway = DiscogsGateway::new(None, Some(server.uri()));
        let albums = gateway
            .search_album("Radiohead", "OK Computer")
            .await
            .expect("search succeeds");

        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].id, "123");
        assert_eq!(albums[0].name, "OK Computer");
        assert_eq!(albums[0].artist_name.as_deref(), Some("Radiohead"));
        assert_eq!(albums[0].year(), Some(1997));
    }

    #[tokio::test]
    async fn api_message_payload_becomes_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"message": "You must authenticate"})),
            )
            .mount(&server)
            .await;

        let gateway = DiscogsGateway::new(None, Some(server.uri()));
        let result = gateway.search_artist("Radiohead").await;
        assert!(matches!(result, Err(ProviderError::ApiError { .. })));
    }
}
