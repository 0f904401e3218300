// SPDX-License-Identifier: GPL-3.0-or-later

use crate::error::{ProviderError, Result};
use crate::ratelimit::RateLimiter;
use crate::ProviderGateway;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tagsmith_domain::{ProviderAlbum, ProviderArtist, ProviderKind, ProviderTrack, ReleaseDate};
use tracing::{debug, trace};
use url::Url;
use uuid::Uuid;

const MUSICBRAINZ_API_BASE: &str = "https://musicbrainz.org/ws/2";
const COVER_ART_ARCHIVE_BASE: &str = "https://coverartarchive.org";
const SEARCH_LIMIT: u32 = 25;

/// MusicBrainz gateway with rate limiting.
///
/// Albums are resolved at the release level (not release groups) so that a
/// selected album always carries a fetchable track list.
#[derive(Debug, Clone)]
pub struct MusicBrainzGateway {
    client: Client,
    base_url: String,
    cover_art_base_url: String,
    rate_limiter: RateLimiter,
}

impl MusicBrainzGateway {
    pub fn new(base_url: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(crate::user_agent())
            .build()?;

        Ok(Self {
            client,
            base_url: base_url
                .unwrap_or_else(|| MUSICBRAINZ_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            cover_art_base_url: COVER_ART_ARCHIVE_BASE.to_string(),
            // MusicBrainz allows one request per second for non-commercial use.
            rate_limiter: RateLimiter::new(Duration::from_secs(1)),
        })
    }

    /// Internal method to perform rate-limited GET requests.
    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.rate_limiter.acquire().await;

        trace!(target: "musicbrainz", "GET {}", url);

        let response = self.client.get(url).send().await?;

        let status = response.status();
        debug!(target: "musicbrainz", "response status: {}", status);

        if status == 404 {
            return Err(ProviderError::NotFound(url.to_string()));
        }

        if status == 503 {
            return Err(ProviderError::RateLimitExceeded);
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        trace!(target: "musicbrainz", "response body: {}", body);

        serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(format!("failed to parse response: {e}")))
    }

    fn search_url(&self, entity: &str, query: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, entity))
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("fmt", "json")
            .append_pair("limit", &SEARCH_LIMIT.to_string());

        Ok(url)
    }

    fn parse_mbid(&self, id: &str) -> Result<Uuid> {
        Uuid::parse_str(id).map_err(|_| ProviderError::MalformedId(id.to_string()))
    }

    fn cover_url(&self, release_mbid: Uuid) -> String {
        format!("{}/release/{}/front-500", self.cover_art_base_url, release_mbid)
    }

    fn map_release(&self, release: MbRelease) -> ProviderAlbum {
        let artist_name = release
            .artist_credit
            .first()
            .map(|credit| credit.name.clone());

        ProviderAlbum {
            id: release.id.to_string(),
            name: release.title,
            artist_name,
            release_date: release.date.as_deref().and_then(ReleaseDate::parse_str),
            cover_url: Some(self.cover_url(release.id)),
            combined: false,
            tracks: Vec::new(),
            album_names: Vec::new(),
        }
    }
}

#[async_trait]
impl ProviderGateway for MusicBrainzGateway {
    fn kind(&self) -> ProviderKind {
        ProviderKind::MusicBrainz
    }

    async fn search_artist(&self, query: &str) -> Result<Vec<ProviderArtist>> {
        let url = self.search_url("artist", query)?;
        let response: ArtistSearchResponse = self.get(url.as_str()).await?;

        Ok(response
            .artists
            .into_iter()
            .map(|artist| ProviderArtist {
                id: artist.id.to_string(),
                name: artist.name,
            })
            .collect())
    }

    async fn search_album(&self, artist: &str, album: &str) -> Result<Vec<ProviderAlbum>> {
        // Lucene query over the release index; quotes keep multi-word names
        // as phrases.
        let query = if artist.is_empty() {
            format!("release:\"{album}\"")
        } else {
            format!("artist:\"{artist}\" AND release:\"{album}\"")
        };
        let url = self.search_url("release", &query)?;
        let response: ReleaseSearchResponse = self.get(url.as_str()).await?;

        Ok(response
            .releases
            .into_iter()
            .map(|release| self.map_release(release))
            .collect())
    }

    async fn get_artist(&self, id: &str) -> Result<ProviderArtist> {
        let mbid = self.parse_mbid(id)?;
        let url = format!("{}/artist/{}?fmt=json", self.base_url, mbid);
        let artist: MbArtist = self.get(&url).await?;

        Ok(ProviderArtist {
            id: artist.id.to_string(),
            name: artist.name,
        })
    }

    async fn get_tracks(&self, album_id: &str) -> Result<Vec<ProviderTrack>> {
        let mbid = self.parse_mbid(album_id)?;
        let url = format!("{}/release/{}?fmt=json&inc=recordings", self.base_url, mbid);
        let release: MbReleaseDetail = self.get(&url).await?;

        let mut tracks = Vec::new();
        for (index, medium) in release.media.into_iter().enumerate() {
            let disc_number = medium.position.unwrap_or(index as u32 + 1);
            for track in medium.tracks {
                tracks.push(ProviderTrack {
                    id: track.id.to_string(),
                    name: track.title,
                    disc_number: Some(disc_number),
                    track_number: track.position,
                    duration_ms: track.length,
                });
            }
        }

        Ok(tracks)
    }
}

#[derive(Debug, Deserialize)]
struct ArtistSearchResponse {
    #[serde(default)]
    artists: Vec<MbArtist>,
}

#[derive(Debug, Deserialize)]
struct MbArtist {
    id: Uuid,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseSearchResponse {
    #[serde(default)]
    releases: Vec<MbRelease>,
}

#[derive(Debug, Deserialize)]
struct MbRelease {
    id: Uuid,
    title: String,
    #[serde(default)]
    date: Option<String>,
    #[serde(rename = "artist-credit", default)]
    artist_credit: Vec<MbArtistCredit>,
}

#[derive(Debug, Deserialize)]
struct MbArtistCredit {
    name: String,
}

#[derive(Debug, Deserialize)]
struct MbReleaseDetail {
    #[serde(default)]
    media: Vec<MbMedium>,
}

#[derive(Debug, Deserialize)]
struct MbMedium {
    #[serde(default)]
    position: Option<u32>,
    #[serde(default)]
    tracks: Vec<MbTrack>,
}

#[derive(Debug, Deserialize)]
struct MbTrack {
    id: Uuid,
    title: String,
    #[serde(default)]
    position: Option<u32>,
    #[serde(default)]
    length: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway(server: &MockServer) -> MusicBrainzGateway {
        MusicBrainzGateway::new(Some(server.uri())).expect("client builds")
    }

    #[tokio::test]
    async fn search_artist_maps_canonical_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artist"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "artists": [
                    {"id": "a74b1b7f-71a5-4011-9441-d0b5e4122711", "name": "Radiohead"}
                ]
            })))
            .mount(&server)
            .await;

        let artists = gateway(&server)
            .search_artist("Radiohead")
            .await
            .expect("search succeeds");

        assert_eq!(artists.len(), 1);
        assert_eq!(artists[0].name, "Radiohead");
        assert_eq!(artists[0].id, "a74b1b7f-71a5-4011-9441-d0b5e4122711");
    }

    #[tokio::test]
    async fn search_album_parses_release_dates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/release"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "releases": [{
                    "id": "9b1acd3f-6c1c-4a57-9cb6-0b57d9b8cb7e",
                    "title": "OK Computer",
                    "date": "1997-05-21",
                    "artist-credit": [{"name": "Radiohead"}]
                }]
            })))
            .mount(&server)
            .await;

        let albums = gateway(&server)
            .search_album("Radiohead", "OK Computer")
            .await
            .expect("search succeeds");

        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].name, "OK Computer");
        assert_eq!(albums[0].artist_name.as_deref(), Some("Radiohead"));
        assert_eq!(albums[0].year(), Some(1997));
        assert!(albums[0]
            .cover_url
            .as_deref()
            .expect("cover url present")
            .contains("9b1acd3f"));
    }

    #[tokio::test]
    async fn get_tracks_flattens_media_into_discs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(
                "/release/9b1acd3f-6c1c-4a57-9cb6-0b57d9b8cb7e",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "media": [
                    {
                        "position": 1,
                        "tracks": [
                            {"id": "11111111-1111-1111-1111-111111111111", "title": "Airbag", "position": 1, "length": 284000}
                        ]
                    },
                    {
                        "position": 2,
                        "tracks": [
                            {"id": "22222222-2222-2222-2222-222222222222", "title": "Lucky", "position": 1, "length": 259000}
                        ]
                    }
                ]
            })))
            .mount(&server)
            .await;

        let tracks = gateway(&server)
            .get_tracks("9b1acd3f-6c1c-4a57-9cb6-0b57d9b8cb7e")
            .await
            .expect("lookup succeeds");

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].disc_number, Some(1));
        assert_eq!(tracks[1].disc_number, Some(2));
        assert_eq!(tracks[0].duration_ms, Some(284000));
    }

    #[tokio::test]
    async fn malformed_album_id_is_rejected_without_a_request() {
        let server = MockServer::start().await;
        let result = gateway(&server).get_tracks("not-a-uuid").await;
        assert!(matches!(result, Err(ProviderError::MalformedId(_))));
    }

    #[tokio::test]
    async fn not_found_maps_to_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = gateway(&server)
            .get_artist("a74b1b7f-71a5-4011-9441-d0b5e4122711")
            .await;
        assert!(matches!(result, Err(ProviderError::NotFound(_))));
    }
}
