//! Deezer gateway implementation

use crate::error::{ProviderError, Result};
use crate::ProviderGateway;
use async_trait::async_trait;
use moka::sync::Cache;
use reqwest::Client;
use serde::Deserialize;
use tagsmith_domain::{ProviderAlbum, ProviderArtist, ProviderKind, ProviderTrack, ReleaseDate};
use tracing::debug;

const DEEZER_API_BASE: &str = "https://api.deezer.com";

/// Deezer public API gateway. No credentials required.
pub struct DeezerGateway {
    client: Client,
    /// Base URL stored without a trailing slash.
    base_url: String,
    cache_artists: Cache<String, Vec<ProviderArtist>>,
    cache_albums: Cache<String, Vec<ProviderAlbum>>,
}

impl DeezerGateway {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url
                .unwrap_or_else(|| DEEZER_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            cache_artists: Cache::new(10_000),
            cache_albums: Cache::new(10_000),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        debug!(target: "deezer", url = %url, "GET");
        let response = self.client.get(url).query(query).send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        // Deezer reports errors inside a 200 body: {"error": {...}}.
        if let Ok(error) = serde_json::from_str::<DeezerErrorBody>(&body) {
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: error.error.message.unwrap_or_else(|| "unknown".to_string()),
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(format!("failed to parse response: {e}")))
    }
}

#[async_trait]
impl ProviderGateway for DeezerGateway {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Deezer
    }

    async fn search_artist(&self, query: &str) -> Result<Vec<ProviderArtist>> {
        if let Some(cached) = self.cache_artists.get(query) {
            return Ok(cached);
        }

        let url = format!("{}/search/artist", self.base_url);
        let response: DataList<DeezerArtist> = self.get(&url, &[("q", query)]).await?;

        let artists: Vec<ProviderArtist> = response
            .data
            .into_iter()
            .map(|artist| ProviderArtist {
                id: artist.id.to_string(),
                name: artist.name,
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

        let url = format!("{}/search/album", self.base_url);
        let query = if artist.is_empty() {
            format!("album:\"{album}\"")
        } else {
            format!("artist:\"{artist}\" album:\"{album}\"")
        };
        let response: DataList<DeezerAlbum> = self.get(&url, &[("q", &query)]).await?;

        let albums: Vec<ProviderAlbum> = response
            .data
            .into_iter()
            .map(|album| ProviderAlbum {
                id: album.id.to_string(),
                name: album.title,
                artist_name: album.artist.map(|artist| artist.name),
                release_date: album
                    .release_date
                    .as_deref()
                    .and_then(ReleaseDate::parse_str),
                cover_url: album.cover_medium.or(album.cover),
                combined: false,
                tracks: Vec::new(),
                album_names: Vec::new(),
            })
            .collect();

        self.cache_albums.insert(cache_key, albums.clone());
        Ok(albums)
    }

    async fn get_artist(&self, id: &str) -> Result<ProviderArtist> {
        let url = format!("{}/artist/{}", self.base_url, id);
        let artist: DeezerArtist = self.get(&url, &[]).await?;

        Ok(ProviderArtist {
            id: artist.id.to_string(),
            name: artist.name,
        })
    }

    async fn get_tracks(&self, album_id: &str) -> Result<Vec<ProviderTrack>> {
        let url = format!("{}/album/{}", self.base_url, album_id);
        let album: DeezerAlbumDetail = self.get(&url, &[]).await?;

        Ok(album
            .tracks
            .map(|tracks| tracks.data)
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(index, track)| ProviderTrack {
                id: track.id.to_string(),
                name: track.title,
                disc_number: track.disk_number,
                track_number: track.track_position.or(Some(index as u32 + 1)),
                duration_ms: track.duration.map(|seconds| seconds * 1000),
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct DataList<T> {
    #[serde(default)]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct DeezerErrorBody {
    error: DeezerErrorDetail,
}

#[derive(Debug, Deserialize)]
struct DeezerErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DeezerArtist {
    id: u64,
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct DeezerAlbum {
    id: u64,
    title: String,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    cover_medium: Option<String>,
    #[serde(default)]
    cover: Option<String>,
    #[serde(default)]
    artist: Option<DeezerArtistRef>,
}

#[derive(Debug, Deserialize)]
struct DeezerArtistRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct DeezerAlbumDetail {
    #[serde(default)]
    tracks: Option<DeezerTrackList>,
}

#[derive(Debug, Deserialize)]
struct DeezerTrackList {
    #[serde(default)]
    data: Vec<DeezerTrack>,
}

#[derive(Debug, Deserialize)]
struct DeezerTrack {
    id: u64,
    title: String,
    #[serde(default)]
    duration: Option<u64>,
    #[serde(default)]
    track_position: Option<u32>,
    #[serde(default)]
    disk_number: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway(server: &MockServer) -> DeezerGateway {
        DeezerGateway::new(Some(server.uri()))
    }

    #[tokio::test]
    async fn search_album_maps_dates_and_covers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/album"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{
                    "id": 302127,
                    "title": "Discovery",
                    "release_date": "2001-03-07",
                    "cover_medium": "https://cdn.deezer.com/cover.jpg",
                    "artist": {"name": "Daft Punk"}
                }]
            })))
            .mount(&server)
            .await;

        let albums = gateway(&server)
            .search_album("Daft Punk", "Discovery")
            .await
            .expect("search succeeds");

        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].id, "302127");
        assert_eq!(albums[0].year(), Some(2001));
        assert_eq!(
            albums[0].cover_url.as_deref(),
            Some("https://cdn.deezer.com/cover.jpg")
        );
    }

    #[tokio::test]
    async fn get_tracks_maps_positions_and_discs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/album/302127"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tracks": {"data": [
                    {"id": 1, "title": "One More Time", "duration": 320,
                     "track_position": 1, "disk_number": 1},
                    {"id": 2, "title": "Aerodynamic", "duration": 207,
                     "track_position": 2, "disk_number": 1}
                ]}
            })))
            .mount(&server)
            .await;

        let tracks = gateway(&server)
            .get_tracks("302127")
            .await
            .expect("lookup succeeds");

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].track_number, Some(1));
        assert_eq!(tracks[0].disc_number, Some(1));
        assert_eq!(tracks[1].duration_ms, Some(207_000));
    }

    #[tokio::test]
    async fn error_body_with_status_200_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": {"type": "DataException", "message": "no data", "code": 800}
            })))
            .mount(&server)
            .await;

        let result = gateway(&server).search_artist("nobody").await;
        assert!(matches!(result, Err(ProviderError::ApiError { .. })));
    }
}
