//! Last.fm gateway implementation

use crate::error::{ProviderError, Result};
use crate::ProviderGateway;
use async_trait::async_trait;
use moka::sync::Cache;
use reqwest::Client;
use serde::Deserialize;
use tagsmith_domain::{ProviderAlbum, ProviderArtist, ProviderKind, ProviderTrack};
use tracing::debug;

const LASTFM_API_BASE: &str = "https://ws.audioscrobbler.com/2.0/";

/// Separator used to encode `artist`/`album` into a canonical album id.
///
/// Last.fm search results carry no stable numeric album id, so the gateway
/// packs both names into the id and splits them again in `get_tracks`.
const ID_SEPARATOR: char = '\u{1f}';

/// Last.fm API gateway.
pub struct LastFmGateway {
    api_key: Option<String>,
    client: Client,
    base_url: String,
    cache_artists: Cache<String, Vec<ProviderArtist>>,
    cache_albums: Cache<String, Vec<ProviderAlbum>>,
}

impl LastFmGateway {
    pub fn new(api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            api_key,
            client: Client::new(),
            base_url: base_url.unwrap_or_else(|| LASTFM_API_BASE.to_string()),
            cache_artists: Cache::new(10_000),
            cache_albums: Cache::new(10_000),
        }
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ProviderError::MissingCredential("lastfm api_key"))
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, params: &[(&str, &str)]) -> Result<T> {
        let api_key = self.api_key()?;
        let mut query: Vec<(&str, &str)> = params.to_vec();
        query.push(("api_key", api_key));
        query.push(("format", "json"));

        debug!(target: "lastfm", method = params.first().map(|(_, m)| *m), "GET");
        let response = self.client.get(&self.base_url).query(&query).send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        // Last.fm reports API errors inside a 200 body.
        if let Ok(error) = serde_json::from_str::<LastFmErrorBody>(&body) {
            if let Some(message) = error.message {
                return Err(ProviderError::ApiError {
                    status: status.as_u16(),
                    message,
                });
            }
        }

        serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(format!("failed to parse response: {e}")))
    }

    pub fn album_id(artist: &str, album: &str) -> String {
        format!("{artist}{ID_SEPARATOR}{album}")
    }

    fn split_album_id(id: &str) -> Result<(&str, &str)> {
        id.split_once(ID_SEPARATOR)
            .ok_or_else(|| ProviderError::MalformedId(id.to_string()))
    }
}

#[async_trait]
impl ProviderGateway for LastFmGateway {
    fn kind(&self) -> ProviderKind {
        ProviderKind::LastFm
    }

    async fn search_artist(&self, query: &str) -> Result<Vec<ProviderArtist>> {
        if let Some(cached) = self.cache_artists.get(query) {
            return Ok(cached);
        }

        let response: ArtistSearchResponse = self
            .get(&[("method", "artist.search"), ("artist", query)])
            .await?;

        let artists: Vec<ProviderArtist> = response
            .results
            .artistmatches
            .artist
            .into_many()
            .into_iter()
            .map(|artist| ProviderArtist {
                // Artist pages are addressed by name; fall back to it when no
                // MBID is published.
                id: artist
                    .mbid
                    .filter(|mbid| !mbid.is_empty())
                    .unwrap_or_else(|| artist.name.clone()),
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

        let response: AlbumSearchResponse = self
            .get(&[("method", "album.search"), ("album", album)])
            .await?;

        let normalized_artist = artist.trim().to_lowercase();
        let albums: Vec<ProviderAlbum> = response
            .results
            .albummatches
            .album
            .into_many()
            .into_iter()
            .filter(|candidate| {
                // album.search has no artist parameter; narrow by the artist
                // we were given unless it is empty.
                normalized_artist.is_empty()
                    || candidate.artist.trim().to_lowercase() == normalized_artist
            })
            .map(|candidate| {
                let mut album = ProviderAlbum::new(
                    Self::album_id(&candidate.artist, &candidate.name),
                    candidate.name,
                );
                album.artist_name = Some(candidate.artist);
                album.cover_url = candidate
                    .image
                    .into_iter()
                    .rev()
                    .find_map(|image| image.text.filter(|url| !url.is_empty()));
                album
            })
            .collect();

        self.cache_albums.insert(cache_key, albums.clone());
        Ok(albums)
    }

    async fn get_artist(&self, id: &str) -> Result<ProviderArtist> {
        let response: ArtistInfoResponse = self
            .get(&[("method", "artist.getinfo"), ("artist", id)])
            .await?;

        Ok(ProviderArtist {
            id: id.to_string(),
            name: response.artist.name,
        })
    }

    async fn get_tracks(&self, album_id: &str) -> Result<Vec<ProviderTrack>> {
        let (artist, album) = Self::split_album_id(album_id)?;
        let response: AlbumInfoResponse = self
            .get(&[
                ("method", "album.getinfo"),
                ("artist", artist),
                ("album", album),
            ])
            .await?;

        let tracks = response
            .album
            .and_then(|album| album.tracks)
            .map(|tracks| tracks.track.into_many())
            .unwrap_or_default();

        Ok(tracks
            .into_iter()
            .enumerate()
            .map(|(index, track)| {
                let rank = track.attr.and_then(|attr| attr.rank);
                ProviderTrack {
                    id: format!("{album_id}{ID_SEPARATOR}{}", index + 1),
                    name: track.name,
                    disc_number: None,
                    track_number: rank.or(Some(index as u32 + 1)),
                    duration_ms: track.duration.map(|seconds| seconds * 1000),
                }
            })
            .collect())
    }
}

/// Last.fm collapses single-element lists into a bare object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_many(self) -> Vec<T> {
        match self {
            Self::Many(items) => items,
            Self::One(item) => vec![item],
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
struct LastFmErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[allow(dead_code)]
    error: u32,
}

#[derive(Debug, Deserialize)]
struct ArtistSearchResponse {
    results: ArtistSearchResults,
}

#[derive(Debug, Deserialize)]
struct ArtistSearchResults {
    artistmatches: ArtistMatches,
}

#[derive(Debug, Deserialize)]
struct ArtistMatches {
    #[serde(default)]
    artist: OneOrMany<LastFmArtist>,
}

#[derive(Debug, Deserialize)]
struct LastFmArtist {
    name: String,
    #[serde(default)]
    mbid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArtistInfoResponse {
    artist: LastFmArtist,
}

#[derive(Debug, Deserialize)]
struct AlbumSearchResponse {
    results: AlbumSearchResults,
}

#[derive(Debug, Deserialize)]
struct AlbumSearchResults {
    albummatches: AlbumMatches,
}

#[derive(Debug, Deserialize)]
struct AlbumMatches {
    #[serde(default)]
    album: OneOrMany<LastFmAlbum>,
}

#[derive(Debug, Deserialize)]
struct LastFmAlbum {
    name: String,
    artist: String,
    #[serde(default)]
    image: Vec<LastFmImage>,
}

#[derive(Debug, Deserialize)]
struct LastFmImage {
    #[serde(rename = "#text", default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlbumInfoResponse {
    #[serde(default)]
    album: Option<AlbumInfo>,
}

#[derive(Debug, Deserialize)]
struct AlbumInfo {
    #[serde(default)]
    tracks: Option<AlbumTracks>,
}

#[derive(Debug, Deserialize)]
struct AlbumTracks {
    #[serde(default)]
    track: OneOrMany<LastFmTrack>,
}

#[derive(Debug, Deserialize)]
struct LastFmTrack {
    name: String,
    #[serde(default)]
    duration: Option<u64>,
    #[serde(rename = "@attr", default)]
    attr: Option<TrackAttr>,
}

#[derive(Debug, Deserialize)]
struct TrackAttr {
    #[serde(default)]
    rank: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway(server: &MockServer) -> LastFmGateway {
        LastFmGateway::new(Some("test-key".to_string()), Some(server.uri()))
    }

    #[test]
    fn album_id_round_trips() {
        let id = LastFmGateway::album_id("Radiohead", "OK Computer");
        let (artist, album) = LastFmGateway::split_album_id(&id).expect("id splits");
        assert_eq!(artist, "Radiohead");
        assert_eq!(album, "OK Computer");
    }

    #[test]
    fn missing_api_key_is_a_credential_error() {
        let gateway = LastFmGateway::new(None, None);
        assert!(matches!(
            gateway.api_key(),
            Err(ProviderError::MissingCredential(_))
        ));
    }

    #[tokio::test]
    async fn search_album_filters_by_artist() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("method", "album.search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": {"albummatches": {"album": [
                    {"name": "OK Computer", "artist": "Radiohead", "image": []},
                    {"name": "OK Computer", "artist": "Karaoke Band", "image": []}
                ]}}
            })))
            .mount(&server)
            .await;

        let albums = gateway(&server)
            .search_album("Radiohead", "OK Computer")
            .await
            .expect("search succeeds");

        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].artist_name.as_deref(), Some("Radiohead"));
    }

    #[tokio::test]
    async fn get_tracks_reads_ranks_and_durations() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("method", "album.getinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "album": {"tracks": {"track": [
                    {"name": "Airbag", "duration": 284, "@attr": {"rank": 1}},
                    {"name": "Paranoid Android", "duration": 387, "@attr": {"rank": 2}}
                ]}}
            })))
            .mount(&server)
            .await;

        let id = LastFmGateway::album_id("Radiohead", "OK Computer");
        let tracks = gateway(&server).get_tracks(&id).await.expect("lookup succeeds");

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].track_number, Some(1));
        assert_eq!(tracks[0].duration_ms, Some(284_000));
        assert_eq!(tracks[1].name, "Paranoid Android");
    }

    #[tokio::test]
    async fn single_track_object_is_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "album": {"tracks": {"track":
                    {"name": "Only Song", "duration": 120, "@attr": {"rank": 1}}
                }}
            })))
            .mount(&server)
            .await;

        let id = LastFmGateway::album_id("Artist", "Single");
        let tracks = gateway(&server).get_tracks(&id).await.expect("lookup succeeds");
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].name, "Only Song");
    }
}
