// SPDX-License-Identifier: GPL-3.0-or-later

//! Provider gateway: a uniform capability surface over the supported
//! metadata catalogs.
//!
//! Each provider client maps its own response payloads into the canonical
//! `ProviderArtist` / `ProviderAlbum` / `ProviderTrack` shapes at this
//! boundary, so the rest of the system never sees provider-specific fields.

mod error;
mod ratelimit;

pub mod deezer;
pub mod discogs;
pub mod lastfm;
pub mod musicbrainz;

pub use error::{ProviderError, Result};
pub use ratelimit::RateLimiter;

use async_trait::async_trait;
use tagsmith_domain::{ProviderAlbum, ProviderArtist, ProviderKind, ProviderTrack};

/// Capability surface every provider implements.
///
/// Errors from these operations are expected to degrade to "zero candidates"
/// at the caller; they are never batch-fatal.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn search_artist(&self, query: &str) -> Result<Vec<ProviderArtist>>;

    async fn search_album(&self, artist: &str, album: &str) -> Result<Vec<ProviderAlbum>>;

    async fn get_artist(&self, id: &str) -> Result<ProviderArtist>;

    async fn get_tracks(&self, album_id: &str) -> Result<Vec<ProviderTrack>>;
}

/// Lookup of the gateway for a provider kind.
pub trait ProviderRegistry: Send + Sync {
    fn gateway(&self, kind: ProviderKind) -> &dyn ProviderGateway;
}

/// The full set of provider clients, one per supported catalog.
pub struct ProviderSet {
    musicbrainz: musicbrainz::MusicBrainzGateway,
    discogs: discogs::DiscogsGateway,
    lastfm: lastfm::LastFmGateway,
    deezer: deezer::DeezerGateway,
}

impl ProviderSet {
    pub fn new(
        musicbrainz: musicbrainz::MusicBrainzGateway,
        discogs: discogs::DiscogsGateway,
        lastfm: lastfm::LastFmGateway,
        deezer: deezer::DeezerGateway,
    ) -> Self {
        Self {
            musicbrainz,
            discogs,
            lastfm,
            deezer,
        }
    }
}

impl ProviderRegistry for ProviderSet {
    fn gateway(&self, kind: ProviderKind) -> &dyn ProviderGateway {
        match kind {
            ProviderKind::MusicBrainz => &self.musicbrainz,
            ProviderKind::Discogs => &self.discogs,
            ProviderKind::LastFm => &self.lastfm,
            ProviderKind::Deezer => &self.deezer,
        }
    }
}

pub(crate) fn user_agent() -> &'static str {
    concat!(
        "tagsmith/",
        env!("CARGO_PKG_VERSION"),
        " ( https://github.com/tagsmith/tagsmith )"
    )
}
