// SPDX-License-Identifier: GPL-3.0-or-later

//! Mutable state for one album resolution session.

use crate::aligner::PairedTrack;
use crate::scanner::AudioFileRecord;
use tagsmith_domain::{AlbumJob, MatchStrategy, ProviderAlbum, ProviderArtist, ProviderTrack};

/// Sub-state of the track stage: normal browsing, manual pair editing, or
/// review of marked pairs.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackMode {
    Browse,
    Manual {
        /// Position within the pairs that carry a local file.
        cursor: usize,
    },
    Review {
        /// Pair indices queued for review.
        queue: Vec<usize>,
        /// Remote tracks still assignable; shrinks as picks are made.
        pool: Vec<ProviderTrack>,
        position: usize,
    },
}

/// All state that must survive across stage transitions within one album
/// job. The stage machine is the only writer.
#[derive(Debug)]
pub struct ResolutionSession {
    pub job: AlbumJob,
    pub files: Vec<AudioFileRecord>,
    pub artist: Option<ProviderArtist>,
    pub album: Option<ProviderAlbum>,
    pub remote_tracks: Vec<ProviderTrack>,
    pub pairs: Vec<PairedTrack>,
    pub strategy: MatchStrategy,
    pub reverse_columns: bool,
    pub preview: bool,
    pub mode: TrackMode,
    /// Messages for the operator, drained by the console after each step.
    pub notices: Vec<String>,
}

impl ResolutionSession {
    pub fn new(mut job: AlbumJob, files: Vec<AudioFileRecord>) -> Self {
        job.track_count = files.len();
        Self {
            job,
            files,
            artist: None,
            album: None,
            remote_tracks: Vec::new(),
            pairs: Vec::new(),
            strategy: MatchStrategy::Order,
            reverse_columns: false,
            preview: false,
            mode: TrackMode::Browse,
            notices: Vec::new(),
        }
    }

    pub fn notice(&mut self, message: impl Into<String>) {
        self.notices.push(message.into());
    }

    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    /// Indices of pairs that carry a local file, in pair order.
    pub fn file_pair_indices(&self) -> Vec<usize> {
        self.pairs
            .iter()
            .enumerate()
            .filter(|(_, pair)| pair.file.is_some())
            .map(|(index, _)| index)
            .collect()
    }

    /// Resolved album-artist for tag writes and folder naming: manual
    /// override first, then the selected artist, then the album credit,
    /// then the folder-derived name.
    pub fn effective_artist(&self) -> String {
        if let Some(override_name) = &self.job.album_artist_override {
            return override_name.clone();
        }
        if let Some(artist) = &self.artist {
            return artist.name.clone();
        }
        if let Some(album) = &self.album {
            if let Some(artist_name) = &album.artist_name {
                return artist_name.clone();
            }
        }
        self.job.artist_name.clone()
    }

    pub fn effective_album_name(&self) -> String {
        self.album
            .as_ref()
            .map(|album| album.name.clone())
            .unwrap_or_else(|| self.job.album_name.clone())
    }

    pub fn effective_year(&self) -> Option<i32> {
        self.album
            .as_ref()
            .and_then(|album| album.year())
            .or(self.job.year)
    }
}
