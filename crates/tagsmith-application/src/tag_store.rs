// SPDX-License-Identifier: GPL-3.0-or-later

//! Tag-library collaborator boundary.
//!
//! All tag I/O goes through the [`TagStore`] trait. The lofty-backed
//! implementation opens the file, performs the read or write, and drops the
//! handle on every exit path, so no handle outlives the operation that needed
//! it. That is what makes folder moves safe: by construction there is never
//! an open handle to release first.

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TagError {
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("tag parsing failed: {0}")]
    Parse(#[from] lofty::error::LoftyError),

    #[error("file has no writable tag: {0}")]
    NoTag(String),
}

/// Tag fields read from an audio file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFields {
    pub title: Option<String>,
    pub performers: Vec<String>,
    pub album_artists: Vec<String>,
    pub composers: Vec<String>,
    pub genres: Vec<String>,
    pub disc: Option<u32>,
    pub track: Option<u32>,
    pub disc_count: Option<u32>,
    pub track_count: Option<u32>,
    pub year: Option<u32>,
    pub comment: Option<String>,
    pub lyrics: Option<String>,
    pub duration_ms: u64,
}

/// The resolved tag set committed to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagWrite {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub album_artist: Option<String>,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub year: Option<u32>,
}

pub trait TagStore: Send + Sync {
    fn load(&self, path: &Path) -> Result<TagFields, TagError>;

    fn store(&self, path: &Path, write: &TagWrite) -> Result<(), TagError>;
}

/// lofty-backed tag store.
#[derive(Debug, Clone, Default)]
pub struct LoftyTagStore;

impl LoftyTagStore {
    pub fn new() -> Self {
        Self
    }
}

impl TagStore for LoftyTagStore {
    fn load(&self, path: &Path) -> Result<TagFields, TagError> {
        use lofty::file::{AudioFile, TaggedFileExt};
        use lofty::probe::Probe;
        use lofty::tag::{Accessor, ItemKey};

        if !path.exists() {
            return Err(TagError::FileNotFound(path.display().to_string()));
        }

        let tagged = Probe::open(path)?.read()?;
        let duration_ms = tagged.properties().duration().as_millis() as u64;

        let tag = tagged.primary_tag().or_else(|| tagged.first_tag());
        let mut fields = TagFields {
            duration_ms,
            ..TagFields::default()
        };

        if let Some(tag) = tag {
            fields.title = tag.title().map(|value| value.to_string());
            fields.performers = tag
                .get_strings(&ItemKey::TrackArtist)
                .map(str::to_string)
                .collect();
            fields.album_artists = tag
                .get_strings(&ItemKey::AlbumArtist)
                .map(str::to_string)
                .collect();
            fields.composers = tag
                .get_strings(&ItemKey::Composer)
                .map(str::to_string)
                .collect();
            fields.genres = tag
                .get_strings(&ItemKey::Genre)
                .map(str::to_string)
                .collect();
            fields.disc = tag.disk();
            fields.track = tag.track();
            fields.disc_count = tag.disk_total();
            fields.track_count = tag.track_total();
            fields.year = tag.year();
            fields.comment = tag.comment().map(|value| value.to_string());
            fields.lyrics = tag.get_string(&ItemKey::Lyrics).map(str::to_string);
        }

        Ok(fields)
    }

    fn store(&self, path: &Path, write: &TagWrite) -> Result<(), TagError> {
        use lofty::config::WriteOptions;
        use lofty::file::TaggedFileExt;
        use lofty::probe::Probe;
        use lofty::tag::{Accessor, ItemKey, Tag, TagExt};

        if !path.exists() {
            return Err(TagError::FileNotFound(path.display().to_string()));
        }

        let mut tagged = Probe::open(path)?.read()?;
        if tagged.primary_tag_mut().is_none() {
            let tag_type = tagged.primary_tag_type();
            tagged.insert_tag(Tag::new(tag_type));
        }
        let tag = tagged
            .primary_tag_mut()
            .ok_or_else(|| TagError::NoTag(path.display().to_string()))?;

        tag.set_title(write.title.clone());
        tag.set_artist(write.artist.clone());
        tag.set_album(write.album.clone());

        match write.album_artist.as_deref() {
            Some(album_artist) => {
                tag.insert_text(ItemKey::AlbumArtist, album_artist.to_string());
            }
            None => {
                tag.remove_key(&ItemKey::AlbumArtist);
            }
        }

        match write.track_number {
            Some(track) => tag.set_track(track),
            None => tag.remove_track(),
        }
        match write.disc_number {
            Some(disc) => tag.set_disk(disc),
            None => tag.remove_disk(),
        }
        match write.year {
            Some(year) => tag.set_year(year),
            None => tag.remove_year(),
        }

        tag.save_to_path(path, WriteOptions::default())?;
        Ok(())
    }
}
