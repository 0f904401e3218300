// SPDX-License-Identifier: GPL-3.0-or-later

//! Album folder scanner.
//!
//! Enumerates an album folder, filters to supported audio extensions, and
//! loads per-file metadata through the tag collaborator. Records keep the
//! raw directory-enumeration order so the filesystem-order pairing strategy
//! can preserve disc-folder traversal order; callers that want a display
//! order sort by path themselves.

use crate::filename_heuristics::parse_stem;
use crate::tag_store::TagStore;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("path does not exist: {0}")]
    PathNotFound(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// One local audio file with its tag-derived metadata.
///
/// Records are plain data: tag handles are scoped inside the tag store, so a
/// record never holds the file open. Refreshed by re-scanning after tag
/// writes and folder moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFileRecord {
    pub path: PathBuf,
    pub disc_number: Option<u32>,
    pub track_number: Option<u32>,
    /// Tag title, falling back to the filename-derived title.
    pub title: String,
    /// Title derived from the filename stem alone.
    pub stem_title: String,
    pub duration_ms: u64,
}

/// Scan an album folder into audio file records.
///
/// Unsupported and unreadable files are skipped with a warning; only a
/// missing folder or a directory read failure is an error.
pub fn scan_album_folder(
    root: impl AsRef<Path>,
    tags: &dyn TagStore,
) -> Result<Vec<AudioFileRecord>, ScanError> {
    let root = root.as_ref();
    if !root.exists() {
        return Err(ScanError::PathNotFound(root.display().to_string()));
    }

    let mut records = Vec::new();
    visit_directory(root, tags, &mut records)?;
    Ok(records)
}

fn visit_directory(
    directory: &Path,
    tags: &dyn TagStore,
    records: &mut Vec<AudioFileRecord>,
) -> Result<(), ScanError> {
    let entries = fs::read_dir(directory).map_err(|err| ScanError::Io(err.to_string()))?;

    for entry in entries {
        let entry = entry.map_err(|err| ScanError::Io(err.to_string()))?;
        let path = entry.path();

        let file_type = entry
            .file_type()
            .map_err(|err| ScanError::Io(err.to_string()))?;

        if file_type.is_symlink() {
            continue;
        }

        if file_type.is_dir() {
            visit_directory(&path, tags, records)?;
            continue;
        }

        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            continue;
        };

        if !is_audio_extension(&extension.to_ascii_lowercase()) {
            continue;
        }

        match load_record(&path, tags) {
            Ok(record) => records.push(record),
            Err(error) => {
                warn!(
                    target: "scanner",
                    path = %path.display(),
                    error = %error,
                    "skipping unreadable audio file"
                );
            }
        }
    }

    Ok(())
}

fn load_record(path: &Path, tags: &dyn TagStore) -> Result<AudioFileRecord, crate::tag_store::TagError> {
    let fields = tags.load(path)?;

    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default();
    let parsed = parse_stem(stem);
    let stem_title = parsed
        .title
        .clone()
        .unwrap_or_else(|| stem.to_string());

    let title = fields
        .title
        .filter(|title| !title.trim().is_empty())
        .or(parsed.title)
        .unwrap_or_else(|| stem.to_string());

    Ok(AudioFileRecord {
        path: path.to_path_buf(),
        disc_number: fields.disc,
        track_number: fields.track.or(parsed.track_number),
        title,
        stem_title,
        duration_ms: fields.duration_ms,
    })
}

pub fn is_audio_extension(extension: &str) -> bool {
    matches!(
        extension,
        "mp3" | "flac" | "m4a" | "aac" | "ogg" | "opus" | "wav" | "wv" | "ape" | "dsf"
    )
}
