// SPDX-License-Identifier: GPL-3.0-or-later

//! Shared fakes for unit tests: in-memory tag store, scripted folder mover,
//! scripted retry decider, and a canned provider gateway.

use crate::aligner::PairedTrack;
use crate::scanner::scan_album_folder;
use crate::session::ResolutionSession;
use crate::tag_store::{TagError, TagFields, TagStore, TagWrite};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use tagsmith_domain::{
    AlbumJob, Confidence, FindMode, ProviderAlbum, ProviderArtist, ProviderKind, ProviderTrack,
    Stage,
};
use tagsmith_providers::{ProviderError, ProviderGateway, ProviderRegistry};
use tempfile::TempDir;

#[derive(Default)]
pub struct FakeTagStore {
    fields: Mutex<HashMap<PathBuf, TagFields>>,
    fail_load: Mutex<HashSet<PathBuf>>,
    fail_store: Mutex<HashSet<PathBuf>>,
    stores: Mutex<Vec<(PathBuf, TagWrite)>>,
}

impl FakeTagStore {
    pub fn set(&self, path: &Path, fields: TagFields) {
        self.fields
            .lock()
            .expect("lock")
            .insert(path.to_path_buf(), fields);
    }

    pub fn fail_on(&self, path: &Path) {
        self.fail_load
            .lock()
            .expect("lock")
            .insert(path.to_path_buf());
    }

    pub fn fail_store_on(&self, path: &Path) {
        self.fail_store
            .lock()
            .expect("lock")
            .insert(path.to_path_buf());
    }

    pub fn store_count(&self) -> usize {
        self.stores.lock().expect("lock").len()
    }

    pub fn stores(&self) -> Vec<(PathBuf, TagWrite)> {
        self.stores.lock().expect("lock").clone()
    }
}

impl TagStore for FakeTagStore {
    fn load(&self, path: &Path) -> Result<TagFields, TagError> {
        if self.fail_load.lock().expect("lock").contains(path) {
            return Err(TagError::FileNotFound(path.display().to_string()));
        }
        Ok(self
            .fields
            .lock()
            .expect("lock")
            .get(path)
            .cloned()
            .unwrap_or(TagFields {
                duration_ms: 100_000,
                ..TagFields::default()
            }))
    }

    fn store(&self, path: &Path, write: &TagWrite) -> Result<(), TagError> {
        if self
            .fail_store
            .lock()
            .expect("lock")
            .contains(path)
        {
            return Err(TagError::NoTag(path.display().to_string()));
        }
        self.stores
            .lock()
            .expect("lock")
            .push((path.to_path_buf(), write.clone()));
        Ok(())
    }
}

use crate::commit::{FolderMover, MoveError, RetryDecider};

enum MoverBehavior {
    Relocate,
    LockedTimes(u32),
}

pub struct FakeMover {
    behavior: MoverBehavior,
    attempts: AtomicU32,
}

impl FakeMover {
    /// Mover that relocates on the first attempt.
    pub fn relocating() -> Self {
        Self {
            behavior: MoverBehavior::Relocate,
            attempts: AtomicU32::new(0),
        }
    }

    /// Alias used by tests that never exercise the mover.
    pub fn succeeding() -> Self {
        Self::relocating()
    }

    /// Mover that reports a lock for the first `locks` attempts, then
    /// relocates.
    pub fn locked_times(locks: u32) -> Self {
        Self {
            behavior: MoverBehavior::LockedTimes(locks),
            attempts: AtomicU32::new(0),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn relocate(
        album_path: &Path,
        artist: &str,
        year: Option<i32>,
        album: &str,
    ) -> Result<PathBuf, MoveError> {
        let root = album_path
            .parent()
            .and_then(Path::parent)
            .ok_or_else(|| MoveError::Io("no parent".to_string()))?;
        let album_segment = match year {
            Some(year) => format!("{year} - {album}"),
            None => album.to_string(),
        };
        let target = root.join(artist).join(album_segment);
        if target == album_path {
            return Ok(target);
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|err| MoveError::Io(err.to_string()))?;
        }
        fs::rename(album_path, &target).map_err(|err| MoveError::Io(err.to_string()))?;
        Ok(target)
    }
}

impl FolderMover for FakeMover {
    fn move_album(
        &self,
        album_path: &Path,
        artist: &str,
        year: Option<i32>,
        album: &str,
    ) -> Result<PathBuf, MoveError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            MoverBehavior::Relocate => Self::relocate(album_path, artist, year, album),
            MoverBehavior::LockedTimes(locks) => {
                if attempt < *locks {
                    Err(MoveError::Locked("held by another process".to_string()))
                } else {
                    Self::relocate(album_path, artist, year, album)
                }
            }
        }
    }
}

pub struct ScriptedRetry {
    decisions: Mutex<Vec<bool>>,
}

impl ScriptedRetry {
    pub fn new(mut decisions: Vec<bool>) -> Self {
        // Pop from the back.
        decisions.reverse();
        Self {
            decisions: Mutex::new(decisions),
        }
    }
}

impl RetryDecider for ScriptedRetry {
    fn retry(&self, _attempt: u32, _error: &MoveError) -> bool {
        self.decisions.lock().expect("lock").pop().unwrap_or(false)
    }
}

/// Build a temp album folder with `count` remote tracks, a local file for
/// every pair except the 0-based positions in `remote_only`, and a session
/// whose pairs are fully wired up.
pub fn session_with_pairs(
    tags: &FakeTagStore,
    count: usize,
    remote_only: &[usize],
) -> (TempDir, ResolutionSession) {
    let dir = TempDir::new().expect("temp dir");
    let album_path = dir.path().join("Radiohead").join("OK Computer");
    fs::create_dir_all(&album_path).expect("album dir");

    for position in 0..count {
        if remote_only.contains(&position) {
            continue;
        }
        let number = position + 1;
        let path = album_path.join(format!("{number:02} - Track {number}.mp3"));
        fs::write(&path, b"audio-data").expect("audio file");
    }

    let mut job = AlbumJob::for_folder(album_path, ProviderKind::MusicBrainz, FindMode::Quick);
    // The fixture represents a job that already reached the track stage.
    job.stage = Stage::Track;
    let files = scan_album_folder(&job.path, tags).expect("scan succeeds");
    let mut session = ResolutionSession::new(job, files.clone());

    let mut pairs = Vec::new();
    let mut remote_tracks = Vec::new();
    for position in 0..count {
        let number = position + 1;
        let track = ProviderTrack {
            id: format!("r{number}"),
            name: format!("Track {number}"),
            disc_number: None,
            track_number: Some(number as u32),
            duration_ms: Some(100_000),
        };
        remote_tracks.push(track.clone());

        if remote_only.contains(&position) {
            pairs.push(PairedTrack::remote_only(track));
        } else {
            let file = files
                .iter()
                .find(|record| record.title == format!("Track {number}"))
                .expect("file for pair")
                .clone();
            pairs.push(PairedTrack::matched(
                file,
                track,
                Confidence::scored(100, 75, 40),
            ));
        }
    }

    session.remote_tracks = remote_tracks;
    session.pairs = pairs;
    session.album = Some(ProviderAlbum::new("album-1", "OK Computer"));
    session.artist = Some(ProviderArtist {
        id: "artist-1".to_string(),
        name: "Radiohead".to_string(),
    });

    (dir, session)
}

/// Canned provider gateway with call counters and failure injection.
pub struct FakeGateway {
    kind: ProviderKind,
    artists: Mutex<Vec<ProviderArtist>>,
    albums: Mutex<Vec<ProviderAlbum>>,
    tracks: Mutex<HashMap<String, Vec<ProviderTrack>>>,
    fail_searches: Mutex<bool>,
    pub search_artist_calls: AtomicU32,
    pub search_album_calls: AtomicU32,
    pub get_tracks_calls: AtomicU32,
}

impl FakeGateway {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            artists: Mutex::new(Vec::new()),
            albums: Mutex::new(Vec::new()),
            tracks: Mutex::new(HashMap::new()),
            fail_searches: Mutex::new(false),
            search_artist_calls: AtomicU32::new(0),
            search_album_calls: AtomicU32::new(0),
            get_tracks_calls: AtomicU32::new(0),
        }
    }

    pub fn with_artists(self, artists: Vec<ProviderArtist>) -> Self {
        *self.artists.lock().expect("lock") = artists;
        self
    }

    pub fn with_albums(self, albums: Vec<ProviderAlbum>) -> Self {
        *self.albums.lock().expect("lock") = albums;
        self
    }

    pub fn with_tracks(self, album_id: &str, tracks: Vec<ProviderTrack>) -> Self {
        self.tracks
            .lock()
            .expect("lock")
            .insert(album_id.to_string(), tracks);
        self
    }

    pub fn fail_searches(&self) {
        *self.fail_searches.lock().expect("lock") = true;
    }
}

#[async_trait]
impl ProviderGateway for FakeGateway {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn search_artist(&self, _query: &str) -> Result<Vec<ProviderArtist>, ProviderError> {
        self.search_artist_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_searches.lock().expect("lock") {
            return Err(ProviderError::InvalidResponse("injected failure".to_string()));
        }
        Ok(self.artists.lock().expect("lock").clone())
    }

    async fn search_album(
        &self,
        _artist: &str,
        _album: &str,
    ) -> Result<Vec<ProviderAlbum>, ProviderError> {
        self.search_album_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_searches.lock().expect("lock") {
            return Err(ProviderError::InvalidResponse("injected failure".to_string()));
        }
        Ok(self.albums.lock().expect("lock").clone())
    }

    async fn get_artist(&self, id: &str) -> Result<ProviderArtist, ProviderError> {
        self.artists
            .lock()
            .expect("lock")
            .iter()
            .find(|artist| artist.id == id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(id.to_string()))
    }

    async fn get_tracks(&self, album_id: &str) -> Result<Vec<ProviderTrack>, ProviderError> {
        self.get_tracks_calls.fetch_add(1, Ordering::SeqCst);
        self.tracks
            .lock()
            .expect("lock")
            .get(album_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(album_id.to_string()))
    }
}

pub struct FakeRegistry {
    gateways: HashMap<ProviderKind, FakeGateway>,
}

impl FakeRegistry {
    pub fn new(gateways: Vec<FakeGateway>) -> Self {
        Self {
            gateways: gateways
                .into_iter()
                .map(|gateway| (gateway.kind, gateway))
                .collect(),
        }
    }

    pub fn fake(&self, kind: ProviderKind) -> &FakeGateway {
        self.gateways.get(&kind).expect("gateway registered")
    }
}

impl ProviderRegistry for FakeRegistry {
    fn gateway(&self, kind: ProviderKind) -> &dyn ProviderGateway {
        self.gateways.get(&kind).expect("gateway registered")
    }
}
