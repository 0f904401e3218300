// SPDX-License-Identifier: GPL-3.0-or-later

//! Commit engine: durably applies resolved metadata and relocates the album
//! folder, with retry-on-lock semantics for the move.

use crate::scanner::{scan_album_folder, AudioFileRecord};
use crate::session::ResolutionSession;
use crate::tag_store::{TagStore, TagWrite};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum MoveError {
    #[error("folder is locked: {0}")]
    Locked(String),

    #[error("target already exists: {0}")]
    TargetExists(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Collaborator that physically relocates an album folder.
pub trait FolderMover: Send + Sync {
    fn move_album(
        &self,
        album_path: &Path,
        artist: &str,
        year: Option<i32>,
        album: &str,
    ) -> Result<PathBuf, MoveError>;
}

/// Asked whether to retry after a lock failure; the console implementation
/// prompts the operator, the non-interactive one always declines.
pub trait RetryDecider: Send + Sync {
    fn retry(&self, attempt: u32, error: &MoveError) -> bool;
}

/// Retry decider for unattended runs: never retries.
pub struct NoRetry;

impl RetryDecider for NoRetry {
    fn retry(&self, _attempt: u32, _error: &MoveError) -> bool {
        false
    }
}

/// Filesystem-backed folder mover.
///
/// The target layout is `<root>/<artist>/<year - album>`; `library_root`
/// overrides the default root (the grandparent of the album folder).
pub struct FsFolderMover {
    pub library_root: Option<PathBuf>,
}

impl FolderMover for FsFolderMover {
    fn move_album(
        &self,
        album_path: &Path,
        artist: &str,
        year: Option<i32>,
        album: &str,
    ) -> Result<PathBuf, MoveError> {
        let root = self
            .library_root
            .clone()
            .or_else(|| {
                album_path
                    .parent()
                    .and_then(Path::parent)
                    .map(Path::to_path_buf)
            })
            .or_else(|| album_path.parent().map(Path::to_path_buf))
            .ok_or_else(|| MoveError::Io("album folder has no parent".to_string()))?;

        let album_segment = match year {
            Some(year) => format!("{year} - {album}"),
            None => album.to_string(),
        };
        let target = root
            .join(sanitize_segment(artist))
            .join(sanitize_segment(&album_segment));

        if target == album_path {
            return Ok(target);
        }
        if target.exists() {
            return Err(MoveError::TargetExists(target.display().to_string()));
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|err| MoveError::Io(err.to_string()))?;
        }

        fs::rename(album_path, &target).map_err(classify_io_error)?;
        Ok(target)
    }
}

fn classify_io_error(err: io::Error) -> MoveError {
    match err.kind() {
        io::ErrorKind::PermissionDenied | io::ErrorKind::WouldBlock => {
            MoveError::Locked(err.to_string())
        }
        _ => MoveError::Io(err.to_string()),
    }
}

/// Sanitize a path segment for filesystem safety.
pub fn sanitize_segment(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_end_matches('.').trim();
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// A parsed 1-based index selection: `"3"`, `"2-4"`, or `"1,3-5"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSpec(Vec<usize>);

impl RangeSpec {
    pub fn parse(input: &str) -> Option<Self> {
        let mut indices = BTreeSet::new();
        for part in input.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            match part.split_once('-') {
                Some((start, end)) => {
                    let start: usize = start.trim().parse().ok()?;
                    let end: usize = end.trim().parse().ok()?;
                    if start == 0 || end < start {
                        return None;
                    }
                    indices.extend(start..=end);
                }
                None => {
                    let index: usize = part.parse().ok()?;
                    if index == 0 {
                        return None;
                    }
                    indices.insert(index);
                }
            }
        }
        if indices.is_empty() {
            return None;
        }
        Some(Self(indices.into_iter().collect()))
    }

    pub fn all(count: usize) -> Self {
        Self((1..=count).collect())
    }

    /// 1-based indices, ascending.
    pub fn indices(&self) -> &[usize] {
        &self.0
    }
}

/// Why one selected index was not saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoAudio,
    NoRemote,
    OutOfRange,
    Preview,
    WriteFailed(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAudio => write!(f, "NoAudio"),
            Self::NoRemote => write!(f, "NoRemote"),
            Self::OutOfRange => write!(f, "OutOfRange"),
            Self::Preview => write!(f, "Preview"),
            Self::WriteFailed(error) => write!(f, "WriteFailed: {error}"),
        }
    }
}

/// Per-track outcome report for one save invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub saved: Vec<PathBuf>,
    /// `(1-based selection index, reason)` for every index not saved.
    pub skipped: Vec<(usize, SkipReason)>,
}

/// Outcome of a folder rename attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    Moved(PathBuf),
    SkippedByUser,
    Failed(String),
    Preview,
}

pub struct CommitEngine<'a> {
    tags: &'a dyn TagStore,
    mover: &'a dyn FolderMover,
}

impl<'a> CommitEngine<'a> {
    pub fn new(tags: &'a dyn TagStore, mover: &'a dyn FolderMover) -> Self {
        Self { tags, mover }
    }

    /// Save the pairs selected by `range` (1-based over the current pair
    /// list). Saved pairs are removed from the queue so repeated partial
    /// saves converge to an empty queue; the file and remote-track lists are
    /// refreshed afterwards.
    pub fn save_selected(&self, session: &mut ResolutionSession, range: &RangeSpec) -> SaveReport {
        let mut report = SaveReport::default();
        let mut saved_pair_indices: Vec<usize> = Vec::new();

        for &selection in range.indices() {
            let Some(pair) = session.pairs.get(selection - 1) else {
                report.skipped.push((selection, SkipReason::OutOfRange));
                continue;
            };

            let Some(file) = pair.file.clone() else {
                report.skipped.push((selection, SkipReason::NoAudio));
                continue;
            };
            let Some(remote) = pair.remote.clone() else {
                report.skipped.push((selection, SkipReason::NoRemote));
                continue;
            };

            if session.preview {
                report.skipped.push((selection, SkipReason::Preview));
                continue;
            }

            let write = build_tag_write(session, &remote);
            match self.tags.store(&file.path, &write) {
                Ok(()) => {
                    info!(
                        target: "commit",
                        path = %file.path.display(),
                        title = %write.title,
                        "tags saved"
                    );
                    report.saved.push(file.path.clone());
                    saved_pair_indices.push(selection - 1);
                }
                Err(error) => {
                    warn!(
                        target: "commit",
                        path = %file.path.display(),
                        error = %error,
                        "tag write failed"
                    );
                    report
                        .skipped
                        .push((selection, SkipReason::WriteFailed(error.to_string())));
                }
            }
        }

        if !saved_pair_indices.is_empty() {
            self.remove_saved(session, &saved_pair_indices);
            self.refresh_files(session);
        }

        report
    }

    /// Save every fully-paired entry. The caller follows up with the folder
    /// rename; this is the tag half of "finish album".
    pub fn save_all(&self, session: &mut ResolutionSession) -> SaveReport {
        let range = RangeSpec::all(session.pairs.len());
        self.save_selected(session, &range)
    }

    /// Rename/relocate the album folder, retrying on lock contention until
    /// the decider declines. On success the session is re-scanned from the
    /// new location and remaining pairs are remapped to the refreshed file
    /// list by position.
    pub fn rename_album(
        &self,
        session: &mut ResolutionSession,
        decider: &dyn RetryDecider,
    ) -> RenameOutcome {
        if session.preview {
            session.notice("preview mode: folder rename skipped");
            return RenameOutcome::Preview;
        }

        let artist = session.effective_artist();
        let album = session.effective_album_name();
        let year = session.effective_year();

        let mut attempt: u32 = 0;
        loop {
            match self
                .mover
                .move_album(&session.job.path, &artist, year, &album)
            {
                Ok(new_path) => {
                    info!(
                        target: "commit",
                        from = %session.job.path.display(),
                        to = %new_path.display(),
                        "album folder moved"
                    );
                    session.job.path = new_path.clone();
                    self.refresh_files(session);
                    return RenameOutcome::Moved(new_path);
                }
                Err(MoveError::Locked(message)) => {
                    attempt += 1;
                    warn!(
                        target: "commit",
                        attempt,
                        error = %message,
                        "folder move blocked by a lock"
                    );
                    if !decider.retry(attempt, &MoveError::Locked(message.clone())) {
                        session.notice("folder rename skipped while the folder is in use");
                        return RenameOutcome::SkippedByUser;
                    }
                }
                Err(error) => {
                    warn!(target: "commit", error = %error, "folder move failed");
                    session.notice(format!("folder rename failed: {error}"));
                    return RenameOutcome::Failed(error.to_string());
                }
            }
        }
    }

    fn remove_saved(&self, session: &mut ResolutionSession, saved_pair_indices: &[usize]) {
        let saved: BTreeSet<usize> = saved_pair_indices.iter().copied().collect();

        let saved_remote_ids: BTreeSet<String> = saved
            .iter()
            .filter_map(|&index| session.pairs.get(index))
            .filter_map(|pair| pair.remote.as_ref().map(|remote| remote.id.clone()))
            .collect();

        session.pairs = session
            .pairs
            .iter()
            .enumerate()
            .filter(|(index, _)| !saved.contains(index))
            .map(|(_, pair)| pair.clone())
            .collect();

        session
            .remote_tracks
            .retain(|track| !saved_remote_ids.contains(&track.id));
    }

    /// Re-scan the album folder and remap in-memory state onto the refreshed
    /// records. Pairs are matched to refreshed files by position in the old
    /// file list, so a folder move keeps every association without another
    /// provider query.
    fn refresh_files(&self, session: &mut ResolutionSession) {
        let old_files = std::mem::take(&mut session.files);

        let refreshed = match scan_album_folder(&session.job.path, self.tags) {
            Ok(refreshed) => refreshed,
            Err(error) => {
                warn!(
                    target: "commit",
                    path = %session.job.path.display(),
                    error = %error,
                    "re-scan after commit failed; keeping stale records"
                );
                session.files = old_files;
                return;
            }
        };

        let position_of = |record: &AudioFileRecord| {
            old_files
                .iter()
                .position(|old| old.path == record.path)
                .or_else(|| {
                    // After a move the paths changed; match by file name.
                    old_files
                        .iter()
                        .position(|old| old.path.file_name() == record.path.file_name())
                })
        };

        for pair in &mut session.pairs {
            let Some(file) = &pair.file else { continue };
            let old_position = old_files.iter().position(|old| old.path == file.path);
            if let Some(old_position) = old_position {
                if let Some(new_record) = refreshed
                    .iter()
                    .find(|record| position_of(record) == Some(old_position))
                {
                    pair.file = Some(new_record.clone());
                }
            }
        }

        session.job.track_count = refreshed.len();
        session.files = refreshed;
    }
}

/// Compute the final tag set for one remote track from the session's
/// resolved artist/album plus the optional manual album-artist override.
pub fn build_tag_write(session: &ResolutionSession, remote: &tagsmith_domain::ProviderTrack) -> TagWrite {
    let artist = session.effective_artist();
    let album = session.effective_album_name();
    let year = session.effective_year().and_then(|year| u32::try_from(year).ok());

    TagWrite {
        title: remote.name.clone(),
        artist,
        album,
        album_artist: session.job.album_artist_override.clone(),
        track_number: remote.track_number,
        disc_number: remote.disc_number,
        year,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aligner::PairedTrack;
    use crate::test_support::{session_with_pairs, FakeMover, FakeTagStore, ScriptedRetry};
    use tagsmith_domain::{Confidence, ProviderTrack, ReleaseDate};

    fn remote(id: &str, name: &str) -> ProviderTrack {
        ProviderTrack {
            id: id.to_string(),
            name: name.to_string(),
            disc_number: None,
            track_number: Some(1),
            duration_ms: Some(100_000),
        }
    }

    #[test]
    fn range_spec_parses_singles_ranges_and_lists() {
        assert_eq!(RangeSpec::parse("3").map(|r| r.indices().to_vec()), Some(vec![3]));
        assert_eq!(
            RangeSpec::parse("2-4").map(|r| r.indices().to_vec()),
            Some(vec![2, 3, 4])
        );
        assert_eq!(
            RangeSpec::parse("1,3-5").map(|r| r.indices().to_vec()),
            Some(vec![1, 3, 4, 5])
        );
        assert_eq!(RangeSpec::parse("0"), None);
        assert_eq!(RangeSpec::parse("4-2"), None);
        assert_eq!(RangeSpec::parse("abc"), None);
    }

    #[test]
    fn sanitize_strips_unsafe_characters() {
        assert_eq!(sanitize_segment("AC/DC"), "AC_DC");
        assert_eq!(sanitize_segment("What?*"), "What__");
        assert_eq!(sanitize_segment("Trailing."), "Trailing");
        assert_eq!(sanitize_segment("  "), "_");
    }

    #[test]
    fn save_selected_skips_missing_audio_and_reduces_queue() {
        let tags = FakeTagStore::default();
        let mover = FakeMover::succeeding();
        let engine = CommitEngine::new(&tags, &mover);

        // Five pairs; pair 2 has no local file.
        let (dir, mut session) = session_with_pairs(&tags, 5, &[1]);

        let report = engine.save_selected(
            &mut session,
            &RangeSpec::parse("2-3").expect("valid range"),
        );

        assert_eq!(report.saved.len(), 1);
        assert_eq!(report.skipped, vec![(2, SkipReason::NoAudio)]);
        assert_eq!(session.pairs.len(), 4, "only the saved pair leaves the queue");
        assert_eq!(tags.store_count(), 1);
        drop(dir);
    }

    #[test]
    fn repeated_partial_saves_never_resave() {
        let tags = FakeTagStore::default();
        let mover = FakeMover::succeeding();
        let engine = CommitEngine::new(&tags, &mover);

        let (dir, mut session) = session_with_pairs(&tags, 3, &[]);

        let first = engine.save_selected(&mut session, &RangeSpec::parse("1").expect("range"));
        assert_eq!(first.saved.len(), 1);
        assert_eq!(session.pairs.len(), 2);

        // Index 1 now addresses what used to be pair 2.
        let second = engine.save_selected(&mut session, &RangeSpec::parse("1-2").expect("range"));
        assert_eq!(second.saved.len(), 2);
        assert!(session.pairs.is_empty());
        assert_eq!(tags.store_count(), 3, "each file saved exactly once");
        drop(dir);
    }

    #[test]
    fn preview_mode_saves_nothing() {
        let tags = FakeTagStore::default();
        let mover = FakeMover::succeeding();
        let engine = CommitEngine::new(&tags, &mover);

        let (dir, mut session) = session_with_pairs(&tags, 2, &[]);
        session.preview = true;

        let report = engine.save_all(&mut session);
        assert!(report.saved.is_empty());
        assert!(report
            .skipped
            .iter()
            .all(|(_, reason)| *reason == SkipReason::Preview));
        assert_eq!(tags.store_count(), 0);
        assert_eq!(session.pairs.len(), 2, "queue unchanged in preview");
        drop(dir);
    }

    #[test]
    fn failed_write_keeps_pair_in_queue() {
        let tags = FakeTagStore::default();
        let mover = FakeMover::succeeding();
        let engine = CommitEngine::new(&tags, &mover);

        let (dir, mut session) = session_with_pairs(&tags, 2, &[]);
        let failing_path = session.pairs[0]
            .file
            .as_ref()
            .expect("file present")
            .path
            .clone();
        tags.fail_store_on(&failing_path);

        let report = engine.save_all(&mut session);
        assert_eq!(report.saved.len(), 1);
        assert!(matches!(
            report.skipped.as_slice(),
            [(1, SkipReason::WriteFailed(_))]
        ));
        assert_eq!(session.pairs.len(), 1, "failed pair stays queued");
        drop(dir);
    }

    #[test]
    fn rename_retries_on_lock_until_decider_declines() {
        let tags = FakeTagStore::default();
        let mover = FakeMover::locked_times(2);
        let engine = CommitEngine::new(&tags, &mover);

        let (dir, mut session) = session_with_pairs(&tags, 2, &[]);

        // Decider retries twice, then the third attempt succeeds.
        let decider = ScriptedRetry::new(vec![true, true]);
        let outcome = engine.rename_album(&mut session, &decider);

        assert!(matches!(outcome, RenameOutcome::Moved(_)));
        assert_eq!(mover.attempts(), 3);
        drop(dir);
    }

    #[test]
    fn rename_skips_when_decider_declines() {
        let tags = FakeTagStore::default();
        let mover = FakeMover::locked_times(u32::MAX);
        let engine = CommitEngine::new(&tags, &mover);

        let (dir, mut session) = session_with_pairs(&tags, 1, &[]);
        let old_path = session.job.path.clone();

        let outcome = engine.rename_album(&mut session, &NoRetry);
        assert_eq!(outcome, RenameOutcome::SkippedByUser);
        assert_eq!(session.job.path, old_path);
        drop(dir);
    }

    #[test]
    fn rename_preserves_record_count_and_fields() {
        let tags = FakeTagStore::default();
        let mover = FakeMover::relocating();
        let engine = CommitEngine::new(&tags, &mover);

        let (dir, mut session) = session_with_pairs(&tags, 3, &[]);
        // A release year makes the target folder name differ, forcing a
        // real relocation.
        session
            .album
            .as_mut()
            .expect("album present")
            .release_date = Some(ReleaseDate::new(1997, None, None));
        let before: Vec<_> = session
            .files
            .iter()
            .map(|record| {
                (
                    record.disc_number,
                    record.track_number,
                    record.title.clone(),
                )
            })
            .collect();

        let outcome = engine.rename_album(&mut session, &NoRetry);
        let RenameOutcome::Moved(new_path) = outcome else {
            panic!("expected a move, got {outcome:?}");
        };

        assert_eq!(session.job.path, new_path);
        assert_eq!(session.files.len(), before.len());
        let after: Vec<_> = session
            .files
            .iter()
            .map(|record| {
                (
                    record.disc_number,
                    record.track_number,
                    record.title.clone(),
                )
            })
            .collect();
        assert_eq!(before, after, "tag-derived fields unchanged by the move");
        assert!(session
            .files
            .iter()
            .all(|record| record.path.starts_with(&new_path)));
        drop(dir);
    }

    #[test]
    fn build_tag_write_applies_album_artist_override() {
        let tags = FakeTagStore::default();
        let (dir, mut session) = session_with_pairs(&tags, 1, &[]);
        session.job.album_artist_override = Some("Various Artists".to_string());

        let write = build_tag_write(&session, &remote("r1", "Opening"));
        assert_eq!(write.artist, "Various Artists");
        assert_eq!(write.album_artist.as_deref(), Some("Various Artists"));
        assert_eq!(write.title, "Opening");
        drop(dir);
    }

    #[test]
    fn pairs_remap_positionally_after_move() {
        let tags = FakeTagStore::default();
        let mover = FakeMover::relocating();
        let engine = CommitEngine::new(&tags, &mover);

        let (dir, mut session) = session_with_pairs(&tags, 2, &[]);
        session
            .album
            .as_mut()
            .expect("album present")
            .release_date = Some(ReleaseDate::new(1997, None, None));
        let titles_before: Vec<_> = session
            .pairs
            .iter()
            .map(|pair: &PairedTrack| {
                (
                    pair.file.as_ref().map(|f| f.title.clone()),
                    pair.remote.as_ref().map(|r| r.name.clone()),
                )
            })
            .collect();

        engine.rename_album(&mut session, &NoRetry);

        let titles_after: Vec<_> = session
            .pairs
            .iter()
            .map(|pair| {
                (
                    pair.file.as_ref().map(|f| f.title.clone()),
                    pair.remote.as_ref().map(|r| r.name.clone()),
                )
            })
            .collect();
        assert_eq!(titles_before, titles_after);
        assert!(session.pairs.iter().all(|pair| {
            pair.file
                .as_ref()
                .map(|file| file.path.starts_with(&session.job.path))
                .unwrap_or(true)
        }));
        let _ = Confidence::unscored();
        drop(dir);
    }
}
