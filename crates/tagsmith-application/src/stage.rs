// SPDX-License-Identifier: GPL-3.0-or-later

//! Resolution stage machine.
//!
//! Drives the three-stage (Artist → Album → Track) or two-stage (Quick →
//! Track) workflow for one album job. The machine owns all cross-stage state
//! transitions; the console only renders the session and feeds one token per
//! `step` call, which is the single suspension point of the interactive
//! loop. Feeding a scripted token sequence exercises the same code paths as
//! a live operator.
//!
//! Provider failures never abort a job: a failed query degrades to zero
//! candidates and the stage re-prompts with the standard recovery options
//! (new search terms, provider switch, skip).

use crate::aligner::{PairedTrack, TrackAligner};
use crate::commit::{CommitEngine, RangeSpec, RenameOutcome, RetryDecider, SaveReport};
use crate::session::{ResolutionSession, TrackMode};
use std::collections::HashSet;
use tagsmith_domain::{
    Confidence, FindMode, MatchStrategy, ProviderAlbum, ProviderArtist, ProviderKind,
    ProviderTrack, Stage,
};
use tagsmith_providers::{ProviderGateway, ProviderRegistry};
use tracing::{debug, info, warn};

/// What the caller should do after one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Re-render and prompt again (the stage may have changed).
    Continue,
    /// The job was abandoned.
    Skipped,
    /// The job finished (tags saved, rename attempted).
    Completed,
}

pub struct StageMachine<'a> {
    registry: &'a dyn ProviderRegistry,
    commit: CommitEngine<'a>,
    aligner: TrackAligner,
    decider: &'a dyn RetryDecider,
    page_size: usize,
}

impl<'a> StageMachine<'a> {
    pub fn new(
        registry: &'a dyn ProviderRegistry,
        commit: CommitEngine<'a>,
        aligner: TrackAligner,
        decider: &'a dyn RetryDecider,
        page_size: usize,
    ) -> Self {
        Self {
            registry,
            commit,
            aligner,
            decider,
            page_size,
        }
    }

    fn gateway(&self, session: &ResolutionSession) -> &dyn ProviderGateway {
        self.registry.gateway(session.job.provider)
    }

    /// Fetch the candidate set for the job's entry stage. Called once per
    /// job and again after every provider switch.
    pub async fn begin(&self, session: &mut ResolutionSession) {
        match session.job.stage {
            Stage::Artist => self.fetch_artists(session).await,
            Stage::Quick => self.fetch_quick_albums(session).await,
            Stage::Album | Stage::Track => {}
        }
    }

    /// Consume one operator token. This is the only place the workflow
    /// advances; everything in between is rendering.
    pub async fn step(&self, session: &mut ResolutionSession, input: &str) -> StepOutcome {
        let token = input.trim();
        debug!(
            target: "stage",
            stage = %session.job.stage,
            token,
            "processing command"
        );

        match session.job.stage {
            Stage::Artist => self.step_artist(session, token).await,
            Stage::Quick => self.step_quick(session, token).await,
            Stage::Album => self.step_album(session, token).await,
            Stage::Track => self.step_track(session, token).await,
        }
    }

    /// Unattended resolution: quick search, first candidate, order pairing,
    /// commit. Skips with a warning wherever an operator would have been
    /// prompted; the interactive track stage is never entered.
    pub async fn resolve_noninteractive(&self, session: &mut ResolutionSession) -> StepOutcome {
        let job_path = session.job.path.display().to_string();

        let albums = match self
            .gateway(session)
            .search_album(&session.job.artist_name, &session.job.album_name)
            .await
        {
            Ok(albums) => albums,
            Err(error) => {
                warn!(target: "stage", path = %job_path, error = %error, "album search failed; skipping");
                return StepOutcome::Skipped;
            }
        };

        let Some(album) = albums.into_iter().next() else {
            warn!(target: "stage", path = %job_path, "no album candidates; skipping");
            return StepOutcome::Skipped;
        };

        let tracks = match self.gateway(session).get_tracks(&album.id).await {
            Ok(tracks) => tracks,
            Err(error) => {
                warn!(target: "stage", path = %job_path, error = %error, "track list unavailable; skipping");
                return StepOutcome::Skipped;
            }
        };

        session.album = Some(album);
        session.remote_tracks = tracks;
        session.strategy = MatchStrategy::Order;
        session.pairs = self.aligner.align(
            &session.files,
            &session.remote_tracks,
            MatchStrategy::Order,
            &[],
        );

        if session.pairs.is_empty() || !session.pairs.iter().all(PairedTrack::is_complete) {
            warn!(
                target: "stage",
                path = %job_path,
                "pairing is incomplete and would need review; skipping"
            );
            return StepOutcome::Skipped;
        }

        let report = self.commit.save_all(session);
        info!(
            target: "stage",
            path = %job_path,
            saved = report.saved.len(),
            skipped = report.skipped.len(),
            "non-interactive save finished"
        );
        self.commit.rename_album(session, self.decider);
        StepOutcome::Completed
    }

    /// Ranked candidates for the pair currently under review, for rendering.
    pub fn review_candidates(
        &self,
        session: &ResolutionSession,
    ) -> Option<Vec<(ProviderTrack, Confidence)>> {
        let TrackMode::Review {
            queue,
            pool,
            position,
        } = &session.mode
        else {
            return None;
        };

        let file_pairs = session.file_pair_indices();
        let pair_index = *file_pairs.get(*queue.get(*position)?)?;
        let file = session.pairs[pair_index].file.as_ref()?;

        Some(
            self.aligner
                .rank_candidates(file, pool)
                .into_iter()
                .map(|(pool_index, confidence)| (pool[pool_index].clone(), confidence))
                .collect(),
        )
    }

    // ------------------------------------------------------------------
    // Stage A: artist search
    // ------------------------------------------------------------------

    async fn step_artist(&self, session: &mut ResolutionSession, token: &str) -> StepOutcome {
        if is_abandon(token) {
            return self.abandon(session);
        }
        if let Some(kind) = ProviderKind::from_shortcut(token) {
            return self.switch_provider(session, kind).await;
        }
        if token == "fm" {
            return self.switch_find_mode(session).await;
        }

        match token {
            "n" => {
                let count = session.job.cache.artists.len();
                session.job.cache.next_page(count, self.page_size);
                return StepOutcome::Continue;
            }
            "p" => {
                session.job.cache.prev_page();
                return StepOutcome::Continue;
            }
            _ => {}
        }

        if let Some(id) = token.strip_prefix("id:") {
            match self.gateway(session).get_artist(id.trim()).await {
                Ok(artist) => return self.select_artist(session, artist).await,
                Err(error) => {
                    warn!(target: "stage", error = %error, "artist id lookup failed");
                    session.notice(format!("artist id lookup failed: {error}"));
                    return StepOutcome::Continue;
                }
            }
        }

        if token.is_empty() || is_index(token) {
            let candidates = session.job.cache.artists.clone();
            match select_candidate(&candidates, token) {
                Some(artist) => return self.select_artist(session, artist).await,
                None => {
                    session.notice("no such artist candidate");
                    return StepOutcome::Continue;
                }
            }
        }

        // Anything else replaces the search query and re-runs the stage.
        session.job.artist_name = token.to_string();
        self.fetch_artists(session).await;
        StepOutcome::Continue
    }

    async fn select_artist(
        &self,
        session: &mut ResolutionSession,
        artist: ProviderArtist,
    ) -> StepOutcome {
        info!(target: "stage", artist = %artist.name, "artist selected");
        session.job.cache.provider_artist_id = Some(artist.id.clone());
        session.artist = Some(artist);
        session.job.stage = Stage::Album;
        self.fetch_albums(session).await;
        StepOutcome::Continue
    }

    // ------------------------------------------------------------------
    // Quick stage: direct artist+album search
    // ------------------------------------------------------------------

    async fn step_quick(&self, session: &mut ResolutionSession, token: &str) -> StepOutcome {
        if is_abandon(token) {
            return self.abandon(session);
        }
        if let Some(kind) = ProviderKind::from_shortcut(token) {
            return self.switch_provider(session, kind).await;
        }
        if token == "fm" {
            return self.switch_find_mode(session).await;
        }

        match token {
            "n" => {
                let count = session.job.cache.albums.len();
                session.job.cache.next_page(count, self.page_size);
                return StepOutcome::Continue;
            }
            "p" => {
                session.job.cache.prev_page();
                return StepOutcome::Continue;
            }
            _ => {}
        }

        if let Some(id) = token.strip_prefix("id:") {
            // Explicit provider id bypasses search entirely.
            let album = ProviderAlbum::new(id.trim(), session.job.album_name.clone());
            return self.enter_track_stage(session, album).await;
        }

        if token.is_empty() || is_index(token) {
            let candidates = session.job.cache.albums.clone();
            match select_candidate(&candidates, token) {
                Some(album) => return self.enter_track_stage(session, album).await,
                None => {
                    session.notice("no such album candidate");
                    return StepOutcome::Continue;
                }
            }
        }

        // Free text replaces the quick query: "artist - album" updates both
        // halves, anything else just the album name.
        match token.split_once(" - ") {
            Some((artist, album)) => {
                session.job.artist_name = artist.trim().to_string();
                session.job.album_name = album.trim().to_string();
            }
            None => session.job.album_name = token.to_string(),
        }
        self.fetch_quick_albums(session).await;
        StepOutcome::Continue
    }

    // ------------------------------------------------------------------
    // Stage B: album search
    // ------------------------------------------------------------------

    async fn step_album(&self, session: &mut ResolutionSession, token: &str) -> StepOutcome {
        if is_abandon(token) {
            return self.abandon(session);
        }
        if let Some(kind) = ProviderKind::from_shortcut(token) {
            return self.switch_provider(session, kind).await;
        }
        if token == "fm" {
            return self.switch_find_mode(session).await;
        }

        match token {
            // Back to artist search from cache, no re-fetch.
            "b" | "pr" => {
                session.job.stage = Stage::Artist;
                return StepOutcome::Continue;
            }
            "n" => {
                let count = session.job.cache.albums.len();
                session.job.cache.next_page(count, self.page_size);
                return StepOutcome::Continue;
            }
            "p" => {
                session.job.cache.prev_page();
                return StepOutcome::Continue;
            }
            _ => {}
        }

        if token == "c" || token.starts_with("c ") {
            return self.combine_albums(session, token.trim_start_matches('c').trim()).await;
        }

        if token.is_empty() || is_index(token) {
            let candidates = session.job.cache.albums.clone();
            match select_candidate(&candidates, token) {
                Some(album) => return self.enter_track_stage(session, album).await,
                None => {
                    session.notice("no such album candidate");
                    return StepOutcome::Continue;
                }
            }
        }

        session.job.album_name = token.to_string();
        self.fetch_albums(session).await;
        StepOutcome::Continue
    }

    /// Build a synthetic combined album from same-titled candidates (or the
    /// explicitly listed 1-based indices) by merging their track lists.
    async fn combine_albums(&self, session: &mut ResolutionSession, spec: &str) -> StepOutcome {
        let candidates = session.job.cache.albums.clone();
        if candidates.is_empty() {
            session.notice("nothing to combine");
            return StepOutcome::Continue;
        }

        let indices: Vec<usize> = if spec.is_empty() {
            let reference = normalize_album_name(&candidates[0].name);
            candidates
                .iter()
                .enumerate()
                .filter(|(_, album)| normalize_album_name(&album.name) == reference)
                .map(|(index, _)| index)
                .collect()
        } else {
            let Some(range) = RangeSpec::parse(spec) else {
                session.notice(format!("cannot parse combine selection '{spec}'"));
                return StepOutcome::Continue;
            };
            let mut indices = Vec::new();
            for &selection in range.indices() {
                if selection > candidates.len() {
                    session.notice(format!("combine index {selection} is out of range"));
                    return StepOutcome::Continue;
                }
                indices.push(selection - 1);
            }
            indices
        };

        if indices.len() < 2 {
            session.notice("combining needs at least two albums");
            return StepOutcome::Continue;
        }

        let mut parts = Vec::with_capacity(indices.len());
        for index in indices {
            let album = candidates[index].clone();
            match self.gateway(session).get_tracks(&album.id).await {
                Ok(tracks) => parts.push((album, tracks)),
                Err(error) => {
                    warn!(target: "stage", album = %album.name, error = %error, "combine aborted");
                    session.notice(format!("track list for '{}' unavailable: {error}", album.name));
                    return StepOutcome::Continue;
                }
            }
        }

        let Some(combined) = ProviderAlbum::combined(parts) else {
            session.notice("nothing to combine");
            return StepOutcome::Continue;
        };
        info!(
            target: "stage",
            merged = combined.album_names.len(),
            tracks = combined.tracks.len(),
            "combined album built"
        );
        self.enter_track_stage(session, combined).await
    }

    async fn enter_track_stage(
        &self,
        session: &mut ResolutionSession,
        album: ProviderAlbum,
    ) -> StepOutcome {
        let tracks = if album.combined {
            album.tracks.clone()
        } else {
            match self.gateway(session).get_tracks(&album.id).await {
                Ok(tracks) => tracks,
                Err(error) => {
                    warn!(target: "stage", album = %album.name, error = %error, "track list unavailable");
                    session.notice(format!("track list unavailable: {error}"));
                    return StepOutcome::Continue;
                }
            }
        };

        info!(
            target: "stage",
            album = %album.name,
            remote = tracks.len(),
            local = session.files.len(),
            "entering track stage"
        );

        session.album = Some(album);
        session.remote_tracks = tracks;
        session.strategy = MatchStrategy::Order;
        session.pairs = self.aligner.align(
            &session.files,
            &session.remote_tracks,
            MatchStrategy::Order,
            &[],
        );
        session.mode = TrackMode::Browse;
        session.job.stage = Stage::Track;
        StepOutcome::Continue
    }

    // ------------------------------------------------------------------
    // Stage C: track matching and commit
    // ------------------------------------------------------------------

    async fn step_track(&self, session: &mut ResolutionSession, token: &str) -> StepOutcome {
        match session.mode.clone() {
            TrackMode::Browse => self.step_browse(session, token).await,
            TrackMode::Manual { cursor } => self.step_manual(session, cursor, token),
            TrackMode::Review {
                queue,
                pool,
                position,
            } => self.step_review(session, queue, pool, position, token),
        }
    }

    async fn step_browse(&self, session: &mut ResolutionSession, token: &str) -> StepOutcome {
        if is_abandon(token) {
            return self.abandon(session);
        }
        if let Some(kind) = ProviderKind::from_shortcut(token) {
            return self.switch_provider(session, kind).await;
        }
        if token == "fm" {
            return self.switch_find_mode(session).await;
        }
        if token == "aa" || token.starts_with("aa ") {
            let value = token.trim_start_matches("aa").trim();
            if value.is_empty() {
                session.job.album_artist_override = None;
                session.notice("album-artist override cleared");
            } else {
                session.job.album_artist_override = Some(value.to_string());
                session.notice(format!("album artist overridden to '{value}'"));
            }
            return StepOutcome::Continue;
        }

        match token {
            "b" | "pr" => {
                session.job.stage = Stage::Album;
                session.mode = TrackMode::Browse;
                return StepOutcome::Continue;
            }
            "r" => {
                session.reverse_columns = !session.reverse_columns;
                return StepOutcome::Continue;
            }
            "w" => {
                session.preview = !session.preview;
                session.notice(if session.preview {
                    "preview mode on: nothing will be written"
                } else {
                    "preview mode off"
                });
                return StepOutcome::Continue;
            }
            "rm" => return self.enter_review(session),
            "rn" => {
                self.commit.rename_album(session, self.decider);
                return StepOutcome::Continue;
            }
            "sa" => {
                let report = self.commit.save_all(session);
                self.notice_report(session, &report);
                match self.commit.rename_album(session, self.decider) {
                    RenameOutcome::Moved(path) => {
                        session.notice(format!("album moved to {}", path.display()));
                    }
                    RenameOutcome::SkippedByUser
                    | RenameOutcome::Failed(_)
                    | RenameOutcome::Preview => {}
                }
                return StepOutcome::Completed;
            }
            _ => {}
        }

        if token == "st" || token.starts_with("st ") {
            let range_text = token.trim_start_matches("st").trim();
            let Some(range) = RangeSpec::parse(range_text) else {
                session.notice("usage: st <range>, e.g. st 2-3");
                return StepOutcome::Continue;
            };
            let report = self.commit.save_selected(session, &range);
            self.notice_report(session, &report);
            if session.pairs.is_empty() {
                session.notice("all tracks saved");
                return StepOutcome::Completed;
            }
            return StepOutcome::Continue;
        }

        if let Some(range_text) = token.strip_prefix("k ") {
            let Some(range) = RangeSpec::parse(range_text.trim()) else {
                session.notice("usage: k <range>, e.g. k 1,4-5");
                return StepOutcome::Continue;
            };
            for &selection in range.indices() {
                if let Some(pair) = session.pairs.get_mut(selection - 1) {
                    pair.marked = !pair.marked;
                } else {
                    session.notice(format!("no pair {selection}"));
                }
            }
            return StepOutcome::Continue;
        }

        if let Some(strategy) = MatchStrategy::from_token(token) {
            return self.apply_strategy(session, strategy);
        }

        session.notice(format!("unrecognized command '{token}'"));
        StepOutcome::Continue
    }

    fn apply_strategy(
        &self,
        session: &mut ResolutionSession,
        strategy: MatchStrategy,
    ) -> StepOutcome {
        if strategy == MatchStrategy::Manual {
            if session.file_pair_indices().is_empty() {
                session.notice("no paired audio files to edit");
                return StepOutcome::Continue;
            }
            session.strategy = MatchStrategy::Manual;
            session.mode = TrackMode::Manual { cursor: 0 };
            session.notice("manual mode: index assigns a remote track, 's' unmatches, empty keeps, 'q' ends");
            return StepOutcome::Continue;
        }

        session.strategy = strategy;
        session.pairs = self.aligner.align(
            &session.files,
            &session.remote_tracks,
            strategy,
            &session.pairs,
        );
        StepOutcome::Continue
    }

    fn step_manual(
        &self,
        session: &mut ResolutionSession,
        cursor: usize,
        token: &str,
    ) -> StepOutcome {
        let file_pairs = session.file_pair_indices();
        if cursor >= file_pairs.len() || token == "q" {
            self.exit_manual(session);
            return StepOutcome::Continue;
        }
        let pair_index = file_pairs[cursor];

        match token {
            "" => {
                self.advance_manual(session, cursor);
            }
            "s" => {
                session.pairs[pair_index].remote = None;
                session.pairs[pair_index].confidence = Confidence::unscored();
                self.normalize_pairs(session);
                self.advance_manual(session, cursor);
            }
            token if is_index(token) => {
                let selection: usize = token.parse().unwrap_or(0);
                let track = selection
                    .checked_sub(1)
                    .and_then(|index| session.remote_tracks.get(index))
                    .cloned();
                let Some(track) = track else {
                    session.notice(format!("no remote track {selection}"));
                    return StepOutcome::Continue;
                };
                self.assign_remote(session, pair_index, track);
                self.advance_manual(session, cursor);
            }
            _ => {
                session.notice("manual mode: index, 's', empty, or 'q'");
            }
        }
        StepOutcome::Continue
    }

    fn advance_manual(&self, session: &mut ResolutionSession, cursor: usize) {
        let next = cursor + 1;
        if next >= session.file_pair_indices().len() {
            self.exit_manual(session);
        } else {
            session.mode = TrackMode::Manual { cursor: next };
        }
    }

    fn exit_manual(&self, session: &mut ResolutionSession) {
        session.mode = TrackMode::Browse;
        // One manual pass done: later refreshes resume automatic pairing.
        session.strategy = MatchStrategy::Order;
    }

    fn enter_review(&self, session: &mut ResolutionSession) -> StepOutcome {
        let file_pairs = session.file_pair_indices();
        if file_pairs.is_empty() {
            session.notice("no paired audio files to review");
            return StepOutcome::Continue;
        }

        let marked: Vec<usize> = file_pairs
            .iter()
            .enumerate()
            .filter(|(_, &pair_index)| session.pairs[pair_index].marked)
            .map(|(ordinal, _)| ordinal)
            .collect();
        let queue = if marked.is_empty() {
            (0..file_pairs.len()).collect()
        } else {
            marked
        };

        // Pool: every unsaved remote not held by a pair outside the queue.
        let queued_pairs: HashSet<usize> = queue.iter().map(|&ordinal| file_pairs[ordinal]).collect();
        let held_outside: HashSet<String> = session
            .pairs
            .iter()
            .enumerate()
            .filter(|(index, pair)| pair.file.is_some() && !queued_pairs.contains(index))
            .filter_map(|(_, pair)| pair.remote.as_ref().map(|remote| remote.id.clone()))
            .collect();
        let pool: Vec<ProviderTrack> = session
            .remote_tracks
            .iter()
            .filter(|track| !held_outside.contains(&track.id))
            .cloned()
            .collect();

        session.mode = TrackMode::Review {
            queue,
            pool,
            position: 0,
        };
        StepOutcome::Continue
    }

    fn step_review(
        &self,
        session: &mut ResolutionSession,
        queue: Vec<usize>,
        mut pool: Vec<ProviderTrack>,
        position: usize,
        token: &str,
    ) -> StepOutcome {
        if is_abandon(token) {
            return self.abandon(session);
        }
        if position >= queue.len() || token == "q" {
            self.normalize_pairs(session);
            session.mode = TrackMode::Browse;
            return StepOutcome::Continue;
        }

        let file_pairs = session.file_pair_indices();
        let pair_index = file_pairs[queue[position]];

        match token {
            "" => {
                self.advance_review(session, queue, pool, position);
            }
            token if is_index(token) => {
                let selection: usize = token.parse().unwrap_or(0);
                let Some(file) = session.pairs[pair_index].file.clone() else {
                    self.advance_review(session, queue, pool, position);
                    return StepOutcome::Continue;
                };
                let ranked = self.aligner.rank_candidates(&file, &pool);
                let Some(&(pool_index, _)) = selection
                    .checked_sub(1)
                    .and_then(|index| ranked.get(index))
                else {
                    session.notice(format!("no candidate {selection}"));
                    session.mode = TrackMode::Review {
                        queue,
                        pool,
                        position,
                    };
                    return StepOutcome::Continue;
                };
                // Chosen tracks leave the pool so they cannot be assigned twice.
                let track = pool.remove(pool_index);
                self.assign_remote(session, pair_index, track);
                self.advance_review(session, queue, pool, position);
            }
            _ => {
                session.notice("review mode: candidate index, empty to keep, or 'q'");
                session.mode = TrackMode::Review {
                    queue,
                    pool,
                    position,
                };
            }
        }
        StepOutcome::Continue
    }

    fn advance_review(
        &self,
        session: &mut ResolutionSession,
        queue: Vec<usize>,
        pool: Vec<ProviderTrack>,
        position: usize,
    ) {
        let next = position + 1;
        if next >= queue.len() {
            self.normalize_pairs(session);
            session.mode = TrackMode::Browse;
        } else {
            session.mode = TrackMode::Review {
                queue,
                pool,
                position: next,
            };
        }
    }

    /// Assign `track` to the pair at `pair_index`. If another pair holds the
    /// track it receives this pair's previous remote instead, so no remote
    /// is ever assigned twice.
    fn assign_remote(
        &self,
        session: &mut ResolutionSession,
        pair_index: usize,
        track: ProviderTrack,
    ) {
        let previous = session.pairs[pair_index].remote.clone();

        for (index, pair) in session.pairs.iter_mut().enumerate() {
            if index != pair_index && pair.remote.as_ref().map(|r| r.id.as_str()) == Some(&track.id)
            {
                pair.remote = previous.clone();
                pair.confidence = match (&pair.file, &pair.remote) {
                    (Some(file), Some(remote)) => self.aligner.confidence_for(file, remote),
                    _ => Confidence::unscored(),
                };
            }
        }

        let pair = &mut session.pairs[pair_index];
        pair.remote = Some(track);
        pair.confidence = match (&pair.file, &pair.remote) {
            (Some(file), Some(remote)) => self.aligner.confidence_for(file, remote),
            _ => Confidence::unscored(),
        };

        self.normalize_pairs(session);
    }

    /// Rebuild the pair list invariantly: file pairs first (stable order),
    /// then a remote-only pair for every unsaved remote not assigned to a
    /// file. Keeps every side visible without duplicates.
    fn normalize_pairs(&self, session: &mut ResolutionSession) {
        let mut pairs: Vec<PairedTrack> = session
            .pairs
            .iter()
            .filter(|pair| pair.file.is_some())
            .cloned()
            .collect();

        let assigned: HashSet<String> = pairs
            .iter()
            .filter_map(|pair| pair.remote.as_ref().map(|remote| remote.id.clone()))
            .collect();

        for track in &session.remote_tracks {
            if !assigned.contains(&track.id) {
                pairs.push(PairedTrack::remote_only(track.clone()));
            }
        }

        session.pairs = pairs;
    }

    // ------------------------------------------------------------------
    // Shared helpers
    // ------------------------------------------------------------------

    fn abandon(&self, session: &mut ResolutionSession) -> StepOutcome {
        info!(target: "stage", path = %session.job.path.display(), "album skipped");
        session.notice("album skipped");
        StepOutcome::Skipped
    }

    async fn switch_provider(
        &self,
        session: &mut ResolutionSession,
        kind: ProviderKind,
    ) -> StepOutcome {
        info!(target: "stage", provider = %kind, "switching provider");
        session.job.switch_provider(kind);
        session.mode = TrackMode::Browse;
        self.begin(session).await;
        StepOutcome::Continue
    }

    /// Toggle between quick and artist-first, returning to the new entry
    /// stage. Unlike a provider switch, caches stay usable for "back".
    async fn switch_find_mode(&self, session: &mut ResolutionSession) -> StepOutcome {
        let new_mode = match session.job.find_mode {
            FindMode::Quick => FindMode::ArtistFirst,
            FindMode::ArtistFirst => FindMode::Quick,
        };
        info!(target: "stage", mode = ?new_mode, "switching find mode");
        session.job.find_mode = new_mode;
        session.job.stage = new_mode.entry_stage();
        session.mode = TrackMode::Browse;

        let needs_fetch = match session.job.stage {
            Stage::Artist => session.job.cache.artists.is_empty(),
            Stage::Quick => session.job.cache.albums.is_empty(),
            Stage::Album | Stage::Track => false,
        };
        if needs_fetch {
            self.begin(session).await;
        }
        StepOutcome::Continue
    }

    async fn fetch_artists(&self, session: &mut ResolutionSession) {
        let query = session.job.artist_name.clone();
        let artists = match self.gateway(session).search_artist(&query).await {
            Ok(artists) => artists,
            Err(error) => {
                warn!(target: "stage", query = %query, error = %error, "artist search failed");
                session.notice(format!("artist search failed: {error}"));
                Vec::new()
            }
        };
        if artists.is_empty() {
            session.notice("no artist candidates; enter new search terms, switch provider, or skip");
        }
        session.job.cache.set_artists(artists);
    }

    async fn fetch_albums(&self, session: &mut ResolutionSession) {
        let artist = session
            .artist
            .as_ref()
            .map(|artist| artist.name.clone())
            .unwrap_or_else(|| session.job.artist_name.clone());
        let album = session.job.album_name.clone();

        let albums = match self.gateway(session).search_album(&artist, &album).await {
            Ok(albums) => albums,
            Err(error) => {
                warn!(target: "stage", artist = %artist, album = %album, error = %error, "album search failed");
                session.notice(format!("album search failed: {error}"));
                Vec::new()
            }
        };
        if albums.is_empty() {
            session.notice("no album candidates; enter new search terms, go back, or skip");
        }
        session.job.cache.set_albums(albums);
    }

    async fn fetch_quick_albums(&self, session: &mut ResolutionSession) {
        let artist = session.job.artist_name.clone();
        let album = session.job.album_name.clone();

        let albums = match self.gateway(session).search_album(&artist, &album).await {
            Ok(albums) => albums,
            Err(error) => {
                warn!(target: "stage", artist = %artist, album = %album, error = %error, "quick search failed");
                session.notice(format!("album search failed: {error}"));
                Vec::new()
            }
        };
        if albums.is_empty() {
            session.notice("no album candidates; enter new search terms, switch provider, or skip");
        }
        session.job.cache.set_albums(albums);
    }

    fn notice_report(&self, session: &mut ResolutionSession, report: &SaveReport) {
        session.notice(format!("saved {} track(s)", report.saved.len()));
        for (selection, reason) in &report.skipped {
            session.notice(format!("track {selection} skipped ({reason})"));
        }
    }
}

fn is_abandon(token: &str) -> bool {
    matches!(token, "x" | "xip")
}

fn is_index(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

/// Resolve an index token against a candidate list; empty input defaults to
/// the first candidate.
fn select_candidate<T: Clone>(candidates: &[T], token: &str) -> Option<T> {
    if candidates.is_empty() {
        return None;
    }
    let index = if token.is_empty() {
        1
    } else {
        token.parse::<usize>().ok()?
    };
    candidates.get(index.checked_sub(1)?).cloned()
}

fn normalize_album_name(name: &str) -> String {
    name.trim().to_lowercase()
}
