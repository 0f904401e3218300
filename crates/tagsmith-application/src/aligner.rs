// SPDX-License-Identifier: GPL-3.0-or-later

//! Track alignment engine.
//!
//! Produces a full, stable pairing between N local files and M remote tracks
//! under one selected strategy, each completed pair annotated with a
//! confidence score derived from duration proximity and title similarity.
//! Re-running any strategy except `manual` on unchanged inputs yields an
//! identical pairing.

use crate::scanner::AudioFileRecord;
use tagsmith_config::MatchingConfig;
use tagsmith_domain::{Confidence, MatchStrategy, ProviderTrack};

/// One (local file, remote track) association with a confidence score.
///
/// At least one side is always present; a pair with both sides absent is
/// meaningless and is never constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct PairedTrack {
    pub file: Option<AudioFileRecord>,
    pub remote: Option<ProviderTrack>,
    pub confidence: Confidence,
    pub marked: bool,
}

impl PairedTrack {
    pub fn matched(file: AudioFileRecord, remote: ProviderTrack, confidence: Confidence) -> Self {
        Self {
            file: Some(file),
            remote: Some(remote),
            confidence,
            marked: false,
        }
    }

    pub fn file_only(file: AudioFileRecord) -> Self {
        Self {
            file: Some(file),
            remote: None,
            confidence: Confidence::unscored(),
            marked: false,
        }
    }

    pub fn remote_only(remote: ProviderTrack) -> Self {
        Self {
            file: None,
            remote: Some(remote),
            confidence: Confidence::unscored(),
            marked: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.file.is_some() && self.remote.is_some()
    }
}

/// Which file-side title a textual strategy compares against the remote name.
#[derive(Debug, Clone, Copy)]
enum TitleSource {
    Tag,
    Stem,
}

pub struct TrackAligner {
    config: MatchingConfig,
}

impl TrackAligner {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    /// Pair local files against remote tracks under `strategy`.
    ///
    /// `previous` is only consulted by the `manual` strategy, which carries
    /// the existing pairing over untouched.
    pub fn align(
        &self,
        files: &[AudioFileRecord],
        tracks: &[ProviderTrack],
        strategy: MatchStrategy,
        previous: &[PairedTrack],
    ) -> Vec<PairedTrack> {
        let assignments = match strategy {
            MatchStrategy::Order => self.pair_positionally(&display_order(files), tracks.len()),
            MatchStrategy::FilesystemOrder => {
                let raw_order: Vec<usize> = (0..files.len()).collect();
                self.pair_positionally(&raw_order, tracks.len())
            }
            MatchStrategy::TrackNumber => self.pair_by_track_number(files, tracks),
            MatchStrategy::Duration => self.pair_by_duration(files, tracks),
            MatchStrategy::Name => self.pair_by_text(files, tracks, TitleSource::Stem),
            MatchStrategy::Title => self.pair_by_text(files, tracks, TitleSource::Tag),
            MatchStrategy::Hybrid => self.pair_by_hybrid(files, tracks),
            MatchStrategy::Manual => return previous.to_vec(),
        };

        self.present(assignments, files, tracks)
    }

    /// Confidence for a completed pair, from the same signals hybrid uses.
    pub fn confidence_for(&self, file: &AudioFileRecord, track: &ProviderTrack) -> Confidence {
        let score = (self.pair_score(file, track, TitleSource::Tag) * 100.0).round() as u8;
        Confidence::scored(score, self.config.high_floor, self.config.low_floor)
    }

    /// Rank `pool` against one local file, best candidates first. Returns
    /// indices into `pool`. Used by review mode.
    pub fn rank_candidates(
        &self,
        file: &AudioFileRecord,
        pool: &[ProviderTrack],
    ) -> Vec<(usize, Confidence)> {
        let mut ranked: Vec<(usize, Confidence)> = pool
            .iter()
            .enumerate()
            .map(|(index, track)| (index, self.confidence_for(file, track)))
            .collect();
        ranked.sort_by(|a, b| b.1.score.cmp(&a.1.score).then(a.0.cmp(&b.0)));
        ranked
    }

    fn pair_positionally(&self, file_order: &[usize], track_count: usize) -> Vec<(usize, usize)> {
        file_order
            .iter()
            .take(track_count)
            .enumerate()
            .map(|(track_index, &file_index)| (file_index, track_index))
            .collect()
    }

    fn pair_by_track_number(
        &self,
        files: &[AudioFileRecord],
        tracks: &[ProviderTrack],
    ) -> Vec<(usize, usize)> {
        let mut used = vec![false; tracks.len()];
        let mut matched = Vec::new();
        let mut leftover_files = Vec::new();

        for &file_index in &display_order(files) {
            let file = &files[file_index];
            let Some(file_number) = file.track_number else {
                leftover_files.push(file_index);
                continue;
            };

            let candidate = tracks.iter().enumerate().find(|(track_index, track)| {
                if used[*track_index] {
                    return false;
                }
                if track.track_number != Some(file_number) {
                    return false;
                }
                // Disc numbers only constrain when both sides expose one.
                match (file.disc_number, track.disc_number) {
                    (Some(file_disc), Some(track_disc)) => file_disc == track_disc,
                    _ => true,
                }
            });

            match candidate {
                Some((track_index, _)) => {
                    used[track_index] = true;
                    matched.push((file_index, track_index));
                }
                None => leftover_files.push(file_index),
            }
        }

        // Files without a usable number fall back to order-based pairing
        // among the remaining tracks.
        let mut remaining_tracks = (0..tracks.len()).filter(|&index| !used[index]);
        for file_index in leftover_files {
            let Some(track_index) = remaining_tracks.next() else {
                break;
            };
            matched.push((file_index, track_index));
        }

        matched
    }

    fn pair_by_duration(
        &self,
        files: &[AudioFileRecord],
        tracks: &[ProviderTrack],
    ) -> Vec<(usize, usize)> {
        // Remote tracks without a duration sort behind every real delta but
        // remain assignable until one side is exhausted.
        const MISSING_DURATION_DELTA: u64 = u64::MAX / 2;

        let mut candidates: Vec<(u64, usize, usize)> = Vec::with_capacity(files.len() * tracks.len());
        for (file_index, file) in files.iter().enumerate() {
            for (track_index, track) in tracks.iter().enumerate() {
                let delta = track
                    .duration_ms
                    .map(|duration| duration.abs_diff(file.duration_ms))
                    .unwrap_or(MISSING_DURATION_DELTA);
                candidates.push((delta, file_index, track_index));
            }
        }
        candidates.sort();

        self.greedy_assign(candidates, files.len(), tracks.len())
    }

    fn pair_by_text(
        &self,
        files: &[AudioFileRecord],
        tracks: &[ProviderTrack],
        source: TitleSource,
    ) -> Vec<(usize, usize)> {
        let mut candidates: Vec<(f32, u64, usize, usize)> =
            Vec::with_capacity(files.len() * tracks.len());
        for (file_index, file) in files.iter().enumerate() {
            let title = match source {
                TitleSource::Tag => &file.title,
                TitleSource::Stem => &file.stem_title,
            };
            for (track_index, track) in tracks.iter().enumerate() {
                let similarity = normalized_similarity(title, &track.name);
                let delta = track
                    .duration_ms
                    .map(|duration| duration.abs_diff(file.duration_ms))
                    .unwrap_or(u64::MAX);
                candidates.push((similarity, delta, file_index, track_index));
            }
        }
        // Best similarity first; ties broken by duration proximity.
        candidates.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then(a.1.cmp(&b.1))
                .then(a.2.cmp(&b.2))
                .then(a.3.cmp(&b.3))
        });

        self.greedy_assign(
            candidates
                .into_iter()
                .map(|(_, _, file_index, track_index)| (0, file_index, track_index))
                .collect(),
            files.len(),
            tracks.len(),
        )
    }

    fn pair_by_hybrid(
        &self,
        files: &[AudioFileRecord],
        tracks: &[ProviderTrack],
    ) -> Vec<(usize, usize)> {
        let mut candidates: Vec<(f32, usize, usize)> =
            Vec::with_capacity(files.len() * tracks.len());
        for (file_index, file) in files.iter().enumerate() {
            for (track_index, track) in tracks.iter().enumerate() {
                let score = self.pair_score(file, track, TitleSource::Tag);
                candidates.push((score, file_index, track_index));
            }
        }
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        self.greedy_assign(
            candidates
                .into_iter()
                .map(|(_, file_index, track_index)| (0, file_index, track_index))
                .collect(),
            files.len(),
            tracks.len(),
        )
    }

    /// Walk pre-sorted candidates, assigning each file and track at most
    /// once, until one side is exhausted.
    fn greedy_assign(
        &self,
        sorted_candidates: Vec<(u64, usize, usize)>,
        file_count: usize,
        track_count: usize,
    ) -> Vec<(usize, usize)> {
        let mut file_taken = vec![false; file_count];
        let mut track_taken = vec![false; track_count];
        let mut matched = Vec::new();
        let budget = file_count.min(track_count);

        for (_, file_index, track_index) in sorted_candidates {
            if matched.len() == budget {
                break;
            }
            if file_taken[file_index] || track_taken[track_index] {
                continue;
            }
            file_taken[file_index] = true;
            track_taken[track_index] = true;
            matched.push((file_index, track_index));
        }

        matched
    }

    /// Build the presented pair list: matched pairs plus single-sided
    /// leftovers, sorted by descending confidence so weak matches surface at
    /// the bottom for review.
    fn present(
        &self,
        assignments: Vec<(usize, usize)>,
        files: &[AudioFileRecord],
        tracks: &[ProviderTrack],
    ) -> Vec<PairedTrack> {
        let mut file_taken = vec![false; files.len()];
        let mut track_taken = vec![false; tracks.len()];

        let mut pairs: Vec<PairedTrack> = assignments
            .into_iter()
            .map(|(file_index, track_index)| {
                file_taken[file_index] = true;
                track_taken[track_index] = true;
                let file = files[file_index].clone();
                let track = tracks[track_index].clone();
                let confidence = self.confidence_for(&file, &track);
                PairedTrack::matched(file, track, confidence)
            })
            .collect();

        for &file_index in &display_order(files) {
            if !file_taken[file_index] {
                pairs.push(PairedTrack::file_only(files[file_index].clone()));
            }
        }
        for (track_index, track) in tracks.iter().enumerate() {
            if !track_taken[track_index] {
                pairs.push(PairedTrack::remote_only(track.clone()));
            }
        }

        pairs.sort_by(|a, b| b.confidence.score.cmp(&a.confidence.score));
        pairs
    }

    fn pair_score(&self, file: &AudioFileRecord, track: &ProviderTrack, source: TitleSource) -> f32 {
        let title = match source {
            TitleSource::Tag => &file.title,
            TitleSource::Stem => &file.stem_title,
        };
        let duration = self.duration_score(file.duration_ms, track.duration_ms);
        let similarity = normalized_similarity(title, &track.name);

        let weight_sum = self.config.duration_weight + self.config.title_weight;
        if weight_sum <= f32::EPSILON {
            return 0.0;
        }
        ((self.config.duration_weight * duration + self.config.title_weight * similarity)
            / weight_sum)
            .clamp(0.0, 1.0)
    }

    fn duration_score(&self, file_ms: u64, track_ms: Option<u64>) -> f32 {
        let Some(track_ms) = track_ms else {
            return 0.0;
        };
        let delta = file_ms.abs_diff(track_ms);
        let full = self.config.duration_full_score_ms;
        let zero = self.config.duration_zero_score_ms;

        if delta <= full {
            1.0
        } else if delta >= zero {
            0.0
        } else {
            1.0 - (delta - full) as f32 / (zero - full) as f32
        }
    }
}

/// Indices of `files` in display order (sorted by path).
pub fn display_order(files: &[AudioFileRecord]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..files.len()).collect();
    order.sort_by(|&a, &b| files[a].path.cmp(&files[b].path));
    order
}

/// Case-insensitive, punctuation-normalized similarity in `[0.0, 1.0]`.
pub fn normalized_similarity(left: &str, right: &str) -> f32 {
    let left = normalize_for_match(left);
    let right = normalize_for_match(right);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    if left == right {
        return 1.0;
    }

    let distance = levenshtein_distance(&left, &right) as f32;
    let max_len = left.chars().count().max(right.chars().count()) as f32;
    (1.0 - (distance / max_len)).clamp(0.0, 1.0)
}

fn normalize_for_match(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn levenshtein_distance(left: &str, right: &str) -> usize {
    let left_chars: Vec<char> = left.chars().collect();
    let right_chars: Vec<char> = right.chars().collect();

    if left_chars.is_empty() {
        return right_chars.len();
    }
    if right_chars.is_empty() {
        return left_chars.len();
    }

    let mut previous_row: Vec<usize> = (0..=right_chars.len()).collect();
    let mut current_row: Vec<usize> = vec![0; right_chars.len() + 1];

    for (left_index, left_char) in left_chars.iter().enumerate() {
        current_row[0] = left_index + 1;
        for (right_index, right_char) in right_chars.iter().enumerate() {
            let insert_cost = current_row[right_index] + 1;
            let delete_cost = previous_row[right_index + 1] + 1;
            let replace_cost = previous_row[right_index] + usize::from(left_char != right_char);
            current_row[right_index + 1] = insert_cost.min(delete_cost).min(replace_cost);
        }
        std::mem::swap(&mut previous_row, &mut current_row);
    }

    previous_row[right_chars.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tagsmith_domain::ConfidenceBucket;

    fn aligner() -> TrackAligner {
        TrackAligner::new(MatchingConfig::default())
    }

    fn file(name: &str, track: Option<u32>, duration_ms: u64) -> AudioFileRecord {
        let stem = name.trim_end_matches(".mp3");
        AudioFileRecord {
            path: PathBuf::from(format!("/album/{name}")),
            disc_number: None,
            track_number: track,
            title: stem.to_string(),
            stem_title: stem.to_string(),
            duration_ms,
        }
    }

    fn remote(name: &str, number: Option<u32>, duration_ms: Option<u64>) -> ProviderTrack {
        ProviderTrack {
            id: format!("remote-{name}"),
            name: name.to_string(),
            disc_number: None,
            track_number: number,
            duration_ms,
        }
    }

    #[test]
    fn strategies_are_deterministic() {
        let files = vec![
            file("B.mp3", Some(2), 200_000),
            file("A.mp3", Some(1), 30_000),
            file("C.mp3", None, 100_000),
        ];
        let tracks = vec![
            remote("A", Some(1), Some(31_000)),
            remote("C", Some(3), Some(99_000)),
            remote("B", Some(2), Some(199_000)),
        ];

        for strategy in [
            MatchStrategy::Order,
            MatchStrategy::FilesystemOrder,
            MatchStrategy::TrackNumber,
            MatchStrategy::Duration,
            MatchStrategy::Name,
            MatchStrategy::Title,
            MatchStrategy::Hybrid,
        ] {
            let first = aligner().align(&files, &tracks, strategy, &[]);
            let second = aligner().align(&files, &tracks, strategy, &[]);
            assert_eq!(first, second, "strategy {strategy} is not deterministic");
        }
    }

    #[test]
    fn order_pairs_display_order_positionally() {
        // Enumeration order differs from display (path) order.
        let files = vec![file("B.mp3", None, 1000), file("A.mp3", None, 2000)];
        let tracks = vec![remote("First", None, None), remote("Second", None, None)];

        let pairs = aligner().align(&files, &tracks, MatchStrategy::Order, &[]);
        let find = |title: &str| {
            pairs
                .iter()
                .find(|p| p.file.as_ref().is_some_and(|f| f.title == title))
                .expect("pair exists")
        };

        assert_eq!(find("A").remote.as_ref().map(|t| t.name.as_str()), Some("First"));
        assert_eq!(find("B").remote.as_ref().map(|t| t.name.as_str()), Some("Second"));
    }

    #[test]
    fn filesystem_order_keeps_enumeration_order() {
        let files = vec![file("B.mp3", None, 1000), file("A.mp3", None, 2000)];
        let tracks = vec![remote("First", None, None), remote("Second", None, None)];

        let pairs = aligner().align(&files, &tracks, MatchStrategy::FilesystemOrder, &[]);
        let find = |title: &str| {
            pairs
                .iter()
                .find(|p| p.file.as_ref().is_some_and(|f| f.title == title))
                .expect("pair exists")
        };

        assert_eq!(find("B").remote.as_ref().map(|t| t.name.as_str()), Some("First"));
        assert_eq!(find("A").remote.as_ref().map(|t| t.name.as_str()), Some("Second"));
    }

    #[test]
    fn order_leaves_extras_unmatched() {
        let files = vec![
            file("A.mp3", None, 1000),
            file("B.mp3", None, 2000),
            file("C.mp3", None, 3000),
        ];
        let tracks = vec![remote("First", None, None)];

        let pairs = aligner().align(&files, &tracks, MatchStrategy::Order, &[]);
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs.iter().filter(|p| p.is_complete()).count(), 1);
        assert_eq!(
            pairs.iter().filter(|p| p.remote.is_none()).count(),
            2,
            "two local files stay unmatched"
        );
    }

    #[test]
    fn empty_remote_list_yields_file_only_pairs() {
        let files = vec![file("A.mp3", None, 1000), file("B.mp3", None, 2000)];

        let pairs = aligner().align(&files, &[], MatchStrategy::Order, &[]);
        assert_eq!(pairs.len(), 2);
        assert!(pairs.iter().all(|p| p.file.is_some() && p.remote.is_none()));
    }

    #[test]
    fn track_number_matches_numbers_with_disc_constraint() {
        let mut file_one = file("01.mp3", Some(1), 1000);
        file_one.disc_number = Some(2);
        let files = vec![file_one, file("02.mp3", Some(1), 2000)];

        let mut track_disc_one = remote("Disc1 Track1", Some(1), None);
        track_disc_one.disc_number = Some(1);
        let mut track_disc_two = remote("Disc2 Track1", Some(1), None);
        track_disc_two.disc_number = Some(2);
        let tracks = vec![track_disc_one, track_disc_two];

        let pairs = aligner().align(&files, &tracks, MatchStrategy::TrackNumber, &[]);
        let disc_two_pair = pairs
            .iter()
            .find(|p| p.file.as_ref().is_some_and(|f| f.disc_number == Some(2)))
            .expect("disc 2 file paired");
        assert_eq!(
            disc_two_pair.remote.as_ref().map(|t| t.name.as_str()),
            Some("Disc2 Track1")
        );
    }

    #[test]
    fn track_number_falls_back_to_order_for_unnumbered_files() {
        let files = vec![file("A.mp3", None, 1000), file("B.mp3", Some(2), 2000)];
        let tracks = vec![
            remote("One", Some(1), None),
            remote("Two", Some(2), None),
        ];

        let pairs = aligner().align(&files, &tracks, MatchStrategy::TrackNumber, &[]);
        let find = |title: &str| {
            pairs
                .iter()
                .find(|p| p.file.as_ref().is_some_and(|f| f.title == title))
                .expect("pair exists")
        };

        assert_eq!(find("B").remote.as_ref().map(|t| t.name.as_str()), Some("Two"));
        assert_eq!(find("A").remote.as_ref().map(|t| t.name.as_str()), Some("One"));
    }

    #[test]
    fn duration_assignment_is_bijective() {
        let files = vec![
            file("A.mp3", None, 100_000),
            file("B.mp3", None, 100_500),
            file("C.mp3", None, 101_000),
        ];
        let tracks = vec![
            remote("X", None, Some(100_200)),
            remote("Y", None, Some(100_700)),
            remote("Z", None, Some(300_000)),
        ];

        let pairs = aligner().align(&files, &tracks, MatchStrategy::Duration, &[]);
        let mut seen_files = std::collections::HashSet::new();
        let mut seen_remotes = std::collections::HashSet::new();
        for pair in pairs.iter().filter(|p| p.is_complete()) {
            assert!(seen_files.insert(pair.file.as_ref().map(|f| f.path.clone())));
            assert!(seen_remotes.insert(pair.remote.as_ref().map(|t| t.id.clone())));
        }
    }

    #[test]
    fn duration_scenario_pairs_nearest_with_high_confidence() {
        let files = vec![file("A.mp3", None, 30_000), file("B.mp3", None, 200_000)];
        let tracks = vec![
            remote("A", None, Some(31_000)),
            remote("B", None, Some(199_000)),
        ];

        let pairs = aligner().align(&files, &tracks, MatchStrategy::Duration, &[]);
        assert_eq!(pairs.len(), 2);
        assert!(pairs.iter().all(|p| p.is_complete()), "zero unmatched");

        for pair in &pairs {
            let file_title = &pair.file.as_ref().expect("file present").title;
            let remote_name = &pair.remote.as_ref().expect("remote present").name;
            assert_eq!(file_title, remote_name);
            assert_eq!(pair.confidence.bucket, ConfidenceBucket::High);
        }
    }

    #[test]
    fn name_ties_break_on_duration() {
        let files = vec![file("Song.mp3", None, 200_000)];
        let tracks = vec![
            remote("Song", None, Some(500_000)),
            remote("Song", None, Some(201_000)),
        ];

        let pairs = aligner().align(&files, &tracks, MatchStrategy::Name, &[]);
        let matched = pairs.iter().find(|p| p.is_complete()).expect("one match");
        assert_eq!(
            matched.remote.as_ref().and_then(|t| t.duration_ms),
            Some(201_000)
        );
    }

    #[test]
    fn hybrid_prefers_duration_when_titles_differ_only_in_formatting() {
        let files = vec![file("Paranoid Android.mp3", None, 387_000)];
        let tracks = vec![
            remote("Paranoid Android (Remastered)", None, Some(387_500)),
            remote("Paranoid Android", None, Some(150_000)),
        ];

        let pairs = aligner().align(&files, &tracks, MatchStrategy::Hybrid, &[]);
        let matched = pairs.iter().find(|p| p.is_complete()).expect("one match");
        assert_eq!(
            matched.remote.as_ref().and_then(|t| t.duration_ms),
            Some(387_500)
        );
    }

    #[test]
    fn manual_strategy_carries_previous_pairing() {
        let files = vec![file("A.mp3", None, 1000)];
        let tracks = vec![remote("X", None, None), remote("Y", None, None)];

        let previous = vec![PairedTrack::matched(
            files[0].clone(),
            tracks[1].clone(),
            Confidence::unscored(),
        )];

        let pairs = aligner().align(&files, &tracks, MatchStrategy::Manual, &previous);
        assert_eq!(pairs, previous);
    }

    #[test]
    fn pairs_are_presented_in_descending_confidence() {
        let files = vec![
            file("Exact.mp3", None, 100_000),
            file("Far.mp3", None, 100_000),
        ];
        let tracks = vec![
            remote("Exact", None, Some(100_000)),
            remote("Something Else Entirely", None, Some(900_000)),
        ];

        let pairs = aligner().align(&files, &tracks, MatchStrategy::Order, &[]);
        for window in pairs.windows(2) {
            assert!(window[0].confidence.score >= window[1].confidence.score);
        }
    }

    #[test]
    fn better_signals_never_earn_a_lower_bucket() {
        let close = aligner().confidence_for(
            &file("Airbag.mp3", None, 284_000),
            &remote("Airbag", None, Some(284_500)),
        );
        let far = aligner().confidence_for(
            &file("Airbag.mp3", None, 284_000),
            &remote("Airbag (Live at Glastonbury)", None, Some(340_000)),
        );

        assert!(close.score >= far.score);
        assert!(close.bucket >= far.bucket);
    }

    #[test]
    fn review_ranking_orders_pool_by_confidence() {
        let target = file("Airbag.mp3", None, 284_000);
        let pool = vec![
            remote("Lucky", None, Some(259_000)),
            remote("Airbag", None, Some(284_000)),
            remote("Electioneering", None, Some(230_000)),
        ];

        let ranked = aligner().rank_candidates(&target, &pool);
        assert_eq!(ranked[0].0, 1, "exact match ranks first");
        assert_eq!(ranked.len(), 3);
    }

    #[test]
    fn similarity_normalizes_case_and_punctuation() {
        assert_eq!(normalized_similarity("Paranoid Android!", "paranoid android"), 1.0);
        assert_eq!(normalized_similarity("", "anything"), 0.0);
        assert!(normalized_similarity("Airbag", "Lucky") < 0.5);
    }
}
