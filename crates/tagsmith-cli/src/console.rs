// SPDX-License-Identifier: GPL-3.0-or-later

//! Console rendering and prompt I/O.

use std::io::{self, BufRead, Write};
use tagsmith_application::commit::{MoveError, RetryDecider};
use tagsmith_application::session::{ResolutionSession, TrackMode};
use tagsmith_application::stage::StageMachine;
use tagsmith_domain::Stage;

/// Read one command line from stdin. EOF becomes the abandon token so an
/// exhausted input stream unwinds the batch instead of spinning.
pub fn prompt(label: &str) -> String {
    print!("{label}> ");
    let _ = io::stdout().flush();

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) => "x".to_string(),
        Ok(_) => line.trim_end_matches(['\r', '\n']).to_string(),
        Err(_) => "x".to_string(),
    }
}

/// Retry-or-skip prompt used when a folder move hits a lock.
pub struct ConsoleRetry;

impl RetryDecider for ConsoleRetry {
    fn retry(&self, attempt: u32, error: &MoveError) -> bool {
        println!("move attempt {attempt} failed: {error}");
        println!("close any program using the folder, then choose: r = retry, s = skip");
        loop {
            match prompt("move").as_str() {
                "r" | "" => return true,
                "s" => return false,
                _ => println!("r = retry, s = skip"),
            }
        }
    }
}

fn format_duration(duration_ms: Option<u64>) -> String {
    match duration_ms {
        Some(ms) => {
            let total_seconds = ms / 1000;
            format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
        }
        None => "-:--".to_string(),
    }
}

/// Render the current session state: candidates for the search stages, the
/// paired-track table for the track stage, plus pending notices.
pub fn render(machine: &StageMachine<'_>, session: &mut ResolutionSession, page_size: usize) {
    for notice in session.take_notices() {
        println!("! {notice}");
    }

    println!();
    println!(
        "== {} [{}] — {}",
        session.job.path.display(),
        session.job.provider,
        session.job.stage
    );

    match session.job.stage {
        Stage::Artist => render_artists(session, page_size),
        Stage::Quick | Stage::Album => render_albums(session, page_size),
        Stage::Track => render_tracks(machine, session),
    }
}

fn render_artists(session: &ResolutionSession, page_size: usize) {
    let cache = &session.job.cache;
    let page = cache.page_slice(&cache.artists, page_size);
    if page.is_empty() {
        println!("  (no candidates)");
    }
    for (offset, artist) in page.iter().enumerate() {
        let number = cache.page * page_size + offset + 1;
        println!("  {number:2}. {}", artist.name);
    }
    println!("index selects (empty = 1) | id:<value> | text = new search | n/p page | mb/dc/lf/dz provider | x skip");
}

fn render_albums(session: &ResolutionSession, page_size: usize) {
    let cache = &session.job.cache;
    let page = cache.page_slice(&cache.albums, page_size);
    if page.is_empty() {
        println!("  (no candidates)");
    }
    for (offset, album) in page.iter().enumerate() {
        let number = cache.page * page_size + offset + 1;
        let year = album
            .year()
            .map(|year| format!(" ({year})"))
            .unwrap_or_default();
        let artist = album.artist_name.as_deref().unwrap_or("?");
        let combined = if album.combined { " [combined]" } else { "" };
        println!("  {number:2}. {artist} — {}{year}{combined}", album.name);
    }
    match session.job.stage {
        Stage::Album => println!(
            "index selects (empty = 1) | c [list] combine | b/pr back | text = new search | n/p page | mb/dc/lf/dz | x skip"
        ),
        _ => println!(
            "index selects (empty = 1) | id:<value> | text = new search | n/p page | mb/dc/lf/dz | x skip"
        ),
    }
}

fn render_tracks(machine: &StageMachine<'_>, session: &ResolutionSession) {
    if let Some(album) = &session.album {
        let year = album
            .year()
            .map(|year| format!(" ({year})"))
            .unwrap_or_default();
        println!("  album: {}{year}", album.name);
        if album.combined {
            println!("  combined from: {}", album.album_names.join(" + "));
        }
    }

    for (index, pair) in session.pairs.iter().enumerate() {
        let local = pair
            .file
            .as_ref()
            .map(|file| format!("{} [{}]", file.title, format_duration(Some(file.duration_ms))))
            .unwrap_or_else(|| "(no audio)".to_string());
        let remote = pair
            .remote
            .as_ref()
            .map(|track| format!("{} [{}]", track.name, format_duration(track.duration_ms)))
            .unwrap_or_else(|| "(no remote)".to_string());
        let marked = if pair.marked { "*" } else { " " };

        let (left, right) = if session.reverse_columns {
            (remote, local)
        } else {
            (local, remote)
        };
        println!(
            "  {:2}.{marked}[{:>3} {:6}] {left}  <->  {right}",
            index + 1,
            pair.confidence.score,
            pair.confidence.bucket.to_string()
        );
    }

    match &session.mode {
        TrackMode::Browse => {
            let preview = if session.preview { " | PREVIEW ON" } else { "" };
            println!(
                "o/f/t/d/n/l/h sort | m manual | rm review | k <range> mark | aa <name> album artist | r columns | st <range> | sa save+move | rn rename | w preview | b back | x skip{preview}"
            );
        }
        TrackMode::Manual { cursor } => {
            let file_pairs = session.file_pair_indices();
            if let Some(&pair_index) = file_pairs.get(*cursor) {
                if let Some(file) = &session.pairs[pair_index].file {
                    println!("assign remote track for: {}", file.title);
                }
            }
            for (index, track) in session.remote_tracks.iter().enumerate() {
                println!(
                    "  {:2}. {} [{}]",
                    index + 1,
                    track.name,
                    format_duration(track.duration_ms)
                );
            }
            println!("index assigns | s unmatch | empty keeps | q done");
        }
        TrackMode::Review { .. } => {
            if let Some(candidates) = machine.review_candidates(session) {
                for (index, (track, confidence)) in candidates.iter().enumerate() {
                    println!(
                        "  {:2}. [{:>3} {:6}] {} [{}]",
                        index + 1,
                        confidence.score,
                        confidence.bucket.to_string(),
                        track.name,
                        format_duration(track.duration_ms)
                    );
                }
            }
            println!("index replaces | empty keeps | q done | x skip album");
        }
    }
}
