// SPDX-License-Identifier: GPL-3.0-or-later

mod console;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tagsmith_application::commit::{CommitEngine, FsFolderMover, NoRetry, RetryDecider};
use tagsmith_application::scanner::{is_audio_extension, scan_album_folder};
use tagsmith_application::session::ResolutionSession;
use tagsmith_application::stage::{StageMachine, StepOutcome};
use tagsmith_application::tag_store::LoftyTagStore;
use tagsmith_application::TrackAligner;
use tagsmith_config::AppConfig;
use tagsmith_domain::{AlbumJob, FindMode, ProviderKind};
use tagsmith_providers::{
    deezer::DeezerGateway, discogs::DiscogsGateway, lastfm::LastFmGateway,
    musicbrainz::MusicBrainzGateway, ProviderSet,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(
    name = "tagsmith",
    about = "Reconcile local album folders against online music catalogs"
)]
struct Args {
    /// A folder of album folders, or a single album folder.
    root: PathBuf,

    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Resolve without prompting; albums that would need review are skipped.
    #[arg(long)]
    non_interactive: bool,

    /// Render everything but write nothing to disk.
    #[arg(long)]
    preview: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    // Configuration problems are the only batch-fatal error class.
    let config = tagsmith_config::load(args.config.as_deref())?;

    let providers = build_providers(&config)?;
    let tags = LoftyTagStore::new();
    let mover = FsFolderMover {
        library_root: config.library.root.as_ref().map(PathBuf::from),
    };

    let provider = parse_provider_kind(&config.providers.default)
        .context("providers.default is not a known provider")?;
    let find_mode = parse_find_mode(&config.workflow.find_mode);
    let non_interactive = args.non_interactive || config.workflow.non_interactive;
    let preview = args.preview || config.workflow.preview;

    let console_retry = console::ConsoleRetry;
    let decider: &dyn RetryDecider = if non_interactive {
        &NoRetry
    } else {
        &console_retry
    };
    let machine = StageMachine::new(
        &providers,
        CommitEngine::new(&tags, &mover),
        TrackAligner::new(config.matching.clone()),
        decider,
        config.workflow.page_size,
    );

    let folders = discover_album_folders(&args.root)?;
    if folders.is_empty() {
        warn!(target: "cli", root = %args.root.display(), "no album folders found");
        return Ok(());
    }
    info!(target: "cli", albums = folders.len(), "starting batch");

    for folder in folders {
        // One album's failure must never abort the batch.
        let files = match scan_album_folder(&folder, &tags) {
            Ok(files) if !files.is_empty() => files,
            Ok(_) => {
                warn!(target: "cli", folder = %folder.display(), "no readable audio files; skipping");
                continue;
            }
            Err(error) => {
                warn!(target: "cli", folder = %folder.display(), error = %error, "scan failed; skipping");
                continue;
            }
        };

        let job = AlbumJob::for_folder(folder.clone(), provider, find_mode);
        let mut session = ResolutionSession::new(job, files);
        session.preview = preview;

        let outcome = if non_interactive {
            machine.resolve_noninteractive(&mut session).await
        } else {
            run_interactive(&machine, &mut session, config.workflow.page_size).await
        };

        match outcome {
            StepOutcome::Completed => {
                info!(target: "cli", folder = %session.job.path.display(), "album finished")
            }
            StepOutcome::Skipped => {
                info!(target: "cli", folder = %folder.display(), "album skipped")
            }
            StepOutcome::Continue => {}
        }
    }

    Ok(())
}

async fn run_interactive(
    machine: &StageMachine<'_>,
    session: &mut ResolutionSession,
    page_size: usize,
) -> StepOutcome {
    machine.begin(session).await;

    loop {
        console::render(machine, session, page_size);
        let line = console::prompt(&session.job.stage.to_string());
        match machine.step(session, &line).await {
            StepOutcome::Continue => {}
            outcome => return outcome,
        }
    }
}

fn build_providers(config: &AppConfig) -> Result<ProviderSet> {
    Ok(ProviderSet::new(
        MusicBrainzGateway::new(config.providers.musicbrainz.base_url.clone())
            .context("building the MusicBrainz client")?,
        DiscogsGateway::new(
            config.providers.discogs.token.clone(),
            config.providers.discogs.base_url.clone(),
        ),
        LastFmGateway::new(
            config.providers.lastfm.api_key.clone(),
            config.providers.lastfm.base_url.clone(),
        ),
        DeezerGateway::new(config.providers.deezer.base_url.clone()),
    ))
}

fn parse_provider_kind(value: &str) -> Option<ProviderKind> {
    match value {
        "musicbrainz" => Some(ProviderKind::MusicBrainz),
        "discogs" => Some(ProviderKind::Discogs),
        "lastfm" => Some(ProviderKind::LastFm),
        "deezer" => Some(ProviderKind::Deezer),
        _ => None,
    }
}

fn parse_find_mode(value: &str) -> FindMode {
    match value {
        "artist-first" => FindMode::ArtistFirst,
        _ => FindMode::Quick,
    }
}

/// Album folders to process: the root itself when it holds audio files,
/// otherwise its subfolders that do (sorted for a stable batch order).
fn discover_album_folders(root: &Path) -> Result<Vec<PathBuf>> {
    if folder_contains_audio(root)? {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut folders = Vec::new();
    for entry in fs::read_dir(root)
        .with_context(|| format!("reading batch root {}", root.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() && folder_contains_audio(&path)? {
            folders.push(path);
        }
    }
    folders.sort();
    Ok(folders)
}

fn folder_contains_audio(folder: &Path) -> Result<bool> {
    for entry in fs::read_dir(folder)
        .with_context(|| format!("reading folder {}", folder.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_symlink() {
            continue;
        }
        if file_type.is_dir() {
            if folder_contains_audio(&path)? {
                return Ok(true);
            }
            continue;
        }

        if path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| is_audio_extension(&ext.to_ascii_lowercase()))
            .unwrap_or(false)
        {
            return Ok(true);
        }
    }
    Ok(false)
}

fn init_tracing() {
    let fmt_layer = fmt::layer().with_target(true).with_level(true);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_parses_all_known_values() {
        assert_eq!(parse_provider_kind("musicbrainz"), Some(ProviderKind::MusicBrainz));
        assert_eq!(parse_provider_kind("discogs"), Some(ProviderKind::Discogs));
        assert_eq!(parse_provider_kind("lastfm"), Some(ProviderKind::LastFm));
        assert_eq!(parse_provider_kind("deezer"), Some(ProviderKind::Deezer));
        assert_eq!(parse_provider_kind("napster"), None);
    }

    #[test]
    fn find_mode_defaults_to_quick() {
        assert_eq!(parse_find_mode("artist-first"), FindMode::ArtistFirst);
        assert_eq!(parse_find_mode("quick"), FindMode::Quick);
        assert_eq!(parse_find_mode("anything"), FindMode::Quick);
    }

    #[test]
    fn discovery_treats_audio_root_as_single_album() {
        let root = tempfile::tempdir().expect("temp dir");
        fs::write(root.path().join("01 - Track.mp3"), b"data").expect("file");

        let folders = discover_album_folders(root.path()).expect("discovery succeeds");
        assert_eq!(folders, vec![root.path().to_path_buf()]);
    }

    #[test]
    fn discovery_finds_album_subfolders() {
        let root = tempfile::tempdir().expect("temp dir");
        let album_one = root.path().join("Album B");
        let album_two = root.path().join("Album A");
        let not_an_album = root.path().join("artwork");
        fs::create_dir_all(&album_one).expect("dir");
        fs::create_dir_all(&album_two).expect("dir");
        fs::create_dir_all(&not_an_album).expect("dir");
        fs::write(album_one.join("01.flac"), b"data").expect("file");
        fs::write(album_two.join("01.mp3"), b"data").expect("file");
        fs::write(not_an_album.join("cover.jpg"), b"data").expect("file");

        let folders = discover_album_folders(root.path()).expect("discovery succeeds");
        assert_eq!(folders, vec![album_two, album_one], "sorted batch order");
    }

    #[test]
    fn nested_disc_folders_count_as_audio() {
        let root = tempfile::tempdir().expect("temp dir");
        let album = root.path().join("Album");
        let disc = album.join("CD2");
        fs::create_dir_all(&disc).expect("dirs");
        fs::write(disc.join("01.ogg"), b"data").expect("file");

        assert!(folder_contains_audio(&album).expect("check succeeds"));
    }
}
