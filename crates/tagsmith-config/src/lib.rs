// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::Path;

use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MusicBrainzConfig {
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DiscogsConfig {
    pub token: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LastFmConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeezerConfig {
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Provider a new job starts on: "musicbrainz", "discogs", "lastfm", or
    /// "deezer".
    pub default: String,
    pub musicbrainz: MusicBrainzConfig,
    pub discogs: DiscogsConfig,
    pub lastfm: LastFmConfig,
    pub deezer: DeezerConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            default: "musicbrainz".to_string(),
            musicbrainz: MusicBrainzConfig::default(),
            discogs: DiscogsConfig::default(),
            lastfm: LastFmConfig::default(),
            deezer: DeezerConfig::default(),
        }
    }
}

/// Tunables for pairing confidence. The hybrid score weights duration
/// proximity against title similarity; the floors bucket the 0-100 score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    pub duration_weight: f32,
    pub title_weight: f32,
    /// Duration deltas at or below this earn a full duration score.
    pub duration_full_score_ms: u64,
    /// Duration deltas at or above this earn a zero duration score.
    pub duration_zero_score_ms: u64,
    /// Scores at or above this are bucketed High.
    pub high_floor: u8,
    /// Scores below this are bucketed Low.
    pub low_floor: u8,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            duration_weight: 0.6,
            title_weight: 0.4,
            duration_full_score_ms: 3_000,
            duration_zero_score_ms: 30_000,
            high_floor: 75,
            low_floor: 40,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// "quick" or "artist-first".
    pub find_mode: String,
    /// Candidates shown per page at the search stages.
    pub page_size: usize,
    /// Skip instead of prompting; stage C is never entered.
    pub non_interactive: bool,
    /// Render everything but write nothing to disk.
    pub preview: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            find_mode: "quick".to_string(),
            page_size: 10,
            non_interactive: false,
            preview: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LibraryConfig {
    /// Root the renamed album folders are moved under; defaults to the
    /// grandparent of each album folder (artist parent) when unset.
    pub root: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub telemetry: TelemetryConfig,
    pub providers: ProvidersConfig,
    pub matching: MatchingConfig,
    pub workflow: WorkflowConfig,
    pub library: LibraryConfig,
}

impl AppConfig {
    /// Configuration errors are the only batch-fatal error class; check them
    /// once at startup.
    pub fn validate(&self) -> Result<()> {
        match self.providers.default.as_str() {
            "musicbrainz" | "discogs" | "lastfm" | "deezer" => {}
            other => bail!("unknown default provider '{other}'"),
        }

        if self.providers.default == "lastfm" && self.providers.lastfm.api_key.is_none() {
            bail!("lastfm is the default provider but providers.lastfm.api_key is not set");
        }

        if self.matching.low_floor > self.matching.high_floor {
            bail!(
                "matching.low_floor ({}) exceeds matching.high_floor ({})",
                self.matching.low_floor,
                self.matching.high_floor
            );
        }

        if self.matching.duration_full_score_ms >= self.matching.duration_zero_score_ms {
            bail!("matching.duration_full_score_ms must be below duration_zero_score_ms");
        }

        Ok(())
    }
}

/// Load configuration from defaults, optional TOML file, and environment
/// overrides (prefix: TAGSMITH_).
pub fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(path) = config_path {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("TAGSMITH_").split("__"));

    let config: AppConfig = figment.extract()?;
    config.validate()?;
    info!(target: "config", "configuration loaded");
    Ok(config)
}
