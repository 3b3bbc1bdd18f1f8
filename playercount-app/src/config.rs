//! Persistent configuration for the playercount app.
//!
//! Config file lives at `~/.config/playercount/app.toml` unless `--config`
//! points elsewhere. Every key is optional.
//!
//! ```toml
//! username = "alice"
//!
//! [session]
//! url = "wss://www.editor-playercount-display.swatdoge.eu"
//! reconnect_after_close_delay = 5000
//!
//! [globe]
//! enabled = true
//! land_texture = "/home/alice/land.png"
//! land_colour = "#525252"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use playercount_globe::style::parse_hex_colour;
use playercount_globe::GlobeStyle;
use playercount_sdk::config::SessionConfig;
use serde::{Deserialize, Serialize};

/// User configuration (persisted in app.toml).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Editor account to register as.
    pub username: Option<String>,
    /// Relay connection and chat limits.
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub globe: GlobeSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GlobeSection {
    /// Open the globe window. Default: true
    pub enabled: Option<bool>,
    pub land_texture: Option<PathBuf>,
    pub highlight_texture: Option<PathBuf>,
    pub land_colour: Option<String>,
    pub sea_colour: Option<String>,
    pub fresnel_colour: Option<String>,
    pub fresnel_intensity: Option<f32>,
}

pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("playercount")
        .join("app.toml")
}

impl Config {
    /// Load from `path`, falling back to defaults if the file is missing or
    /// unreadable.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(s) => match toml::from_str(&s) {
                    Ok(c) => return c,
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "bad config file, using defaults"),
                },
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "can't read config file"),
            }
        }
        Self::default()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let text = toml::to_string_pretty(self).context("serializing config")?;
        std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

/// Effective settings after merging CLI args > config file > defaults.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub session: SessionConfig,
    pub username: Option<String>,
    pub globe: bool,
    pub land_texture: Option<PathBuf>,
    pub highlight_texture: Option<PathBuf>,
    pub style: GlobeStyle,
}

impl Resolved {
    pub fn merge(cli: &super::Cli, config: &Config) -> Result<Self> {
        let mut session = config.session.clone();
        if let Some(url) = &cli.url {
            session.url = url.clone();
        }

        let username = cli
            .username
            .clone()
            .or_else(|| config.username.clone())
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        let globe = !cli.no_globe && config.globe.enabled.unwrap_or(true);

        let land_texture = cli
            .land_texture
            .clone()
            .or_else(|| config.globe.land_texture.clone());
        let highlight_texture = cli
            .highlight_texture
            .clone()
            .or_else(|| config.globe.highlight_texture.clone());

        let defaults = GlobeStyle::default();
        let colour = |value: &Option<String>, fallback: u32| -> Result<u32> {
            match value {
                Some(text) => Ok(parse_hex_colour(text)?),
                None => Ok(fallback),
            }
        };
        let style = GlobeStyle {
            land: colour(&config.globe.land_colour, defaults.land)?,
            sea: colour(&config.globe.sea_colour, defaults.sea)?,
            fresnel: colour(&config.globe.fresnel_colour, defaults.fresnel)?,
            fresnel_intensity: config
                .globe
                .fresnel_intensity
                .unwrap_or(defaults.fresnel_intensity),
        };

        Ok(Self {
            session,
            username,
            globe,
            land_texture,
            highlight_texture,
            style,
        })
    }

    /// Config file contents that reproduce these settings.
    pub fn to_config(&self) -> Config {
        let hex = |c: u32| format!("#{c:06x}");
        Config {
            username: self.username.clone(),
            session: self.session.clone(),
            globe: GlobeSection {
                enabled: Some(self.globe),
                land_texture: self.land_texture.clone(),
                highlight_texture: self.highlight_texture.clone(),
                land_colour: Some(hex(self.style.land)),
                sea_colour: Some(hex(self.style.sea)),
                fresnel_colour: Some(hex(self.style.fresnel)),
                fresnel_intensity: Some(self.style.fresnel_intensity),
            },
        }
    }
}
