// Configuration management module
// Handles loading, saving, and validating configuration

use crate::scrobbler::listenbrainz::DEFAULT_API_URL;
use crate::scrobbler::{LastFmScrobbler, ListenBrainzScrobbler};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Show the authorization URL in the terminal instead of opening a browser tab
    #[serde(default)]
    pub interactive_auth: bool,

    /// Last.fm configuration
    pub lastfm: Option<LastFmConfig>,

    /// ListenBrainz configurations (can have multiple instances)
    #[serde(default)]
    pub listenbrainz: Vec<ListenBrainzConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastFmConfig {
    pub enabled: bool,
    pub api_key: String,
    pub api_secret: String,
    /// Filled in after a successful `auth`
    #[serde(default)]
    pub session_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenBrainzConfig {
    pub enabled: bool,
    pub name: String,
    pub token: String,
    pub api_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interactive_auth: false,
            lastfm: Some(LastFmConfig {
                enabled: false,
                api_key: String::new(),
                api_secret: String::new(),
                session_key: String::new(),
            }),
            listenbrainz: vec![ListenBrainzConfig {
                enabled: false,
                name: "Primary".to_string(),
                token: String::new(),
                api_url: DEFAULT_API_URL.to_string(),
            }],
        }
    }
}

impl Config {
    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?;

        Ok(config_dir.join("scrobble_dispatch.conf"))
    }

    /// Load configuration from file, or create default if it doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("Config file not found, creating default at {:?}", path);
            let default_config = Self::default();
            default_config.save(path)?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(path)
            .context("Failed to read config file")?;

        Self::parse(&content)
    }

    /// Parse and validate configuration text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .context("Failed to parse config file")?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        fs::write(path, content)
            .context("Failed to write config file")?;

        log::info!("Config saved to {:?}", path);

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        // Check that at least one scrobbler is enabled
        let lastfm_enabled = self.lastfm.as_ref().map(|l| l.enabled).unwrap_or(false);
        let listenbrainz_enabled = self.listenbrainz.iter().any(|l| l.enabled);

        if !lastfm_enabled && !listenbrainz_enabled {
            log::warn!("No scrobbling services are enabled");
        }

        // Validate Last.fm config if enabled
        if let Some(lastfm) = &self.lastfm {
            if lastfm.enabled {
                if lastfm.api_key.is_empty() {
                    anyhow::bail!("Last.fm api_key is required when Last.fm is enabled");
                }
                if lastfm.api_secret.is_empty() {
                    anyhow::bail!("Last.fm api_secret is required when Last.fm is enabled");
                }
            }
        }

        // Validate ListenBrainz configs if enabled
        let mut names = HashSet::new();
        for lb in &self.listenbrainz {
            if !names.insert(lb.name.as_str()) {
                anyhow::bail!("ListenBrainz instance names must be unique (instance: {})", lb.name);
            }
            if lb.enabled {
                if lb.token.is_empty() {
                    anyhow::bail!("ListenBrainz token is required when enabled (instance: {})", lb.name);
                }
                if lb.api_url.is_empty() {
                    anyhow::bail!("ListenBrainz api_url is required (instance: {})", lb.name);
                }
            }
        }

        Ok(())
    }

    /// Last.fm scrobbler, if enabled
    pub fn lastfm_scrobbler(&self) -> Result<Option<LastFmScrobbler>> {
        self.lastfm
            .as_ref()
            .filter(|l| l.enabled)
            .map(|lastfm| {
                LastFmScrobbler::new(
                    lastfm.api_key.clone(),
                    lastfm.api_secret.clone(),
                    lastfm.session_key.clone(),
                )
            })
            .transpose()
    }

    /// One scrobbler per enabled ListenBrainz instance
    pub fn listenbrainz_scrobblers(&self) -> Result<Vec<ListenBrainzScrobbler>> {
        self.listenbrainz
            .iter()
            .filter(|lb| lb.enabled)
            .map(|lb| ListenBrainzScrobbler::new(&lb.name, lb.token.clone(), lb.api_url.clone()))
            .collect()
    }
}
