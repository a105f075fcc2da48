use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::{Context, OptionExt, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::services::merge::{DEFAULT_PLAYLIST_NAME, MAX_BATCH_SIZE, MergeOptions};
use crate::spotify_rs::client::{SPOTIFY_API_BASE_URL, SpotifyClientOptions};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub spotify: SpotifyConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpotifyConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// A short-lived token, used as-is when no refresh token is configured.
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub token_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    #[serde(default = "default_playlist_name")]
    pub playlist_name: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingConfig {
    #[serde(default = "default_tracing_level")]
    pub level: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

fn default_playlist_name() -> String {
    DEFAULT_PLAYLIST_NAME.to_string()
}

fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}

fn default_fetch_concurrency() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> usize {
    3
}

fn default_tracing_level() -> String {
    "warn".to_string()
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            playlist_name: default_playlist_name(),
            batch_size: default_batch_size(),
            fetch_concurrency: default_fetch_concurrency(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: default_tracing_level(),
            otlp_endpoint: None,
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err(format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .wrap_err(format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Default location: `<config dir>/sphuffle/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|path| path.join("sphuffle").join("config.toml"))
            .ok_or_eyre("Could not determine the user config directory")
    }

    /// Loads `path` (or the default location). A missing file yields the
    /// defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        if !path.exists() {
            return Ok(Config::default());
        }

        Self::from_file(&path)
    }

    /// Writes the default config to `path` unless a file already exists.
    /// Returns whether a file was written.
    pub fn create_default(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .wrap_err(format!("Failed to create directory: {}", parent.display()))?;
        }

        let contents =
            toml::to_string_pretty(&Config::default()).wrap_err("Failed to serialize config")?;
        std::fs::write(path, contents)
            .wrap_err(format!("Failed to write config file: {}", path.display()))?;
        Ok(true)
    }

    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            playlist_name: self.merge.playlist_name.clone(),
            batch_size: self.merge.batch_size.clamp(1, MAX_BATCH_SIZE),
            fetch_concurrency: self.merge.fetch_concurrency.max(1),
        }
    }

    pub fn client_options(&self) -> Result<SpotifyClientOptions> {
        let base = self
            .spotify
            .api_base_url
            .as_deref()
            .unwrap_or(SPOTIFY_API_BASE_URL);
        let base_url = Url::parse(base).wrap_err(format!("Invalid Spotify API url: {}", base))?;

        Ok(SpotifyClientOptions {
            base_url,
            timeout: Duration::from_secs(self.http.timeout_secs),
            max_retries: self.http.max_retries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [spotify]
            client_id = "id"

            [merge]
            batch_size = 500
            "#,
        )
        .unwrap();

        assert_eq!(config.spotify.client_id.as_deref(), Some("id"));
        assert_eq!(config.merge.playlist_name, "Sphuffle");
        assert_eq!(config.http.max_retries, 3);

        let options = config.merge_options();
        assert_eq!(options.batch_size, 100);
        assert_eq!(options.fetch_concurrency, 4);
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.merge.batch_size, MAX_BATCH_SIZE);
        assert_eq!(parsed.tracing.level, "warn");
    }

    #[test]
    fn test_client_options_rejects_bad_url() {
        let mut config = Config::default();
        config.spotify.api_base_url = Some("not a url".into());
        assert!(config.client_options().is_err());
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let path = std::env::temp_dir().join("sphuffle-test-missing").join("config.toml");
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.merge.playlist_name, "Sphuffle");
    }
}
