use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::Result;
use color_eyre::eyre::{Context, eyre};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::retry::RetryPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    MissingFile { path: PathBuf },
    #[error(
        "Spotify credentials missing. Set CLIENT_ID and CLIENT_SECRET or [spotify] in the config file"
    )]
    MissingCredentials,
}

const DEFAULT_INSTRUMENTAL_KEYWORDS: &[&str] =
    &["instrumental", "karaoke", "backing track", "no vocals"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Library directory everything is stored under
    destination: String,
    /// Directory holding songs.txt / album.txt / playlist.txt / artist.txt
    input_directory: String,
    /// Image copied into artist folders created for grouped songs
    placeholder_image: Option<String>,
    /// Market used when listing an artist's albums
    market: Option<String>,
    /// Titles containing any of these (case-insensitive) are skipped
    instrumental_keywords: Vec<String>,
    spotify: SpotifyConfig,
    retry: RetryConfig,
    download: DownloadConfig,
    curate: CurateConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    #[serde(with = "humantime_duration")]
    pub delay: Duration,
    pub catalog_attempts: usize,
    pub image_attempts: usize,
    pub download_attempts: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub binary: String,
    pub audio_format: String,
    pub audio_quality: String,
    #[serde(with = "humantime_duration")]
    pub socket_timeout: Duration,
    #[serde(with = "humantime_duration")]
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CurateConfig {
    pub artists: Vec<String>,
}

/// Retry budgets per call site, sharing one delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicies {
    pub catalog: RetryPolicy,
    pub image: RetryPolicy,
    pub download: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            destination: "~/Music/DownloadedMusic".to_string(),
            input_directory: ".".to_string(),
            placeholder_image: None,
            market: Some("IN".to_string()),
            instrumental_keywords: DEFAULT_INSTRUMENTAL_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            spotify: SpotifyConfig::default(),
            retry: RetryConfig::default(),
            download: DownloadConfig::default(),
            curate: CurateConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(3),
            catalog_attempts: 3,
            image_attempts: 3,
            download_attempts: 3,
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            audio_format: "mp3".to_string(),
            audio_quality: "192".to_string(),
            socket_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
        }
    }
}

mod humantime_duration {
    use super::*;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::MissingFile {
                path: path.to_path_buf(),
            }
            .into());
        }
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&contents)
            .wrap_err_with(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Get the default config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("song-retriever").join("config.toml"))
    }

    /// Load the default config file, falling back to built-in defaults when
    /// there is none
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Write the default config to the default path, unless a file exists
    pub fn create_default() -> Result<PathBuf> {
        let path = Self::config_path().ok_or_else(|| eyre!("No config directory available"))?;
        if path.exists() {
            return Ok(path);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents =
            toml::to_string_pretty(&Self::default()).wrap_err("Failed to serialize config")?;
        std::fs::write(&path, contents)
            .wrap_err_with(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(path)
    }

    /// Expand ~ to home directory; relative paths resolve against the
    /// current directory
    fn expand_path(path: &str) -> PathBuf {
        let expanded = match path.strip_prefix("~/") {
            Some(rest) => match dirs::home_dir() {
                Some(home) => home.join(rest),
                None => PathBuf::from(path),
            },
            None => PathBuf::from(path),
        };
        if expanded.is_absolute() {
            return expanded;
        }
        std::env::current_dir()
            .map(|cwd| cwd.join(&expanded))
            .unwrap_or(expanded)
    }

    pub fn set_destination(&mut self, destination: &str) {
        if !destination.trim().is_empty() {
            self.destination = destination.trim().to_string();
        }
    }

    pub fn set_input_directory(&mut self, input_directory: &str) {
        self.input_directory = input_directory.to_string();
    }

    pub fn set_spotify_credentials(&mut self, client_id: Option<String>, client_secret: Option<String>) {
        if client_id.is_some() {
            self.spotify.client_id = client_id;
        }
        if client_secret.is_some() {
            self.spotify.client_secret = client_secret;
        }
    }

    /// Get expanded library path
    pub fn destination_path(&self) -> PathBuf {
        Self::expand_path(&self.destination)
    }

    pub fn input_directory_path(&self) -> PathBuf {
        Self::expand_path(&self.input_directory)
    }

    pub fn placeholder_image_path(&self) -> Option<PathBuf> {
        self.placeholder_image.as_deref().map(Self::expand_path)
    }

    pub fn market(&self) -> Option<&str> {
        self.market.as_deref().filter(|m| !m.is_empty())
    }

    pub fn instrumental_keywords(&self) -> &[String] {
        &self.instrumental_keywords
    }

    pub fn download(&self) -> &DownloadConfig {
        &self.download
    }

    pub fn curate_artists(&self) -> &[String] {
        &self.curate.artists
    }

    /// Spotify client id and secret. Missing credentials are a configuration
    /// error.
    pub fn spotify_credentials(&self) -> Result<(String, String), ConfigError> {
        let non_empty = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        match (
            non_empty(&self.spotify.client_id),
            non_empty(&self.spotify.client_secret),
        ) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(ConfigError::MissingCredentials),
        }
    }

    pub fn retry_policies(&self) -> RetryPolicies {
        let delay = self.retry.delay;
        RetryPolicies {
            catalog: RetryPolicy::new(self.retry.catalog_attempts, delay),
            image: RetryPolicy::new(self.retry.image_attempts, delay),
            download: RetryPolicy::new(self.retry.download_attempts, delay),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        let policies = config.retry_policies();
        assert_eq!(policies.catalog, RetryPolicy::new(3, Duration::from_secs(3)));
        assert_eq!(policies.download.max_attempts(), 3);
        assert_eq!(config.download().binary, "yt-dlp");
        assert_eq!(config.market(), Some("IN"));
        assert_eq!(config.instrumental_keywords().len(), 4);
        assert!(config.spotify_credentials().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            destination = "/srv/music"
            instrumental_keywords = ["karaoke"]

            [retry]
            delay = "500ms"
            download_attempts = 5

            [spotify]
            client_id = "id"
            client_secret = "secret"

            [curate]
            artists = ["The Beatles", "Queen"]
            "#,
        )
        .unwrap();

        assert_eq!(config.destination_path(), PathBuf::from("/srv/music"));
        assert_eq!(config.instrumental_keywords(), ["karaoke".to_string()]);
        let policies = config.retry_policies();
        assert_eq!(policies.download, RetryPolicy::new(5, Duration::from_millis(500)));
        assert_eq!(policies.image, RetryPolicy::new(3, Duration::from_millis(500)));
        assert_eq!(config.download().socket_timeout, Duration::from_secs(30));
        assert_eq!(
            config.spotify_credentials().unwrap(),
            ("id".to_string(), "secret".to_string())
        );
        assert_eq!(config.curate_artists(), ["The Beatles", "Queen"]);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingFile { .. })
        ));
    }

    #[test]
    fn test_invalid_duration_is_rejected() {
        let result = Config::from_toml("[retry]\ndelay = \"soon\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let rendered = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed = Config::from_toml(&rendered).unwrap();
        assert_eq!(parsed.retry_policies(), Config::default().retry_policies());
        assert_eq!(parsed.download().request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.set_destination("  ");
        assert!(config.destination_path().ends_with("DownloadedMusic"));

        config.set_destination("/tmp/library");
        assert_eq!(config.destination_path(), PathBuf::from("/tmp/library"));

        config.set_spotify_credentials(Some("id".into()), None);
        assert!(config.spotify_credentials().is_err());
        config.set_spotify_credentials(None, Some("secret".into()));
        assert!(config.spotify_credentials().is_ok());
    }

    #[test]
    fn test_relative_paths_resolve_against_current_dir() {
        let mut config = Config::default();
        config.set_destination("Library");
        let path = config.destination_path();
        assert!(path.is_absolute());
        assert!(path.ends_with("Library"));
    }
}
