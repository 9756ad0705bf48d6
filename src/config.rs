use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

const DEFAULTS_TOML: &str = include_str!("defaults.toml");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub busy_timeout: Duration,
    pub debounce: Duration,
    pub placeholder_avatar_url: String,
    pub media_dir: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    storage: RawStorage,
    #[serde(default)]
    availability: RawAvailability,
    #[serde(default)]
    profile: RawProfile,
    #[serde(default)]
    media: RawMedia,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStorage {
    busy_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAvailability {
    debounce_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProfile {
    placeholder_avatar_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMedia {
    dir: Option<PathBuf>,
}

impl RawConfig {
    fn overlay(self, user: RawConfig) -> RawConfig {
        RawConfig {
            storage: RawStorage {
                busy_timeout_ms: user.storage.busy_timeout_ms.or(self.storage.busy_timeout_ms),
            },
            availability: RawAvailability {
                debounce_ms: user.availability.debounce_ms.or(self.availability.debounce_ms),
            },
            profile: RawProfile {
                placeholder_avatar_url: user
                    .profile
                    .placeholder_avatar_url
                    .or(self.profile.placeholder_avatar_url),
            },
            media: RawMedia {
                dir: user.media.dir.or(self.media.dir),
            },
        }
    }
}

impl Config {
    /// Built-in defaults, optionally overlaid with a user file. A missing user
    /// file is an error only when the path was given explicitly.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults: RawConfig = toml::from_str(DEFAULTS_TOML)?;
        let merged = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                })?;
                defaults.overlay(toml::from_str(&raw)?)
            }
            None => defaults,
        };
        Self::from_raw(merged)
    }

    #[cfg(test)]
    pub(crate) fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let defaults: RawConfig = toml::from_str(DEFAULTS_TOML)?;
        Self::from_raw(defaults.overlay(toml::from_str(raw)?))
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let busy_timeout_ms = raw
            .storage
            .busy_timeout_ms
            .ok_or(ConfigError::Missing("storage.busy_timeout_ms"))?;
        if busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "storage.busy_timeout_ms must be greater than zero".to_string(),
            ));
        }
        let debounce_ms = raw
            .availability
            .debounce_ms
            .ok_or(ConfigError::Missing("availability.debounce_ms"))?;
        let placeholder_avatar_url = raw
            .profile
            .placeholder_avatar_url
            .ok_or(ConfigError::Missing("profile.placeholder_avatar_url"))?;
        if let Err(err) = Url::parse(&placeholder_avatar_url) {
            return Err(ConfigError::Invalid(format!(
                "profile.placeholder_avatar_url '{}' is not an absolute url: {}",
                placeholder_avatar_url, err
            )));
        }
        let media_dir = raw.media.dir.ok_or(ConfigError::Missing("media.dir"))?;

        Ok(Self {
            busy_timeout: Duration::from_millis(busy_timeout_ms),
            debounce: Duration::from_millis(debounce_ms),
            placeholder_avatar_url,
            media_dir,
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml(toml::de::Error),
    Missing(&'static str),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "cannot read config {}: {}", path.display(), source)
            }
            ConfigError::Toml(err) => write!(f, "invalid config TOML: {}", err),
            ConfigError::Missing(key) => write!(f, "config key '{}' is missing", key),
            ConfigError::Invalid(message) => write!(f, "{}", message),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Toml(err) => Some(err),
            ConfigError::Missing(_) | ConfigError::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        ConfigError::Toml(value)
    }
}
