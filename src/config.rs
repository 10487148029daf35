use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::domain::{FetchStrategy, SourceKey};
use crate::error::SdoError;

pub const CONFIG_FILE_NAME: &str = "sdo-fetch.json";
pub const DEFAULT_OUTPUT_DIR: &str = "sdo_data";
pub const DEFAULT_IMAGE_SCALE: f64 = 2.4;
pub const DEFAULT_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_API_BASE_URL: &str = "https://api.helioviewer.org/v2/";
pub const DEFAULT_DIRECT_BASE_URL: &str = "https://sdo.gsfc.nasa.gov/assets/img/latest/";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub strategy: Option<FetchStrategy>,
    #[serde(default)]
    pub image_scale: Option<f64>,
    #[serde(default)]
    pub interval_secs: Option<u64>,
    #[serde(default)]
    pub sources: Option<Vec<String>>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub direct_base_url: Option<String>,
}

/// Base URLs of the two remote services. Both end with `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub api_base: String,
    pub direct_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE_URL.to_string(),
            direct_base: DEFAULT_DIRECT_BASE_URL.to_string(),
        }
    }
}

impl Endpoints {
    pub fn api(&self, method: &str) -> String {
        format!("{}{}/", self.api_base, method)
    }

    /// Resolves a path returned by the API (e.g. a screenshot `url`) against the API host.
    pub fn api_host_url(&self, path: &str) -> Result<String, SdoError> {
        let base = reqwest::Url::parse(&self.api_base).map_err(|err| {
            SdoError::ConfigParse(format!("invalid api_base_url {}: {err}", self.api_base))
        })?;
        let joined = base.join(path).map_err(|err| SdoError::UnexpectedResponse {
            endpoint: self.api_base.clone(),
            message: format!("invalid image path {path}: {err}"),
        })?;
        Ok(joined.to_string())
    }

    pub fn direct_image(&self, code: &str) -> String {
        format!("{}latest_1024_{code}.jpg", self.direct_base)
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub output_dir: Option<Utf8PathBuf>,
    pub strategy: FetchStrategy,
    pub image_scale: f64,
    pub interval: Duration,
    pub sources: Vec<SourceKey>,
    pub timeout: Duration,
    pub endpoints: Endpoints,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            strategy: FetchStrategy::default(),
            image_scale: DEFAULT_IMAGE_SCALE,
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            sources: default_sources(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            endpoints: Endpoints::default(),
        }
    }
}

impl ResolvedConfig {
    /// Configured output directory, or `fallback` when the config leaves it unset.
    pub fn output_dir_or(&self, fallback: &str) -> Utf8PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| Utf8PathBuf::from(fallback))
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads an explicit config file, or the first of `./sdo-fetch.json` and the
    /// per-user config file that exists. Falls back to defaults when neither does.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, SdoError> {
        let config_path = match path {
            Some(path) => Some(PathBuf::from(path)),
            None => Self::discover(),
        };

        let Some(config_path) = config_path else {
            return Self::resolve_config(Config::default());
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| SdoError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| SdoError::ConfigParse(err.to_string()))?;
        tracing::debug!(path = %config_path.display(), "loaded config");

        Self::resolve_config(config)
    }

    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "helioviewer", "sdo-fetch")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        Self::user_config_path().filter(|path| path.exists())
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, SdoError> {
        let defaults = ResolvedConfig::default();

        let image_scale = config.image_scale.unwrap_or(DEFAULT_IMAGE_SCALE);
        validate_scale(image_scale)?;

        let interval_secs = config.interval_secs.unwrap_or(DEFAULT_INTERVAL_SECS);
        let interval = validate_interval(interval_secs)?;

        let timeout_secs = config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(SdoError::ConfigParse(
                "timeout_secs must be at least 1".to_string(),
            ));
        }

        let sources = match config.sources {
            Some(values) => SourceKey::parse_list(&values)?,
            None => defaults.sources,
        };

        let endpoints = Endpoints {
            api_base: config
                .api_base_url
                .map(with_trailing_slash)
                .unwrap_or(defaults.endpoints.api_base),
            direct_base: config
                .direct_base_url
                .map(with_trailing_slash)
                .unwrap_or(defaults.endpoints.direct_base),
        };

        Ok(ResolvedConfig {
            output_dir: config.output_dir.map(Utf8PathBuf::from),
            strategy: config.strategy.unwrap_or(defaults.strategy),
            image_scale,
            interval,
            sources,
            timeout: Duration::from_secs(timeout_secs),
            endpoints,
        })
    }
}

pub fn validate_scale(scale: f64) -> Result<f64, SdoError> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(SdoError::InvalidScale(scale.to_string()));
    }
    Ok(scale)
}

pub fn validate_interval(secs: u64) -> Result<Duration, SdoError> {
    if secs == 0 {
        return Err(SdoError::InvalidInterval(
            "interval must be at least 1 second".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

pub fn default_sources() -> Vec<SourceKey> {
    SourceKey::parse_list(&["AIA_171".to_string()]).unwrap_or_default()
}

fn with_trailing_slash(mut value: String) -> String {
    if !value.ends_with('/') {
        value.push('/');
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.output_dir, None);
        assert_eq!(
            resolved.output_dir_or(DEFAULT_OUTPUT_DIR),
            Utf8PathBuf::from("sdo_data")
        );
        assert_eq!(resolved.strategy, FetchStrategy::Direct);
        assert_eq!(resolved.interval, Duration::from_secs(300));
        assert_eq!(resolved.sources.len(), 1);
        assert_eq!(resolved.sources[0].as_str(), "AIA_171");
    }

    #[test]
    fn endpoints_join_paths() {
        let endpoints = Endpoints::default();
        assert_eq!(
            endpoints.api("getDataSources"),
            "https://api.helioviewer.org/v2/getDataSources/"
        );
        assert_eq!(
            endpoints.api_host_url("/cache/screenshots/abc.png").unwrap(),
            "https://api.helioviewer.org/cache/screenshots/abc.png"
        );
        assert_eq!(
            endpoints.direct_image("0171"),
            "https://sdo.gsfc.nasa.gov/assets/img/latest/latest_1024_0171.jpg"
        );
    }
}
