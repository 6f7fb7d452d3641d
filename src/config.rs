//! Configuration loaded from environment variables.
//!
//! Every setting has a default, so the studio runs with nothing but an API
//! key in the environment.

use crate::error::{GenStudioError, Result};
use crate::image::providers::{ImagenModel, ImagenProvider};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::time::Duration;

/// Studio configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudioConfig {
    /// File holding the persisted history.
    /// Env: `GENSTUDIO_HISTORY_PATH`
    /// Default: `<data dir>/history.json`, or `./genstudio-history.json`
    /// when the platform has no data directory.
    pub history_path: PathBuf,

    /// Directory downloads are written to.
    /// Env: `GENSTUDIO_DOWNLOAD_DIR`
    /// Default: `.`
    pub download_dir: PathBuf,

    /// Imagen model to call.
    /// Env: `GENSTUDIO_MODEL`
    /// Default: `imagen-4.0-generate-001`
    pub model: ImagenModel,

    /// Upper bound on one generation request.
    /// Env: `GENSTUDIO_TIMEOUT_SECS`
    /// Default: unset (wait indefinitely).
    pub request_timeout: Option<Duration>,

    /// Override for the generation service base URL.
    /// Env: `GENSTUDIO_API_BASE`
    pub api_base: Option<String>,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            history_path: default_history_path(),
            download_dir: PathBuf::from("."),
            model: ImagenModel::default(),
            request_timeout: None,
            api_base: None,
        }
    }
}

fn default_history_path() -> PathBuf {
    ProjectDirs::from("dev", "genstudio", "genstudio")
        .map(|dirs| dirs.data_dir().join("history.json"))
        .unwrap_or_else(|| PathBuf::from("genstudio-history.json"))
}

impl StudioConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(path) = var("GENSTUDIO_HISTORY_PATH") {
            config.history_path = PathBuf::from(path);
        }
        if let Some(dir) = var("GENSTUDIO_DOWNLOAD_DIR") {
            config.download_dir = PathBuf::from(dir);
        }
        if let Some(model) = var("GENSTUDIO_MODEL") {
            config.model = model.parse().map_err(|_| {
                GenStudioError::InvalidRequest(format!("GENSTUDIO_MODEL: unknown model {model}"))
            })?;
        }
        if let Some(secs) = var("GENSTUDIO_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                GenStudioError::InvalidRequest(format!(
                    "GENSTUDIO_TIMEOUT_SECS: expected whole seconds, got {secs}"
                ))
            })?;
            if secs == 0 {
                return Err(GenStudioError::InvalidRequest(
                    "GENSTUDIO_TIMEOUT_SECS must be greater than zero".into(),
                ));
            }
            config.request_timeout = Some(Duration::from_secs(secs));
        }
        config.api_base = var("GENSTUDIO_API_BASE");

        Ok(config)
    }

    /// Builds the Imagen provider this configuration describes. Without an
    /// explicit key the provider reads it from the environment.
    pub fn imagen_provider(&self, api_key: Option<String>) -> Result<ImagenProvider> {
        let mut builder = ImagenProvider::builder().model(self.model);
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(base) = &self.api_base {
            builder = builder.base_url(base);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = StudioConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.download_dir, PathBuf::from("."));
        assert_eq!(config.model, ImagenModel::Imagen4);
        assert_eq!(config.request_timeout, None);
        assert_eq!(config.api_base, None);
        assert!(config.history_path.ends_with("history.json"));
    }

    #[test]
    fn test_overrides() {
        let config = StudioConfig::from_lookup(lookup(&[
            ("GENSTUDIO_HISTORY_PATH", "/tmp/h.json"),
            ("GENSTUDIO_DOWNLOAD_DIR", "out"),
            ("GENSTUDIO_MODEL", "imagen-4.0-fast-generate-001"),
            ("GENSTUDIO_TIMEOUT_SECS", "90"),
            ("GENSTUDIO_API_BASE", "http://localhost:8080/v1beta"),
        ]))
        .unwrap();
        assert_eq!(config.history_path, PathBuf::from("/tmp/h.json"));
        assert_eq!(config.download_dir, PathBuf::from("out"));
        assert_eq!(config.model, ImagenModel::Imagen4Fast);
        assert_eq!(config.request_timeout, Some(Duration::from_secs(90)));
        assert_eq!(
            config.api_base.as_deref(),
            Some("http://localhost:8080/v1beta")
        );
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let config =
            StudioConfig::from_lookup(lookup(&[("GENSTUDIO_DOWNLOAD_DIR", "  ")])).unwrap();
        assert_eq!(config.download_dir, PathBuf::from("."));
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        for (key, value) in [
            ("GENSTUDIO_TIMEOUT_SECS", "soon"),
            ("GENSTUDIO_TIMEOUT_SECS", "0"),
            ("GENSTUDIO_MODEL", "dall-e-3"),
        ] {
            let err = StudioConfig::from_lookup(lookup(&[(key, value)])).unwrap_err();
            assert!(err.to_string().contains(key), "{err}");
        }
    }

    #[test]
    fn test_provider_from_config() {
        let config = StudioConfig {
            model: ImagenModel::Imagen4Ultra,
            ..StudioConfig::default()
        };
        let provider = config.imagen_provider(Some("test-key".into())).unwrap();
        assert_eq!(provider.model(), ImagenModel::Imagen4Ultra);
    }
}
