//! Runtime configuration, read from an optional TOML file.
//!
//! Every field has a default, so running without a config file is valid.
//! Relative file names are resolved against `data_dir`.

use crate::geo::{GeoError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    pub data_dir: PathBuf,
    pub cache_file: PathBuf,
    pub credentials_file: PathBuf,
    pub token_file: PathBuf,
    /// Pause between consecutive live upstream calls.
    pub throttle_ms: u64,
    /// Tokens expiring within this many seconds are refreshed.
    pub token_margin_secs: u64,
    /// Search radius around a street for reverse lookups.
    pub reverse_buffer: u32,
    pub http_timeout_secs: u64,
    pub onemap: OneMapConfig,
    pub street_directory: StreetDirectoryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OneMapConfig {
    pub search_url: String,
    pub reverse_url: String,
    pub auth_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreetDirectoryConfig {
    /// Page that runs the query and embeds the payload in `#query_results`.
    pub loader_url: String,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            cache_file: PathBuf::from("Geocoding.cache"),
            credentials_file: PathBuf::from("OneMap.key"),
            token_file: PathBuf::from("OneMapToken.key"),
            throttle_ms: 50,
            token_margin_secs: 600,
            reverse_buffer: 500,
            http_timeout_secs: 30,
            onemap: OneMapConfig::default(),
            street_directory: StreetDirectoryConfig::default(),
        }
    }
}

impl Default for OneMapConfig {
    fn default() -> Self {
        Self {
            search_url: "https://developers.onemap.sg/commonapi/search".into(),
            reverse_url: "https://developers.onemap.sg/privateapi/commonsvc/revgeocode".into(),
            auth_url: "https://developers.onemap.sg/privateapi/auth/post/getToken".into(),
        }
    }
}

impl Default for StreetDirectoryConfig {
    fn default() -> Self {
        Self {
            loader_url: "http://localhost:8910/SDirectory.html".into(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".hdb-geo")
}

impl GeoConfig {
    /// Read the config at `path`, or the defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| GeoError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn cache_path(&self) -> PathBuf {
        self.resolve(&self.cache_file)
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.resolve(&self.credentials_file)
    }

    pub fn token_path(&self) -> PathBuf {
        self.resolve(&self.token_file)
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    fn resolve(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.data_dir.join(file)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_file() {
        let config = GeoConfig::load(None).unwrap();
        assert_eq!(config.throttle(), Duration::from_millis(50));
        assert_eq!(config.token_margin_secs, 600);
        assert_eq!(config.reverse_buffer, 500);
        assert!(config.cache_path().ends_with("Geocoding.cache"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hdb-geo.toml");
        fs::write(
            &path,
            r#"
data_dir = "/srv/geo"
throttle_ms = 200

[onemap]
search_url = "http://127.0.0.1:9000/search"
"#,
        )
        .unwrap();

        let config = GeoConfig::load(Some(&path)).unwrap();
        assert_eq!(config.throttle_ms, 200);
        assert_eq!(config.cache_path(), PathBuf::from("/srv/geo/Geocoding.cache"));
        assert_eq!(config.onemap.search_url, "http://127.0.0.1:9000/search");
        assert!(config.onemap.auth_url.ends_with("/getToken"));
    }

    #[test]
    fn test_absolute_paths_kept() {
        let config = GeoConfig {
            token_file: PathBuf::from("/etc/hdb-geo/token.key"),
            ..GeoConfig::default()
        };
        assert_eq!(config.token_path(), PathBuf::from("/etc/hdb-geo/token.key"));
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "throttle_ms = \"fast\"").unwrap();
        assert!(matches!(GeoConfig::load(Some(&path)), Err(GeoError::Config(_))));
    }
}
