//! Layered configuration.
//!
//! Sources, lowest priority first:
//! 1. Built-in defaults.
//! 2. `config.toml` in the platform config directory (if it exists).
//! 3. An explicit file passed on the command line (`.toml`, `.yaml`/`.yml`
//!    or `.json`).
//! 4. `SIFT_`-prefixed environment variables, with `__` between nested keys
//!    (`SIFT_PROVIDER__API_KEY`, `SIFT_POLLING__MAX_ATTEMPTS`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "SIFT_";
const DATABASE_FILE: &str = "sift.sqlite3";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "sift")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Required for scanning; `show`/`list`/`report` work without it.
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
}
impl Default for ProviderConfig {
    fn default() -> Self {
        Self { base_url: "https://api.metadefender.com/v4".to_string(), api_key: None, request_timeout_secs: 30 }
    }
}
impl ProviderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub max_attempts: u32,
    pub delay_ms: u64,
    pub concurrency: usize,
}
impl Default for PollingConfig {
    fn default() -> Self {
        Self { max_attempts: 10, delay_ms: 2000, concurrency: 16 }
    }
}
impl PollingConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database: PathBuf,
}
impl Default for StoreConfig {
    fn default() -> Self {
        let database = match project_dirs() {
            Some(dirs) => dirs.data_dir().join(DATABASE_FILE),
            None => PathBuf::from(DATABASE_FILE),
        };
        Self { database }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadsConfig {
    pub max_size_bytes: u64,
    /// Empty allows every type.
    pub allowed_mime_types: Vec<String>,
    /// Write an error record even when the oracle could not be reached.
    pub record_unreachable_submissions: bool,
}
impl Default for UploadsConfig {
    fn default() -> Self {
        Self { max_size_bytes: 10 * 1024 * 1024, allowed_mime_types: Vec::new(), record_unreachable_submissions: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// An `EnvFilter` directive; `RUST_LOG` takes precedence.
    pub level: String,
}
impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub polling: PollingConfig,
    pub store: StoreConfig,
    pub uploads: UploadsConfig,
    pub log: LogConfig,
}

impl Config {
    /// Load from every source, with `explicit` (if any) overriding the
    /// platform config file.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let platform = project_dirs().map(|dirs| dirs.config_dir().join("config.toml"));
        Self::load_from(platform.as_deref(), explicit)
    }

    fn load_from(platform: Option<&Path>, explicit: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = platform {
            // Missing files are skipped.
            figment = figment.merge(Toml::file(path));
        }
        if let Some(path) = explicit {
            if !path.is_file() {
                tracing::error!(path = %path.display(), "Config file does not exist");
                exn::bail!(ErrorKind::Load);
            }
            figment = match path.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => figment.merge(Toml::file(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => exn::bail!(ErrorKind::Invalid("config file must be .toml, .yaml, .yml or .json")),
            };
        }
        let config: Config =
            figment.merge(Env::prefixed(ENV_PREFIX).split("__")).extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.provider.base_url.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("provider.base_url must not be empty"));
        }
        if self.provider.request_timeout_secs == 0 {
            exn::bail!(ErrorKind::Invalid("provider.request_timeout_secs must be at least 1"));
        }
        if self.polling.max_attempts == 0 {
            exn::bail!(ErrorKind::Invalid("polling.max_attempts must be at least 1"));
        }
        if self.polling.concurrency == 0 {
            exn::bail!(ErrorKind::Invalid("polling.concurrency must be at least 1"));
        }
        if self.uploads.max_size_bytes == 0 {
            exn::bail!(ErrorKind::Invalid("uploads.max_size_bytes must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            let config = Config::load_from(None, None).unwrap();
            assert_eq!(config.provider.base_url, "https://api.metadefender.com/v4");
            assert_eq!(config.provider.api_key, None);
            assert_eq!(config.polling.max_attempts, 10);
            assert_eq!(config.polling.delay(), Duration::from_secs(2));
            assert_eq!(config.polling.concurrency, 16);
            assert_eq!(config.uploads.max_size_bytes, 10_485_760);
            assert!(config.store.database.ends_with(DATABASE_FILE));
            assert_eq!(config.log.level, "info");
            Ok(())
        });
    }

    #[rstest]
    #[case::toml("sift.toml", "[polling]\nmax_attempts = 3\n[provider]\napi_key = \"from-file\"\n")]
    #[case::yaml("sift.yaml", "polling:\n  max_attempts: 3\nprovider:\n  api_key: from-file\n")]
    #[case::json("sift.json", r#"{"polling": {"max_attempts": 3}, "provider": {"api_key": "from-file"}}"#)]
    fn test_explicit_file(#[case] name: &str, #[case] contents: &str) {
        Jail::expect_with(|jail| {
            jail.create_file(name, contents)?;
            let config = Config::load_from(None, Some(Path::new(name))).unwrap();
            assert_eq!(config.polling.max_attempts, 3);
            assert_eq!(config.polling.delay_ms, 2000);
            assert_eq!(config.provider.api_key.as_deref(), Some("from-file"));
            Ok(())
        });
    }

    #[test]
    fn test_priority() {
        Jail::expect_with(|jail| {
            jail.create_file("platform.toml", "[polling]\nmax_attempts = 4\ndelay_ms = 500\nconcurrency = 2\n")?;
            jail.create_file("explicit.toml", "[polling]\nmax_attempts = 6\ndelay_ms = 750\n")?;
            jail.set_env("SIFT_POLLING__MAX_ATTEMPTS", "8");
            jail.set_env("SIFT_PROVIDER__API_KEY", "from-env");
            let config =
                Config::load_from(Some(Path::new("platform.toml")), Some(Path::new("explicit.toml"))).unwrap();
            assert_eq!(config.polling.max_attempts, 8);
            assert_eq!(config.polling.delay_ms, 750);
            assert_eq!(config.polling.concurrency, 2);
            assert_eq!(config.provider.api_key.as_deref(), Some("from-env"));
            Ok(())
        });
    }

    #[test]
    fn test_missing_platform_file_is_skipped() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            let platform = jail.directory().join("config.toml");
            let config = Config::load_from(Some(&platform), None).unwrap();
            assert_eq!(config.polling, PollingConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_platform_file() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("config.toml", "[polling]\nmax_attempts = 4\n")?;
            let config = Config::load_from(Some(&jail.directory().join("config.toml")), None).unwrap();
            assert_eq!(config.polling.max_attempts, 4);
            jail.set_env("SIFT_POLLING__MAX_ATTEMPTS", "8");
            let config = Config::load_from(Some(&jail.directory().join("config.toml")), None).unwrap();
            assert_eq!(config.polling.max_attempts, 8);
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        Jail::expect_with(|jail| {
            let err = Config::load_from(None, Some(&jail.directory().join("sift.toml"))).unwrap_err();
            assert_eq!(&*err, &ErrorKind::Load);
            Ok(())
        });
    }

    #[test]
    fn test_unknown_extension() {
        Jail::expect_with(|jail| {
            jail.create_file("sift.ini", "max_attempts=3")?;
            let err = Config::load_from(None, Some(&jail.directory().join("sift.ini"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Invalid(_)));
            Ok(())
        });
    }

    #[rstest]
    #[case::zero_attempts("[polling]\nmax_attempts = 0\n")]
    #[case::zero_concurrency("[polling]\nconcurrency = 0\n")]
    #[case::empty_base_url("[provider]\nbase_url = \"\"\n")]
    fn test_invalid_values(#[case] contents: &str) {
        Jail::expect_with(|jail| {
            jail.create_file("sift.toml", contents)?;
            let err = Config::load_from(None, Some(Path::new("sift.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Invalid(_)));
            Ok(())
        });
    }

    #[test]
    fn test_wrong_type() {
        Jail::expect_with(|jail| {
            jail.create_file("sift.toml", "[polling]\nmax_attempts = \"many\"\n")?;
            let err = Config::load_from(None, Some(Path::new("sift.toml"))).unwrap_err();
            assert_eq!(&*err, &ErrorKind::Load);
            Ok(())
        });
    }
}
