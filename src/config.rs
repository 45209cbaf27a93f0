use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::session::DEFAULT_INSTANCE;

const DEFAULT_ENV_PREFIX: &str = "LEMMY_CACHE";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub lemmy: LemmyConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LemmyConfig {
    #[serde(default = "default_instance")]
    pub default_instance: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for LemmyConfig {
    fn default() -> Self {
        Self {
            default_instance: default_instance(),
            user_agent: default_user_agent(),
            request_timeout: default_request_timeout(),
        }
    }
}

fn default_instance() -> String {
    DEFAULT_INSTANCE.to_string()
}

fn default_user_agent() -> String {
    format!("lemmy-cache/{}", crate::VERSION)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    #[serde(default = "default_stale_time", with = "humantime_serde")]
    pub stale_time: Duration,
    #[serde(default = "default_page_limit")]
    pub page_limit: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_time: default_stale_time(),
            page_limit: default_page_limit(),
        }
    }
}

fn default_stale_time() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_page_limit() -> i64 {
    25
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directives; `RUST_LOG` wins when set.
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "warn".into()
}

/// Where [`load`] looks. `None` fields fall back to the per-user config file
/// and the `LEMMY_CACHE` environment prefix.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

/// Defaults, then the YAML file if present, then environment overrides.
pub fn load(options: LoadOptions) -> Result<Config> {
    let file = options.config_file.or_else(default_path);
    let mut cfg = match file.filter(|path| path.exists()) {
        Some(path) => merge_config(Config::default(), parse_file(&path)?),
        None => Config::default(),
    };
    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    cfg = merge_config(cfg, from_env(prefix, env::vars()));
    Ok(cfg)
}

fn parse_file(path: &Path) -> Result<Config> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("parse config {}", path.display()))
}

/// Layers `other` over `base`. Fields still at their default in `other` do
/// not override.
fn merge_config(mut base: Config, other: Config) -> Config {
    let defaults = Config::default();
    let lemmy = other.lemmy;
    if !lemmy.default_instance.is_empty() && lemmy.default_instance != defaults.lemmy.default_instance {
        base.lemmy.default_instance = lemmy.default_instance;
    }
    if !lemmy.user_agent.is_empty() && lemmy.user_agent != defaults.lemmy.user_agent {
        base.lemmy.user_agent = lemmy.user_agent;
    }
    if lemmy.request_timeout != defaults.lemmy.request_timeout {
        base.lemmy.request_timeout = lemmy.request_timeout;
    }

    let cache = other.cache;
    if cache.stale_time != defaults.cache.stale_time {
        base.cache.stale_time = cache.stale_time;
    }
    if cache.page_limit > 0 && cache.page_limit != defaults.cache.page_limit {
        base.cache.page_limit = cache.page_limit;
    }

    if !other.logging.filter.is_empty() && other.logging.filter != defaults.logging.filter {
        base.logging.filter = other.logging.filter;
    }
    base
}

/// Builds a config from `{PREFIX}_{SECTION}__{FIELD}` variables. Unknown keys
/// and unparsable values are ignored.
fn from_env<I>(prefix: &str, vars: I) -> Config
where
    I: IntoIterator<Item = (String, String)>,
{
    let prefix = format!("{}_", prefix.to_uppercase());
    let overrides: BTreeMap<String, String> = vars
        .into_iter()
        .filter_map(|(name, value)| {
            let field = name.strip_prefix(&prefix)?;
            Some((field.to_ascii_lowercase().replace("__", "."), value))
        })
        .collect();

    let mut cfg = Config::default();
    for (field, value) in overrides {
        set_field(&mut cfg, &field, value);
    }
    cfg
}

fn set_field(cfg: &mut Config, field: &str, value: String) {
    match field {
        "lemmy.default_instance" => cfg.lemmy.default_instance = value,
        "lemmy.user_agent" => cfg.lemmy.user_agent = value,
        "lemmy.request_timeout" => {
            if let Ok(timeout) = humantime::parse_duration(&value) {
                cfg.lemmy.request_timeout = timeout;
            }
        }
        "cache.stale_time" => {
            if let Ok(stale_time) = humantime::parse_duration(&value) {
                cfg.cache.stale_time = stale_time;
            }
        }
        "cache.page_limit" => {
            if let Ok(limit) = value.parse() {
                cfg.cache.page_limit = limit;
            }
        }
        "logging.filter" => cfg.logging.filter = value,
        other => tracing::debug!(field = other, "ignoring unknown config override"),
    }
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("lemmy-cache").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::tempdir;

    fn isolated(prefix: &str, config_file: PathBuf) -> LoadOptions {
        LoadOptions {
            config_file: Some(config_file),
            env_prefix: Some(prefix.to_string()),
        }
    }

    #[test]
    fn load_defaults_without_files() {
        let dir = tempdir().unwrap();
        let cfg = load(isolated("LEMMY_CACHE_TEST_DEFAULTS", dir.path().join("missing.yaml"))).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.lemmy.default_instance, "https://lemmy.world");
        assert_eq!(cfg.cache.stale_time, Duration::from_secs(300));
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "lemmy:\n  default_instance: https://beehaw.org\ncache:\n  stale_time: 30s\n  page_limit: 50\n",
        )
        .unwrap();
        let cfg = load(isolated("LEMMY_CACHE_TEST_FILE", path)).unwrap();
        assert_eq!(cfg.lemmy.default_instance, "https://beehaw.org");
        assert_eq!(cfg.cache.stale_time, Duration::from_secs(30));
        assert_eq!(cfg.cache.page_limit, 50);
        assert_eq!(cfg.lemmy.user_agent, default_user_agent());
    }

    #[test]
    fn env_overrides_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "logging:\n  filter: info\n").unwrap();
        env::set_var("LEMMY_CACHE_TEST_ENV_LOGGING__FILTER", "lemmy_cache=debug");
        env::set_var("LEMMY_CACHE_TEST_ENV_CACHE__STALE_TIME", "2m");
        let cfg = load(isolated("LEMMY_CACHE_TEST_ENV", path)).unwrap();
        assert_eq!(cfg.logging.filter, "lemmy_cache=debug");
        assert_eq!(cfg.cache.stale_time, Duration::from_secs(120));
        env::remove_var("LEMMY_CACHE_TEST_ENV_LOGGING__FILTER");
        env::remove_var("LEMMY_CACHE_TEST_ENV_CACHE__STALE_TIME");
    }

    #[test]
    fn env_keys_map_to_sections() {
        let vars = [
            ("APP_LEMMY__USER_AGENT", "agent/1"),
            ("APP_CACHE__PAGE_LIMIT", "not a number"),
            ("APP_CACHE__UNKNOWN", "x"),
            ("OTHER_LOGGING__FILTER", "trace"),
        ]
        .map(|(key, value)| (key.to_string(), value.to_string()));
        let cfg = from_env("app", vars);
        assert_eq!(cfg.lemmy.user_agent, "agent/1");
        assert_eq!(cfg.cache.page_limit, default_page_limit());
        assert_eq!(cfg.logging.filter, default_filter());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "cache: [not, a, map]\n").unwrap();
        let err = load(isolated("LEMMY_CACHE_TEST_BAD", path)).unwrap_err();
        assert!(format!("{err:#}").contains("parse config"));
    }
}
