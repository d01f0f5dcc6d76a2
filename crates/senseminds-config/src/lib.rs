//! Deployment profiles and configuration loading for the SenseMinds CLI.
//!
//! A config file holds named profiles, one per deployment (edge gateway,
//! lab rig, ...). Each profile points at a realtime server and optionally
//! a separate REST root, and can override the shared pacing defaults.
//! [`profile_to_realtime_config`] turns a resolved profile into the
//! [`RealtimeConfig`] that `senseminds-core` consumes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use url::Url;

use senseminds_api::TlsMode;
use senseminds_core::RealtimeConfig;

/// Environment variable that points at an alternate config file.
pub const CONFIG_PATH_ENV: &str = "SENSEMINDS_CONFIG";

const ENV_PREFIX: &str = "SENSEMINDS_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for `{field}`: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found (available: {available})")]
    ProfileNotFound { name: String, available: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config error: {0}")]
    Figment(Box<figment::Error>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self::Figment(Box::new(e))
    }
}

// ── Config types ────────────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

/// Settings shared by every profile unless the profile overrides them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Room joined after every connect.
    #[serde(default = "default_room")]
    pub room: String,

    /// Seconds between fallback poll cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Failed connects tolerated before switching to fallback polling.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// REST request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_room() -> String {
    "alerts".into()
}
fn default_poll_interval() -> u64 {
    15
}
fn default_max_reconnect_attempts() -> u32 {
    3
}
fn default_timeout() -> u64 {
    30
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            room: default_room(),
            poll_interval: default_poll_interval(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            timeout: default_timeout(),
        }
    }
}

/// One deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    /// Socket.IO server, e.g. `http://10.0.0.5:5000`.
    pub realtime_url: String,

    /// REST root. Derived as `{realtime_url}/api/v1` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socketio_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_reconnect_attempts: Option<u32>,

    /// Fixed delay before reconnecting after a server-side close, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_disconnect_delay: Option<u64>,

    /// Bound on a single connect attempt, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alerts_lookback_hours: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alerts_limit: Option<u32>,

    /// Extra CA certificate (PEM) trusted for REST calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,
}

impl Profile {
    /// A profile pointing at `realtime_url` with every other setting
    /// inherited.
    pub fn new(realtime_url: impl Into<String>) -> Self {
        Self {
            realtime_url: realtime_url.into(),
            ..Self::default()
        }
    }
}

/// Endpoint overrides that win over the profile, typically from
/// `SENSEMINDS_REALTIME_URL` / `SENSEMINDS_API_URL` or CLI flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub realtime_url: Option<String>,
    pub api_url: Option<String>,
}

impl Overrides {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            realtime_url: var("SENSEMINDS_REALTIME_URL"),
            api_url: var("SENSEMINDS_API_URL"),
        }
    }

    /// Fill unset fields from `fallback`.
    pub fn or(self, fallback: Self) -> Self {
        Self {
            realtime_url: self.realtime_url.or(fallback.realtime_url),
            api_url: self.api_url.or(fallback.api_url),
        }
    }
}

// ── Loading & saving ────────────────────────────────────────────────

/// Canonical config file path: `$SENSEMINDS_CONFIG` if set, otherwise the
/// platform config dir (`~/.config/senseminds/config.toml` on Linux).
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    directories::ProjectDirs::from("io", "senseminds", "senseminds").map_or_else(
        || {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            PathBuf::from(home)
                .join(".config")
                .join("senseminds")
                .join("config.toml")
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Load from the canonical path. Layers: built-in defaults, then the
/// TOML file, then `SENSEMINDS_*` env vars (`__` separates nesting, e.g.
/// `SENSEMINDS_DEFAULTS__POLL_INTERVAL=5`).
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit path with the same layering as [`load_config`].
/// A missing file is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?;
    Ok(config)
}

/// Persist to the canonical path.
pub fn save_config(config: &Config) -> Result<(), ConfigError> {
    save_config_to(config, &config_path())
}

/// Persist to an explicit path, creating parent directories.
pub fn save_config_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml = toml::to_string_pretty(config)?;
    std::fs::write(path, toml)?;
    Ok(())
}

// ── Resolution ──────────────────────────────────────────────────────

/// Pick the profile to use: the explicit name, else `default_profile`,
/// else `"default"`.
pub fn resolve_profile<'a>(
    config: &'a Config,
    name: Option<&str>,
) -> Result<(&'a str, &'a Profile), ConfigError> {
    let name = name
        .or(config.default_profile.as_deref())
        .unwrap_or("default");

    config
        .profiles
        .get_key_value(name)
        .map(|(key, profile)| (key.as_str(), profile))
        .ok_or_else(|| ConfigError::ProfileNotFound {
            name: name.to_owned(),
            available: if config.profiles.is_empty() {
                "none".into()
            } else {
                config
                    .profiles
                    .keys()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            },
        })
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("{raw:?}: {e}"),
    })
}

/// `{realtime_url}/api/v1`, keeping any path prefix on the realtime URL.
fn derive_api_url(realtime: &Url) -> Result<Url, ConfigError> {
    let base = realtime.as_str().trim_end_matches('/');
    parse_url("api_url", &format!("{base}/api/v1"))
}

fn positive(field: &str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(value)
}

/// Build the runtime config for a profile.
pub fn profile_to_realtime_config(
    profile: &Profile,
    defaults: &Defaults,
    overrides: &Overrides,
) -> Result<RealtimeConfig, ConfigError> {
    let realtime_raw = overrides
        .realtime_url
        .as_deref()
        .unwrap_or(&profile.realtime_url);
    if realtime_raw.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "realtime_url".into(),
            reason: "no realtime server configured".into(),
        });
    }
    let realtime_url = parse_url("realtime_url", realtime_raw)?;

    let api_url = match overrides.api_url.as_deref().or(profile.api_url.as_deref()) {
        Some(raw) => parse_url("api_url", raw)?,
        None => derive_api_url(&realtime_url)?,
    };

    let mut config = RealtimeConfig::new(realtime_url, api_url);

    let poll = positive(
        "poll_interval",
        profile.poll_interval.unwrap_or(defaults.poll_interval),
    )?;
    config.poll_interval = Duration::from_secs(poll);

    let attempts = profile
        .max_reconnect_attempts
        .unwrap_or(defaults.max_reconnect_attempts);
    positive("max_reconnect_attempts", u64::from(attempts))?;
    config.reconnect.max_attempts = attempts;

    config.request_timeout = Duration::from_secs(positive(
        "timeout",
        profile.timeout.unwrap_or(defaults.timeout),
    )?);
    config.room = profile.room.clone().unwrap_or_else(|| defaults.room.clone());

    if let Some(path) = &profile.socketio_path {
        config.socketio_path.clone_from(path);
    }
    if let Some(namespace) = &profile.namespace {
        config.namespace.clone_from(namespace);
    }
    if let Some(secs) = profile.server_disconnect_delay {
        config.server_disconnect_delay = Duration::from_secs(secs);
    }
    if let Some(secs) = profile.connect_timeout {
        config.connect_timeout = Duration::from_secs(positive("connect_timeout", secs)?);
    }
    if let Some(hours) = profile.alerts_lookback_hours {
        config.alerts_lookback_hours = hours;
    }
    if let Some(limit) = profile.alerts_limit {
        config.alerts_limit = limit;
    }
    if let Some(ca) = &profile.ca_cert {
        config.tls = TlsMode::CustomCa(ca.clone());
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lab() -> Profile {
        Profile::new("http://10.0.0.5:5000")
    }

    #[test]
    fn defaults_match_dashboard_pacing() {
        let defaults = Defaults::default();
        assert_eq!(defaults.poll_interval, 15);
        assert_eq!(defaults.max_reconnect_attempts, 3);
        assert_eq!(defaults.room, "alerts");
    }

    #[test]
    fn api_url_is_derived_from_realtime_url() {
        let config =
            profile_to_realtime_config(&lab(), &Defaults::default(), &Overrides::default())
                .unwrap();
        assert_eq!(config.realtime_url.as_str(), "http://10.0.0.5:5000/");
        assert_eq!(config.api_url.as_str(), "http://10.0.0.5:5000/api/v1");
        assert_eq!(config.poll_interval, Duration::from_secs(15));
    }

    #[test]
    fn derived_api_url_keeps_path_prefix() {
        let profile = Profile::new("https://edge.example/sm/");
        let config =
            profile_to_realtime_config(&profile, &Defaults::default(), &Overrides::default())
                .unwrap();
        assert_eq!(config.api_url.as_str(), "https://edge.example/sm/api/v1");
    }

    #[test]
    fn profile_values_win_over_defaults() {
        let profile = Profile {
            api_url: Some("http://10.0.0.6:8080/api/v1".into()),
            room: Some("ops".into()),
            poll_interval: Some(5),
            max_reconnect_attempts: Some(6),
            alerts_limit: Some(25),
            ca_cert: Some("/etc/senseminds/ca.pem".into()),
            ..lab()
        };
        let config =
            profile_to_realtime_config(&profile, &Defaults::default(), &Overrides::default())
                .unwrap();

        assert_eq!(config.api_url.as_str(), "http://10.0.0.6:8080/api/v1");
        assert_eq!(config.room, "ops");
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.reconnect.max_attempts, 6);
        assert_eq!(config.alerts_limit, 25);
        assert!(matches!(config.tls, TlsMode::CustomCa(_)));
    }

    #[test]
    fn overrides_win_over_profile() {
        let overrides = Overrides {
            realtime_url: Some("http://192.168.1.20:5000".into()),
            api_url: None,
        };
        let config = profile_to_realtime_config(&lab(), &Defaults::default(), &overrides).unwrap();
        assert_eq!(config.realtime_url.host_str(), Some("192.168.1.20"));
        assert_eq!(config.api_url.as_str(), "http://192.168.1.20:5000/api/v1");
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let profile = Profile {
            poll_interval: Some(0),
            ..lab()
        };
        let err = profile_to_realtime_config(&profile, &Defaults::default(), &Overrides::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "poll_interval"));
    }

    #[test]
    fn bad_url_is_rejected() {
        let profile = Profile::new("not a url");
        let err = profile_to_realtime_config(&profile, &Defaults::default(), &Overrides::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "realtime_url"));
    }

    #[test]
    fn empty_realtime_url_is_rejected() {
        let err = profile_to_realtime_config(
            &Profile::default(),
            &Defaults::default(),
            &Overrides::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("no realtime server"));
    }

    #[test]
    fn resolve_prefers_explicit_name() {
        let mut config = Config::default();
        config.profiles.insert("default".into(), lab());
        config
            .profiles
            .insert("gateway".into(), Profile::new("http://10.0.0.9:5000"));

        let (name, _) = resolve_profile(&config, Some("gateway")).unwrap();
        assert_eq!(name, "gateway");
        let (name, _) = resolve_profile(&config, None).unwrap();
        assert_eq!(name, "default");
    }

    #[test]
    fn resolve_missing_profile_lists_available() {
        let mut config = Config::default();
        config.profiles.insert("lab".into(), lab());

        let err = resolve_profile(&config, Some("prod")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "profile 'prod' not found (available: lab)"
        );
    }

    #[test]
    fn overrides_fill_from_fallback() {
        let cli = Overrides {
            realtime_url: Some("http://a:1".into()),
            api_url: None,
        };
        let env = Overrides {
            realtime_url: Some("http://b:2".into()),
            api_url: Some("http://b:2/api/v1".into()),
        };
        let merged = cli.or(env);
        assert_eq!(merged.realtime_url.as_deref(), Some("http://a:1"));
        assert_eq!(merged.api_url.as_deref(), Some("http://b:2/api/v1"));
    }

    #[test]
    fn save_then_load_preserves_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.defaults.poll_interval = 20;
        config.profiles.insert(
            "default".into(),
            Profile {
                room: Some("ops".into()),
                ..lab()
            },
        );
        save_config_to(&config, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.default_profile.as_deref(), Some("default"));
        assert_eq!(loaded.defaults.poll_interval, 20);
        let profile = &loaded.profiles["default"];
        assert_eq!(profile.realtime_url, "http://10.0.0.5:5000");
        assert_eq!(profile.room.as_deref(), Some("ops"));
        assert_eq!(profile.api_url, None);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert!(loaded.profiles.is_empty());
        assert_eq!(loaded.defaults.max_reconnect_attempts, 3);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[defaults]\npoll_interval = 30\n\n[profiles.lab]\nrealtime_url = \"http://lab:5000\"\n",
        )
        .unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.defaults.poll_interval, 30);
        assert_eq!(loaded.defaults.room, "alerts");
        assert_eq!(loaded.profiles["lab"].realtime_url, "http://lab:5000");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[defaults\npoll_interval = ").unwrap();

        assert!(matches!(
            load_config_from(&path),
            Err(ConfigError::Figment(_))
        ));
    }
}
