//! Effective settings and the layers they are merged from
//!
//! Every configuration source is reduced to a [`ConfigLayer`]: a map from a
//! canonical [`Field`] to a raw value. Layers are then folded in precedence
//! order into one immutable [`Settings`].

use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

use humantime_serde::re::humantime;
use url::Url;

use crate::app::client::{ClientConfig, Endpoints};
use crate::constants::{http, limits, splunkbase};
use crate::errors::{ConfigError, ConfigResult};

/// Where a setting came from, highest precedence first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigSource {
    Cli,
    File,
    Env,
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cli => "cli",
            Self::File => "file",
            Self::Env => "env",
            Self::Default => "default",
        };
        f.write_str(name)
    }
}

/// Canonical setting names shared by every source
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Username,
    Password,
    AppsFile,
    AppsList,
    OutputDir,
    Proxy,
    Timeout,
    RateLimit,
    BaseUrl,
    ApiUrl,
}

/// Section names whose keys are read; anything else is ignored
const KNOWN_SECTIONS: &[&str] = &[
    "splunkbase",
    "apps",
    "http",
    "client",
    "network",
    "default",
];

impl Field {
    /// Name used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Password => "password",
            Self::AppsFile => "apps_file",
            Self::AppsList => "apps_list",
            Self::OutputDir => "output_dir",
            Self::Proxy => "proxy",
            Self::Timeout => "timeout",
            Self::RateLimit => "rate_limit",
            Self::BaseUrl => "base_url",
            Self::ApiUrl => "api_url",
        }
    }

    /// Maps a `(section, key)` pair from a config file to a field
    ///
    /// Keys are matched case-insensitively with `-` and `_` treated alike.
    /// `file` and `list` only mean the apps file / inline list inside an
    /// `apps` section.
    pub fn from_key(section: Option<&str>, key: &str) -> Option<Self> {
        let section = section.map(normalize_key);
        if let Some(section) = section.as_deref() {
            if !KNOWN_SECTIONS.contains(&section) {
                return None;
            }
        }
        let in_apps = section.as_deref() == Some("apps");

        match normalize_key(key).as_str() {
            "username" | "user" => Some(Self::Username),
            "password" => Some(Self::Password),
            "apps_file" => Some(Self::AppsFile),
            "file" if in_apps => Some(Self::AppsFile),
            "list" if in_apps => Some(Self::AppsList),
            "apps" | "app_list" if !in_apps => Some(Self::AppsList),
            "output" | "output_dir" => Some(Self::OutputDir),
            "proxy" => Some(Self::Proxy),
            "timeout" => Some(Self::Timeout),
            "rate_limit" | "rate_limit_rps" => Some(Self::RateLimit),
            "base_url" => Some(Self::BaseUrl),
            "api_url" => Some(Self::ApiUrl),
            _ => None,
        }
    }

    /// Maps the part of an environment variable after the prefix to a field
    ///
    /// `SPLUNK_ASD_FILE` and `SPLUNK_ASD_LIST` refer to the apps settings.
    pub fn from_env_suffix(suffix: &str) -> Option<Self> {
        match normalize_key(suffix).as_str() {
            "file" => Some(Self::AppsFile),
            "list" => Some(Self::AppsList),
            other => Self::from_key(None, other),
        }
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_lowercase().replace('-', "_")
}

/// A password or other value that must never be printed
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The underlying value, for the one place that must send it
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Value as read from a source, before typing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Text(String),
    List(Vec<String>),
}

impl RawValue {
    fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::List(items) => items.iter().all(|item| item.trim().is_empty()),
        }
    }

    /// Single text value; lists are joined with commas
    fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.trim().to_string(),
            Self::List(items) => items.join(","),
        }
    }

    /// List value; text is split on commas and newlines
    fn as_list(&self) -> Vec<String> {
        let items: Vec<String> = match self {
            Self::Text(text) => text
                .split([',', '\n'])
                .map(|item| item.trim().to_string())
                .collect(),
            Self::List(items) => items.iter().map(|item| item.trim().to_string()).collect(),
        };
        items.into_iter().filter(|item| !item.is_empty()).collect()
    }
}

/// Values contributed by one source
#[derive(Debug, Clone)]
pub struct ConfigLayer {
    source: ConfigSource,
    values: BTreeMap<Field, RawValue>,
}

impl ConfigLayer {
    pub fn new(source: ConfigSource) -> Self {
        Self {
            source,
            values: BTreeMap::new(),
        }
    }

    /// Built-in defaults for the optional settings
    pub fn defaults() -> Self {
        let mut layer = Self::new(ConfigSource::Default);
        layer.set(Field::BaseUrl, splunkbase::BASE_URL);
        layer.set(Field::ApiUrl, splunkbase::API_URL);
        layer.set(
            Field::Timeout,
            format!("{}s", http::DEFAULT_TIMEOUT.as_secs()),
        );
        layer.set(Field::RateLimit, limits::DEFAULT_RATE_LIMIT_RPS.to_string());
        layer
    }

    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Sets a text value; empty values are treated as absent
    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        self.set_raw(field, RawValue::Text(value.into()));
    }

    /// Sets a raw value; later writes to the same field win within a layer
    pub fn set_raw(&mut self, field: Field, value: RawValue) {
        if value.is_empty() {
            return;
        }
        self.values.insert(field, value);
    }

    pub fn get(&self, field: Field) -> Option<&RawValue> {
        self.values.get(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

/// The effective configuration for one run
///
/// Built once by [`ConfigResolver`](crate::config::ConfigResolver) and only
/// ever passed around by reference afterwards.
#[derive(Debug, Clone)]
pub struct Settings {
    pub username: String,
    pub password: Secret,
    pub apps_file: Option<PathBuf>,
    pub inline_apps: Vec<String>,
    pub output_dir: PathBuf,
    pub endpoints: Endpoints,
    pub proxy: Option<String>,
    pub timeout: Duration,
    pub rate_limit_rps: NonZeroU32,
    /// Highest-precedence source that supplied any value
    pub config_source: ConfigSource,
    provenance: BTreeMap<Field, ConfigSource>,
}

impl Settings {
    /// Folds layers into settings
    ///
    /// `layers` must be ordered from highest to lowest precedence. The first
    /// layer holding a field decides its value.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` for an absent username, password
    /// or output directory and `ConfigError::InvalidValue` for values that do
    /// not parse.
    pub fn from_layers(layers: &[ConfigLayer]) -> ConfigResult<Self> {
        let mut provenance = BTreeMap::new();
        let mut lookup = |field: Field| -> Option<RawValue> {
            layers.iter().find_map(|layer| {
                layer.get(field).map(|value| {
                    provenance.insert(field, layer.source());
                    value.clone()
                })
            })
        };

        let username = lookup(Field::Username).map(|v| v.as_text());
        let password = lookup(Field::Password).map(|v| v.as_text());
        let output_dir = lookup(Field::OutputDir).map(|v| v.as_text());
        let apps_file = lookup(Field::AppsFile).map(|v| PathBuf::from(v.as_text()));
        let inline_apps = lookup(Field::AppsList)
            .map(|v| v.as_list())
            .unwrap_or_default();
        let proxy = lookup(Field::Proxy).map(|v| v.as_text());
        let timeout = lookup(Field::Timeout).map(|v| v.as_text());
        let rate_limit = lookup(Field::RateLimit).map(|v| v.as_text());
        let base_url = lookup(Field::BaseUrl).map(|v| v.as_text());
        let api_url = lookup(Field::ApiUrl).map(|v| v.as_text());

        let username = username.ok_or_else(|| missing(Field::Username))?;
        let password = password.ok_or_else(|| missing(Field::Password))?;
        let output_dir = output_dir.ok_or_else(|| missing(Field::OutputDir))?;

        let timeout = match timeout {
            Some(value) => parse_timeout(&value)?,
            None => http::DEFAULT_TIMEOUT,
        };
        let rate_limit_rps = match rate_limit {
            Some(value) => parse_rate_limit(&value)?,
            None => limits::DEFAULT_RATE_LIMIT_RPS,
        };
        let base_url = parse_url(
            Field::BaseUrl,
            base_url.as_deref().unwrap_or(splunkbase::BASE_URL),
        )?;
        let api_url = parse_url(
            Field::ApiUrl,
            api_url.as_deref().unwrap_or(splunkbase::API_URL),
        )?;
        if let Some(proxy) = &proxy {
            parse_url(Field::Proxy, proxy)?;
        }

        let config_source = provenance
            .values()
            .copied()
            .min()
            .unwrap_or(ConfigSource::Default);

        Ok(Self {
            username,
            password: Secret::new(password),
            apps_file,
            inline_apps,
            output_dir: PathBuf::from(output_dir),
            endpoints: Endpoints::new(base_url, api_url),
            proxy,
            timeout,
            rate_limit_rps,
            config_source,
            provenance,
        })
    }

    /// Which source supplied `field`, if any did
    pub fn source_of(&self, field: Field) -> Option<ConfigSource> {
        self.provenance.get(&field).copied()
    }

    /// HTTP client configuration derived from these settings
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            request_timeout: self.timeout,
            proxy: self.proxy.clone(),
            rate_limit_rps: self.rate_limit_rps,
            ..ClientConfig::default()
        }
    }
}

fn missing(field: Field) -> ConfigError {
    ConfigError::MissingField {
        field: field.name().to_string(),
    }
}

fn invalid(field: Field, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.name().to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Accepts plain seconds (`90`) or a humantime duration (`1m 30s`)
fn parse_timeout(value: &str) -> ConfigResult<Duration> {
    let duration = match value.parse::<u64>() {
        Ok(secs) => Duration::from_secs(secs),
        Err(_) => humantime::parse_duration(value)
            .map_err(|e| invalid(Field::Timeout, value, e.to_string()))?,
    };
    if duration.is_zero() {
        return Err(invalid(Field::Timeout, value, "Timeout must be non-zero"));
    }
    Ok(duration)
}

fn parse_rate_limit(value: &str) -> ConfigResult<NonZeroU32> {
    let rate = value
        .parse::<u32>()
        .map_err(|e| invalid(Field::RateLimit, value, e.to_string()))?;
    NonZeroU32::new(rate)
        .ok_or_else(|| invalid(Field::RateLimit, value, "Rate limit must be non-zero"))
}

/// Parses a URL, making sure a base path ends with `/` so joins keep it
fn parse_url(field: Field, value: &str) -> ConfigResult<Url> {
    let mut url = Url::parse(value).map_err(|e| invalid(field, value, e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid(field, value, "URL must be hierarchical (http/https)"));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
