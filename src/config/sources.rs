//! Reading configuration sources into layers
//!
//! Each file syntax is flattened to `(section, key, value)` triples before
//! keys are mapped to [`Field`]s, so every format shares one key vocabulary.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::settings::{ConfigLayer, ConfigSource, Field, RawValue};
use crate::constants::env;
use crate::errors::{ConfigError, ConfigResult};

/// Config file syntax, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Ini,
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// Picks the format for `path`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnsupportedFormat` for unknown extensions
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("ini") | Some("conf") => Ok(Self::Ini),
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            _ => Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Flattens `content` into `(section, key, value)` entries
    pub fn flatten(&self, path: &Path, content: &str) -> ConfigResult<Vec<FlatEntry>> {
        match self {
            Self::Ini => flatten_ini(path, content),
            Self::Yaml => flatten_yaml(path, content),
            Self::Toml => flatten_toml(path, content),
        }
    }
}

/// One setting as found in a file, before key mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatEntry {
    pub section: Option<String>,
    pub key: String,
    pub value: RawValue,
}

impl FlatEntry {
    fn new(section: Option<&str>, key: &str, value: RawValue) -> Self {
        Self {
            section: section.map(str::to_string),
            key: key.to_string(),
            value,
        }
    }
}

fn parse_error(path: &Path, reason: impl ToString) -> ConfigError {
    ConfigError::Parse {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn flatten_ini(path: &Path, content: &str) -> ConfigResult<Vec<FlatEntry>> {
    let ini = ini::Ini::load_from_str(content).map_err(|e| parse_error(path, e))?;

    let mut entries = Vec::new();
    for (section, properties) in ini.iter() {
        for (key, value) in properties.iter() {
            entries.push(FlatEntry::new(
                section,
                key,
                RawValue::Text(value.to_string()),
            ));
        }
    }
    Ok(entries)
}

fn flatten_yaml(path: &Path, content: &str) -> ConfigResult<Vec<FlatEntry>> {
    use serde_yaml::Value;

    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let document: Value = serde_yaml::from_str(content).map_err(|e| parse_error(path, e))?;
    let mapping = match document {
        Value::Mapping(mapping) => mapping,
        Value::Null => return Ok(Vec::new()),
        _ => return Err(parse_error(path, "top level must be a mapping")),
    };

    fn scalar(value: &Value) -> Option<String> {
        match value {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            _ => None,
        }
    }

    fn raw(value: &Value) -> Option<RawValue> {
        match value {
            Value::Sequence(items) => Some(RawValue::List(items.iter().filter_map(scalar).collect())),
            other => scalar(other).map(RawValue::Text),
        }
    }

    let mut entries = Vec::new();
    for (key, value) in &mapping {
        let Some(key) = scalar(key) else { continue };
        match value {
            Value::Mapping(section) => {
                for (inner_key, inner_value) in section {
                    if let (Some(inner_key), Some(inner_value)) = (scalar(inner_key), raw(inner_value)) {
                        entries.push(FlatEntry::new(Some(key.as_str()), &inner_key, inner_value));
                    }
                }
            }
            other => {
                if let Some(value) = raw(other) {
                    entries.push(FlatEntry::new(None, &key, value));
                }
            }
        }
    }
    Ok(entries)
}

fn flatten_toml(path: &Path, content: &str) -> ConfigResult<Vec<FlatEntry>> {
    use toml::Value;

    let table: toml::Table = content.parse().map_err(|e| parse_error(path, e))?;

    fn scalar(value: &Value) -> Option<String> {
        match value {
            Value::String(text) => Some(text.clone()),
            Value::Integer(number) => Some(number.to_string()),
            Value::Float(number) => Some(number.to_string()),
            Value::Boolean(flag) => Some(flag.to_string()),
            _ => None,
        }
    }

    fn raw(value: &Value) -> Option<RawValue> {
        match value {
            Value::Array(items) => Some(RawValue::List(items.iter().filter_map(scalar).collect())),
            other => scalar(other).map(RawValue::Text),
        }
    }

    let mut entries = Vec::new();
    for (key, value) in &table {
        match value {
            Value::Table(section) => {
                for (inner_key, inner_value) in section {
                    if let Some(inner_value) = raw(inner_value) {
                        entries.push(FlatEntry::new(Some(key.as_str()), inner_key, inner_value));
                    }
                }
            }
            other => {
                if let Some(value) = raw(other) {
                    entries.push(FlatEntry::new(None, key, value));
                }
            }
        }
    }
    Ok(entries)
}

/// Reads a config file into a [`ConfigSource::File`] layer
///
/// # Errors
///
/// Returns `ConfigError` if the file is missing, unreadable, of an unknown
/// format or malformed
pub async fn load_config_file(path: &Path) -> ConfigResult<ConfigLayer> {
    let format = ConfigFormat::from_path(path)?;

    let content = tokio::fs::read_to_string(path).await.map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let mut layer = ConfigLayer::new(ConfigSource::File);
    for entry in format.flatten(path, &content)? {
        match Field::from_key(entry.section.as_deref(), &entry.key) {
            Some(field) => layer.set_raw(field, entry.value),
            None => debug!(
                "Ignoring unknown key {}{} in {}",
                entry
                    .section
                    .as_deref()
                    .map(|s| format!("{}.", s))
                    .unwrap_or_default(),
                entry.key,
                path.display()
            ),
        }
    }

    debug!("Read {} setting(s) from {}", layer.len(), path.display());
    Ok(layer)
}

/// Reads `KEY=value` pairs from an env file without touching the process environment
///
/// # Errors
///
/// Returns `ConfigError::NotFound` if the file does not exist and
/// `ConfigError::Parse` for malformed lines
pub fn read_env_file(path: &Path) -> ConfigResult<Vec<(String, String)>> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let iter = dotenv::from_path_iter(path).map_err(|e| parse_error(path, e))?;
    iter.map(|item| item.map_err(|e| parse_error(path, e)))
        .collect()
}

/// Builds the env layer from `SPLUNK_ASD_*` variables
///
/// Later pairs win, so callers pass env file entries before process variables.
pub fn env_layer<I>(vars: I) -> ConfigLayer
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut layer = ConfigLayer::new(ConfigSource::Env);
    for (name, value) in vars {
        let Some(suffix) = name.strip_prefix(env::PREFIX) else {
            continue;
        };
        match Field::from_env_suffix(suffix) {
            Some(field) => layer.set(field, value),
            None => debug!("Ignoring unknown environment variable {}", name),
        }
    }
    layer
}

/// First existing config file among the standard locations
pub fn discover_config_file(search_dir: &Path, user_config_dir: Option<&Path>) -> Option<PathBuf> {
    use crate::constants::files::{LOCAL_CONFIG_FILES, USER_CONFIG_DIR};

    let local = LOCAL_CONFIG_FILES.iter().map(|name| search_dir.join(name));
    let user = user_config_dir.map(|dir| dir.join(USER_CONFIG_DIR).join("config.yaml"));

    local.chain(user).find(|candidate| {
        let exists = candidate.is_file();
        if exists {
            debug!("Found config file: {}", candidate.display());
        }
        exists
    })
}
