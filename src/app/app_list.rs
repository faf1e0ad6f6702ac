//! App list loading
//!
//! Turns an apps file or an inline config entry into an ordered list of
//! [`AppEntry`]. Order and duplicates are preserved exactly as written.
//!
//! Supported file layouts, chosen by extension:
//!
//! ```text
//! apps.txt   one entry per line: `identifier` or `identifier@version`, `#` comments
//! apps.json  ["appA", {"uid": "1621", "version": "9.1.0", "name": "Splunk Add-on"}]
//! apps.yaml  - appA
//!            - uid: 1621
//!              version: 9.1.0
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::app::models::{parse_app_line, AppEntry};
use crate::errors::{AppListError, AppListResult};

/// Where the app list comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppSource {
    /// A file on disk
    File(PathBuf),
    /// Entries given directly in the configuration
    Inline(Vec<String>),
}

impl AppSource {
    /// Picks the source from the resolved settings: a file wins over an inline list
    pub fn from_settings(apps_file: Option<&Path>, inline_apps: &[String]) -> AppListResult<Self> {
        match apps_file {
            Some(path) => Ok(Self::File(path.to_path_buf())),
            None if !inline_apps.is_empty() => Ok(Self::Inline(inline_apps.to_vec())),
            None => Err(AppListError::NoSource),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Inline(_) => "inline config entry".to_string(),
        }
    }
}

/// Structured list element: a bare identifier or an object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StructuredEntry {
    Bare(String),
    Detailed {
        #[serde(alias = "uid", alias = "id", alias = "app_id")]
        identifier: ScalarText,
        #[serde(default)]
        version: Option<ScalarText>,
    },
}

/// Accepts integers as well as strings (`uid: 1621`, `version: 2`)
///
/// Decimal numbers are kept apart: `8.10` parses to `8.1`, so the text the
/// user wrote is gone by the time it reaches us.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScalarText {
    Text(String),
    Integer(i64),
    Decimal(f64),
}

impl ScalarText {
    fn into_text(self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text),
            Self::Integer(value) => Some(value.to_string()),
            Self::Decimal(_) => None,
        }
    }
}

impl StructuredEntry {
    fn into_entry(self, line: usize) -> AppListResult<AppEntry> {
        match self {
            Self::Bare(text) => Ok(match text.split_once('@') {
                Some((identifier, version)) => {
                    AppEntry::pinned(identifier.trim(), version.trim())
                }
                None => AppEntry::new(text.trim()),
            }),
            Self::Detailed {
                identifier,
                version,
            } => {
                let identifier = identifier.into_text().ok_or_else(|| {
                    AppListError::InvalidEntry {
                        line,
                        content: "numeric identifier with a fraction".to_string(),
                    }
                })?;
                let identifier = identifier.trim().to_string();
                let version = match version {
                    Some(version) => version.into_text().ok_or_else(|| {
                        AppListError::UnquotedVersion {
                            line,
                            identifier: identifier.clone(),
                        }
                    })?,
                    None => String::new(),
                };
                let version = version.trim();

                Ok(AppEntry {
                    identifier,
                    version: (!version.is_empty()).then(|| version.to_string()),
                })
            }
        }
    }
}

/// Layout of an apps file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListFormat {
    PlainText,
    Json,
    Yaml,
}

impl ListFormat {
    fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => Self::Json,
            Some("yaml") | Some("yml") => Self::Yaml,
            _ => Self::PlainText,
        }
    }
}

/// Loads app lists
pub struct AppListLoader;

impl AppListLoader {
    /// Loads the ordered entries from `source`
    ///
    /// # Errors
    ///
    /// Returns `AppListError` if the source is unreadable, malformed, holds an
    /// unusable identifier or yields no entries
    pub async fn load(source: &AppSource) -> AppListResult<Vec<AppEntry>> {
        let entries = match source {
            AppSource::File(path) => {
                let content =
                    tokio::fs::read_to_string(path)
                        .await
                        .map_err(|source| AppListError::Io {
                            path: path.clone(),
                            source,
                        })?;
                Self::parse(path, &content)?
            }
            AppSource::Inline(items) => Self::parse_inline(items)?,
        };

        if entries.is_empty() {
            return Err(AppListError::Empty {
                source_name: source.describe(),
            });
        }

        info!(
            "Loaded {} app(s) from {}",
            entries.len(),
            source.describe()
        );
        Ok(entries)
    }

    /// Parses file content according to the file's extension
    pub fn parse(path: &Path, content: &str) -> AppListResult<Vec<AppEntry>> {
        let format = ListFormat::from_path(path);
        debug!("Parsing {} as {:?}", path.display(), format);

        match format {
            ListFormat::PlainText => Self::parse_lines(content),
            ListFormat::Json => {
                let items: Vec<StructuredEntry> =
                    serde_json::from_str(content).map_err(|e| AppListError::Parse {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    })?;
                Self::finish_structured(items)
            }
            ListFormat::Yaml => {
                // An empty YAML document is an empty list, not a parse error
                if content.trim().is_empty() {
                    return Ok(Vec::new());
                }
                let items: Vec<StructuredEntry> =
                    serde_yaml::from_str(content).map_err(|e| AppListError::Parse {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    })?;
                Self::finish_structured(items)
            }
        }
    }

    /// Parses a plain-text list, one entry per line
    pub fn parse_lines(content: &str) -> AppListResult<Vec<AppEntry>> {
        let mut entries = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if let Some(entry) = parse_app_line(line, index + 1)? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    fn parse_inline(items: &[String]) -> AppListResult<Vec<AppEntry>> {
        let mut entries = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            if let Some(entry) = parse_app_line(item, index + 1)? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    fn finish_structured(items: Vec<StructuredEntry>) -> AppListResult<Vec<AppEntry>> {
        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let entry = item.into_entry(index + 1)?;
                entry.validate(index + 1)?;
                Ok(entry)
            })
            .collect()
    }
}
