//! Installed-version tracking in a JSON apps file
//!
//! In update mode the `version` recorded for each app is the release already
//! installed rather than a pin. After a newer release has been downloaded the
//! entry's `version` and `updated_time` are written back to the file. Every
//! other field of the entry (`name`, comments kept as extra keys, ...) is left
//! untouched.
//!
//! ```text
//! [
//!     {"name": "Splunk Add-on for AWS", "uid": 1876, "version": "7.3.0",
//!      "updated_time": "Tue, 03 Sep 2024 10:00:00 GMT"}
//! ]
//! ```

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::app::app_list::AppListLoader;
use crate::app::models::AppEntry;
use crate::constants::files;
use crate::errors::{AppListError, AppListResult};

/// Keys an object may use for the app identifier, in lookup order
const IDENTIFIER_KEYS: [&str; 4] = ["identifier", "uid", "id", "app_id"];

/// A JSON apps file opened for update tracking
#[derive(Debug, Clone)]
pub struct TrackedApps {
    path: PathBuf,
    document: Vec<Value>,
    entries: Vec<AppEntry>,
}

impl TrackedApps {
    /// Checks that `apps_file` can be tracked, without reading it
    ///
    /// # Errors
    ///
    /// Returns `AppListError::TrackingUnsupported` if no apps file is
    /// configured or it is not a `.json` file
    pub fn check_path(apps_file: Option<&Path>) -> AppListResult<&Path> {
        let path = apps_file.ok_or_else(|| AppListError::TrackingUnsupported {
            reason: "no apps file configured (an inline list cannot be updated)".to_string(),
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if !is_json {
            return Err(AppListError::TrackingUnsupported {
                reason: format!("{} is not a .json file", path.display()),
            });
        }
        Ok(path)
    }

    /// Reads and parses the apps file
    ///
    /// # Errors
    ///
    /// Returns `AppListError` if the file is not a JSON list the loader
    /// accepts or holds no entries
    pub async fn load(path: &Path) -> AppListResult<Self> {
        Self::check_path(Some(path))?;

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| AppListError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let entries = AppListLoader::parse(path, &content)?;
        if entries.is_empty() {
            return Err(AppListError::Empty {
                source_name: path.display().to_string(),
            });
        }

        let document: Vec<Value> =
            serde_json::from_str(&content).map_err(|e| AppListError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        info!(
            "Tracking {} app(s) in {}",
            entries.len(),
            path.display()
        );
        Ok(Self {
            path: path.to_path_buf(),
            document,
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries in file order, as they were when the file was loaded
    pub fn entries(&self) -> &[AppEntry] {
        &self.entries
    }

    /// Release currently recorded for `identifier`
    ///
    /// Reflects [`record`](Self::record) calls made since loading.
    pub fn installed_version(&self, identifier: &str) -> Option<String> {
        self.document.iter().find_map(|item| match item {
            Value::Object(object) if object_identifier(object).as_deref() == Some(identifier) => {
                object
                    .get("version")
                    .and_then(scalar_text)
                    .filter(|version| !version.is_empty())
            }
            Value::String(text) => match text.split_once('@') {
                Some((id, version)) if id.trim() == identifier => {
                    Some(version.trim().to_string())
                }
                _ => None,
            },
            _ => None,
        })
    }

    /// Records a newly installed release for the first entry of `identifier`
    ///
    /// A bare string entry is replaced by an object so the version can be
    /// stored. Returns `false` if no entry matches.
    pub fn record(&mut self, identifier: &str, version: &str, updated_time: &str) -> bool {
        let Some(item) = self
            .document
            .iter_mut()
            .find(|item| item_identifier(item).as_deref() == Some(identifier))
        else {
            return false;
        };

        if !item.is_object() {
            let mut object = Map::new();
            object.insert("uid".to_string(), Value::String(identifier.to_string()));
            *item = Value::Object(object);
        }
        if let Value::Object(object) = item {
            object.insert("version".to_string(), Value::String(version.to_string()));
            object.insert(
                "updated_time".to_string(),
                Value::String(updated_time.to_string()),
            );
        }
        debug!("Recorded {} at {} ({})", identifier, version, updated_time);
        true
    }

    /// Writes the document back, replacing the file atomically
    ///
    /// # Errors
    ///
    /// Returns `AppListError::Io` if the file cannot be written
    pub async fn save(&self) -> AppListResult<()> {
        let io_error = |source: std::io::Error| AppListError::Io {
            path: self.path.clone(),
            source,
        };

        let mut content = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut content, formatter);
        self.document
            .serialize(&mut serializer)
            .map_err(|e| io_error(std::io::Error::from(e)))?;
        content.push(b'\n');

        let mut temp_name = self.path.as_os_str().to_os_string();
        temp_name.push(files::TEMP_FILE_SUFFIX);
        let temp_path = PathBuf::from(temp_name);

        tokio::fs::write(&temp_path, &content)
            .await
            .map_err(io_error)?;
        if let Err(source) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(io_error(source));
        }

        debug!("Wrote {}", self.path.display());
        Ok(())
    }
}

fn item_identifier(item: &Value) -> Option<String> {
    match item {
        Value::Object(object) => object_identifier(object),
        Value::String(text) => {
            let id = text.split_once('@').map_or(text.as_str(), |(id, _)| id);
            Some(id.trim().to_string())
        }
        _ => None,
    }
}

fn object_identifier(object: &Map<String, Value>) -> Option<String> {
    IDENTIFIER_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(scalar_text))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const APPS: &str = r#"[
    {"name": "Splunk Add-on for AWS", "uid": 1876, "version": "7.3.0", "updated_time": "old"},
    {"name": "Lookup Editor", "uid": "1724"},
    "appC@1.0"
]"#;

    async fn write_apps(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("apps.json");
        tokio::fs::write(&path, APPS).await.unwrap();
        path
    }

    #[test]
    fn test_only_json_files_can_be_tracked() {
        assert!(TrackedApps::check_path(Some(Path::new("apps.JSON"))).is_ok());
        assert!(matches!(
            TrackedApps::check_path(Some(Path::new("apps.txt"))).unwrap_err(),
            AppListError::TrackingUnsupported { .. }
        ));
        assert!(matches!(
            TrackedApps::check_path(None).unwrap_err(),
            AppListError::TrackingUnsupported { .. }
        ));
    }

    #[tokio::test]
    async fn test_load_reads_installed_versions() {
        let temp_dir = TempDir::new().unwrap();
        let tracked = TrackedApps::load(&write_apps(&temp_dir).await).await.unwrap();

        assert_eq!(tracked.entries().len(), 3);
        assert_eq!(tracked.installed_version("1876").as_deref(), Some("7.3.0"));
        assert_eq!(tracked.installed_version("1724"), None);
        assert_eq!(tracked.installed_version("appC").as_deref(), Some("1.0"));
        assert_eq!(tracked.installed_version("unknown"), None);
    }

    #[tokio::test]
    async fn test_record_and_save_keep_other_fields() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_apps(&temp_dir).await;
        let mut tracked = TrackedApps::load(&path).await.unwrap();

        assert!(tracked.record("1876", "7.4.0", "Tue, 03 Sep 2024 10:00:00 GMT"));
        assert!(tracked.record("appC", "1.1", "2024-09-03T10:00:00Z"));
        assert!(!tracked.record("missing", "1.0", "now"));
        assert_eq!(tracked.installed_version("1876").as_deref(), Some("7.4.0"));
        tracked.save().await.unwrap();

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(written.starts_with("[\n    {"));
        let saved: Vec<Value> = serde_json::from_str(&written).unwrap();
        assert_eq!(saved[0]["name"], "Splunk Add-on for AWS");
        assert_eq!(saved[0]["uid"], 1876);
        assert_eq!(saved[0]["version"], "7.4.0");
        assert_eq!(saved[0]["updated_time"], "Tue, 03 Sep 2024 10:00:00 GMT");
        assert_eq!(saved[1], serde_json::json!({"name": "Lookup Editor", "uid": "1724"}));
        assert_eq!(saved[2]["uid"], "appC");
        assert_eq!(saved[2]["version"], "1.1");
        assert!(!temp_dir.path().join("apps.json.part").exists());

        // The rewritten file still loads
        let reloaded = TrackedApps::load(&path).await.unwrap();
        assert_eq!(reloaded.installed_version("appC").as_deref(), Some("1.1"));
    }

    #[tokio::test]
    async fn test_empty_list_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("apps.json");
        tokio::fs::write(&path, "[]").await.unwrap();

        assert!(matches!(
            TrackedApps::load(&path).await.unwrap_err(),
            AppListError::Empty { .. }
        ));
    }
}
