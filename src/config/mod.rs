//! Configuration resolution for Splunkbase Fetcher
//!
//! Settings are merged from four layers, highest precedence first:
//!
//! 1. Command line arguments
//! 2. A config file (`--config`, or the first of `./splunkbase.{yaml,yml,ini,conf,toml}`
//!    and `<user config dir>/splunkbase-fetcher/config.yaml`)
//! 3. The env layer: `SPLUNK_ASD_*` entries of an env file (`--env-file` or
//!    `./.env`), overlaid by `SPLUNK_ASD_*` process environment variables
//! 4. Built-in defaults
//!
//! The result is an immutable [`Settings`] value; nothing is stored globally.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::constants::env;
use crate::errors::{ConfigError, ConfigResult};

pub mod settings;
pub mod sources;

pub use settings::{ConfigLayer, ConfigSource, Field, RawValue, Secret, Settings};
pub use sources::{ConfigFormat, FlatEntry};

/// Builder collecting the inputs of one resolution
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    cli: ConfigLayer,
    config_file: Option<PathBuf>,
    env_file: Option<PathBuf>,
    env_vars: Option<Vec<(String, String)>>,
    search_dir: PathBuf,
    user_config_dir: Option<PathBuf>,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self {
            cli: ConfigLayer::new(ConfigSource::Cli),
            config_file: None,
            env_file: None,
            env_vars: None,
            search_dir: PathBuf::from("."),
            user_config_dir: dirs::config_dir(),
        }
    }
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values given on the command line
    pub fn with_cli(mut self, cli: ConfigLayer) -> Self {
        self.cli = cli;
        self
    }

    /// Explicit config file; a missing or unrecognised file is skipped with a warning
    pub fn with_config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_file = path;
        self
    }

    /// Explicit env file; a missing file is skipped with a warning
    pub fn with_env_file(mut self, path: Option<PathBuf>) -> Self {
        self.env_file = path;
        self
    }

    /// Replaces the process environment as the source of `SPLUNK_ASD_*` variables
    pub fn with_env_vars<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.env_vars = Some(vars.into_iter().collect());
        self
    }

    /// Directory searched for local config files and the default `.env`
    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dir = dir.into();
        self
    }

    /// User config directory; `None` skips the user config lookup
    pub fn with_user_config_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.user_config_dir = dir;
        self
    }

    /// Reads every source and merges them into [`Settings`]
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a file cannot be read or parsed, a required
    /// field is absent or a value is invalid
    pub async fn resolve(self) -> ConfigResult<Settings> {
        let file_layer = self.file_layer().await?;
        let env_layer = self.env_layer()?;

        let layers = [
            self.cli,
            file_layer.unwrap_or_else(|| ConfigLayer::new(ConfigSource::File)),
            env_layer,
            ConfigLayer::defaults(),
        ];

        let settings = Settings::from_layers(&layers)?;
        info!(
            "Configuration resolved (highest source: {})",
            settings.config_source
        );
        debug!(
            "Output directory {} from {}",
            settings.output_dir.display(),
            settings
                .source_of(Field::OutputDir)
                .unwrap_or(ConfigSource::Default)
        );
        Ok(settings)
    }

    async fn file_layer(&self) -> ConfigResult<Option<ConfigLayer>> {
        let path = match &self.config_file {
            Some(path) => path.clone(),
            None => match sources::discover_config_file(
                &self.search_dir,
                self.user_config_dir.as_deref(),
            ) {
                Some(path) => path,
                None => {
                    debug!("No config file found in standard locations");
                    return Ok(None);
                }
            },
        };

        match sources::load_config_file(&path).await {
            Ok(layer) => {
                info!("Loaded configuration from: {}", path.display());
                Ok(Some(layer))
            }
            Err(ConfigError::NotFound { path }) => {
                warn!(
                    "Configuration file {} not found. Continuing without it",
                    path.display()
                );
                Ok(None)
            }
            Err(ConfigError::UnsupportedFormat { path }) => {
                warn!(
                    "Ignoring configuration file {}: expected .ini, .conf, .yaml, .yml or .toml",
                    path.display()
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn env_layer(&self) -> ConfigResult<ConfigLayer> {
        let mut vars = match &self.env_file {
            Some(path) => match sources::read_env_file(path) {
                Err(ConfigError::NotFound { path }) => {
                    warn!("Env file {} not found. Continuing without it", path.display());
                    Vec::new()
                }
                other => other?,
            },
            None => self.default_env_file_vars()?,
        };

        match &self.env_vars {
            Some(overrides) => vars.extend(overrides.iter().cloned()),
            None => vars.extend(std::env::vars().filter(|(name, _)| name.starts_with(env::PREFIX))),
        }

        Ok(sources::env_layer(vars))
    }

    fn default_env_file_vars(&self) -> ConfigResult<Vec<(String, String)>> {
        let path = self.search_dir.join(env::DEFAULT_ENV_FILE);
        if !path.is_file() {
            return Ok(Vec::new());
        }
        debug!("Reading env file {}", path.display());
        sources::read_env_file(&path)
    }

    /// Config file that resolution would read, if any
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config_file.clone().or_else(|| {
            sources::discover_config_file(&self.search_dir, self.user_config_dir.as_deref())
        })
    }
}

/// Convenience for building a layer from optional values
pub fn cli_layer<'a, I>(values: I) -> ConfigLayer
where
    I: IntoIterator<Item = (Field, Option<&'a str>)>,
{
    let mut layer = ConfigLayer::new(ConfigSource::Cli);
    for (field, value) in values {
        if let Some(value) = value {
            layer.set(field, value);
        }
    }
    layer
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    /// A resolver isolated from the real working directory and environment
    fn isolated(dir: &Path) -> ConfigResolver {
        ConfigResolver::new()
            .with_search_dir(dir)
            .with_user_config_dir(None)
            .with_env_vars(Vec::new())
    }

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_resolve_from_ini_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.ini");
        tokio::fs::write(
            &path,
            "[splunkbase]\nusername = alice\npassword = pw\n[apps]\nfile = apps.txt\noutput = ./out\n",
        )
        .await
        .unwrap();

        let settings = isolated(temp_dir.path())
            .with_config_file(Some(path))
            .resolve()
            .await
            .unwrap();

        assert_eq!(settings.username, "alice");
        assert_eq!(settings.password.expose(), "pw");
        assert_eq!(settings.apps_file, Some(PathBuf::from("apps.txt")));
        assert_eq!(settings.output_dir, PathBuf::from("./out"));
        assert_eq!(settings.config_source, ConfigSource::File);
    }

    #[tokio::test]
    async fn test_cli_overrides_file_overrides_env() {
        let temp_dir = TempDir::new().unwrap();
        tokio::fs::write(
            temp_dir.path().join("splunkbase.yaml"),
            "splunkbase:\n  username: file-user\n  password: file-pass\n",
        )
        .await
        .unwrap();
        tokio::fs::write(
            temp_dir.path().join(".env"),
            "SPLUNK_ASD_USERNAME=env-user\nSPLUNK_ASD_PASSWORD=env-pass\nSPLUNK_ASD_OUTPUT=env-out\n",
        )
        .await
        .unwrap();

        let cli = cli_layer([(Field::Username, Some("cli-user")), (Field::Proxy, None)]);
        let settings = isolated(temp_dir.path())
            .with_cli(cli)
            .resolve()
            .await
            .unwrap();

        assert_eq!(settings.username, "cli-user");
        assert_eq!(settings.password.expose(), "file-pass");
        assert_eq!(settings.output_dir, PathBuf::from("env-out"));
        assert_eq!(settings.proxy, None);
        assert_eq!(settings.config_source, ConfigSource::Cli);
        assert_eq!(settings.source_of(Field::Password), Some(ConfigSource::File));
        assert_eq!(settings.source_of(Field::OutputDir), Some(ConfigSource::Env));
    }

    #[tokio::test]
    async fn test_process_env_overrides_env_file() {
        let temp_dir = TempDir::new().unwrap();
        let env_file = temp_dir.path().join("custom.env");
        tokio::fs::write(
            &env_file,
            "SPLUNK_ASD_USERNAME=file-user\nSPLUNK_ASD_PASSWORD=pw\nSPLUNK_ASD_OUTPUT=out\n",
        )
        .await
        .unwrap();

        let settings = isolated(temp_dir.path())
            .with_env_file(Some(env_file))
            .with_env_vars(vars(&[
                ("SPLUNK_ASD_USERNAME", "process-user"),
                ("SPLUNK_ASD_TIMEOUT", "5m"),
            ]))
            .resolve()
            .await
            .unwrap();

        assert_eq!(settings.username, "process-user");
        assert_eq!(settings.timeout, Duration::from_secs(300));
        assert_eq!(settings.config_source, ConfigSource::Env);
    }

    #[tokio::test]
    async fn test_missing_required_field() {
        let temp_dir = TempDir::new().unwrap();
        let err = isolated(temp_dir.path())
            .with_env_vars(vars(&[
                ("SPLUNK_ASD_USERNAME", "alice"),
                ("SPLUNK_ASD_OUTPUT", "out"),
            ]))
            .resolve()
            .await
            .unwrap_err();

        match err {
            ConfigError::MissingField { field } => assert_eq!(field, "password"),
            other => panic!("Expected MissingField, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_explicit_files_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let env = vars(&[
            ("SPLUNK_ASD_USERNAME", "alice"),
            ("SPLUNK_ASD_PASSWORD", "pw"),
            ("SPLUNK_ASD_OUTPUT", "out"),
        ]);

        let settings = isolated(temp_dir.path())
            .with_config_file(Some(temp_dir.path().join("missing.yaml")))
            .with_env_file(Some(temp_dir.path().join("missing.env")))
            .with_env_vars(env)
            .resolve()
            .await
            .unwrap();

        assert_eq!(settings.username, "alice");
        assert_eq!(settings.config_source, ConfigSource::Env);
    }

    #[tokio::test]
    async fn test_missing_config_file_still_requires_fields() {
        let temp_dir = TempDir::new().unwrap();

        let err = isolated(temp_dir.path())
            .with_config_file(Some(temp_dir.path().join("missing.yaml")))
            .resolve()
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { .. }));
    }

    #[tokio::test]
    async fn test_inline_list_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("splunkbase.toml");
        tokio::fs::write(
            &path,
            "[splunkbase]\nusername = \"alice\"\npassword = \"pw\"\n[apps]\noutput = \"out\"\nlist = [\"appA\", \"appB@2.0\"]\n",
        )
        .await
        .unwrap();

        let resolver = isolated(temp_dir.path());
        assert_eq!(resolver.config_path(), Some(path));

        let settings = resolver.resolve().await.unwrap();
        assert_eq!(settings.inline_apps, vec!["appA", "appB@2.0"]);
        assert!(settings.apps_file.is_none());
    }

    #[tokio::test]
    async fn test_unsupported_config_extension_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        tokio::fs::write(&path, r#"{"username": "ignored"}"#).await.unwrap();

        let settings = isolated(temp_dir.path())
            .with_config_file(Some(path))
            .with_cli(cli_layer([
                (Field::Username, Some("alice")),
                (Field::Password, Some("pw")),
                (Field::OutputDir, Some("out")),
            ]))
            .resolve()
            .await
            .unwrap();

        assert_eq!(settings.username, "alice");
        assert_eq!(settings.source_of(Field::Username), Some(ConfigSource::Cli));
    }

    #[tokio::test]
    async fn test_malformed_config_file_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("splunkbase.yaml");
        tokio::fs::write(&path, "splunkbase: [unclosed").await.unwrap();

        let err = isolated(temp_dir.path())
            .with_config_file(Some(path))
            .resolve()
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
