//! Command-line argument parsing for Splunkbase Fetcher
//!
//! Every flag is optional: values not given here come from the config file,
//! the env layer or defaults.

use std::path::PathBuf;

use clap::{Args, Parser};

use crate::config::{cli_layer, ConfigLayer, ConfigResolver, Field};

/// Splunkbase Fetcher - download Splunk apps from Splunkbase
#[derive(Parser, Debug)]
#[command(
    name = "splunkbase_fetcher",
    version,
    about = "Authenticate against Splunkbase and download a list of apps",
    long_about = "Logs in to Splunkbase once, then downloads every app in the configured list
into the output directory. Settings come from flags, a config file (.ini, .conf, .yaml,
.yml or .toml) and SPLUNK_ASD_* environment variables, in that order of precedence."
)]
pub struct Cli {
    /// Logging options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Run options
    #[command(flatten)]
    pub run: RunArgs,
}

/// Output verbosity
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, conflicts_with_all = ["verbose", "very_verbose"])]
    pub quiet: bool,
}

/// Settings overrides and run mode
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Configuration file (.ini, .conf, .yaml, .yml, .toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Splunkbase username
    #[arg(short, long)]
    pub username: Option<String>,

    /// Splunkbase password
    #[arg(short, long)]
    pub password: Option<String>,

    /// File listing the apps to download
    #[arg(
        short = 'a',
        long = "apps_file",
        visible_alias = "apps-file",
        value_name = "FILE"
    )]
    pub apps_file: Option<PathBuf>,

    /// Directory the apps are written to
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Env file with SPLUNK_ASD_* entries (default: ./.env when present)
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    /// HTTP(S) proxy URL
    #[arg(long, value_name = "URL")]
    pub proxy: Option<String>,

    /// Request timeout, e.g. "90s" or "2m"
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<String>,

    /// Load the app list and show what would be downloaded, without network access
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// Treat versions in the JSON apps file as installed releases: skip apps
    /// already at their latest release and record new downloads in the file
    #[arg(long)]
    pub update: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the log level based on verbosity flags
    pub fn log_level(&self) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }
}

impl RunArgs {
    /// The command line as the highest-precedence config layer
    pub fn to_cli_layer(&self) -> ConfigLayer {
        let apps_file = self.apps_file.as_ref().map(|p| p.to_string_lossy());
        let output = self.output.as_ref().map(|p| p.to_string_lossy());

        cli_layer([
            (Field::Username, self.username.as_deref()),
            (Field::Password, self.password.as_deref()),
            (Field::AppsFile, apps_file.as_deref()),
            (Field::OutputDir, output.as_deref()),
            (Field::Proxy, self.proxy.as_deref()),
            (Field::Timeout, self.timeout.as_deref()),
        ])
    }

    /// Resolver for these arguments, reading the real environment
    pub fn resolver(&self) -> ConfigResolver {
        ConfigResolver::new()
            .with_cli(self.to_cli_layer())
            .with_config_file(self.config.clone())
            .with_env_file(self.env_file.clone())
    }
}
