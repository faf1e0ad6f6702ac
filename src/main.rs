//! Splunkbase Fetcher CLI application
//!
//! Logs in to Splunkbase once and downloads a configured list of apps into a
//! local directory, one at a time.

use std::process;

use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use splunkbase_fetcher::cli::{exit_code, handle_run, Cli};
use splunkbase_fetcher::errors::Result;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let result = run().await;

    if let Err(e) = &result {
        error!("Run aborted ({} error)", e.category());
        eprintln!("Error: {}", e);
    }

    let code = exit_code(&result);
    if code != 0 {
        process::exit(code);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(&cli);

    info!("Splunkbase Fetcher v{} starting", env!("CARGO_PKG_VERSION"));

    handle_run(&cli.run, cli.global.quiet).await
}

/// Initialize logging based on CLI verbosity settings
fn init_logging(cli: &Cli) {
    let log_level = cli.log_level();

    let mut filter = EnvFilter::from_default_env();
    match format!("splunkbase_fetcher={}", log_level).parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Ignoring invalid log directive: {}", e),
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose) // Show levels only in very verbose mode
        .with_writer(std::io::stderr)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
