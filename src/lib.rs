pub mod app;

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, warn};

use app::cli::{self, Cli};
use app::config::{config_path, load_config_from_path, AppConfig};
use app::logging::init_logging;

pub fn run() -> ExitCode {
    let args = Cli::parse();
    let config_file = args.config.clone().unwrap_or_else(config_path);
    let (config, load_error) = match load_config_from_path(&config_file) {
        Ok(config) => (config, None),
        Err(err) => (AppConfig::default(), Some(err)),
    };
    init_logging(&config.logging.log_level);
    if let Some(err) = load_error {
        warn!(error = %err, path = %config_file.display(), "config unreadable, using defaults");
    }

    match cli::run(args.command, config, &config_file) {
        Ok(code) => code,
        Err(err) => {
            error!(trace_id = %err.trace_id, code = %err.code, error = %err.error, "command failed");
            eprintln!("error: {}", err.error);
            ExitCode::FAILURE
        }
    }
}
