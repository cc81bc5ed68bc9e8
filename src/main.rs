use std::process::ExitCode;

use tracing::{error, info};

use lineupbot::Config;

#[tokio::main]
async fn main() -> ExitCode {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    // Load configuration
    let config = match Config::load_with_env(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {path}: {e}");
            eprintln!("Using default configuration.");
            Config::default()
        }
    };
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    // Initialize logging
    if let Err(e) = lineupbot::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        lineupbot::logging::init_console_only(&config.logging.level);
    }

    info!("lineupbot v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Connecting to {}:{} as {}",
        config.server.host, config.server.port, config.identity.nickname
    );

    match lineupbot::bot::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
