use clap::Parser;
use grocle::app::App;
use grocle::cli::Args;
use grocle::config::Config;
use grocle::logging::setup_logging;
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config and setup logging before App::new() so startup logs are never silently dropped
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    setup_logging(&config, args.tracing);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("GIT_COMMIT_SHORT"),
        environment = if cfg!(debug_assertions) {
            "development"
        } else {
            "production"
        },
        "starting grocle"
    );

    let app = match App::new(config).await {
        Ok(app) => app,
        Err(e) => {
            error!(error = ?e, "Failed to initialize application");
            return ExitCode::FAILURE;
        }
    };

    app.warm_start().await;
    app.run().await
}
