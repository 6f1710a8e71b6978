use clap::Parser;
use std::process::ExitCode;

use drive_organizer::cancel::{spawn_signal_watcher, CancelFlag};
use drive_organizer::commands::{self, Cli, Commands};
use drive_organizer::config::AppConfig;
use drive_organizer::logging;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match AppConfig::load(cli.config.as_deref(), &cli.overrides()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("❌ Configuration error: {}", err);
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config.log_level);

    let cancel = CancelFlag::new();
    spawn_signal_watcher(cancel.clone());

    let result = match &cli.command {
        Commands::Organize(args) => commands::organize::run(&config, args, cancel).await,
        Commands::Auth => commands::auth::run(&config, cancel).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Command failed");
            eprintln!("❌ {}", err);
            ExitCode::FAILURE
        }
    }
}
