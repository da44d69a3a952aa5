use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use magvox_config::{CliArgs, Config};
use magvox_edit::Workspace;
use magvox_server::{AppState, MagvoxServer};
use magvox_store::ProjectCatalog;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    // Resolve config directory
    let Some(config_dir) = args.config.clone().or_else(Config::default_dir) else {
        eprintln!("No config directory available; pass --config");
        return ExitCode::FAILURE;
    };

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);
    if let Err(e) = config.validate() {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let log_dir = config_dir.join("logs");
    magvox_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    let Some(projects_dir) = config.projects_dir() else {
        tracing::error!("no projects directory available; pass --projects-dir");
        return ExitCode::FAILURE;
    };
    let catalog = match ProjectCatalog::open_or_create(&projects_dir) {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("serving projects from {}", projects_dir.display());

    let workspace = Workspace::new(
        catalog,
        config.history.max_depth,
        config.partition.edge_length,
    );
    let state = Arc::new(AppState::new(workspace, config.server.cors_origin.clone()));

    let server = match MagvoxServer::start(&config.server.bind_address, config.server.port, state) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    match server.join() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
