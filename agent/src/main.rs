//! dockhand - Entry Point
//!
//! A single-instance continuous-deployment agent. Listens for push webhooks
//! and drives the fetch-build-restart-verify pipeline for one application.

use std::collections::HashMap;
use std::env;

use dockhand::app::options::AppOptions;
use dockhand::app::run::run;
use dockhand::logs::{init_logging, LogOptions};
use dockhand::setup::setup;
use dockhand::storage::config::DeployConfig;
use dockhand::storage::layout::StorageLayout;
use dockhand::utils::version_info;

use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to serialize version info: {}", e),
        }
        return;
    }

    // Run the setup
    if cli_args.contains_key("setup") {
        return setup(&cli_args).await;
    }

    // Run the agent starting here

    // Retrieve the deploy configuration
    let layout = StorageLayout::default();
    let config_file = layout.config_file();
    let config = match config_file.read_json::<DeployConfig>().await {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to read deploy configuration: {}", e);
            error!("Run: dockhand --setup --name=<app> --workdir=<path> --port=<port> --backend=<variant>");
            return;
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: config.log_level.clone(),
        stdout: true,
        log_dir: Some(layout.logs_dir().path().to_path_buf()),
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    // Run the agent
    let options = AppOptions::from_config(&config, layout);
    info!("Running dockhand for {} with options: {:?}", config.app_name, options);
    let result = run(config, options, await_shutdown_signal()).await;
    if let Err(e) = result {
        error!("Failed to run the agent: {e}");
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                return;
            }
        };
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(signal) => signal,
            Err(e) => {
                error!("Failed to install SIGINT handler: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, shutting down...");
        }
    }
}
