//! One-time instance setup
//!
//! Provisions the runtime for the chosen backend, renders the service unit,
//! generates the webhook secret, and persists the deploy configuration.
//! Non-interactive: everything comes from flags so provisioning scripts can
//! drive it.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{error, info};

use crate::backend::descriptor::BackendVariant;
use crate::backend::registry::descriptor_for;
use crate::installer::runtime::{ensure_runtime, ensure_tool};
use crate::logs::{init_logging, LogOptions};
use crate::storage::config::DeployConfig;
use crate::storage::layout::StorageLayout;
use crate::utils::{generate_secret, version_info};

/// Run the setup process
pub async fn setup(cli_args: &HashMap<String, String>) {
    match setup_impl(cli_args).await {
        Ok(config) => {
            info!("Setup successful");
            println!();
            println!("[SUCCESS] dockhand configured for {}", config.app_name);
            println!(
                "Webhook endpoint: http://<host>:{}/hooks/push",
                config.listener.port
            );
            println!("Webhook secret:   {}", config.webhook_secret);
            println!();
            println!("Point your repository's push webhook at the endpoint above,");
            println!("signing deliveries with the secret (X-Hub-Signature-256).");
            println!("Start the agent with: systemctl start dockhand");
        }
        Err(e) => {
            error!("Setup failed: {:?}", e);
            eprintln!("\n[ERROR] Setup failed: {}", e);
            std::process::exit(1);
        }
    }
}

async fn setup_impl(
    cli_args: &HashMap<String, String>,
) -> Result<DeployConfig, Box<dyn std::error::Error>> {
    // Temporary logging until the config file exists
    let log_options = LogOptions {
        stdout: true,
        ..Default::default()
    };
    let _ = init_logging(log_options);

    println!("dockhand Setup");
    println!("==============");
    println!();

    let app_name = cli_args
        .get("name")
        .cloned()
        .ok_or("Missing application name. Provide via --name=<name>")?;

    let workdir = cli_args
        .get("workdir")
        .map(PathBuf::from)
        .ok_or("Missing working tree path. Provide via --workdir=<path>")?;

    let port: u16 = cli_args
        .get("port")
        .ok_or("Missing application port. Provide via --port=<port>")?
        .parse()?;

    let variant: BackendVariant = cli_args
        .get("backend")
        .ok_or("Missing backend. Provide via --backend=<interpreted|compiled_binary|containerized|supervisor_managed>")?
        .parse()?;

    let branch = cli_args
        .get("branch")
        .cloned()
        .unwrap_or_else(|| "main".to_string());

    let runtime_version = cli_args.get("runtime-version").cloned();

    println!("Application:  {}", app_name);
    println!("Working tree: {}", workdir.display());
    println!("Backend:      {}", variant);
    println!("Branch:       {}", branch);
    println!();

    // Setup storage layout
    let layout = StorageLayout::default();
    println!("Setting up storage at: {:?}", layout.base_dir);
    layout.setup().await?;

    // Provision the runtime and auxiliary tooling
    println!("Provisioning runtime for {} backend...", variant);
    ensure_tool("git").await?;
    ensure_runtime(variant, runtime_version.as_deref()).await?;
    if variant == BackendVariant::Interpreted {
        ensure_tool("pm2").await?;
    }

    // Build the configuration record
    let config = DeployConfig {
        app_name: app_name.clone(),
        workdir,
        port,
        backend: variant.as_str().to_string(),
        branch,
        webhook_secret: cli_args.get("secret").cloned().unwrap_or_else(generate_secret),
        runtime_version,
        log_level: Default::default(),
        listener: Default::default(),
        pipeline: Default::default(),
    };

    // Render the service unit for backends managed through systemd
    let descriptor = descriptor_for(variant, &config);
    let unit_file = layout.units_dir().file(&format!("{}.service", app_name));
    unit_file.write_string(&descriptor.service_unit.render()).await?;
    println!("Service unit rendered to: {:?}", unit_file.path());

    // Persist the configuration, secret included, owner-readable only
    let config_file = layout.config_file();
    config_file.write_json(&config).await?;
    config_file.set_permissions_600().await?;
    println!("Configuration saved to: {:?}", config_file.path());

    let version = version_info();
    println!();
    println!("Agent version: {}", version.version);
    println!("Git hash: {}", version.git_hash);
    println!("Build time: {}", version.build_time);

    Ok(config)
}
