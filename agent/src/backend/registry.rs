//! Backend descriptor registry
//!
//! Closed registry: every supported variant maps to exactly one descriptor,
//! derived from the deploy configuration. No side effects.

use std::path::PathBuf;

use crate::backend::descriptor::{
    BackendDescriptor, BackendVariant, RestartPolicy, RestartPrimitive, ServiceUnit,
};
use crate::storage::config::DeployConfig;

/// Build the descriptor for the selected backend variant.
///
/// Selecting an unrecognized variant fails earlier, at `BackendVariant`
/// parse time, with `DeployError::UnknownBackend`.
pub fn descriptor_for(variant: BackendVariant, config: &DeployConfig) -> BackendDescriptor {
    let env = vec![("PORT".to_string(), config.port.to_string())];

    match variant {
        BackendVariant::Interpreted => BackendDescriptor {
            variant,
            install_cmd: "npm ci --omit=dev".to_string(),
            build_cmd: None,
            artifact: PathBuf::from("server.js"),
            restart: RestartPrimitive::ProcessManager {
                app_name: config.app_name.clone(),
            },
            service_unit: ServiceUnit {
                name: config.app_name.clone(),
                working_dir: config.workdir.clone(),
                exec_start: format!("/usr/bin/env node {}/server.js", config.workdir.display()),
                env: {
                    let mut env = env.clone();
                    env.push(("NODE_ENV".to_string(), "production".to_string()));
                    env
                },
                restart_policy: RestartPolicy::Always,
                memory_limit: Some("512M".to_string()),
            },
        },

        BackendVariant::CompiledBinary => BackendDescriptor {
            variant,
            install_cmd: "cargo fetch".to_string(),
            build_cmd: Some("cargo build --release".to_string()),
            artifact: PathBuf::from("target/release").join(&config.app_name),
            restart: RestartPrimitive::Systemd {
                unit: format!("{}.service", config.app_name),
            },
            service_unit: ServiceUnit {
                name: config.app_name.clone(),
                working_dir: config.workdir.clone(),
                exec_start: config
                    .workdir
                    .join("target/release")
                    .join(&config.app_name)
                    .display()
                    .to_string(),
                env,
                restart_policy: RestartPolicy::OnFailure,
                memory_limit: Some("1G".to_string()),
            },
        },

        BackendVariant::Containerized => BackendDescriptor {
            variant,
            // Image assembly happens inside compose; no separate steps
            install_cmd: String::new(),
            build_cmd: None,
            artifact: PathBuf::from("docker-compose.yml"),
            restart: RestartPrimitive::Compose {
                project_dir: config.workdir.clone(),
            },
            service_unit: ServiceUnit {
                name: config.app_name.clone(),
                working_dir: config.workdir.clone(),
                exec_start: "docker compose up".to_string(),
                env,
                restart_policy: RestartPolicy::Always,
                memory_limit: None,
            },
        },

        BackendVariant::SupervisorManaged => BackendDescriptor {
            variant,
            install_cmd: "composer install --no-dev --no-interaction".to_string(),
            build_cmd: None,
            artifact: PathBuf::from("public/index.php"),
            restart: RestartPrimitive::FpmPool {
                pool_unit: "php8.3-fpm.service".to_string(),
                proxy_unit: "nginx.service".to_string(),
            },
            service_unit: ServiceUnit {
                name: config.app_name.clone(),
                working_dir: config.workdir.clone(),
                exec_start: "/usr/sbin/php-fpm8.3 --nodaemonize".to_string(),
                env,
                restart_policy: RestartPolicy::Always,
                memory_limit: Some("256M".to_string()),
            },
        },
    }
}
