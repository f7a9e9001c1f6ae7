//! Runtime installation with ordered fallback chains
//!
//! Each backend variant maps to one runtime toolchain. Installation is
//! idempotent: a probe runs first and a present runtime short-circuits the
//! chain.

use tracing::info;

use crate::backend::descriptor::BackendVariant;
use crate::errors::InstallError;
use crate::installer::fallback::{probe_command, run_chain, CommandStrategy, InstallStrategy};

/// Ensure the runtime and build toolchain for a backend variant are present.
///
/// Tries the primary distribution channel, then a user-space version manager,
/// then a build-from-source last resort. Returns immediately when the probe
/// already succeeds.
pub async fn ensure_runtime(
    variant: BackendVariant,
    version: Option<&str>,
) -> Result<(), InstallError> {
    let (tool, probe, strategies) = runtime_chain(variant, version);

    if probe_command(&probe).await {
        info!("Runtime {} already present, skipping install", tool);
        return Ok(());
    }

    run_chain(&tool, &strategies).await
}

/// Ensure an auxiliary tool (version-control client, container engine,
/// process manager) is present, using the same fallback-chain combinator.
pub async fn ensure_tool(name: &str) -> Result<(), InstallError> {
    let (probe, strategies) = tool_chain(name);

    if probe_command(&probe).await {
        info!("Tool {} already present, skipping install", name);
        return Ok(());
    }

    run_chain(name, &strategies).await
}

fn runtime_chain(
    variant: BackendVariant,
    version: Option<&str>,
) -> (String, String, Vec<Box<dyn InstallStrategy>>) {
    match variant {
        BackendVariant::Interpreted => {
            let version = version.unwrap_or("22");
            (
                "node".to_string(),
                "node --version".to_string(),
                vec![
                    shell("apt", "apt-get install -y nodejs npm"),
                    shell(
                        "nvm",
                        format!(
                            "curl -fsSL https://raw.githubusercontent.com/nvm-sh/nvm/v0.40.1/install.sh | bash \
                             && . \"$HOME/.nvm/nvm.sh\" && nvm install {}",
                            version
                        ),
                    ),
                    shell(
                        "tarball",
                        format!(
                            "curl -fsSL \"https://nodejs.org/dist/latest-v{}.x/node-v{}*-linux-x64.tar.gz\" \
                             | tar -xz -C /usr/local --strip-components=1",
                            version, version
                        ),
                    ),
                ],
            )
        }

        BackendVariant::CompiledBinary => (
            "cargo".to_string(),
            "cargo --version".to_string(),
            vec![
                shell("apt", "apt-get install -y cargo"),
                shell(
                    "rustup",
                    "curl -fsSL https://sh.rustup.rs | sh -s -- -y --default-toolchain stable",
                ),
            ],
        ),

        BackendVariant::Containerized => (
            "docker".to_string(),
            "docker --version".to_string(),
            vec![
                shell("apt", "apt-get install -y docker.io docker-compose-plugin"),
                shell("convenience-script", "curl -fsSL https://get.docker.com | sh"),
            ],
        ),

        BackendVariant::SupervisorManaged => {
            let version = version.unwrap_or("8.3");
            (
                "php-fpm".to_string(),
                format!("php-fpm{} -v", version),
                vec![
                    shell("apt", format!("apt-get install -y php{}-fpm composer", version)),
                    shell(
                        "ppa",
                        format!(
                            "add-apt-repository -y ppa:ondrej/php && apt-get update \
                             && apt-get install -y php{}-fpm composer",
                            version
                        ),
                    ),
                ],
            )
        }
    }
}

fn tool_chain(name: &str) -> (String, Vec<Box<dyn InstallStrategy>>) {
    match name {
        "git" => (
            "git --version".to_string(),
            vec![
                shell("apt", "apt-get install -y git"),
                shell("dnf", "dnf install -y git"),
            ],
        ),
        "pm2" => (
            "pm2 --version".to_string(),
            vec![shell("npm-global", "npm install -g pm2")],
        ),
        other => (
            format!("{} --version", other),
            vec![shell("apt", format!("apt-get install -y {}", other))],
        ),
    }
}

fn shell(name: &str, script: impl Into<String>) -> Box<dyn InstallStrategy> {
    Box::new(CommandStrategy::new(name, script))
}
