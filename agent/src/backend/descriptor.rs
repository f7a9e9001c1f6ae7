//! Backend descriptor types
//!
//! A descriptor captures everything the pipeline needs to build and restart
//! one backend variant, so per-variant branching happens exactly once (in the
//! registry) instead of at every call site.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DeployError;

/// Closed set of supported backend variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendVariant {
    /// Interpreted entry point kept alive by a long-running process manager
    Interpreted,

    /// Compiled binary managed as a systemd-style unit
    CompiledBinary,

    /// Container-orchestrated compose stack
    Containerized,

    /// FPM-style worker pool behind a reverse proxy
    SupervisorManaged,
}

impl BackendVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendVariant::Interpreted => "interpreted",
            BackendVariant::CompiledBinary => "compiled_binary",
            BackendVariant::Containerized => "containerized",
            BackendVariant::SupervisorManaged => "supervisor_managed",
        }
    }
}

impl FromStr for BackendVariant {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interpreted" => Ok(BackendVariant::Interpreted),
            "compiled_binary" => Ok(BackendVariant::CompiledBinary),
            "containerized" => Ok(BackendVariant::Containerized),
            "supervisor_managed" => Ok(BackendVariant::SupervisorManaged),
            other => Err(DeployError::UnknownBackend(other.to_string())),
        }
    }
}

impl std::fmt::Display for BackendVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Restart capability, dispatched by the supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartPrimitive {
    /// Long-running process manager: restart the named app, start it if
    /// it is not registered yet
    ProcessManager { app_name: String },

    /// systemd unit restart
    Systemd { unit: String },

    /// Compose stack in the project directory
    Compose { project_dir: PathBuf },

    /// FPM pool reload plus reverse-proxy reload
    FpmPool { pool_unit: String, proxy_unit: String },
}

/// Service restart policy for the rendered unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    Always,
    OnFailure,
    No,
}

impl RestartPolicy {
    fn as_str(&self) -> &'static str {
        match self {
            RestartPolicy::Always => "always",
            RestartPolicy::OnFailure => "on-failure",
            RestartPolicy::No => "no",
        }
    }
}

/// Template for the long-running service unit
#[derive(Debug, Clone)]
pub struct ServiceUnit {
    pub name: String,
    pub working_dir: PathBuf,
    pub exec_start: String,
    pub env: Vec<(String, String)>,
    pub restart_policy: RestartPolicy,
    pub memory_limit: Option<String>,
}

impl ServiceUnit {
    /// Render the unit as systemd ini text
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("[Unit]\n");
        out.push_str(&format!("Description={} (managed by dockhand)\n", self.name));
        out.push_str("After=network.target\n\n");

        out.push_str("[Service]\n");
        out.push_str(&format!("WorkingDirectory={}\n", self.working_dir.display()));
        out.push_str(&format!("ExecStart={}\n", self.exec_start));
        for (key, value) in &self.env {
            out.push_str(&format!("Environment={}={}\n", key, value));
        }
        out.push_str(&format!("Restart={}\n", self.restart_policy.as_str()));
        if let Some(limit) = &self.memory_limit {
            out.push_str(&format!("MemoryMax={}\n", limit));
        }
        out.push('\n');

        out.push_str("[Install]\n");
        out.push_str("WantedBy=multi-user.target\n");
        out
    }
}

/// Immutable description of how one backend variant is built and restarted.
///
/// Created once during setup (or at agent start from the persisted config)
/// and read-only for the lifetime of the application instance.
#[derive(Debug, Clone)]
pub struct BackendDescriptor {
    pub variant: BackendVariant,

    /// Dependency-install command, run in the working tree
    pub install_cmd: String,

    /// Build command; None for variants with no build step
    pub build_cmd: Option<String>,

    /// Artifact path or entry point relative to the working tree
    pub artifact: PathBuf,

    /// Restart capability
    pub restart: RestartPrimitive,

    /// Template for the long-running service unit
    pub service_unit: ServiceUnit,
}
