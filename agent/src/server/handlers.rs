//! HTTP request handlers

use std::sync::Arc;

use axum::{body::Bytes, extract::State, response::IntoResponse, Json};
use http::{HeaderMap, StatusCode};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{info, warn};

use crate::deploy::pipeline::DeploymentAttempt;
use crate::errors::DeployError;
use crate::server::state::ServerState;
use crate::utils::version_info;

const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "dockhand".to_string(),
        version: version.version,
    })
}

/// Version response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Deploy status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub app: String,
    pub last_attempt: Option<DeploymentAttempt>,
}

/// Deploy status handler
pub async fn status_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let last_attempt = state.pipeline.last_attempt().await;
    Json(StatusResponse {
        app: state.app_name.clone(),
        last_attempt,
    })
}

/// Push webhook payload, GitHub-flavored. All fields optional: the
/// signature check is the authentication, the payload only filters.
#[derive(Debug, Default, Deserialize)]
pub struct PushPayload {
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    pub after: Option<String>,
}

/// Push webhook response
#[derive(Debug, Serialize)]
pub struct PushResponse {
    pub triggered: bool,
    pub message: String,
}

/// Push webhook handler
///
/// Verifies the HMAC signature over the raw body before anything else, then
/// filters by branch and triggers the pipeline. Always answers immediately;
/// deploy outcome goes to the deploy log.
pub async fn push_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    if !verify_signature(&state.webhook_secret, signature, &body) {
        warn!("Rejected webhook delivery: missing or invalid signature");
        return (
            StatusCode::UNAUTHORIZED,
            Json(PushResponse {
                triggered: false,
                message: "invalid signature".to_string(),
            }),
        );
    }

    // Only a push to the deploy branch triggers. Deliveries without a ref
    // (ping events, malformed bodies) are acknowledged and dropped.
    let payload: PushPayload = serde_json::from_slice(&body).unwrap_or_default();
    let deploy_ref = format!("refs/heads/{}", state.branch);
    match payload.git_ref.as_deref() {
        Some(git_ref) if git_ref == deploy_ref => {}
        Some(git_ref) => {
            info!("Ignoring push to {} (deploying {})", git_ref, deploy_ref);
            return (
                StatusCode::ACCEPTED,
                Json(PushResponse {
                    triggered: false,
                    message: format!("push to {} ignored", git_ref),
                }),
            );
        }
        None => {
            info!("Ignoring delivery without a push ref (deploying {})", deploy_ref);
            return (
                StatusCode::ACCEPTED,
                Json(PushResponse {
                    triggered: false,
                    message: "delivery without a push ref ignored".to_string(),
                }),
            );
        }
    }

    info!(
        "Push accepted for {} ({})",
        state.app_name,
        payload.after.as_deref().unwrap_or("unknown revision")
    );

    match state.pipeline.trigger().await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(PushResponse {
                triggered: true,
                message: "deploy triggered".to_string(),
            }),
        ),
        Err(DeployError::LockContention { owner_pid }) => (
            StatusCode::CONFLICT,
            Json(PushResponse {
                triggered: false,
                message: format!("deploy already in progress (pid {})", owner_pid),
            }),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(PushResponse {
                triggered: false,
                message: e.to_string(),
            }),
        ),
    }
}

/// Check an `sha256=<hex>` signature against the raw request body
fn verify_signature(secret: &SecretString, header: Option<&str>, body: &[u8]) -> bool {
    let Some(value) = header else {
        return false;
    };
    let Some(hex_digest) = value.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };

    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}
