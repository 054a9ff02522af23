//! Inbound HTTP server: authenticated operator commands plus health and status.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;
use swarm_proto::{CommandRequest, CommandResponse};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::SwarmNode;
use crate::commands::{COMMANDS, CommandError, handle_command};
use crate::error::NodeResult;

pub const COMMAND_PATH: &str = "/webhook/command";
pub const HEALTH_PATH: &str = "/health";
pub const STATUS_PATH: &str = "/status";

pub fn make_router(node: Arc<SwarmNode>) -> Router {
    Router::new()
        .route(COMMAND_PATH, post(webhook_command))
        .route(HEALTH_PATH, get(health))
        .route(STATUS_PATH, get(status))
        .with_state(node)
}

/// Serve on `listener` until `cancel` fires.
pub async fn run_server(
    listener: TcpListener,
    node: Arc<SwarmNode>,
    cancel: CancellationToken,
) -> NodeResult<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "command server listening");
    axum::serve(listener, make_router(node))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    info!("command server stopped");
    Ok(())
}

fn now_z() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn authorized(node: &SwarmNode, token: Option<&str>) -> bool {
    let expected = node.config.auth_token.as_str();
    !expected.is_empty() && token == Some(expected)
}

async fn webhook_command(
    State(node): State<Arc<SwarmNode>>,
    Json(request): Json<CommandRequest>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&node, request.auth_token.as_deref()) {
        warn!(command = %request.command, "rejected command with bad auth token");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Unauthorized"})),
        );
    }

    info!(command = %request.command, request_id = ?request.request_id, "command received");
    let started = Instant::now();
    let outcome = handle_command(&node, &request.command, &request.parameters).await;

    let (status, success, result) = match outcome {
        Ok(result) => (StatusCode::OK, true, result),
        Err(CommandError::Unknown(name)) => (
            StatusCode::BAD_REQUEST,
            false,
            format!("Unknown command: {name}"),
        ),
        Err(e) => {
            warn!(command = %request.command, error = %e, "command failed");
            node.alert_error(
                "command_failed",
                &e.to_string(),
                json!({"command": request.command, "request_id": request.request_id}),
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                false,
                format!("Command failed: {e}"),
            )
        }
    };

    let response = CommandResponse {
        success,
        result,
        execution_time: started.elapsed().as_secs_f64(),
        timestamp: Utc::now(),
        vps_id: node.config.vps_id.clone(),
        request_id: request.request_id,
    };
    let body = serde_json::to_value(&response).unwrap_or_else(|e| json!({"error": e.to_string()}));
    (status, Json(body))
}

async fn health(State(node): State<Arc<SwarmNode>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "vps_id": node.config.vps_id,
        "vps_name": node.config.vps_name,
        "timestamp": now_z(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn status(State(node): State<Arc<SwarmNode>>) -> Json<Value> {
    Json(json!({
        "vps_id": node.config.vps_id,
        "vps_name": node.config.vps_name,
        "timestamp": now_z(),
        "status": "online",
        "reward_monitor": node.reward_monitor_running(),
        "service_watch": node.service_watch_running(),
        "commands": COMMANDS,
    }))
}
