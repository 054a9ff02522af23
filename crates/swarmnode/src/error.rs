//! Node error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("config error: {0}")]
    Config(String),

    #[error("dashboard error: {0}")]
    Dashboard(#[from] swarm_dashboard::DashboardError),

    #[error("notifier error: {0}")]
    Notify(#[from] swarm_notify::NotifyError),

    #[error("eoa lookup error: {0}")]
    Eoa(#[from] swarm_eoa::EoaError),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type NodeResult<T> = Result<T, NodeError>;
