//! Rendering of plans into manifests and dashboards

pub mod dashboard;
pub mod manifests;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to encode manifest: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to encode dashboard: {0}")]
    Json(#[from] serde_json::Error),
}
