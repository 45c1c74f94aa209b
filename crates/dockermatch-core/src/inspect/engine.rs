use async_trait::async_trait;
use bollard::image::CreateImageOptions;
use bollard::Docker;
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Errors from the engine boundary, before they gain image context.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("image not found")]
    NotFound,
    #[error("{0}")]
    Failed(String),
}

/// Image inspection payload as returned by the Docker Engine API.
///
/// Field names follow the wire format so fixture JSON deserializes
/// directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RawImageInspect {
    pub id: String,
    pub repo_tags: Vec<String>,
    pub created: Option<String>,
    pub size: i64,
    pub architecture: String,
    pub os: String,
    pub config: RawImageConfig,
    #[serde(rename = "RootFS")]
    pub root_fs: RawRootFs,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RawImageConfig {
    pub env: Option<Vec<String>>,
    pub cmd: Option<Vec<String>>,
    pub entrypoint: Option<Vec<String>>,
    pub working_dir: Option<String>,
    pub user: Option<String>,
    pub exposed_ports: Option<HashMap<String, serde_json::Value>>,
    pub volumes: Option<HashMap<String, serde_json::Value>>,
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RawRootFs {
    #[serde(rename = "Type")]
    pub fs_type: String,
    pub layers: Vec<String>,
}

/// One `/history` item. `Created` is either RFC3339 text or Unix seconds
/// depending on the endpoint and engine version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RawHistoryItem {
    pub id: String,
    pub created: Option<serde_json::Value>,
    pub created_by: String,
    pub size: i64,
    pub comment: String,
}

/// Minimal Docker Engine surface the inspector needs. Implementations
/// return history in API order (newest layer first).
#[async_trait]
pub trait DockerEngine: Send + Sync {
    async fn inspect_image(&self, reference: &str) -> Result<RawImageInspect, EngineError>;
    async fn pull_image(&self, reference: &str) -> Result<(), EngineError>;
    async fn image_history(&self, reference: &str) -> Result<Vec<RawHistoryItem>, EngineError>;
}

/// Engine implementation backed by bollard over the local Docker socket.
pub struct BollardEngine {
    docker: Docker,
}

impl BollardEngine {
    pub fn connect() -> Result<Self, EngineError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| EngineError::Failed(format!("failed to connect to Docker engine: {}", e)))?;
        Ok(Self { docker })
    }
}

fn classify(error: bollard::errors::Error) -> EngineError {
    match error {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => EngineError::NotFound,
        other => EngineError::Failed(other.to_string()),
    }
}

#[async_trait]
impl DockerEngine for BollardEngine {
    async fn inspect_image(&self, reference: &str) -> Result<RawImageInspect, EngineError> {
        let inspect = self
            .docker
            .inspect_image(reference)
            .await
            .map_err(classify)?;

        let config = inspect.config.unwrap_or_default();
        let root_fs = inspect.root_fs.unwrap_or_default();

        Ok(RawImageInspect {
            id: inspect.id.unwrap_or_default(),
            repo_tags: inspect.repo_tags.unwrap_or_default(),
            created: inspect.created,
            size: inspect.size.unwrap_or_default(),
            architecture: inspect.architecture.unwrap_or_default(),
            os: inspect.os.unwrap_or_default(),
            config: RawImageConfig {
                env: config.env,
                cmd: config.cmd,
                entrypoint: config.entrypoint,
                working_dir: config.working_dir,
                user: config.user,
                exposed_ports: config
                    .exposed_ports
                    .map(|ports| ports.into_keys().map(|k| (k, serde_json::json!({}))).collect()),
                volumes: config
                    .volumes
                    .map(|vols| vols.into_keys().map(|k| (k, serde_json::json!({}))).collect()),
                labels: config.labels,
            },
            root_fs: RawRootFs {
                fs_type: root_fs.typ,
                layers: root_fs.layers.unwrap_or_default(),
            },
        })
    }

    async fn pull_image(&self, reference: &str) -> Result<(), EngineError> {
        debug!(image = reference, "pulling image");
        let options = CreateImageOptions {
            from_image: reference.to_string(),
            ..Default::default()
        };
        self.docker
            .create_image(Some(options), None, None)
            .try_collect::<Vec<_>>()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn image_history(&self, reference: &str) -> Result<Vec<RawHistoryItem>, EngineError> {
        let history = self
            .docker
            .image_history(reference)
            .await
            .map_err(classify)?;

        Ok(history
            .into_iter()
            .map(|item| RawHistoryItem {
                id: item.id,
                created: Some(serde_json::json!(item.created)),
                created_by: item.created_by,
                size: item.size,
                comment: item.comment,
            })
            .collect())
    }
}
