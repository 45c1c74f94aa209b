pub mod engine;
pub mod facts;

pub use engine::{BollardEngine, DockerEngine, EngineError, RawHistoryItem, RawImageInspect};
pub use facts::{base_image_hint, clean_created_by, HistoryEntry, ImageConfigFacts, ImageFacts};

use crate::error::MatchError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Facade over a Docker engine producing cached `ImageFacts` projections.
///
/// The cache is keyed by the caller-supplied reference string and is the
/// only shared mutable state in the engine; equivalent inspections are
/// idempotent, so last-writer-wins is fine.
pub struct ImageInspector {
    engine: Arc<dyn DockerEngine>,
    cache: RwLock<HashMap<String, Arc<ImageFacts>>>,
    timeout: Duration,
}

impl ImageInspector {
    pub fn new(engine: Arc<dyn DockerEngine>, timeout: Duration) -> Self {
        Self {
            engine,
            cache: RwLock::new(HashMap::new()),
            timeout,
        }
    }

    /// Inspect an image, pulling it on a local miss. Honors the deadline
    /// and the caller's cancellation signal.
    pub async fn inspect(
        &self,
        reference: &str,
        cancel: &CancellationToken,
    ) -> Result<Arc<ImageFacts>, MatchError> {
        if cancel.is_cancelled() {
            return Err(MatchError::Cancelled);
        }

        if let Some(facts) = self.cache.read().expect("cache lock poisoned").get(reference) {
            debug!(image = reference, "image facts cache hit");
            return Ok(Arc::clone(facts));
        }

        let work = self.fetch(reference);
        let facts = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(MatchError::Cancelled),
            result = tokio::time::timeout(self.timeout, work) => match result {
                Ok(facts) => facts?,
                Err(_) => return Err(MatchError::InspectionTimeout(reference.to_string())),
            },
        };

        let facts = Arc::new(facts);
        self.cache
            .write()
            .expect("cache lock poisoned")
            .insert(reference.to_string(), Arc::clone(&facts));
        Ok(facts)
    }

    async fn fetch(&self, reference: &str) -> Result<ImageFacts, MatchError> {
        let raw = match self.engine.inspect_image(reference).await {
            Ok(raw) => raw,
            Err(EngineError::NotFound) => {
                info!(image = reference, "image not present locally, pulling");
                self.engine
                    .pull_image(reference)
                    .await
                    .map_err(|e| engine_error(reference, e))?;
                self.engine
                    .inspect_image(reference)
                    .await
                    .map_err(|e| engine_error(reference, e))?
            }
            Err(e) => return Err(engine_error(reference, e)),
        };

        let history = self
            .engine
            .image_history(reference)
            .await
            .map_err(|e| engine_error(reference, e))?;

        Ok(project(raw, history))
    }
}

fn engine_error(reference: &str, error: EngineError) -> MatchError {
    match error {
        EngineError::NotFound => MatchError::ImageNotFound(reference.to_string()),
        EngineError::Failed(reason) => MatchError::InspectionFailed {
            image: reference.to_string(),
            reason,
        },
    }
}

/// Shape the raw engine payloads into `ImageFacts`.
pub fn project(raw: RawImageInspect, history: Vec<RawHistoryItem>) -> ImageFacts {
    let config = &raw.config;

    let mut env = std::collections::BTreeMap::new();
    for entry in config.env.iter().flatten() {
        if let Some((key, value)) = entry.split_once('=') {
            env.insert(key.to_string(), value.to_string());
        }
    }

    let config_facts = ImageConfigFacts {
        env,
        cmd: config.cmd.clone(),
        entrypoint: config.entrypoint.clone(),
        workdir: config.working_dir.clone().unwrap_or_default(),
        exposed_ports: config
            .exposed_ports
            .iter()
            .flat_map(|ports| ports.keys().cloned())
            .collect(),
        volumes: config
            .volumes
            .iter()
            .flat_map(|vols| vols.keys().cloned())
            .collect(),
        labels: config
            .labels
            .iter()
            .flat_map(|labels| labels.iter().map(|(k, v)| (k.clone(), v.clone())))
            .collect(),
        user: config.user.clone().unwrap_or_default(),
    };

    // The engine reports newest layer first; flip into build order.
    let entries: Vec<HistoryEntry> = history
        .into_iter()
        .rev()
        .map(|item| {
            let cleaned = facts::clean_created_by(&item.created_by);
            let kind = facts::history_kind(&item.created_by, &cleaned);
            HistoryEntry {
                cleaned,
                kind,
                created_at: parse_timestamp(item.created.as_ref()),
                size_bytes: item.size,
                empty_layer: item.size == 0,
                created_by: item.created_by,
            }
        })
        .collect();

    ImageFacts {
        id: raw.id,
        tags: raw.repo_tags,
        created_at: raw
            .created
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        size_bytes: raw.size,
        architecture: raw.architecture,
        os: raw.os,
        config: config_facts,
        history: entries,
        rootfs_layers: raw.root_fs.layers,
    }
}

/// Parse an engine timestamp: RFC3339 text or Unix seconds.
fn parse_timestamp(value: Option<&serde_json::Value>) -> Option<DateTime<Utc>> {
    match value? {
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        serde_json::Value::Number(n) => DateTime::from_timestamp(n.as_i64()?, 0),
        _ => None,
    }
}
