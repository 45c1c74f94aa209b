use crate::config::MatchConfig;
use crate::error::MatchError;
use crate::facets;
use crate::inspect::{base_image_hint, DockerEngine, ImageFacts, ImageInspector};
use crate::layers;
use crate::parser::{self, DockerfileAnalysis};
use crate::report::{FacetName, FacetScore, MatchQuality, MatchReport, MatchType};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Facets other than base image warn below this score.
const FACET_WARN_THRESHOLD: f64 = 0.7;

/// The match engine: parses a Dockerfile, inspects the image, and scores
/// the pair into a `MatchReport`.
pub struct Matcher {
    config: MatchConfig,
    inspector: ImageInspector,
}

impl Matcher {
    pub fn new(engine: Arc<dyn DockerEngine>, config: MatchConfig) -> Self {
        let timeout = Duration::from_secs(config.inspection.timeout_secs);
        Self {
            config,
            inspector: ImageInspector::new(engine, timeout),
        }
    }

    /// Connect to the local Docker engine with the given configuration.
    pub fn connect(config: MatchConfig) -> Result<Self, MatchError> {
        let engine = crate::inspect::BollardEngine::connect()
            .map_err(|e| MatchError::Configuration(e.to_string()))?;
        Ok(Self::new(Arc::new(engine), config))
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Match a Dockerfile against an image reference.
    pub async fn match_image(
        &self,
        dockerfile: &str,
        image_ref: &str,
    ) -> Result<MatchReport, MatchError> {
        self.match_image_with(dockerfile, image_ref, None, CancellationToken::new())
            .await
    }

    /// Full-control variant: per-call configuration overrides and a
    /// cancellation signal. No partial report is ever produced.
    pub async fn match_image_with(
        &self,
        dockerfile: &str,
        image_ref: &str,
        overrides: Option<&MatchConfig>,
        cancel: CancellationToken,
    ) -> Result<MatchReport, MatchError> {
        if let Some(overrides) = overrides {
            overrides.validate()?;
        }
        let config = overrides.unwrap_or(&self.config);

        let analysis = parser::parse(dockerfile)?;
        let facts = self.inspector.inspect(image_ref, &cancel).await?;
        if cancel.is_cancelled() {
            return Err(MatchError::Cancelled);
        }

        debug!(
            image = image_ref,
            instructions = analysis.instructions.len(),
            history = facts.history.len(),
            "scoring match"
        );
        Ok(analyze(&analysis, &facts, config))
    }

    /// Pure scoring path, usable when the image facts are already at hand.
    pub fn analyze(&self, analysis: &DockerfileAnalysis, facts: &ImageFacts) -> MatchReport {
        analyze(analysis, facts, &self.config)
    }
}

/// Score a parsed Dockerfile against image facts. Pure and total.
pub fn analyze(
    analysis: &DockerfileAnalysis,
    facts: &ImageFacts,
    config: &MatchConfig,
) -> MatchReport {
    let layer_matches = layers::align(analysis, &facts.history, config);
    let layer_score = layers::facet_score(&layer_matches, analysis, config);
    let matched = layer_matches
        .iter()
        .filter(|m| m.match_type != MatchType::None)
        .count();
    let layers_facet = FacetScore::new(
        layer_score,
        format!(
            "aligned {} of {} layer-creating instructions",
            matched,
            layer_matches.len()
        ),
    );

    let hint = base_image_hint(&facts.history);
    let base_facet = facets::base_image::score(&analysis.base_image, hint.as_deref(), config);

    let environment = facets::metadata::environment(analysis, facts);
    let ports = facets::metadata::ports(analysis, facts);
    let volumes = facets::metadata::volumes(analysis, facts);
    let labels = facets::metadata::labels(analysis, facts, config);
    let commands = facets::commands::score(analysis, facts);
    let workdir = facets::workdir::score(analysis, facts);
    let platform = facets::platform::score(analysis, facts);
    let context = facets::context::score(analysis, &layer_matches, &facts.history, config);

    let metadata_parts = [
        &environment,
        &ports,
        &volumes,
        &labels,
        &commands,
        &workdir,
        &platform,
    ];
    let metadata_score = (metadata_parts.iter().map(|f| f.score).sum::<f64>()
        / metadata_parts.len() as f64)
        .clamp(0.0, 1.0);
    let metadata = FacetScore::new(
        metadata_score,
        "mean of environment, ports, volumes, labels, commands, workdir, and platform",
    );

    let overall = (base_facet.score * config.score_weights.base_image
        + layers_facet.score * config.score_weights.layer_match
        + metadata.score * config.score_weights.metadata
        + context.score * config.score_weights.context)
        .clamp(0.0, 1.0);

    let mut mismatch_reasons = Vec::new();
    if base_facet.score < config.thresholds.likely_match {
        mismatch_reasons.push(format!("base image: {}", base_facet.rationale));
    }
    if layers_facet.score < FACET_WARN_THRESHOLD {
        mismatch_reasons.push(format!("layers: {}", layers_facet.rationale));
    }
    if metadata.score < FACET_WARN_THRESHOLD {
        for facet in metadata_parts.iter().filter(|f| f.score < FACET_WARN_THRESHOLD) {
            mismatch_reasons.push(format!("metadata: {}", facet.rationale));
        }
    }
    if context.score < FACET_WARN_THRESHOLD {
        mismatch_reasons.push(format!("build context: {}", context.rationale));
    }

    let mut facet_map = BTreeMap::new();
    facet_map.insert(FacetName::BaseImage, base_facet);
    facet_map.insert(FacetName::Layers, layers_facet);
    facet_map.insert(FacetName::Environment, environment);
    facet_map.insert(FacetName::Ports, ports);
    facet_map.insert(FacetName::Volumes, volumes);
    facet_map.insert(FacetName::Labels, labels);
    facet_map.insert(FacetName::Commands, commands);
    facet_map.insert(FacetName::Workdir, workdir);
    facet_map.insert(FacetName::Platform, platform);
    facet_map.insert(FacetName::Context, context);
    facet_map.insert(FacetName::Metadata, metadata);

    MatchReport {
        overall,
        quality: MatchQuality::from_score(overall, &config.thresholds),
        facets: facet_map,
        layer_matches,
        mismatch_reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::facts::{clean_created_by, history_kind};
    use crate::inspect::{HistoryEntry, ImageConfigFacts};

    fn entry(created_by: &str, size: i64) -> HistoryEntry {
        let cleaned = clean_created_by(created_by);
        let kind = history_kind(created_by, &cleaned);
        HistoryEntry {
            created_by: created_by.to_string(),
            cleaned,
            kind,
            created_at: None,
            size_bytes: size,
            empty_layer: size == 0,
        }
    }

    fn facts(history: Vec<HistoryEntry>, config: ImageConfigFacts, arch: &str) -> ImageFacts {
        ImageFacts {
            id: "sha256:test".into(),
            tags: vec![],
            created_at: None,
            size_bytes: 0,
            architecture: arch.into(),
            os: "linux".into(),
            config,
            history,
            rootfs_layers: vec![],
        }
    }

    #[test]
    fn test_identical_pair_scores_excellent() {
        let analysis =
            parser::parse("FROM python:3.9-slim\nCMD [\"python\"]\n").unwrap();
        let image = facts(
            vec![entry("FROM python:3.9-slim", 0)],
            ImageConfigFacts {
                cmd: Some(vec!["python".into()]),
                ..Default::default()
            },
            "amd64",
        );
        let config = MatchConfig::default();

        let report = analyze(&analysis, &image, &config);
        assert!(report.overall >= 0.9, "overall was {}", report.overall);
        assert_eq!(report.quality, MatchQuality::Excellent);
        assert!(report.mismatch_reasons.is_empty());
    }

    #[test]
    fn test_unrelated_pair_scores_low_with_reasons() {
        let analysis = parser::parse(
            "FROM node:20\nRUN npm install\nEXPOSE 3000\nCMD [\"node\", \"index.js\"]\n",
        )
        .unwrap();
        let image = facts(
            vec![
                entry("FROM python:3.9-slim", 0),
                entry("/bin/sh -c pip install flask", 1024),
            ],
            ImageConfigFacts {
                cmd: Some(vec!["python".into()]),
                ..Default::default()
            },
            "amd64",
        );
        let config = MatchConfig::default();

        let report = analyze(&analysis, &image, &config);
        assert!(report.overall < 0.5);
        assert!(!report.mismatch_reasons.is_empty());
    }

    #[test]
    fn test_all_scores_in_unit_interval() {
        let analysis = parser::parse(
            "FROM debian\nRUN apt-get install -y curl\nCOPY . /app\nENV A=1\nEXPOSE 80\nVOLUME /data\nWORKDIR /app\nLABEL version=1\nCMD [\"sh\"]\n",
        )
        .unwrap();
        let image = facts(
            vec![entry("/bin/sh -c apt-get install -y curl", 1024)],
            ImageConfigFacts::default(),
            "amd64",
        );
        let config = MatchConfig::default();

        let report = analyze(&analysis, &image, &config);
        assert!((0.0..=1.0).contains(&report.overall));
        for (name, facet) in &report.facets {
            assert!(
                (0.0..=1.0).contains(&facet.score),
                "facet {} out of range: {}",
                name,
                facet.score
            );
        }
        for layer_match in &report.layer_matches {
            assert!((0.0..=1.0).contains(&layer_match.score));
        }
    }

    #[test]
    fn test_layer_match_order_follows_dockerfile() {
        let analysis = parser::parse(
            "FROM debian\nRUN a b c\nRUN d e f\nCOPY x /x\n",
        )
        .unwrap();
        let image = facts(
            vec![
                entry("/bin/sh -c a b c", 100),
                entry("/bin/sh -c d e f", 100),
            ],
            ImageConfigFacts::default(),
            "amd64",
        );
        let config = MatchConfig::default();

        let report = analyze(&analysis, &image, &config);
        let indices: Vec<usize> = report
            .layer_matches
            .iter()
            .map(|m| m.instruction_index)
            .collect();
        let mut sorted = indices.clone();
        sorted.sort_unstable();
        assert_eq!(indices, sorted);
    }

    #[test]
    fn test_appending_empty_layer_is_nearly_inert() {
        let analysis =
            parser::parse("FROM debian\nRUN apt-get update\n").unwrap();
        let config = MatchConfig::default();

        let base_history = vec![
            entry("FROM debian", 0),
            entry("/bin/sh -c apt-get update", 1024),
        ];
        let mut extended = base_history.clone();
        extended.push(entry("/bin/sh -c #(nop)  LABEL extra=1", 0));

        let before = analyze(
            &analysis,
            &facts(base_history, ImageConfigFacts::default(), "amd64"),
            &config,
        );
        let after = analyze(
            &analysis,
            &facts(extended.clone(), ImageConfigFacts::default(), "amd64"),
            &config,
        );

        let tolerance = 1.0 / extended.len() as f64;
        assert!(before.overall - after.overall <= tolerance);
    }
}
