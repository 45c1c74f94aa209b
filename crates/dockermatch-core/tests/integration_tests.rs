use async_trait::async_trait;
use dockermatch_core::inspect::{
    DockerEngine, EngineError, RawHistoryItem, RawImageInspect,
};
use dockermatch_core::report::{FacetName, MatchQuality, MatchType};
use dockermatch_core::{parse_package_command, MatchConfig, MatchError, Matcher, PackageManager};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Get the workspace root (two levels up from CARGO_MANIFEST_DIR of
/// dockermatch-core).
fn fixtures_dir() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir)
        .parent()
        .unwrap() // crates/
        .parent()
        .unwrap() // workspace root
        .join("tests/fixtures")
}

fn dockerfile_fixture(name: &str) -> String {
    let path = fixtures_dir().join("dockerfiles").join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read {}: {}", path.display(), e))
}

/// On-disk image fixture: the inspect payload plus the history payload,
/// both in Docker Engine API shape (history newest-first).
#[derive(Deserialize)]
struct ImageFixture {
    inspect: RawImageInspect,
    history: Vec<RawHistoryItem>,
}

fn image_fixture(name: &str) -> ImageFixture {
    let path = fixtures_dir().join("images").join(name);
    let content = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read {}: {}", path.display(), e));
    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("failed to parse {}: {}", path.display(), e))
}

/// Engine stub serving fixture JSON; optionally requires a pull first.
struct FixtureEngine {
    fixture: ImageFixture,
    requires_pull: std::sync::atomic::AtomicBool,
}

impl FixtureEngine {
    fn new(name: &str) -> Self {
        Self {
            fixture: image_fixture(name),
            requires_pull: std::sync::atomic::AtomicBool::new(false),
        }
    }

    fn not_pulled(name: &str) -> Self {
        Self {
            fixture: image_fixture(name),
            requires_pull: std::sync::atomic::AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl DockerEngine for FixtureEngine {
    async fn inspect_image(&self, _reference: &str) -> Result<RawImageInspect, EngineError> {
        if self.requires_pull.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(EngineError::NotFound);
        }
        Ok(self.fixture.inspect.clone())
    }

    async fn pull_image(&self, _reference: &str) -> Result<(), EngineError> {
        self.requires_pull
            .store(false, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn image_history(&self, _reference: &str) -> Result<Vec<RawHistoryItem>, EngineError> {
        Ok(self.fixture.history.clone())
    }
}

/// Engine stub for an image that does not exist anywhere.
struct MissingEngine;

#[async_trait]
impl DockerEngine for MissingEngine {
    async fn inspect_image(&self, _reference: &str) -> Result<RawImageInspect, EngineError> {
        Err(EngineError::NotFound)
    }

    async fn pull_image(&self, _reference: &str) -> Result<(), EngineError> {
        Err(EngineError::NotFound)
    }

    async fn image_history(&self, _reference: &str) -> Result<Vec<RawHistoryItem>, EngineError> {
        Err(EngineError::NotFound)
    }
}

fn matcher(fixture: &str) -> Matcher {
    Matcher::new(
        Arc::new(FixtureEngine::new(fixture)),
        MatchConfig::default(),
    )
}

// ─── Scenario tests ───

#[tokio::test]
async fn test_identical_pair_is_excellent() {
    let dockerfile = dockerfile_fixture("python-identical.dockerfile");
    let report = matcher("python-identical.json")
        .match_image(&dockerfile, "python-identical:latest")
        .await
        .unwrap();

    assert!(report.overall >= 0.9, "overall was {}", report.overall);
    assert_eq!(report.quality, MatchQuality::Excellent);
    assert!(report.mismatch_reasons.is_empty());
    assert_eq!(report.facet(FacetName::BaseImage).unwrap().score, 1.0);
}

#[tokio::test]
async fn test_shell_exec_equivalence() {
    let dockerfile = dockerfile_fixture("shell-exec.dockerfile");
    let report = matcher("shell-exec.json")
        .match_image(&dockerfile, "shell-exec:latest")
        .await
        .unwrap();

    assert_eq!(report.facet(FacetName::Commands).unwrap().score, 1.0);
}

#[tokio::test]
async fn test_port_normalization() {
    let dockerfile = dockerfile_fixture("flask-app.dockerfile");
    let report = matcher("flask-app.json")
        .match_image(&dockerfile, "flask-app:latest")
        .await
        .unwrap();

    assert_eq!(report.facet(FacetName::Ports).unwrap().score, 1.0);
}

#[tokio::test]
async fn test_flask_app_scores_well() {
    let dockerfile = dockerfile_fixture("flask-app.dockerfile");
    let report = matcher("flask-app.json")
        .match_image(&dockerfile, "flask-app:latest")
        .await
        .unwrap();

    assert!(report.overall >= 0.8, "overall was {}", report.overall);
    assert!(matches!(
        report.quality,
        MatchQuality::Good | MatchQuality::Excellent
    ));
    assert_eq!(report.facet(FacetName::Environment).unwrap().score, 1.0);
    assert_eq!(report.facet(FacetName::Volumes).unwrap().score, 1.0);
    assert_eq!(report.facet(FacetName::Labels).unwrap().score, 1.0);
    assert_eq!(report.facet(FacetName::Context).unwrap().score, 1.0);

    // All three layer-creating instructions found their history entry.
    assert!(report
        .layer_matches
        .iter()
        .all(|m| m.match_type != MatchType::None));
}

#[tokio::test]
async fn test_reordered_layers_score_lower_but_nonzero() {
    let dockerfile = dockerfile_fixture("multi-run.dockerfile");

    let in_order = matcher("multi-run.json")
        .match_image(&dockerfile, "multi-run:latest")
        .await
        .unwrap();
    let reordered = matcher("multi-run-reordered.json")
        .match_image(&dockerfile, "multi-run:reordered")
        .await
        .unwrap();

    let baseline = in_order.facet(FacetName::Layers).unwrap().score;
    let shuffled = reordered.facet(FacetName::Layers).unwrap().score;

    assert!(
        shuffled < baseline,
        "expected {} < {}",
        shuffled,
        baseline
    );
    assert!(shuffled > 0.0);
}

#[tokio::test]
async fn test_platform_alias() {
    let dockerfile = dockerfile_fixture("arm64-app.dockerfile");
    let report = matcher("arm64-app.json")
        .match_image(&dockerfile, "arm64-app:latest")
        .await
        .unwrap();

    assert_eq!(report.facet(FacetName::Platform).unwrap().score, 1.0);
}

#[test]
fn test_apt_package_extraction_from_fixture_history() {
    let fixture = image_fixture("multi-run.json");
    let install_layer = fixture
        .history
        .iter()
        .find(|item| item.created_by.contains("apt-get install"))
        .unwrap();

    let command = parse_package_command(&install_layer.created_by).unwrap();
    assert_eq!(command.manager, PackageManager::AptGet);
    assert_eq!(command.verb, "install");
    assert_eq!(command.packages, vec!["curl", "ca-certificates"]);
}

// ─── Pipeline behavior ───

#[tokio::test]
async fn test_pull_on_local_miss() {
    let engine = Arc::new(FixtureEngine::not_pulled("python-identical.json"));
    let matcher = Matcher::new(engine, MatchConfig::default());
    let dockerfile = dockerfile_fixture("python-identical.dockerfile");

    let report = matcher
        .match_image(&dockerfile, "python-identical:latest")
        .await
        .unwrap();
    assert!(report.overall > 0.9);
}

#[tokio::test]
async fn test_image_not_found() {
    let matcher = Matcher::new(Arc::new(MissingEngine), MatchConfig::default());
    let dockerfile = dockerfile_fixture("python-identical.dockerfile");

    let err = matcher
        .match_image(&dockerfile, "ghost:latest")
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::ImageNotFound(_)));
}

#[tokio::test]
async fn test_invalid_dockerfile_errors() {
    let matcher = matcher("python-identical.json");

    let err = matcher
        .match_image("# nothing here\n", "python-identical:latest")
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::InvalidDockerfile(_)));

    let err = matcher
        .match_image("RUN echo hi\n", "python-identical:latest")
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::NoBaseImage));
}

#[tokio::test]
async fn test_cancellation_aborts_without_report() {
    let matcher = matcher("python-identical.json");
    let dockerfile = dockerfile_fixture("python-identical.dockerfile");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = matcher
        .match_image_with(&dockerfile, "python-identical:latest", None, cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::Cancelled));
}

#[tokio::test]
async fn test_config_overrides_shift_weights() {
    let matcher = matcher("multi-run.json");
    let dockerfile = dockerfile_fixture("multi-run.dockerfile");

    let default_report = matcher
        .match_image(&dockerfile, "multi-run:latest")
        .await
        .unwrap();

    let mut overrides = MatchConfig::default();
    overrides.score_weights.base_image = 1.0;
    overrides.score_weights.layer_match = 0.0;
    overrides.score_weights.metadata = 0.0;
    overrides.score_weights.context = 0.0;
    let base_only = matcher
        .match_image_with(
            &dockerfile,
            "multi-run:latest",
            Some(&overrides),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    // Base image matches exactly, so the base-only view hits 1.0 while the
    // default blend stays below it.
    assert_eq!(base_only.overall, 1.0);
    assert!(default_report.overall < 1.0);
}

#[tokio::test]
async fn test_invalid_overrides_rejected() {
    let matcher = matcher("multi-run.json");
    let dockerfile = dockerfile_fixture("multi-run.dockerfile");

    let mut overrides = MatchConfig::default();
    overrides.thresholds.excellent = 3.0;
    let err = matcher
        .match_image_with(
            &dockerfile,
            "multi-run:latest",
            Some(&overrides),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::Configuration(_)));
}

// ─── Report wire format ───

#[tokio::test]
async fn test_report_serializes_to_documented_shape() {
    let dockerfile = dockerfile_fixture("flask-app.dockerfile");
    let report = matcher("flask-app.json")
        .match_image(&dockerfile, "flask-app:latest")
        .await
        .unwrap();

    let value = serde_json::to_value(&report).unwrap();
    assert!(value["overall"].is_number());
    assert!(value["quality"].is_string());
    assert!(value["facets"]["baseImage"]["score"].is_number());
    assert!(value["facets"]["layers"]["rationale"].is_string());
    let first = &value["layerMatches"][0];
    assert!(first["instructionIndex"].is_number());
    assert!(first["score"].is_number());
    assert!(first["type"].is_string());
    assert!(first["details"]["sequenceScore"].is_number());
    assert!(first["details"]["commandScore"].is_number());
    assert!(value["mismatchReasons"].is_array());
}

#[tokio::test]
async fn test_scores_stay_in_unit_interval_across_fixtures() {
    let cases = [
        ("python-identical.dockerfile", "python-identical.json"),
        ("flask-app.dockerfile", "flask-app.json"),
        ("multi-run.dockerfile", "multi-run.json"),
        ("multi-run.dockerfile", "multi-run-reordered.json"),
        ("shell-exec.dockerfile", "shell-exec.json"),
        ("arm64-app.dockerfile", "arm64-app.json"),
        // Deliberate mismatches.
        ("multi-run.dockerfile", "flask-app.json"),
        ("flask-app.dockerfile", "multi-run.json"),
    ];

    for (dockerfile_name, image_name) in cases {
        let dockerfile = dockerfile_fixture(dockerfile_name);
        let report = matcher(image_name)
            .match_image(&dockerfile, "test:latest")
            .await
            .unwrap();

        assert!(
            (0.0..=1.0).contains(&report.overall),
            "{} vs {}: overall {}",
            dockerfile_name,
            image_name,
            report.overall
        );
        for (name, facet) in &report.facets {
            assert!(
                (0.0..=1.0).contains(&facet.score),
                "{} vs {}: facet {} = {}",
                dockerfile_name,
                image_name,
                name,
                facet.score
            );
        }
    }
}
