use crate::error::MatchError;
use crate::parser::InstructionKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

/// Environment variable prefix for configuration overrides
/// (e.g. `DOCKERMATCH_SCORE_WEIGHTS_BASE_IMAGE=0.25`).
const ENV_PREFIX: &str = "DOCKERMATCH_";

/// Immutable scoring configuration, loaded once at startup.
///
/// Every weight and threshold lives in [0,1]; `validate` rejects anything
/// outside that range so scorers never have to re-check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub score_weights: ScoreWeights,
    pub layer_matching: LayerMatching,
    pub path_matching: PathMatching,
    pub label_matching: LabelMatching,
    pub context_matching: ContextMatching,
    pub command_type_weights: CommandTypeWeights,
    pub thresholds: Thresholds,
    pub inspection: Inspection,
    /// Known base-image alias pairs (empty unless supplied; looked up in
    /// both directions).
    pub base_image_aliases: HashMap<String, String>,
}

/// Top-level facet weights. Should sum to roughly 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub base_image: f64,
    pub layer_match: f64,
    pub metadata: f64,
    pub context: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerMatching {
    pub exact_match_threshold: f64,
    pub partial_match_threshold: f64,
    pub sequence_weight: f64,
    pub command_weight: f64,
}

/// Tiered scores for COPY/ADD path comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathMatching {
    pub exact: f64,
    pub parent: f64,
    pub filename: f64,
    pub extension: f64,
}

/// Per-key importance weights for LABEL comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelMatching {
    pub maintainer: f64,
    pub version: f64,
    pub description: f64,
    pub other: f64,
}

impl LabelMatching {
    /// Importance weight for a (lower-cased) label key.
    pub fn weight_for(&self, key: &str) -> f64 {
        if key.contains("maintainer") {
            self.maintainer
        } else if key.contains("version") {
            self.version
        } else if key.contains("description") {
            self.description
        } else {
            self.other
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextMatching {
    pub file_presence: f64,
    pub path_pattern: f64,
}

/// Relative weight of each instruction kind when aggregating layer matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "UPPERCASE")]
pub struct CommandTypeWeights {
    pub run: f64,
    pub copy: f64,
    pub add: f64,
    pub env: f64,
    pub workdir: f64,
    pub expose: f64,
    pub volume: f64,
    pub label: f64,
    pub user: f64,
    pub arg: f64,
    pub other: f64,
}

impl CommandTypeWeights {
    pub fn weight_for(&self, kind: InstructionKind) -> f64 {
        match kind {
            InstructionKind::Run => self.run,
            InstructionKind::Copy => self.copy,
            InstructionKind::Add => self.add,
            InstructionKind::Env => self.env,
            InstructionKind::Workdir => self.workdir,
            InstructionKind::Expose => self.expose,
            InstructionKind::Volume => self.volume,
            InstructionKind::Label => self.label,
            InstructionKind::User => self.user,
            InstructionKind::Arg => self.arg,
            _ => self.other,
        }
    }
}

/// Quality band cut-offs for the final report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub likely_match: f64,
    pub excellent: f64,
    pub good: f64,
    pub fair: f64,
    pub poor: f64,
}

/// Inspection I/O limits. Not score-like, so only sanity-checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Inspection {
    /// Deadline for a single inspection including an image pull on miss.
    pub timeout_secs: u64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            base_image: 0.30,
            layer_match: 0.40,
            metadata: 0.15,
            context: 0.15,
        }
    }
}

impl Default for LayerMatching {
    fn default() -> Self {
        Self {
            exact_match_threshold: 0.95,
            partial_match_threshold: 0.5,
            sequence_weight: 0.3,
            command_weight: 0.7,
        }
    }
}

impl Default for PathMatching {
    fn default() -> Self {
        Self {
            exact: 1.0,
            parent: 0.8,
            filename: 0.6,
            extension: 0.3,
        }
    }
}

impl Default for LabelMatching {
    fn default() -> Self {
        Self {
            maintainer: 0.4,
            version: 0.3,
            description: 0.2,
            other: 0.1,
        }
    }
}

impl Default for ContextMatching {
    fn default() -> Self {
        Self {
            file_presence: 0.6,
            path_pattern: 0.4,
        }
    }
}

impl Default for CommandTypeWeights {
    fn default() -> Self {
        Self {
            run: 1.0,
            copy: 0.8,
            add: 0.8,
            env: 0.6,
            workdir: 0.4,
            expose: 0.4,
            volume: 0.4,
            label: 0.3,
            user: 0.3,
            arg: 0.2,
            other: 0.1,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            likely_match: 0.8,
            excellent: 0.9,
            good: 0.8,
            fair: 0.6,
            poor: 0.4,
        }
    }
}

impl Default for Inspection {
    fn default() -> Self {
        Self { timeout_secs: 60 }
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            score_weights: ScoreWeights::default(),
            layer_matching: LayerMatching::default(),
            path_matching: PathMatching::default(),
            label_matching: LabelMatching::default(),
            context_matching: ContextMatching::default(),
            command_type_weights: CommandTypeWeights::default(),
            thresholds: Thresholds::default(),
            inspection: Inspection::default(),
            base_image_aliases: HashMap::new(),
        }
    }
}

impl MatchConfig {
    /// Load configuration from a TOML file, apply environment overrides,
    /// and validate.
    pub fn load(path: &Path) -> Result<Self, MatchError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MatchError::Configuration(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let mut config: MatchConfig = toml::from_str(&content).map_err(|e| {
            MatchError::Configuration(format!(
                "failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides; used when no config file is given.
    pub fn from_env() -> Result<Self, MatchError> {
        let mut config = MatchConfig::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), MatchError> {
        for (key, value) in std::env::vars() {
            let Some(option) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let option = option.to_lowercase();
            if !self.is_known_option(&option) {
                warn!(option = %key, "ignoring unknown configuration override");
                continue;
            }
            let parsed: f64 = value.parse().map_err(|_| {
                MatchError::Configuration(format!("override {} is not a number: '{}'", key, value))
            })?;
            self.set_option(&option, parsed);
        }
        Ok(())
    }

    fn is_known_option(&self, option: &str) -> bool {
        const KNOWN: [&str; 35] = [
            "score_weights_base_image",
            "score_weights_layer_match",
            "score_weights_metadata",
            "score_weights_context",
            "layer_matching_exact_match_threshold",
            "layer_matching_partial_match_threshold",
            "layer_matching_sequence_weight",
            "layer_matching_command_weight",
            "path_matching_exact",
            "path_matching_parent",
            "path_matching_filename",
            "path_matching_extension",
            "label_matching_maintainer",
            "label_matching_version",
            "label_matching_description",
            "label_matching_other",
            "context_matching_file_presence",
            "context_matching_path_pattern",
            "command_type_weights_run",
            "command_type_weights_copy",
            "command_type_weights_add",
            "command_type_weights_env",
            "command_type_weights_workdir",
            "command_type_weights_expose",
            "command_type_weights_volume",
            "command_type_weights_label",
            "command_type_weights_user",
            "command_type_weights_arg",
            "command_type_weights_other",
            "thresholds_likely_match",
            "thresholds_excellent",
            "thresholds_good",
            "thresholds_fair",
            "thresholds_poor",
            "inspection_timeout_secs",
        ];
        KNOWN.contains(&option)
    }

    fn set_option(&mut self, option: &str, value: f64) -> bool {
        let slot = match option {
            "score_weights_base_image" => &mut self.score_weights.base_image,
            "score_weights_layer_match" => &mut self.score_weights.layer_match,
            "score_weights_metadata" => &mut self.score_weights.metadata,
            "score_weights_context" => &mut self.score_weights.context,
            "layer_matching_exact_match_threshold" => {
                &mut self.layer_matching.exact_match_threshold
            }
            "layer_matching_partial_match_threshold" => {
                &mut self.layer_matching.partial_match_threshold
            }
            "layer_matching_sequence_weight" => &mut self.layer_matching.sequence_weight,
            "layer_matching_command_weight" => &mut self.layer_matching.command_weight,
            "path_matching_exact" => &mut self.path_matching.exact,
            "path_matching_parent" => &mut self.path_matching.parent,
            "path_matching_filename" => &mut self.path_matching.filename,
            "path_matching_extension" => &mut self.path_matching.extension,
            "label_matching_maintainer" => &mut self.label_matching.maintainer,
            "label_matching_version" => &mut self.label_matching.version,
            "label_matching_description" => &mut self.label_matching.description,
            "label_matching_other" => &mut self.label_matching.other,
            "context_matching_file_presence" => &mut self.context_matching.file_presence,
            "context_matching_path_pattern" => &mut self.context_matching.path_pattern,
            "command_type_weights_run" => &mut self.command_type_weights.run,
            "command_type_weights_copy" => &mut self.command_type_weights.copy,
            "command_type_weights_add" => &mut self.command_type_weights.add,
            "command_type_weights_env" => &mut self.command_type_weights.env,
            "command_type_weights_workdir" => &mut self.command_type_weights.workdir,
            "command_type_weights_expose" => &mut self.command_type_weights.expose,
            "command_type_weights_volume" => &mut self.command_type_weights.volume,
            "command_type_weights_label" => &mut self.command_type_weights.label,
            "command_type_weights_user" => &mut self.command_type_weights.user,
            "command_type_weights_arg" => &mut self.command_type_weights.arg,
            "command_type_weights_other" => &mut self.command_type_weights.other,
            "thresholds_likely_match" => &mut self.thresholds.likely_match,
            "thresholds_excellent" => &mut self.thresholds.excellent,
            "thresholds_good" => &mut self.thresholds.good,
            "thresholds_fair" => &mut self.thresholds.fair,
            "thresholds_poor" => &mut self.thresholds.poor,
            "inspection_timeout_secs" => {
                self.inspection.timeout_secs = value as u64;
                return true;
            }
            _ => return false,
        };
        *slot = value;
        true
    }

    /// Reject any weight or threshold outside [0,1].
    pub fn validate(&self) -> Result<(), MatchError> {
        let scores = [
            ("score_weights.base_image", self.score_weights.base_image),
            ("score_weights.layer_match", self.score_weights.layer_match),
            ("score_weights.metadata", self.score_weights.metadata),
            ("score_weights.context", self.score_weights.context),
            (
                "layer_matching.exact_match_threshold",
                self.layer_matching.exact_match_threshold,
            ),
            (
                "layer_matching.partial_match_threshold",
                self.layer_matching.partial_match_threshold,
            ),
            (
                "layer_matching.sequence_weight",
                self.layer_matching.sequence_weight,
            ),
            (
                "layer_matching.command_weight",
                self.layer_matching.command_weight,
            ),
            ("path_matching.exact", self.path_matching.exact),
            ("path_matching.parent", self.path_matching.parent),
            ("path_matching.filename", self.path_matching.filename),
            ("path_matching.extension", self.path_matching.extension),
            ("label_matching.maintainer", self.label_matching.maintainer),
            ("label_matching.version", self.label_matching.version),
            (
                "label_matching.description",
                self.label_matching.description,
            ),
            ("label_matching.other", self.label_matching.other),
            (
                "context_matching.file_presence",
                self.context_matching.file_presence,
            ),
            (
                "context_matching.path_pattern",
                self.context_matching.path_pattern,
            ),
            ("command_type_weights.RUN", self.command_type_weights.run),
            ("command_type_weights.COPY", self.command_type_weights.copy),
            ("command_type_weights.ADD", self.command_type_weights.add),
            ("command_type_weights.ENV", self.command_type_weights.env),
            (
                "command_type_weights.WORKDIR",
                self.command_type_weights.workdir,
            ),
            (
                "command_type_weights.EXPOSE",
                self.command_type_weights.expose,
            ),
            (
                "command_type_weights.VOLUME",
                self.command_type_weights.volume,
            ),
            (
                "command_type_weights.LABEL",
                self.command_type_weights.label,
            ),
            ("command_type_weights.USER", self.command_type_weights.user),
            ("command_type_weights.ARG", self.command_type_weights.arg),
            (
                "command_type_weights.OTHER",
                self.command_type_weights.other,
            ),
            ("thresholds.likely_match", self.thresholds.likely_match),
            ("thresholds.excellent", self.thresholds.excellent),
            ("thresholds.good", self.thresholds.good),
            ("thresholds.fair", self.thresholds.fair),
            ("thresholds.poor", self.thresholds.poor),
        ];

        for (name, value) in scores {
            if !(0.0..=1.0).contains(&value) || !value.is_finite() {
                return Err(MatchError::Configuration(format!(
                    "{} must be in [0,1], got {}",
                    name, value
                )));
            }
        }

        if self.inspection.timeout_secs == 0 {
            return Err(MatchError::Configuration(
                "inspection.timeout_secs must be greater than zero".into(),
            ));
        }

        let weight_sum = self.score_weights.base_image
            + self.score_weights.layer_match
            + self.score_weights.metadata
            + self.score_weights.context;
        if (weight_sum - 1.0).abs() > 0.05 {
            warn!(
                sum = weight_sum,
                "score_weights do not sum to 1.0; overall score will be skewed"
            );
        }

        Ok(())
    }

    /// Whether two base-image references are a configured alias pair.
    pub fn are_image_aliases(&self, a: &str, b: &str) -> bool {
        self.base_image_aliases.get(a).is_some_and(|v| v == b)
            || self.base_image_aliases.get(b).is_some_and(|v| v == a)
    }
}
