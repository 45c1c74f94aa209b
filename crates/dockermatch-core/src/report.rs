use crate::config::Thresholds;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How a layer-creating instruction paired with image history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    Partial,
    None,
}

/// Score breakdown for one layer pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDetails {
    pub sequence_score: f64,
    pub command_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Alignment between one Dockerfile instruction and one history entry
/// (or none).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerMatch {
    /// Index into the full parsed instruction stream.
    pub instruction_index: usize,
    pub history_index: Option<usize>,
    pub score: f64,
    #[serde(rename = "type")]
    pub match_type: MatchType,
    pub details: MatchDetails,
}

/// One comparison dimension of the final report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FacetName {
    BaseImage,
    Layers,
    Environment,
    Ports,
    Volumes,
    Workdir,
    Platform,
    Commands,
    Labels,
    Context,
    Metadata,
}

impl fmt::Display for FacetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FacetName::BaseImage => "base image",
            FacetName::Layers => "layers",
            FacetName::Environment => "environment",
            FacetName::Ports => "ports",
            FacetName::Volumes => "volumes",
            FacetName::Workdir => "workdir",
            FacetName::Platform => "platform",
            FacetName::Commands => "commands",
            FacetName::Labels => "labels",
            FacetName::Context => "build context",
            FacetName::Metadata => "metadata",
        };
        f.write_str(name)
    }
}

/// A facet's score with human-readable rationale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetScore {
    pub score: f64,
    pub rationale: String,
}

impl FacetScore {
    pub fn new(score: f64, rationale: impl Into<String>) -> Self {
        Self {
            score: score.clamp(0.0, 1.0),
            rationale: rationale.into(),
        }
    }
}

/// Quality band of an overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchQuality {
    Excellent,
    Good,
    Fair,
    Poor,
    #[serde(rename = "Very Poor")]
    VeryPoor,
}

impl MatchQuality {
    pub fn from_score(score: f64, thresholds: &Thresholds) -> Self {
        if score >= thresholds.excellent {
            MatchQuality::Excellent
        } else if score >= thresholds.good {
            MatchQuality::Good
        } else if score >= thresholds.fair {
            MatchQuality::Fair
        } else if score >= thresholds.poor {
            MatchQuality::Poor
        } else {
            MatchQuality::VeryPoor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MatchQuality::Excellent => "Excellent",
            MatchQuality::Good => "Good",
            MatchQuality::Fair => "Fair",
            MatchQuality::Poor => "Poor",
            MatchQuality::VeryPoor => "Very Poor",
        }
    }
}

impl fmt::Display for MatchQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The final match report for one Dockerfile/image pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReport {
    pub overall: f64,
    pub quality: MatchQuality,
    pub facets: BTreeMap<FacetName, FacetScore>,
    pub layer_matches: Vec<LayerMatch>,
    pub mismatch_reasons: Vec<String>,
}

impl MatchReport {
    pub fn facet(&self, name: FacetName) -> Option<&FacetScore> {
        self.facets.get(&name)
    }

    /// Whether the overall score clears the likely-match threshold.
    pub fn is_likely_match(&self, thresholds: &Thresholds) -> bool {
        self.overall >= thresholds.likely_match
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_bands() {
        let thresholds = Thresholds::default();
        assert_eq!(
            MatchQuality::from_score(0.95, &thresholds),
            MatchQuality::Excellent
        );
        assert_eq!(
            MatchQuality::from_score(0.85, &thresholds),
            MatchQuality::Good
        );
        assert_eq!(
            MatchQuality::from_score(0.7, &thresholds),
            MatchQuality::Fair
        );
        assert_eq!(
            MatchQuality::from_score(0.45, &thresholds),
            MatchQuality::Poor
        );
        assert_eq!(
            MatchQuality::from_score(0.1, &thresholds),
            MatchQuality::VeryPoor
        );
    }

    #[test]
    fn test_quality_serializes_with_space() {
        let json = serde_json::to_string(&MatchQuality::VeryPoor).unwrap();
        assert_eq!(json, "\"Very Poor\"");
    }

    #[test]
    fn test_facet_score_clamped() {
        assert_eq!(FacetScore::new(1.4, "over").score, 1.0);
        assert_eq!(FacetScore::new(-0.2, "under").score, 0.0);
    }

    #[test]
    fn test_report_wire_format() {
        let mut facets = BTreeMap::new();
        facets.insert(FacetName::BaseImage, FacetScore::new(1.0, "exact match"));
        let report = MatchReport {
            overall: 0.92,
            quality: MatchQuality::Excellent,
            facets,
            layer_matches: vec![LayerMatch {
                instruction_index: 1,
                history_index: Some(0),
                score: 0.97,
                match_type: MatchType::Exact,
                details: MatchDetails {
                    sequence_score: 1.0,
                    command_score: 0.97,
                    reason: None,
                },
            }],
            mismatch_reasons: vec![],
        };

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["quality"], "Excellent");
        assert!(value["facets"]["baseImage"]["score"].is_number());
        assert_eq!(value["layerMatches"][0]["instructionIndex"], 1);
        assert_eq!(value["layerMatches"][0]["type"], "exact");
        assert!(value["layerMatches"][0]["details"]["sequenceScore"].is_number());
    }
}
