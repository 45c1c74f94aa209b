//! Environment, port, volume, and label scorers. These feed the composite
//! metadata facet in the aggregator.

use crate::config::MatchConfig;
use crate::inspect::ImageFacts;
use crate::parser::DockerfileAnalysis;
use crate::report::FacetScore;
use std::collections::BTreeSet;
use std::collections::HashSet;

/// Compare ENV declarations against the image's environment.
pub fn environment(analysis: &DockerfileAnalysis, facts: &ImageFacts) -> FacetScore {
    let df_env = analysis.env_vars();
    let img_env = &facts.config.env;

    if df_env.is_empty() && img_env.is_empty() {
        return FacetScore::new(1.0, "no environment variables in either");
    }
    if df_env.is_empty() || img_env.is_empty() {
        return FacetScore::new(0.0, "environment variables in only one source");
    }

    let mut total = 0.0;
    let mut notes = Vec::new();
    for (key, value) in &df_env {
        match img_env.get(key) {
            Some(img_value) if img_value == value => {
                total += 1.0;
                notes.push(format!("exact match: {}", key));
            }
            Some(_) => {
                total += 0.5;
                notes.push(format!("key match with different value: {}", key));
            }
            None => notes.push(format!("missing from image: {}", key)),
        }
    }

    FacetScore::new(total / df_env.len() as f64, notes.join("; "))
}

/// Compare EXPOSE declarations against the image's exposed ports.
pub fn ports(analysis: &DockerfileAnalysis, facts: &ImageFacts) -> FacetScore {
    let df_ports: BTreeSet<String> = analysis.exposed_ports().into_iter().collect();
    let img_ports = &facts.config.exposed_ports;

    if df_ports.is_empty() && img_ports.is_empty() {
        return FacetScore::new(1.0, "no ports exposed in either");
    }
    if df_ports.is_empty() || img_ports.is_empty() {
        return FacetScore::new(0.0, "ports exposed in only one source");
    }

    let matched: Vec<&String> = df_ports.intersection(img_ports).collect();
    let score = matched.len() as f64 / df_ports.len().max(img_ports.len()) as f64;
    let rationale = if matched.is_empty() {
        format!(
            "no matching ports (dockerfile: {:?}, image: {:?})",
            df_ports, img_ports
        )
    } else {
        format!(
            "matched {} of {} ports",
            matched.len(),
            df_ports.len().max(img_ports.len())
        )
    };
    FacetScore::new(score, rationale)
}

/// Compare VOLUME declarations against the image's volumes.
pub fn volumes(analysis: &DockerfileAnalysis, facts: &ImageFacts) -> FacetScore {
    let df_volumes: BTreeSet<String> = analysis
        .volumes()
        .iter()
        .map(|v| normalize_volume(v))
        .collect();
    let img_volumes: BTreeSet<String> = facts
        .config
        .volumes
        .iter()
        .map(|v| normalize_volume(v))
        .collect();

    if df_volumes.is_empty() && img_volumes.is_empty() {
        return FacetScore::new(1.0, "no volumes in either");
    }
    if df_volumes.is_empty() || img_volumes.is_empty() {
        return FacetScore::new(0.0, "volumes in only one source");
    }

    let matched = df_volumes.intersection(&img_volumes).count();
    let score = matched as f64 / df_volumes.len().max(img_volumes.len()) as f64;
    FacetScore::new(
        score,
        format!(
            "matched {} of {} volumes",
            matched,
            df_volumes.len().max(img_volumes.len())
        ),
    )
}

fn normalize_volume(volume: &str) -> String {
    let trimmed = volume.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Compare LABEL declarations against image labels, weighted by key
/// importance. Dockerfile labels missing from the image count against
/// the score with their full weight.
pub fn labels(analysis: &DockerfileAnalysis, facts: &ImageFacts, config: &MatchConfig) -> FacetScore {
    let df_labels = &analysis.labels;
    let img_labels: std::collections::BTreeMap<String, String> = facts
        .config
        .labels
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v.clone()))
        .collect();

    if df_labels.is_empty() && img_labels.is_empty() {
        return FacetScore::new(1.0, "no labels in either");
    }
    if df_labels.is_empty() || img_labels.is_empty() {
        return FacetScore::new(0.0, "labels in only one source");
    }

    let mut weighted = 0.0;
    let mut weight_total = 0.0;
    let mut notes = Vec::new();

    for (key, value) in df_labels {
        let weight = config.label_matching.weight_for(key);
        weight_total += weight;

        let Some(img_value) = img_labels.get(key) else {
            notes.push(format!("missing from image: {}", key));
            continue;
        };

        let pair_score = if value.eq_ignore_ascii_case(img_value) {
            notes.push(format!("exact match: {}", key));
            1.0
        } else if key.contains("version") {
            let similarity = version_similarity(value, img_value);
            notes.push(format!("version prefix match: {} ({:.2})", key, similarity));
            similarity
        } else {
            let similarity = token_similarity(value, img_value);
            notes.push(format!("value similarity: {} ({:.2})", key, similarity));
            similarity
        };
        weighted += pair_score * weight;
    }

    if weight_total == 0.0 {
        return FacetScore::new(0.0, "no comparable labels");
    }
    FacetScore::new(weighted / weight_total, notes.join("; "))
}

/// Ratio of matching leading numeric components (`1.2.3` vs `1.2.9` is
/// 2 of 3).
fn version_similarity(a: &str, b: &str) -> f64 {
    let parts_a: Vec<&str> = numeric_parts(a);
    let parts_b: Vec<&str> = numeric_parts(b);
    if parts_a.is_empty() || parts_b.is_empty() {
        return 0.0;
    }

    let max_parts = parts_a.len().max(parts_b.len());
    let mut matching = 0;
    for (pa, pb) in parts_a.iter().zip(parts_b.iter()) {
        if pa == pb {
            matching += 1;
        } else {
            break;
        }
    }
    matching as f64 / max_parts as f64
}

fn numeric_parts(version: &str) -> Vec<&str> {
    version
        .split(|c: char| !c.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .collect()
}

fn token_similarity(a: &str, b: &str) -> f64 {
    let tokens_a: HashSet<&str> = a.split_whitespace().collect();
    let tokens_b: HashSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }
    tokens_a.intersection(&tokens_b).count() as f64 / tokens_a.union(&tokens_b).count() as f64
}
