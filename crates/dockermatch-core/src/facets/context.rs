use crate::config::MatchConfig;
use crate::inspect::HistoryEntry;
use crate::parser::DockerfileAnalysis;
use crate::report::{FacetScore, LayerMatch, MatchType};
use std::path::Path;

/// Score the build context: how closely COPY/ADD source paths line up
/// with the paths recorded in the matched history entries.
///
/// Blends two signals: the fraction of COPY/ADD instructions that found a
/// layer at all, and the tiered path similarity of the pairs that did.
pub fn score(
    analysis: &DockerfileAnalysis,
    matches: &[LayerMatch],
    history: &[HistoryEntry],
    config: &MatchConfig,
) -> FacetScore {
    let copies = analysis.copy_instructions();
    if copies.is_empty() {
        return FacetScore::new(1.0, "no COPY/ADD instructions to compare");
    }

    let mut matched = 0usize;
    let mut similarity_total = 0.0;

    for (instruction_index, inst) in &copies {
        let layer_match = matches
            .iter()
            .find(|m| m.instruction_index == *instruction_index);
        let Some(layer_match) = layer_match else {
            continue;
        };
        if layer_match.match_type == MatchType::None {
            continue;
        }
        let Some(history_index) = layer_match.history_index else {
            continue;
        };

        matched += 1;
        let inst_paths = source_paths(&inst.raw);
        let hist_paths = history_source_paths(&history[history_index].cleaned);
        similarity_total += path_similarity(&inst_paths, &hist_paths, config);
    }

    let presence = matched as f64 / copies.len() as f64;
    let path_score = if matched > 0 {
        similarity_total / matched as f64
    } else {
        0.0
    };

    let score = config.context_matching.file_presence * presence
        + config.context_matching.path_pattern * path_score;

    FacetScore::new(
        score,
        format!(
            "{} of {} copy instructions matched a layer; path similarity {:.2}",
            matched,
            copies.len(),
            path_score
        ),
    )
}

/// Source paths of a COPY/ADD body: every token but the destination,
/// flags dropped.
fn source_paths(body: &str) -> Vec<String> {
    let tokens: Vec<&str> = body
        .split_whitespace()
        .filter(|token| !token.starts_with("--"))
        .collect();
    if tokens.len() < 2 {
        return Vec::new();
    }
    tokens[..tokens.len() - 1]
        .iter()
        .map(|t| t.to_string())
        .collect()
}

/// Source paths of a cleaned history entry (`COPY src dest`).
fn history_source_paths(cleaned: &str) -> Vec<String> {
    let body = cleaned
        .strip_prefix("COPY")
        .or_else(|| cleaned.strip_prefix("ADD"))
        .unwrap_or(cleaned)
        .trim_start();
    source_paths(body)
}

/// Mean of the best tiered score each Dockerfile path achieves against
/// any history path.
fn path_similarity(df_paths: &[String], hist_paths: &[String], config: &MatchConfig) -> f64 {
    if df_paths.is_empty() || hist_paths.is_empty() {
        return 0.0;
    }

    let mut total = 0.0;
    for df_path in df_paths {
        let a = Path::new(df_path);
        let mut best = 0.0f64;
        for hist_path in hist_paths {
            let b = Path::new(hist_path);
            let tier = if a == b {
                config.path_matching.exact
            } else if a.parent().is_some() && a.parent() == b.parent() {
                config.path_matching.parent
            } else if a.file_name().is_some() && a.file_name() == b.file_name() {
                config.path_matching.filename
            } else if a.extension().is_some() && a.extension() == b.extension() {
                config.path_matching.extension
            } else {
                0.0
            };
            best = best.max(tier);
        }
        total += best;
    }
    total / df_paths.len() as f64
}
