use crate::config::MatchConfig;
use crate::inspect::{clean_created_by, HistoryEntry};
use crate::parser::{DockerfileAnalysis, InstructionKind};
use crate::report::{LayerMatch, MatchDetails, MatchType};
use std::collections::HashSet;

/// Sequentially align layer-creating instructions against image history.
///
/// Output order equals Dockerfile order; each history entry is consumed at
/// most once, ties go to the earliest entry.
pub fn align(
    analysis: &DockerfileAnalysis,
    history: &[HistoryEntry],
    config: &MatchConfig,
) -> Vec<LayerMatch> {
    let layer_instructions = analysis.layer_instructions();

    // Only entries with a usable command can pair; keep original indices.
    let candidates: Vec<(usize, &HistoryEntry)> = history
        .iter()
        .enumerate()
        .filter(|(_, entry)| !entry.cleaned.is_empty())
        .collect();

    let mut matches = Vec::with_capacity(layer_instructions.len());
    let mut used: HashSet<usize> = HashSet::new();

    for (position, (instruction_index, inst)) in layer_instructions.iter().enumerate() {
        let cleaned_inst = clean_created_by(&inst.raw);

        let mut best_score = 0.0;
        let mut best: Option<(usize, f64, f64)> = None;

        for (history_index, entry) in &candidates {
            if used.contains(history_index) {
                continue;
            }

            // History entries for metadata-style rewrites keep the keyword
            // (`COPY app.py /app/`); instruction bodies do not.
            let hist_cmd = history_command(&entry.cleaned, inst.kind);
            let similarity = match inst.kind {
                InstructionKind::Run => jaccard(&cleaned_inst, hist_cmd),
                // Path variance is handled by the build-context facet, not
                // here.
                _ => {
                    if cleaned_inst == hist_cmd {
                        1.0
                    } else {
                        0.0
                    }
                }
            };

            let sequence_penalty =
                (position as f64 - *history_index as f64).abs() / candidates.len() as f64;
            let score = similarity * (1.0 - 0.5 * sequence_penalty);

            if score > best_score {
                best_score = score;
                best = Some((*history_index, similarity, 1.0 - sequence_penalty));
            }
        }

        match best {
            Some((history_index, command_score, sequence_score))
                if best_score >= config.layer_matching.partial_match_threshold =>
            {
                used.insert(history_index);
                let match_type = if best_score >= config.layer_matching.exact_match_threshold {
                    MatchType::Exact
                } else {
                    MatchType::Partial
                };
                matches.push(LayerMatch {
                    instruction_index: *instruction_index,
                    history_index: Some(history_index),
                    score: best_score,
                    match_type,
                    details: MatchDetails {
                        sequence_score,
                        command_score,
                        reason: None,
                    },
                });
            }
            _ => matches.push(LayerMatch {
                instruction_index: *instruction_index,
                history_index: None,
                score: 0.0,
                match_type: MatchType::None,
                details: MatchDetails {
                    sequence_score: 0.0,
                    command_score: 0.0,
                    reason: Some("no history entry scored above the match threshold".into()),
                },
            }),
        }
    }

    matches
}

/// Aggregate layer matches into the layer facet score, weighting each
/// match by its instruction kind.
pub fn facet_score(
    matches: &[LayerMatch],
    analysis: &DockerfileAnalysis,
    config: &MatchConfig,
) -> f64 {
    let total = analysis.layer_instructions().len();
    if total == 0 {
        // Nothing to align; vacuously matched.
        return 1.0;
    }

    let weighted: f64 = matches
        .iter()
        .filter(|m| m.match_type != MatchType::None)
        .map(|m| {
            let kind = analysis.instructions[m.instruction_index].kind;
            m.score * config.command_type_weights.weight_for(kind)
        })
        .sum();

    (weighted / total as f64).clamp(0.0, 1.0)
}

fn history_command(cleaned: &str, kind: InstructionKind) -> &str {
    cleaned
        .strip_prefix(kind.as_str())
        .map(str::trim_start)
        .unwrap_or(cleaned)
}

/// Token-set similarity `|A∩B| / |A∪B|`; zero when either side is empty.
fn jaccard(a: &str, b: &str) -> f64 {
    let tokens_a: HashSet<&str> = a.split_whitespace().collect();
    let tokens_b: HashSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }
    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();
    intersection as f64 / union as f64
}
