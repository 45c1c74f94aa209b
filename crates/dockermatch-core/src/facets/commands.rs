use crate::inspect::ImageFacts;
use crate::normalize::{commands_equal, normalize, CommandInput};
use crate::parser::DockerfileAnalysis;
use crate::report::FacetScore;

/// Compare CMD and ENTRYPOINT across the two sides. Each pair contributes
/// half the facet; an instruction absent from both sides counts as a
/// match.
pub fn score(analysis: &DockerfileAnalysis, facts: &ImageFacts) -> FacetScore {
    let df_cmd = normalize(match analysis.cmd() {
        Some(inst) => CommandInput::Text(&inst.raw),
        None => CommandInput::Absent,
    });
    let df_entrypoint = normalize(match analysis.entrypoint() {
        Some(inst) => CommandInput::Text(&inst.raw),
        None => CommandInput::Absent,
    });
    let img_cmd = normalize(CommandInput::from(facts.config.cmd.as_ref()));
    let img_entrypoint = normalize(CommandInput::from(facts.config.entrypoint.as_ref()));

    let mut score = 0.0;
    let mut notes = Vec::new();

    if commands_equal(&df_cmd, &img_cmd, true) {
        score += 0.5;
        notes.push("CMD matches".to_string());
    } else {
        notes.push(format!("CMD differs ({} vs {})", df_cmd, img_cmd));
    }

    if commands_equal(&df_entrypoint, &img_entrypoint, true) {
        score += 0.5;
        notes.push("ENTRYPOINT matches".to_string());
    } else {
        notes.push(format!(
            "ENTRYPOINT differs ({} vs {})",
            df_entrypoint, img_entrypoint
        ));
    }

    FacetScore::new(score, notes.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::ImageConfigFacts;
    use crate::parser;

    fn facts(cmd: Option<Vec<&str>>, entrypoint: Option<Vec<&str>>) -> ImageFacts {
        ImageFacts {
            id: "sha256:test".into(),
            tags: vec![],
            created_at: None,
            size_bytes: 0,
            architecture: "amd64".into(),
            os: "linux".into(),
            config: ImageConfigFacts {
                cmd: cmd.map(|c| c.into_iter().map(String::from).collect()),
                entrypoint: entrypoint.map(|e| e.into_iter().map(String::from).collect()),
                ..Default::default()
            },
            history: vec![],
            rootfs_layers: vec![],
        }
    }

    #[test]
    fn test_both_match() {
        let analysis =
            parser::parse("FROM alpine\nENTRYPOINT [\"/bin/app\"]\nCMD [\"--serve\"]\n").unwrap();
        let facts = facts(Some(vec!["--serve"]), Some(vec!["/bin/app"]));
        assert_eq!(score(&analysis, &facts).score, 1.0);
    }

    #[test]
    fn test_shell_exec_equivalence() {
        let analysis =
            parser::parse("FROM alpine\nENTRYPOINT [\"/bin/sh\", \"-c\", \"serve\"]\n").unwrap();
        let facts = facts(None, Some(vec!["sh", "-c", "serve"]));
        assert_eq!(score(&analysis, &facts).score, 1.0);
    }

    #[test]
    fn test_cmd_only_mismatch_halves() {
        let analysis = parser::parse("FROM alpine\nCMD [\"python\"]\n").unwrap();
        let facts = facts(Some(vec!["node"]), None);
        assert_eq!(score(&analysis, &facts).score, 0.5);
    }

    #[test]
    fn test_absent_on_both_sides_matches() {
        let analysis = parser::parse("FROM alpine\nRUN ls\n").unwrap();
        let facts = facts(None, None);
        assert_eq!(score(&analysis, &facts).score, 1.0);
    }
}
