use crate::inspect::ImageFacts;
use crate::parser::DockerfileAnalysis;
use crate::report::FacetScore;

/// Compare the effective WORKDIR against the image's working directory.
pub fn score(analysis: &DockerfileAnalysis, facts: &ImageFacts) -> FacetScore {
    let df_workdir = analysis.last_workdir().unwrap_or("");
    let img_workdir = facts.config.workdir.trim();

    if df_workdir.is_empty() && img_workdir.is_empty() {
        return FacetScore::new(1.0, "no working directory in either");
    }
    if df_workdir.is_empty() || img_workdir.is_empty() {
        return FacetScore::new(0.0, "working directory set in only one source");
    }

    if df_workdir == img_workdir {
        return FacetScore::new(1.0, format!("working directory matches ({})", df_workdir));
    }
    if df_workdir.trim_end_matches('/') == img_workdir.trim_end_matches('/') {
        return FacetScore::new(
            0.9,
            format!(
                "working directory matches ignoring trailing slash ({})",
                df_workdir
            ),
        );
    }

    FacetScore::new(
        0.0,
        format!(
            "working directory mismatch ({} vs {})",
            df_workdir, img_workdir
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::ImageConfigFacts;
    use crate::parser;

    fn facts(workdir: &str) -> ImageFacts {
        ImageFacts {
            id: "sha256:test".into(),
            tags: vec![],
            created_at: None,
            size_bytes: 0,
            architecture: "amd64".into(),
            os: "linux".into(),
            config: ImageConfigFacts {
                workdir: workdir.into(),
                ..Default::default()
            },
            history: vec![],
            rootfs_layers: vec![],
        }
    }

    #[test]
    fn test_exact_match() {
        let analysis = parser::parse("FROM alpine\nWORKDIR /app\n").unwrap();
        assert_eq!(score(&analysis, &facts("/app")).score, 1.0);
    }

    #[test]
    fn test_last_workdir_wins() {
        let analysis = parser::parse("FROM alpine\nWORKDIR /build\nWORKDIR /app\n").unwrap();
        assert_eq!(score(&analysis, &facts("/app")).score, 1.0);
    }

    #[test]
    fn test_trailing_slash_scores_point_nine() {
        let analysis = parser::parse("FROM alpine\nWORKDIR /app/\n").unwrap();
        assert_eq!(score(&analysis, &facts("/app")).score, 0.9);
    }

    #[test]
    fn test_absent_both_sides() {
        let analysis = parser::parse("FROM alpine\nRUN ls\n").unwrap();
        assert_eq!(score(&analysis, &facts("")).score, 1.0);
    }

    #[test]
    fn test_absent_one_side() {
        let analysis = parser::parse("FROM alpine\nWORKDIR /app\n").unwrap();
        assert_eq!(score(&analysis, &facts("")).score, 0.0);
    }

    #[test]
    fn test_mismatch() {
        let analysis = parser::parse("FROM alpine\nWORKDIR /srv\n").unwrap();
        assert_eq!(score(&analysis, &facts("/app")).score, 0.0);
    }
}
