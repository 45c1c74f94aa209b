use crate::inspect::ImageFacts;
use crate::parser::DockerfileAnalysis;
use crate::report::FacetScore;

/// Compare the architecture implied by the Dockerfile against the image.
///
/// `--platform=` on the first FROM wins; otherwise the base-image
/// reference is scanned for an arch substring; with no hint at all the
/// Dockerfile is assumed to target whatever the image was built for.
pub fn score(analysis: &DockerfileAnalysis, facts: &ImageFacts) -> FacetScore {
    let image_arch = facts.architecture.trim();
    let df_arch = dockerfile_arch(analysis);

    if image_arch.is_empty() {
        return match df_arch {
            Some(arch) => FacetScore::new(
                0.0,
                format!("image architecture unknown (dockerfile targets {})", arch),
            ),
            None => FacetScore::new(1.0, "no architecture information on either side"),
        };
    }

    let df_arch = match df_arch {
        Some(arch) => arch,
        None => {
            return FacetScore::new(
                1.0,
                format!(
                    "no platform in Dockerfile, assuming image architecture ({})",
                    image_arch
                ),
            )
        }
    };

    if let Some(family) = common_family(&df_arch, image_arch) {
        return FacetScore::new(1.0, format!("architecture matches ({})", family));
    }

    FacetScore::new(
        0.0,
        format!(
            "architecture mismatch (dockerfile: {}, image: {})",
            df_arch, image_arch
        ),
    )
}

fn dockerfile_arch(analysis: &DockerfileAnalysis) -> Option<String> {
    if let Some(platform) = analysis.platform() {
        let lower = platform.to_lowercase();
        if lower.contains("amd64") {
            return Some("amd64".into());
        }
        if lower.contains("arm64") {
            return Some("arm64".into());
        }
    }

    let base = analysis.base_image.to_lowercase();
    if base.contains("amd64") {
        return Some("amd64".into());
    }
    if base.contains("arm64") {
        return Some("arm64".into());
    }
    None
}

/// The shared family name when both arch tokens belong to the same
/// equivalence class.
fn common_family(a: &str, b: &str) -> Option<&'static str> {
    const FAMILIES: [(&str, [&str; 2]); 2] = [
        ("amd64", ["amd64", "x86_64"]),
        ("arm64", ["arm64", "aarch64"]),
    ];
    for (family, variants) in FAMILIES {
        if variants.contains(&a) && variants.contains(&b) {
            return Some(family);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::ImageConfigFacts;
    use crate::parser;

    fn facts(arch: &str) -> ImageFacts {
        ImageFacts {
            id: "sha256:test".into(),
            tags: vec![],
            created_at: None,
            size_bytes: 0,
            architecture: arch.into(),
            os: "linux".into(),
            config: ImageConfigFacts::default(),
            history: vec![],
            rootfs_layers: vec![],
        }
    }

    #[test]
    fn test_platform_flag_alias_match() {
        let analysis = parser::parse("FROM --platform=linux/arm64 base\n").unwrap();
        assert_eq!(score(&analysis, &facts("aarch64")).score, 1.0);
    }

    #[test]
    fn test_amd64_x86_64_equivalent() {
        let analysis = parser::parse("FROM --platform=linux/amd64 base\n").unwrap();
        assert_eq!(score(&analysis, &facts("x86_64")).score, 1.0);
    }

    #[test]
    fn test_arch_from_base_image_name() {
        let analysis = parser::parse("FROM arm64v8/alpine:3.19\n").unwrap();
        assert_eq!(score(&analysis, &facts("arm64")).score, 1.0);
    }

    #[test]
    fn test_no_hint_defaults_to_image_arch() {
        let analysis = parser::parse("FROM alpine:3.19\n").unwrap();
        assert_eq!(score(&analysis, &facts("amd64")).score, 1.0);
    }

    #[test]
    fn test_mismatch() {
        let analysis = parser::parse("FROM --platform=linux/arm64 base\n").unwrap();
        assert_eq!(score(&analysis, &facts("amd64")).score, 0.0);
    }
}
