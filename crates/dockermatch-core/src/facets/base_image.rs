use crate::config::MatchConfig;
use crate::report::FacetScore;

/// Score how well the Dockerfile base image matches the reference the
/// image history records.
pub fn score(dockerfile_base: &str, image_base: Option<&str>, config: &MatchConfig) -> FacetScore {
    let image_base = image_base.unwrap_or("");
    if dockerfile_base.is_empty() && image_base.is_empty() {
        return FacetScore::new(1.0, "no base image on either side");
    }
    if dockerfile_base.is_empty() || image_base.is_empty() {
        return FacetScore::new(0.0, "base image recorded on only one side");
    }

    let df = normalize_image_ref(dockerfile_base);
    let img = normalize_image_ref(image_base);

    if df == img {
        return FacetScore::new(1.0, format!("base image matches exactly ({})", df));
    }

    if repository(&df) == repository(&img) {
        return FacetScore::new(
            0.8,
            format!("same repository, different tag ({} vs {})", df, img),
        );
    }

    if config.are_image_aliases(&df, &img) {
        return FacetScore::new(0.9, format!("known alias pair ({} ~ {})", df, img));
    }

    FacetScore::new(0.0, format!("base image mismatch ({} vs {})", df, img))
}

/// Normalize an image reference: drop the registry, default the tag to
/// `latest`, lowercase.
pub fn normalize_image_ref(reference: &str) -> String {
    let mut reference = reference.trim();

    if let Some((first, rest)) = reference.split_once('/') {
        if first.contains('.') || first.contains(':') || first == "localhost" {
            reference = rest;
        }
    }

    let mut normalized = reference.to_string();
    if !normalized.contains(':') {
        normalized.push_str(":latest");
    }
    normalized.to_lowercase()
}

/// The repository part of a normalized reference (tag and digest dropped).
fn repository(reference: &str) -> &str {
    let repo = match reference.split_once('@') {
        Some((repo, _)) => repo,
        None => reference,
    };
    match repo.split_once(':') {
        Some((repo, _)) => repo,
        None => repo,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_drops_registry() {
        assert_eq!(
            normalize_image_ref("registry.example.com/library/ubuntu:22.04"),
            "library/ubuntu:22.04"
        );
        assert_eq!(normalize_image_ref("localhost/app"), "app:latest");
    }

    #[test]
    fn test_normalize_defaults_tag() {
        assert_eq!(normalize_image_ref("ubuntu"), "ubuntu:latest");
        assert_eq!(normalize_image_ref("Ubuntu:22.04"), "ubuntu:22.04");
    }

    #[test]
    fn test_normalize_keeps_namespace() {
        // A plain namespace is not a registry.
        assert_eq!(normalize_image_ref("lib/app:1.0"), "lib/app:1.0");
    }

    #[test]
    fn test_exact_match() {
        let config = MatchConfig::default();
        let facet = score("python:3.9-slim", Some("python:3.9-slim"), &config);
        assert_eq!(facet.score, 1.0);
    }

    #[test]
    fn test_tag_mismatch_scores_point_eight() {
        let config = MatchConfig::default();
        let facet = score("python:3.9", Some("python:3.10"), &config);
        assert_eq!(facet.score, 0.8);
    }

    #[test]
    fn test_alias_pair() {
        let mut config = MatchConfig::default();
        config
            .base_image_aliases
            .insert("node:latest".into(), "node-lts:latest".into());
        let facet = score("node", Some("node-lts"), &config);
        assert_eq!(facet.score, 0.9);
    }

    #[test]
    fn test_unrelated_images_zero() {
        let config = MatchConfig::default();
        let facet = score("python:3.9", Some("node:20"), &config);
        assert_eq!(facet.score, 0.0);
    }

    #[test]
    fn test_missing_image_side_zero() {
        let config = MatchConfig::default();
        let facet = score("python:3.9", None, &config);
        assert_eq!(facet.score, 0.0);
    }
}
