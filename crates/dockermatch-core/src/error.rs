use thiserror::Error;

/// Errors surfaced by the match engine.
///
/// Facet scorers never fail; everything here comes from the input
/// boundary (Dockerfile text, configuration) or the inspection path.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The Dockerfile contains no parseable instructions.
    #[error("invalid Dockerfile: {0}")]
    InvalidDockerfile(String),

    /// The Dockerfile has no FROM instruction.
    #[error("no base image (FROM instruction) found in Dockerfile")]
    NoBaseImage,

    /// The image reference could not be resolved locally or pulled.
    #[error("image '{0}' not found")]
    ImageNotFound(String),

    /// The Docker engine returned an error during inspection.
    #[error("failed to inspect image '{image}': {reason}")]
    InspectionFailed { image: String, reason: String },

    /// Inspection (including a pull on miss) exceeded its deadline.
    /// Transient; the caller may retry.
    #[error("inspection of image '{0}' timed out")]
    InspectionTimeout(String),

    /// No usable Docker engine, or the loaded configuration is invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The caller aborted the match before a report was produced.
    #[error("match cancelled")]
    Cancelled,
}

/// Coarse classification used by adapter layers (HTTP status mapping,
/// CLI exit codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Environment,
    Transient,
    Cancelled,
}

impl MatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MatchError::InvalidDockerfile(_) | MatchError::NoBaseImage => ErrorKind::InvalidInput,
            MatchError::ImageNotFound(_) => ErrorKind::NotFound,
            MatchError::InspectionFailed { .. } | MatchError::Configuration(_) => {
                ErrorKind::Environment
            }
            MatchError::InspectionTimeout(_) => ErrorKind::Transient,
            MatchError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            MatchError::InvalidDockerfile("empty".into()).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(MatchError::NoBaseImage.kind(), ErrorKind::InvalidInput);
        assert_eq!(
            MatchError::ImageNotFound("ghost:latest".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            MatchError::InspectionTimeout("slow:latest".into()).kind(),
            ErrorKind::Transient
        );
        assert_eq!(MatchError::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_error_messages_name_the_image() {
        let err = MatchError::InspectionFailed {
            image: "alpine:3.19".into(),
            reason: "engine unreachable".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("alpine:3.19"));
        assert!(msg.contains("engine unreachable"));
    }
}
