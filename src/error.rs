//! Error taxonomy for the locality subsystem.
//!
//! Every failure here is recoverable: import errors leave the stored
//! snapshot untouched, query misses are reported as ordinary results.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LocalityError>;

#[derive(Debug, Error)]
pub enum LocalityError {
    /// Source unreadable, unresolvable or of the wrong type.
    #[error("{0}")]
    File(String),

    /// Input is not well-formed markup. Carries the parser diagnostics.
    #[error("Invalid XML structure: {}", .0.join("; "))]
    Parse(Vec<String>),

    /// A required top-level section is absent.
    #[error("XML must contain <{regions}> and <{subregions}> sections.")]
    Structure {
        regions: &'static str,
        subregions: &'static str,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidIdentifier(String),

    /// The snapshot could not be written; the previous one is still current.
    #[error("Could not persist localities: {0}")]
    Persist(String),

    #[error("Could not export localities: {0}")]
    Export(String),
}

impl LocalityError {
    /// True for the query-time misses that callers render as an empty result.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::InvalidIdentifier(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_joins_diagnostics() {
        let err = LocalityError::Parse(vec!["unexpected EOF".into(), "no root".into()]);
        assert_eq!(err.to_string(), "Invalid XML structure: unexpected EOF; no root");
    }

    #[test]
    fn test_structure_error_names_sections() {
        let err = LocalityError::Structure { regions: "wilayas", subregions: "communes" };
        assert_eq!(
            err.to_string(),
            "XML must contain <wilayas> and <communes> sections."
        );
    }

    #[test]
    fn test_export_error_is_not_a_persist_error() {
        let err = LocalityError::Export("key must be a string".into());
        assert_eq!(err.to_string(), "Could not export localities: key must be a string");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_not_found_classification() {
        assert!(LocalityError::NotFound("x".into()).is_not_found());
        assert!(LocalityError::InvalidIdentifier("x".into()).is_not_found());
        assert!(!LocalityError::File("x".into()).is_not_found());
    }
}
