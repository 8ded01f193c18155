//! Error kinds for the compile pipeline.
//!
//! DESIGN DECISION: a single flat `thiserror` enum at the crate root
//! WHY: every stage (ingest, select, resolve, budget, assemble) needs to
//! surface failures through one `?`-friendly type; splitting per-module
//! error enums would just push the fan-in back onto callers.

use thiserror::Error;

/// Where in the pipeline a dropped atom was lost, recorded on the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DropStage {
    /// Filtered out by `matches(atom, ctx)`.
    Unmatched,
    /// Removed by the dependency filter.
    MissingDependency,
    /// Excluded by conflict resolution or an `is_exclusive` group.
    Conflict,
    /// Dropped by the budget manager under token pressure.
    Budget,
}

impl DropStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropStage::Unmatched => "unmatched",
            DropStage::MissingDependency => "missing-dep",
            DropStage::Conflict => "conflict",
            DropStage::Budget => "budget",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// An atom failed `validate()` during ingest.
    #[error("invalid atom '{0}'")]
    InvalidAtom(String),

    /// A dependency cycle was found while topologically ordering atoms;
    /// carries the shortest cycle found as a sequence of atom ids.
    #[error("dependency cycle: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    /// A mandatory atom could not be fit even in its minimal render form.
    #[error("budget exhausted: mandatory atom '{0}' does not fit available tokens")]
    BudgetExhausted(String),

    /// The semantic-search collaborator was not supplied, timed out, or
    /// errored; non-fatal, selection proceeds with `score_vector = 0`.
    #[error("semantic search unavailable: {0}")]
    SemanticSearchUnavailable(String),

    /// A compile was cancelled via its cancellation token.
    #[error("compile cancelled")]
    Cancelled,

    /// Configuration failed to parse or validate.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Configuration(err.to_string())
    }
}

/// A non-fatal condition recorded on the manifest rather than propagated as
/// an `Err`. Mirrors the spec's "downgrade to warning" propagation policy:
/// only `DependencyCycle` and `BudgetExhausted` ever abort a compile.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Warning {
    MandatoryDropped { atom_id: String, reason: String },
    MissingDependency { atom_id: String, missing: Vec<String> },
    SemanticSearchUnavailable { reason: String },
    InvalidAtomSkipped { atom_id: String, reason: String },
    TemplateError { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_stage_as_str() {
        assert_eq!(DropStage::Unmatched.as_str(), "unmatched");
        assert_eq!(DropStage::MissingDependency.as_str(), "missing-dep");
        assert_eq!(DropStage::Conflict.as_str(), "conflict");
        assert_eq!(DropStage::Budget.as_str(), "budget");
    }

    #[test]
    fn dependency_cycle_message() {
        let err = Error::DependencyCycle(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(err.to_string(), "dependency cycle: a -> b -> a");
    }

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        matches!(err, Error::Io(_));
    }
}
