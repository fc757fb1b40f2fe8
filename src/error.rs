// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error as StdError;

use thiserror::Error;

use crate::record::Mode;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors returned when a pipeline can not be constructed.
///
/// These are raised before any record flows and no pipeline handle is created.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No source stream was given.
    #[error("invalid configuration: missing source stream")]
    MissingSource,

    /// Dispatch rule at the given position has an empty signal name.
    #[error("invalid configuration: dispatch rule {index} has an empty signal name")]
    EmptySignalName { index: usize },

    /// Pattern of a declarative rule could not be compiled.
    #[error("invalid pattern for signal \"{signal}\": {source}")]
    InvalidPattern {
        signal: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors surfacing on the pipeline stream while records flow.
///
/// Every one of them is fatal, the pipeline ends right after yielding it.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Source or one of the stages failed.
    #[error("stage failed: {0}")]
    Stage(#[from] StageError),

    /// Predicate of a dispatch rule failed while evaluating a record.
    #[error("predicate for signal \"{signal}\" failed: {source}")]
    Predicate {
        signal: String,
        #[source]
        source: PredicateError,
    },

    /// A record arrived at the tap which does not match the pipeline's mode.
    #[error("expected {expected} record but received {found} record")]
    ModeMismatch { expected: Mode, found: Mode },
}

/// Failure raised by a source stream or a transformation stage.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StageError(BoxError);

impl StageError {
    pub fn new<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self(err.into())
    }

    pub fn into_inner(self) -> BoxError {
        self.0
    }
}

/// Failure raised by a dispatch rule predicate.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct PredicateError(BoxError);

impl PredicateError {
    pub fn new<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self(err.into())
    }

    pub fn into_inner(self) -> BoxError {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use crate::record::Mode;

    use super::{ConfigError, PipelineError, PredicateError, StageError};

    #[test]
    fn messages() {
        assert_eq!(
            ConfigError::MissingSource.to_string(),
            "invalid configuration: missing source stream"
        );

        let err = PipelineError::from(StageError::new("unexpected end of input"));
        assert_eq!(err.to_string(), "stage failed: unexpected end of input");

        let err = PipelineError::Predicate {
            signal: "warn".into(),
            source: PredicateError::new("missing field"),
        };
        assert_eq!(
            err.to_string(),
            "predicate for signal \"warn\" failed: missing field"
        );
        assert_eq!(err.source().unwrap().to_string(), "missing field");

        let err = PipelineError::ModeMismatch {
            expected: Mode::Raw,
            found: Mode::Structured,
        };
        assert_eq!(
            err.to_string(),
            "expected raw record but received structured record"
        );
    }
}
