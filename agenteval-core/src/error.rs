use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the evaluation engine.
///
/// Propagation policy (spec §7): errors from agent invocation or the
/// harness are caught and classified into a failing [`crate::model::EvalCaseResult`]
/// rather than bubbling here; errors from a judge are caught inside its
/// retry wrapper and become a synthetic [`crate::model::JudgeResult`]. The
/// variants below surface only at load time, at config time, or from
/// `setup`/`teardown` hooks, which spec §7 treats as configuration errors.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("failed to load eval case file {path}: {source}")]
    LoadError {
        path: PathBuf,
        #[source]
        source: Box<EvalError>,
    },

    #[error("failed to parse eval case: {0}")]
    ParseError(String),

    #[error("agent execution failed: {0}")]
    ExecutionError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    #[error("judge error: {0}")]
    JudgeError(String),
}

pub type Result<T> = std::result::Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = EvalError::JudgeError("boom".into());
        assert_eq!(err.to_string(), "judge error: boom");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: EvalError = io_err.into();
        assert!(matches!(err, EvalError::IoError(_)));
    }

    #[test]
    fn error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: EvalError = json_err.into();
        assert!(matches!(err, EvalError::JsonError(_)));
    }
}
