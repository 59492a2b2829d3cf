// ============================================================
// Layer 3 — Typed Errors
// ============================================================
// Most of the application returns anyhow::Result. The errors
// below are the ones a caller has to tell apart:
//
//   ConfigError      — bad or unsupported configuration,
//                      raised before any model is built
//   CheckpointError  — above all `Missing`, which main()
//                      turns into a diagnostic + exit(1)
//   EvaluationError  — an empty validation set
//   DataError        — unreadable or malformed dataset files

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown {field} '{value}'")]
    Unknown { field: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("unsupported configuration: {0}")]
    Unsupported(String),
}

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("{} does not exist.", path.display())]
    Missing { path: PathBuf },

    #[error("checkpoint I/O error on '{}': {source}", path.display())]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode/encode checkpoint '{}': {message}", path.display())]
    Record { path: PathBuf, message: String },
}

#[derive(Error, Debug, PartialEq)]
pub enum EvaluationError {
    #[error("validation set is empty; accuracy is undefined")]
    EmptyValidationSet,
}

#[derive(Error, Debug)]
pub enum DataError {
    #[error("cannot read '{}': {source}", path.display())]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed dataset file: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_message_names_the_file() {
        let err = CheckpointError::Missing { path: PathBuf::from("trained_model/x.pkl") };
        assert_eq!(err.to_string(), "trained_model/x.pkl does not exist.");
    }

    #[test]
    fn test_checkpoint_error_survives_anyhow() {
        let err: anyhow::Error = CheckpointError::Missing { path: PathBuf::from("a.pkl") }.into();
        assert!(matches!(
            err.downcast_ref::<CheckpointError>(),
            Some(CheckpointError::Missing { .. })
        ));
    }
}
