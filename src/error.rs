//! The top-level error type for the whole pipeline.

use thiserror::Error;

use crate::plugin::StageError;

/// A comprehensive error for one pipeline run, carrying the process exit
/// code the failure maps to.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Missing parameters, unresolved plugins, unknown input types.
    #[error("{0}")]
    Orchestration(String),

    #[error("extract failed: {0}")]
    Extract(StageError),

    #[error("transform failed: {0}")]
    Transform(StageError),

    #[error("export failed: {0}")]
    Export(StageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// The process exit code for this failure: 3 for orchestration
    /// problems, 4 for extract failures, 5 for transform/export failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Orchestration(_) | PipelineError::Io(_) => 3,
            PipelineError::Extract(_) => 4,
            PipelineError::Transform(_) | PipelineError::Export(_) => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_stage() {
        assert_eq!(
            PipelineError::Orchestration("x".to_string()).exit_code(),
            3
        );
        assert_eq!(
            PipelineError::Extract(StageError::new(1, "x")).exit_code(),
            4
        );
        assert_eq!(
            PipelineError::Transform(StageError::new(1, "x")).exit_code(),
            5
        );
        assert_eq!(PipelineError::Export(StageError::new(1, "x")).exit_code(), 5);
    }
}
