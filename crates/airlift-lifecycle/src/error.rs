//! ---
//! airlift_section: "04-lifecycle-orchestration"
//! airlift_subsection: "module"
//! airlift_type: "source"
//! airlift_scope: "code"
//! airlift_description: "Error taxonomy for lifecycle steps and composite operations."
//! airlift_version: "v0.1.0"
//! airlift_owner: "tbd"
//! ---
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::orchestrator::{Operation, Step};

/// Failure of a single external command.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program could not be started at all (missing binary, permissions).
    #[error("failed to launch `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    /// The file meant to be streamed on stdin could not be opened.
    #[error("unable to open {path:?} as input for `{command}`")]
    Input {
        command: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The program ran and reported failure.
    #[error("`{command}` {}", describe_exit(.code, .stderr))]
    Exit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl ProcessError {
    /// Exit status reported by the child, when it got far enough to produce one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessError::Exit { code, .. } => *code,
            _ => None,
        }
    }
}

fn describe_exit(code: &Option<i32>, stderr: &str) -> String {
    let status = match code {
        Some(code) => format!("exited with status {code}"),
        None => "was terminated by a signal".to_owned(),
    };
    match stderr.trim().lines().last() {
        Some(last) if !last.trim().is_empty() => format!("{status}: {}", last.trim()),
        _ => status,
    }
}

/// Failure of one lifecycle step.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("unable to {action} {path:?}")]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("schema file not found: {0:?}")]
    SchemaNotFound(PathBuf),
    #[error("database service '{service}' not ready after {waited:?} ({attempts} probes)")]
    ReadinessTimeout {
        service: String,
        attempts: usize,
        waited: Duration,
    },
}

impl StepError {
    pub(crate) fn filesystem(
        action: &'static str,
        path: impl Into<PathBuf>,
        source: io::Error,
    ) -> Self {
        StepError::Filesystem {
            action,
            path: path.into(),
            source,
        }
    }
}

/// Failure of a composite operation: which step broke and what had already completed.
///
/// Completed steps are not rolled back.
#[derive(Debug, Error)]
#[error("{operation} failed at step '{step}' after {} completed step(s)", .completed.len())]
pub struct OperationError {
    pub operation: Operation,
    pub step: Step,
    pub completed: Vec<Step>,
    #[source]
    pub source: StepError,
}

impl OperationError {
    /// Process exit code to surface: the failing command's own status when it
    /// fits in a byte, `1` otherwise.
    pub fn exit_code(&self) -> u8 {
        match &self.source {
            StepError::Process(err) => err
                .exit_code()
                .and_then(|code| u8::try_from(code).ok())
                .filter(|code| *code != 0)
                .unwrap_or(1),
            _ => 1,
        }
    }
}
