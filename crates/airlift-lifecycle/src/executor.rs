//! ---
//! airlift_section: "04-lifecycle-orchestration"
//! airlift_subsection: "module"
//! airlift_type: "source"
//! airlift_scope: "code"
//! airlift_description: "External command capability injected into every lifecycle step."
//! airlift_version: "v0.1.0"
//! airlift_owner: "tbd"
//! ---
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::ProcessError;

const REDACTED: &str = "********";

/// Description of one external command invocation.
///
/// Arguments added through [`CommandSpec::secret_arg`] are masked whenever the
/// command is displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    secret_args: Vec<usize>,
    stdin_file: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            secret_args: Vec::new(),
            stdin_file: None,
        }
    }

    /// Build a command from an argv-style list; `None` when the list is empty.
    pub fn from_argv<S: AsRef<str>>(argv: &[S]) -> Option<Self> {
        let (program, rest) = argv.split_first()?;
        Some(Self::new(program.as_ref()).args(rest.iter().map(|s| s.as_ref().to_owned())))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append an argument that must never appear in logs or error messages.
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.secret_args.push(self.args.len());
        self.args.push(arg.into());
        self
    }

    /// Append another command (program and arguments) as trailing arguments,
    /// keeping its secret markers.
    pub fn nest(mut self, inner: &CommandSpec) -> Self {
        self.args.push(inner.program.clone());
        let offset = self.args.len();
        self.secret_args
            .extend(inner.secret_args.iter().map(|index| index + offset));
        self.args.extend(inner.args.iter().cloned());
        self
    }

    /// Stream the given file into the child's stdin.
    pub fn stdin_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin_file = Some(path.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn stdin_path(&self) -> Option<&Path> {
        self.stdin_file.as_deref()
    }

    /// True when `token` equals the program or one of the arguments.
    pub fn has_token(&self, token: &str) -> bool {
        self.program == token || self.args.iter().any(|arg| arg == token)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for (index, arg) in self.args.iter().enumerate() {
            if self.secret_args.contains(&index) {
                write!(f, " {REDACTED}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        if let Some(path) = &self.stdin_file {
            write!(f, " < {}", path.display())?;
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status; `None` when the child was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success() -> Self {
        Self {
            code: Some(0),
            ..Self::default()
        }
    }

    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    /// Convert a non-zero exit into a [`ProcessError::Exit`].
    pub fn into_result(self, spec: &CommandSpec) -> Result<Self, ProcessError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ProcessError::Exit {
                command: spec.to_string(),
                code: self.code,
                stderr: self.stderr,
            })
        }
    }
}

/// Capability to run external commands, one at a time, to completion.
///
/// Implementations return `Ok` for any command that ran, whatever its exit
/// status; only launch failures are errors. Callers decide what a non-zero
/// status means (see [`run_checked`]).
pub trait CommandExecutor {
    fn execute(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError>;
}

impl<T: CommandExecutor + ?Sized> CommandExecutor for &T {
    fn execute(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        (**self).execute(spec)
    }
}

/// Run a command and treat any non-zero exit as fatal.
pub fn run_checked<E: CommandExecutor + ?Sized>(
    executor: &E,
    spec: &CommandSpec,
) -> Result<CommandOutput, ProcessError> {
    executor.execute(spec)?.into_result(spec)
}

/// Executor backed by real child processes.
#[derive(Debug, Clone)]
pub struct SystemExecutor {
    working_dir: PathBuf,
}

impl SystemExecutor {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }
}

impl CommandExecutor for SystemExecutor {
    fn execute(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&self.working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        match &spec.stdin_file {
            Some(path) => {
                let path = if path.is_absolute() {
                    path.clone()
                } else {
                    self.working_dir.join(path)
                };
                let file = File::open(&path).map_err(|source| ProcessError::Input {
                    command: spec.to_string(),
                    path: path.clone(),
                    source,
                })?;
                command.stdin(Stdio::from(file));
            }
            None => {
                command.stdin(Stdio::null());
            }
        }

        debug!(command = %spec, cwd = %self.working_dir.display(), "spawning command");
        let output = command.output().map_err(|source| ProcessError::Spawn {
            command: spec.to_string(),
            source,
        })?;
        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(command = %spec, code = ?result.code, "command finished");
        Ok(result)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;

    use super::*;

    /// Minimal in-crate fake; the full scripted executor lives in `airlift-testharness`.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingExecutor {
        pub(crate) calls: RefCell<Vec<CommandSpec>>,
        pub(crate) fail_token: Option<(&'static str, i32)>,
        pub(crate) stdout: String,
    }

    impl RecordingExecutor {
        pub(crate) fn failing_on(token: &'static str, code: i32) -> Self {
            Self {
                fail_token: Some((token, code)),
                ..Self::default()
            }
        }

        pub(crate) fn last(&self) -> CommandSpec {
            self.calls
                .borrow()
                .last()
                .cloned()
                .expect("at least one command recorded")
        }
    }

    impl CommandExecutor for RecordingExecutor {
        fn execute(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
            self.calls.borrow_mut().push(spec.clone());
            match self.fail_token {
                Some((token, code)) if spec.has_token(token) => {
                    Ok(CommandOutput::failure(code, "scripted failure"))
                }
                _ => Ok(CommandOutput::success().with_stdout(self.stdout.clone())),
            }
        }
    }
}
