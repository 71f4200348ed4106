//! ---
//! airlift_section: "11-test-harness"
//! airlift_subsection: "module"
//! airlift_type: "source"
//! airlift_scope: "code"
//! airlift_description: "Scripted executor and sleeper fakes for lifecycle scenarios."
//! airlift_version: "v0.1.0"
//! airlift_owner: "tbd"
//! ---
//! Test doubles for the lifecycle kernel.
//!
//! [`ScriptedExecutor`] records every command it is asked to run and answers
//! from a list of rules; [`RecordingSleeper`] records sleeps without blocking.

use std::io;
use std::time::Duration;

use airlift_lifecycle::{CommandExecutor, CommandOutput, CommandSpec, ProcessError, Sleeper};
use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug, Clone)]
enum Response {
    Output(CommandOutput),
    SpawnFailure,
}

#[derive(Debug, Clone)]
struct Rule {
    needles: Vec<String>,
    response: Response,
    remaining: Option<usize>,
}

impl Rule {
    fn matches(&self, spec: &CommandSpec) -> bool {
        self.remaining != Some(0) && self.needles.iter().all(|needle| spec.has_token(needle))
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    rules: Vec<Rule>,
    calls: Vec<CommandSpec>,
}

/// Executor fake: unmatched commands succeed with empty output.
///
/// A rule matches when every needle equals the program or one of the
/// arguments. Rules are checked in the order they were added.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    state: Mutex<ScriptState>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, needles: &[&str], response: Response, remaining: Option<usize>) -> Self {
        self.state.lock().rules.push(Rule {
            needles: needles.iter().map(|needle| (*needle).to_owned()).collect(),
            response,
            remaining,
        });
        self
    }

    /// Answer matching commands with `output`.
    pub fn respond_when(self, needles: &[&str], output: CommandOutput) -> Self {
        self.push(needles, Response::Output(output), None)
    }

    /// Answer only the next `times` matching commands with `output`.
    pub fn respond_times(self, needles: &[&str], output: CommandOutput, times: usize) -> Self {
        self.push(needles, Response::Output(output), Some(times))
    }

    /// Make matching commands exit with `code`.
    pub fn fail_when(self, needles: &[&str], code: i32) -> Self {
        let output = CommandOutput::failure(code, format!("scripted failure (exit {code})"));
        self.push(needles, Response::Output(output), None)
    }

    /// Make matching commands fail to launch.
    pub fn spawn_failure_when(self, needles: &[&str]) -> Self {
        self.push(needles, Response::SpawnFailure, None)
    }

    /// Every command executed so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.state.lock().calls.clone()
    }

    /// Executed commands rendered with secrets masked.
    pub fn rendered_calls(&self) -> Vec<String> {
        self.state.lock().calls.iter().map(ToString::to_string).collect()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Number of executed commands carrying `token`.
    pub fn calls_matching(&self, token: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|spec| spec.has_token(token))
            .count()
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn execute(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        let mut state = self.state.lock();
        state.calls.push(spec.clone());
        debug!(command = %spec, "scripted execution");
        let rule = state.rules.iter_mut().find(|rule| rule.matches(spec));
        let response = match rule {
            Some(rule) => {
                if let Some(remaining) = rule.remaining.as_mut() {
                    *remaining -= 1;
                }
                rule.response.clone()
            }
            None => Response::Output(CommandOutput::success()),
        };
        match response {
            Response::Output(output) => Ok(output),
            Response::SpawnFailure => Err(ProcessError::Spawn {
                command: spec.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "scripted launch failure"),
            }),
        }
    }
}

/// Sleeper fake that records requested durations and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }

    pub fn total(&self) -> Duration {
        self.sleeps.lock().iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
    }
}
