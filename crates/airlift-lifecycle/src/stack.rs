//! ---
//! airlift_section: "04-lifecycle-orchestration"
//! airlift_subsection: "module"
//! airlift_type: "source"
//! airlift_scope: "code"
//! airlift_description: "Container stack control through the compose tool."
//! airlift_version: "v0.1.0"
//! airlift_owner: "tbd"
//! ---
use airlift_common::config::ComposeConfig;
use tracing::info;

use crate::error::ProcessError;
use crate::executor::{run_checked, CommandExecutor, CommandOutput, CommandSpec};

/// Thin wrapper over `docker compose` (or whatever `compose.program` names).
pub struct StackController<'a, E: ?Sized> {
    executor: &'a E,
    compose: &'a ComposeConfig,
}

impl<'a, E: CommandExecutor + ?Sized> StackController<'a, E> {
    pub fn new(executor: &'a E, compose: &'a ComposeConfig) -> Self {
        Self { executor, compose }
    }

    /// Base compose invocation including `-f`/`-p` when configured.
    pub fn compose_command(&self) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.compose.program)
            .args(self.compose.base_args.iter().cloned());
        if let Some(file) = &self.compose.file {
            spec = spec.arg("-f").arg(file.display().to_string());
        }
        if let Some(project) = &self.compose.project_name {
            spec = spec.arg("-p").arg(project.as_str());
        }
        spec
    }

    /// Stop and remove every service; `volumes` also drops named volumes and orphans.
    pub fn down(&self, volumes: bool) -> Result<CommandOutput, ProcessError> {
        let mut spec = self.compose_command().arg("down");
        if volumes {
            spec = spec.args(["--volumes", "--remove-orphans"]);
        }
        info!(volumes, "stopping stack");
        run_checked(self.executor, &spec)
    }

    /// Start every service detached.
    pub fn up(&self) -> Result<CommandOutput, ProcessError> {
        let spec = self.compose_command().args(["up", "-d"]);
        info!("starting stack");
        run_checked(self.executor, &spec)
    }

    /// Start a single service detached.
    pub fn start_service(&self, service: &str) -> Result<CommandOutput, ProcessError> {
        let spec = self.compose_command().args(["up", "-d", service]);
        info!(service, "starting service");
        run_checked(self.executor, &spec)
    }

    fn exec_command(&self, service: &str, inner: &CommandSpec) -> CommandSpec {
        self.compose_command().args(["exec", "-T", service]).nest(inner)
    }

    /// Run a command inside a running service container.
    pub fn exec(&self, service: &str, inner: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        run_checked(self.executor, &self.exec_command(service, inner))
    }

    /// Like [`exec`](Self::exec) with a host file streamed to the command's stdin.
    pub fn exec_with_input(
        &self,
        service: &str,
        inner: &CommandSpec,
        input: &std::path::Path,
    ) -> Result<CommandOutput, ProcessError> {
        let spec = self.exec_command(service, inner).stdin_file(input);
        run_checked(self.executor, &spec)
    }

    /// Run a command inside a service without treating a non-zero exit as an error.
    pub fn probe(&self, service: &str, inner: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        self.executor.execute(&self.exec_command(service, inner))
    }

    /// Run a command in a fresh, removed-afterwards container of `service`.
    pub fn run_once(&self, service: &str, inner: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        let spec = self.compose_command().args(["run", "--rm", service]).nest(inner);
        run_checked(self.executor, &spec)
    }
}
