//! ---
//! airlift_section: "04-lifecycle-orchestration"
//! airlift_subsection: "module"
//! airlift_type: "source"
//! airlift_scope: "code"
//! airlift_description: "Airflow metadata initialization and admin account creation."
//! airlift_version: "v0.1.0"
//! airlift_owner: "tbd"
//! ---
use std::fmt;

use airlift_common::config::{AdminCredential, BootstrapConfig};
use tracing::{info, warn};

use crate::error::ProcessError;
use crate::executor::{CommandExecutor, CommandOutput, CommandSpec};
use crate::stack::StackController;

/// Result of the admin-creation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminOutcome {
    Created,
    /// The tool exited cleanly but reported the account was already there.
    AlreadyExists,
}

impl fmt::Display for AdminOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminOutcome::Created => f.write_str("created"),
            AdminOutcome::AlreadyExists => f.write_str("already exists"),
        }
    }
}

/// Runs the Airflow CLI in throwaway webserver containers.
pub struct BootstrapInitializer<'a, E: ?Sized> {
    stack: StackController<'a, E>,
    service: &'a str,
    config: &'a BootstrapConfig,
}

impl<'a, E: CommandExecutor + ?Sized> BootstrapInitializer<'a, E> {
    pub fn new(stack: StackController<'a, E>, service: &'a str, config: &'a BootstrapConfig) -> Self {
        Self {
            stack,
            service,
            config,
        }
    }

    /// Initialize the Airflow metadata database.
    pub fn init_metadata(&self) -> Result<CommandOutput, ProcessError> {
        let command = CommandSpec::from_argv(&self.config.init_command)
            .unwrap_or_else(|| CommandSpec::new("airflow").args(["db", "init"]));
        info!(service = self.service, command = %command, "initializing metadata database");
        self.stack.run_once(self.service, &command)
    }

    /// Create the administrative account. The password is never logged.
    pub fn create_admin(&self, admin: &AdminCredential) -> Result<AdminOutcome, ProcessError> {
        let command = admin_command(admin);
        info!(service = self.service, username = %admin.username, "creating admin account");
        let output = self.stack.run_once(self.service, &command)?;
        let outcome = classify_admin_output(&output);
        if outcome == AdminOutcome::AlreadyExists {
            warn!(username = %admin.username, "admin account already present");
        }
        Ok(outcome)
    }
}

fn admin_command(admin: &AdminCredential) -> CommandSpec {
    CommandSpec::new("airflow")
        .args(["users", "create"])
        .arg("--username")
        .arg(admin.username.as_str())
        .arg("--firstname")
        .arg(admin.firstname.as_str())
        .arg("--lastname")
        .arg(admin.lastname.as_str())
        .arg("--role")
        .arg(admin.role.as_str())
        .arg("--email")
        .arg(admin.email.as_str())
        .arg("--password")
        .secret_arg(admin.password.as_str())
}

fn classify_admin_output(output: &CommandOutput) -> AdminOutcome {
    let mentions_existing = |text: &str| text.to_ascii_lowercase().contains("already exist");
    if mentions_existing(&output.stdout) || mentions_existing(&output.stderr) {
        AdminOutcome::AlreadyExists
    } else {
        AdminOutcome::Created
    }
}
