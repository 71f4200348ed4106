//! ---
//! airlift_section: "05-external-interfaces"
//! airlift_subsection: "binary"
//! airlift_type: "source"
//! airlift_scope: "code"
//! airlift_description: "Lifecycle operation dispatch for the control CLI."
//! airlift_version: "v0.1.0"
//! airlift_owner: "tbd"
//! ---
use std::path::Path;

use airlift_common::{AdminCredential, StackConfig};
use airlift_lifecycle::{Lifecycle, Operation, OperationReport, SystemExecutor, ThreadSleeper};
use anyhow::Result;
use clap::Args;

/// Admin credential overrides for `init-airflow` and `start`.
#[derive(Debug, Default, Args)]
pub struct AdminArgs {
    /// Admin account name.
    #[arg(long = "admin-username", env = "AIRLIFT_ADMIN_USERNAME", value_name = "NAME")]
    username: Option<String>,

    /// Admin password.
    #[arg(
        long = "admin-password",
        env = "AIRLIFT_ADMIN_PASSWORD",
        value_name = "PASSWORD",
        hide_env_values = true
    )]
    password: Option<String>,

    /// Admin e-mail address.
    #[arg(long = "admin-email", env = "AIRLIFT_ADMIN_EMAIL", value_name = "EMAIL")]
    email: Option<String>,
}

impl AdminArgs {
    pub fn apply(self, mut admin: AdminCredential) -> AdminCredential {
        if let Some(username) = self.username {
            admin.username = username;
        }
        if let Some(password) = self.password {
            admin.password = password;
        }
        if let Some(email) = self.email {
            admin.email = email;
        }
        admin
    }
}

/// Run one operation against the real compose tool.
pub fn run(
    operation: Operation,
    config: &StackConfig,
    project_dir: &Path,
    admin: AdminCredential,
) -> Result<()> {
    let executor = SystemExecutor::new(project_dir);
    let sleeper = ThreadSleeper;
    let lifecycle = Lifecycle::new(config, project_dir, &executor, &sleeper).with_admin(admin);

    let report = lifecycle.run(operation)?;
    match &report.inspection {
        Some(output) => print!("{output}"),
        None => render_report(&report),
    }
    Ok(())
}

fn render_report(report: &OperationReport) {
    for record in &report.steps {
        match &record.detail {
            Some(detail) => println!(
                "ok  {:<18} {:>7} ms  {}",
                record.step.as_str(),
                record.elapsed.as_millis(),
                detail
            ),
            None => println!(
                "ok  {:<18} {:>7} ms",
                record.step.as_str(),
                record.elapsed.as_millis()
            ),
        }
    }
    println!(
        "{} completed in {} ms",
        report.operation.cli_name(),
        report.total_elapsed().as_millis()
    );
}
