//! ---
//! airlift_section: "04-lifecycle-orchestration"
//! airlift_subsection: "module"
//! airlift_type: "source"
//! airlift_scope: "code"
//! airlift_description: "Application schema provisioning into the Postgres service."
//! airlift_version: "v0.1.0"
//! airlift_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use airlift_common::config::DatabaseConfig;
use tracing::info;

use crate::error::StepError;
use crate::executor::{CommandExecutor, CommandOutput, CommandSpec};
use crate::readiness::{wait_until, Readiness, ReadinessPolicy, Sleeper};
use crate::stack::StackController;

/// A DDL file that has been confirmed to exist on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDocument {
    path: PathBuf,
    size_bytes: u64,
}

impl SchemaDocument {
    /// Confirm the schema file exists before anything touches the database.
    pub fn locate(path: impl Into<PathBuf>) -> Result<Self, StepError> {
        let path = path.into();
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(Self {
                size_bytes: meta.len(),
                path,
            }),
            _ => Err(StepError::SchemaNotFound(path)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

/// Applies a [`SchemaDocument`] with `psql` inside the database service.
pub struct SchemaProvisioner<'a, E: ?Sized> {
    stack: StackController<'a, E>,
    service: &'a str,
    database: &'a DatabaseConfig,
}

impl<'a, E: CommandExecutor + ?Sized> SchemaProvisioner<'a, E> {
    pub fn new(stack: StackController<'a, E>, service: &'a str, database: &'a DatabaseConfig) -> Self {
        Self {
            stack,
            service,
            database,
        }
    }

    pub fn start_database(&self) -> Result<CommandOutput, StepError> {
        Ok(self.stack.start_service(self.service)?)
    }

    fn readiness_probe(&self) -> CommandSpec {
        CommandSpec::new("pg_isready")
            .args(["-U", self.database.user.as_str()])
            .args(["-d", self.database.name.as_str()])
    }

    /// Poll `pg_isready` until the server accepts connections.
    pub fn wait_until_ready<S: Sleeper + ?Sized>(
        &self,
        policy: &ReadinessPolicy,
        sleeper: &S,
    ) -> Result<Readiness, StepError> {
        let probe = self.readiness_probe();
        wait_until(policy, sleeper, self.service, || {
            Ok(self.stack.probe(self.service, &probe)?.is_success())
        })
    }

    /// Stream the DDL into `psql`, aborting on the first error.
    pub fn apply(&self, schema: &SchemaDocument) -> Result<CommandOutput, StepError> {
        let mut psql = CommandSpec::new("psql")
            .args(["-v", "ON_ERROR_STOP=1"])
            .args(["-U", self.database.user.as_str()])
            .args(["-d", self.database.name.as_str()]);
        if self.database.transactional {
            psql = psql.arg("--single-transaction");
        }
        info!(
            service = self.service,
            schema = %schema.path().display(),
            bytes = schema.size_bytes(),
            "applying schema"
        );
        Ok(self
            .stack
            .exec_with_input(self.service, &psql, schema.path())?)
    }
}
