//! ---
//! airlift_section: "04-lifecycle-orchestration"
//! airlift_subsection: "module"
//! airlift_type: "source"
//! airlift_scope: "code"
//! airlift_description: "Named composite operations executed as fail-fast step plans."
//! airlift_version: "v0.1.0"
//! airlift_owner: "tbd"
//! ---
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use airlift_common::config::{AdminCredential, StackConfig};
use airlift_logging::{
    airlift_debug, airlift_error, airlift_info, airlift_warn, log_system_event, LogContext,
    SystemEventOutcome,
};

use crate::bootstrap::{AdminOutcome, BootstrapInitializer};
use crate::error::{OperationError, StepError};
use crate::executor::{CommandExecutor, CommandSpec};
use crate::readiness::{Readiness, ReadinessPolicy, Sleeper};
use crate::schema::{SchemaDocument, SchemaProvisioner};
use crate::stack::StackController;
use crate::workdirs::{ResetReport, WorkingDirectorySet};

/// The named entry points of the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Tear the stack down, volumes included.
    Down,
    /// Tear down and empty the working directories.
    Reset,
    /// Initialize Airflow metadata and create the admin account.
    Init,
    /// Provision the application schema into Postgres.
    CreateSchema,
    /// Bring the whole stack up detached.
    Up,
    /// Run the database inspection script.
    InspectDatabase,
    /// Full bring-up from a clean slate.
    Start,
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Operation::Down,
        Operation::Reset,
        Operation::Init,
        Operation::CreateSchema,
        Operation::Up,
        Operation::InspectDatabase,
        Operation::Start,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Down => "down",
            Operation::Reset => "reset",
            Operation::Init => "init",
            Operation::CreateSchema => "create-schema",
            Operation::Up => "up",
            Operation::InspectDatabase => "ver-db",
            Operation::Start => "start",
        }
    }

    /// Name of the matching `airliftctl` subcommand and script target.
    pub fn cli_name(&self) -> &'static str {
        match self {
            Operation::Down => "down-airflow",
            Operation::Reset => "reset-airflow",
            Operation::Init => "init-airflow",
            Operation::CreateSchema => "create-schema",
            Operation::Up => "up-airflow",
            Operation::InspectDatabase => "ver-db",
            Operation::Start => "start",
        }
    }

    pub fn summary(&self) -> &'static str {
        match self {
            Operation::Down => "Stop the stack and remove its volumes",
            Operation::Reset => "Stop the stack and empty logs, dags and plugins",
            Operation::Init => "Initialize the Airflow metadata database and admin user",
            Operation::CreateSchema => "Apply the application schema to Postgres",
            Operation::Up => "Start every service in the background",
            Operation::InspectDatabase => "Run the database inspection script",
            Operation::Start => "Reset, initialize, provision and start the stack",
        }
    }

    /// Ordered steps for this operation.
    pub fn plan(&self, options: &PlanOptions) -> Vec<Step> {
        match self {
            Operation::Down => vec![Step::StackDown],
            Operation::Reset => vec![Step::StackDown, Step::ResetDirectories],
            Operation::Init => vec![Step::InitMetadata, Step::CreateAdmin],
            Operation::CreateSchema => vec![
                Step::LocateSchema,
                Step::StartDatabase,
                Step::AwaitDatabase,
                Step::ApplySchema,
            ],
            Operation::Up => vec![Step::StackUp],
            Operation::InspectDatabase => vec![Step::InspectDatabase],
            Operation::Start => {
                let mut steps = Operation::Reset.plan(options);
                steps.extend(Operation::Init.plan(options));
                if options.apply_schema {
                    steps.extend(Operation::CreateSchema.plan(options));
                }
                steps.extend(Operation::Up.plan(options));
                steps
            }
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of work inside an operation plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    StackDown,
    ResetDirectories,
    InitMetadata,
    CreateAdmin,
    LocateSchema,
    StartDatabase,
    AwaitDatabase,
    ApplySchema,
    StackUp,
    InspectDatabase,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::StackDown => "stack-down",
            Step::ResetDirectories => "reset-directories",
            Step::InitMetadata => "init-metadata",
            Step::CreateAdmin => "create-admin",
            Step::LocateSchema => "locate-schema",
            Step::StartDatabase => "start-database",
            Step::AwaitDatabase => "await-database",
            Step::ApplySchema => "apply-schema",
            Step::StackUp => "stack-up",
            Step::InspectDatabase => "inspect-database",
        }
    }

    fn service<'c>(&self, config: &'c StackConfig) -> Option<&'c str> {
        match self {
            Step::InitMetadata | Step::CreateAdmin | Step::InspectDatabase => {
                Some(config.services.webserver.as_str())
            }
            Step::StartDatabase | Step::AwaitDatabase | Step::ApplySchema => {
                Some(config.services.database.as_str())
            }
            _ => None,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Switches that shape operation plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanOptions {
    /// Include schema provisioning in `start`.
    pub apply_schema: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self { apply_schema: true }
    }
}

impl PlanOptions {
    pub fn from_config(config: &StackConfig) -> Self {
        Self {
            apply_schema: config.start.apply_schema,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub step: Step,
    pub elapsed: Duration,
    pub detail: Option<String>,
}

/// What a successful operation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationReport {
    pub operation: Operation,
    pub steps: Vec<StepRecord>,
    pub reset: Option<ResetReport>,
    pub admin: Option<AdminOutcome>,
    pub readiness: Option<Readiness>,
    /// Captured stdout of the inspection script.
    pub inspection: Option<String>,
}

impl OperationReport {
    fn new(operation: Operation) -> Self {
        Self {
            operation,
            steps: Vec::new(),
            reset: None,
            admin: None,
            readiness: None,
            inspection: None,
        }
    }

    pub fn completed_steps(&self) -> Vec<Step> {
        self.steps.iter().map(|record| record.step).collect()
    }

    pub fn total_elapsed(&self) -> Duration {
        self.steps.iter().map(|record| record.elapsed).sum()
    }
}

/// Runs operations against a configured stack.
pub struct Lifecycle<'a, E: ?Sized, S: ?Sized> {
    config: &'a StackConfig,
    project_dir: PathBuf,
    executor: &'a E,
    sleeper: &'a S,
    admin: AdminCredential,
}

impl<'a, E, S> Lifecycle<'a, E, S>
where
    E: CommandExecutor + ?Sized,
    S: Sleeper + ?Sized,
{
    pub fn new(
        config: &'a StackConfig,
        project_dir: impl Into<PathBuf>,
        executor: &'a E,
        sleeper: &'a S,
    ) -> Self {
        // Anchored once: stdin files are reopened relative to this directory.
        let project_dir = project_dir.into();
        let project_dir = std::path::absolute(&project_dir).unwrap_or(project_dir);
        Self {
            config,
            project_dir,
            executor,
            sleeper,
            admin: config.admin.clone(),
        }
    }

    /// Override the admin credential taken from configuration.
    pub fn with_admin(mut self, admin: AdminCredential) -> Self {
        self.admin = admin;
        self
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn plan(&self, operation: Operation) -> Vec<Step> {
        operation.plan(&PlanOptions::from_config(self.config))
    }

    /// Execute every step of `operation` in order, stopping at the first failure.
    ///
    /// Steps that already completed are left as they are.
    pub fn run(&self, operation: Operation) -> Result<OperationReport, OperationError> {
        let plan = self.plan(operation);
        let op_ctx = LogContext::new().with_operation(operation.as_str());
        airlift_info!(context = op_ctx, "running {} step(s)", plan.len());
        airlift_debug!(
            context = op_ctx,
            "plan {:?} in {}",
            plan.iter().map(Step::as_str).collect::<Vec<_>>(),
            self.project_dir.display()
        );

        let mut report = OperationReport::new(operation);
        let mut located: Option<SchemaDocument> = None;
        for step in plan {
            let mut ctx = op_ctx.clone().with_step(step.as_str());
            if let Some(service) = step.service(self.config) {
                ctx = ctx.with_service(service);
            }
            airlift_info!(context = ctx, "step started");
            let started = Instant::now();
            match self.run_step(step, &mut report, &mut located) {
                Ok(detail) => {
                    let elapsed = started.elapsed();
                    airlift_info!(
                        context = ctx,
                        "step finished in {} ms",
                        elapsed.as_millis()
                    );
                    if let Some(detail) = &detail {
                        airlift_debug!(context = ctx, "{}", detail);
                    }
                    report.steps.push(StepRecord {
                        step,
                        elapsed,
                        detail,
                    });
                }
                Err(source) => {
                    airlift_error!(context = ctx, "step failed: {}", source);
                    let error = OperationError {
                        operation,
                        step,
                        completed: report.completed_steps(),
                        source,
                    };
                    log_system_event(
                        Some(&ctx),
                        "lifecycle.operation",
                        &error.to_string(),
                        SystemEventOutcome::Fault,
                    );
                    return Err(error);
                }
            }
        }

        log_system_event(
            Some(&op_ctx),
            "lifecycle.operation",
            &format!(
                "{} completed {} step(s) in {} ms",
                operation,
                report.steps.len(),
                report.total_elapsed().as_millis()
            ),
            SystemEventOutcome::Success,
        );
        Ok(report)
    }

    fn stack(&self) -> StackController<'a, E> {
        StackController::new(self.executor, &self.config.compose)
    }

    fn schema_path(&self) -> PathBuf {
        let path = &self.config.database.schema_file;
        if path.is_absolute() {
            path.clone()
        } else {
            self.project_dir.join(path)
        }
    }

    fn provisioner(&self) -> SchemaProvisioner<'a, E> {
        SchemaProvisioner::new(
            self.stack(),
            &self.config.services.database,
            &self.config.database,
        )
    }

    fn bootstrap(&self) -> BootstrapInitializer<'a, E> {
        BootstrapInitializer::new(
            self.stack(),
            &self.config.services.webserver,
            &self.config.bootstrap,
        )
    }

    fn run_step(
        &self,
        step: Step,
        report: &mut OperationReport,
        located: &mut Option<SchemaDocument>,
    ) -> Result<Option<String>, StepError> {
        match step {
            Step::StackDown => {
                self.stack().down(true)?;
                Ok(None)
            }
            Step::ResetDirectories => {
                let directories =
                    WorkingDirectorySet::from_config(&self.project_dir, &self.config.directories);
                let reset = directories.reset()?;
                for warning in reset.directories.iter().flat_map(|d| d.warnings.iter()) {
                    airlift_warn!("{}", warning);
                }
                let detail = reset.summary();
                report.reset = Some(reset);
                Ok(Some(detail))
            }
            Step::InitMetadata => {
                self.bootstrap().init_metadata()?;
                Ok(None)
            }
            Step::CreateAdmin => {
                let outcome = self.bootstrap().create_admin(&self.admin)?;
                report.admin = Some(outcome);
                Ok(Some(format!("{} {}", self.admin.username, outcome)))
            }
            Step::LocateSchema => {
                let schema = SchemaDocument::locate(self.schema_path())?;
                let detail = format!(
                    "{} ({} bytes)",
                    schema.path().display(),
                    schema.size_bytes()
                );
                *located = Some(schema);
                Ok(Some(detail))
            }
            Step::StartDatabase => {
                self.provisioner().start_database()?;
                Ok(None)
            }
            Step::AwaitDatabase => {
                let policy = ReadinessPolicy::from_config(&self.config.readiness);
                let readiness = self.provisioner().wait_until_ready(&policy, self.sleeper)?;
                report.readiness = Some(readiness);
                Ok(Some(format!(
                    "ready after {} probe(s), {} ms",
                    readiness.attempts,
                    readiness.waited.as_millis()
                )))
            }
            Step::ApplySchema => {
                let schema = match located.take() {
                    Some(schema) => schema,
                    None => SchemaDocument::locate(self.schema_path())?,
                };
                self.provisioner().apply(&schema)?;
                Ok(Some(schema.path().display().to_string()))
            }
            Step::StackUp => {
                self.stack().up()?;
                Ok(None)
            }
            Step::InspectDatabase => {
                let command = CommandSpec::from_argv(&self.config.inspect.command)
                    .unwrap_or_else(|| {
                        CommandSpec::new("python").arg("/opt/airflow/scripts/ver_db.py")
                    });
                let output = self
                    .stack()
                    .exec(&self.config.services.webserver, &command)?;
                report.inspection = Some(output.stdout);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::RecordingExecutor;

    struct NoSleep;

    impl Sleeper for NoSleep {
        fn sleep(&self, _duration: Duration) {}
    }

    #[test]
    fn start_plan_composes_the_sub_operations() {
        let full = Operation::Start.plan(&PlanOptions::default());
        assert_eq!(
            full,
            vec![
                Step::StackDown,
                Step::ResetDirectories,
                Step::InitMetadata,
                Step::CreateAdmin,
                Step::LocateSchema,
                Step::StartDatabase,
                Step::AwaitDatabase,
                Step::ApplySchema,
                Step::StackUp,
            ]
        );
        let without_schema = Operation::Start.plan(&PlanOptions {
            apply_schema: false,
        });
        assert!(!without_schema.contains(&Step::ApplySchema));
        assert_eq!(without_schema.last(), Some(&Step::StackUp));
    }

    #[test]
    fn operation_names_are_unique() {
        let mut cli: Vec<_> = Operation::ALL.iter().map(Operation::cli_name).collect();
        cli.sort_unstable();
        cli.dedup();
        assert_eq!(cli.len(), Operation::ALL.len());
        assert_eq!(Operation::InspectDatabase.to_string(), "ver-db");
        assert_eq!(Step::InitMetadata.to_string(), "init-metadata");
    }

    #[test]
    fn reset_tears_down_then_empties_directories() {
        let root = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(root.path().join("dags/old")).expect("seed");
        let config = StackConfig::default();
        let executor = RecordingExecutor::default();
        let lifecycle = Lifecycle::new(&config, root.path(), &executor, &NoSleep);

        let report = lifecycle.run(Operation::Reset).expect("reset succeeds");
        assert_eq!(
            report.completed_steps(),
            vec![Step::StackDown, Step::ResetDirectories]
        );
        assert!(executor.last().has_token("--volumes"));
        let reset = report.reset.expect("reset report");
        assert_eq!(reset.directories[1].removed_entries, 1);
    }

    #[test]
    fn failing_step_stops_the_plan() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = StackConfig::default();
        let executor = RecordingExecutor::failing_on("users", 9);
        let lifecycle = Lifecycle::new(&config, root.path(), &executor, &NoSleep);

        let err = lifecycle.run(Operation::Start).expect_err("admin step fails");
        assert_eq!(err.step, Step::CreateAdmin);
        assert_eq!(
            err.completed,
            vec![Step::StackDown, Step::ResetDirectories, Step::InitMetadata]
        );
        assert_eq!(err.exit_code(), 9);
        // down, db init, users create; nothing afterwards.
        assert_eq!(executor.calls.borrow().len(), 3);
    }

    #[test]
    fn relative_project_dir_is_anchored_at_construction() {
        let config = StackConfig::default();
        let executor = RecordingExecutor::default();
        let lifecycle = Lifecycle::new(&config, "deploy", &executor, &NoSleep);
        assert!(lifecycle.project_dir().is_absolute());
        assert!(lifecycle.project_dir().ends_with("deploy"));
        let schema = lifecycle.schema_path();
        assert!(schema.is_absolute());
        assert!(schema.ends_with("deploy/sql/schema.sql"));
    }

    #[test]
    fn inspection_output_is_captured() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = StackConfig::default();
        let executor = RecordingExecutor {
            stdout: "regulations: 12 rows\n".to_owned(),
            ..RecordingExecutor::default()
        };
        let lifecycle = Lifecycle::new(&config, root.path(), &executor, &NoSleep);
        let report = lifecycle
            .run(Operation::InspectDatabase)
            .expect("inspection succeeds");
        assert_eq!(report.inspection.as_deref(), Some("regulations: 12 rows\n"));
        assert_eq!(
            executor.last().to_string(),
            "docker compose exec -T airflow-webserver python /opt/airflow/scripts/ver_db.py"
        );
    }
}
