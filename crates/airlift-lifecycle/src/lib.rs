//! ---
//! airlift_section: "04-lifecycle-orchestration"
//! airlift_subsection: "module"
//! airlift_type: "source"
//! airlift_scope: "code"
//! airlift_description: "Lifecycle orchestration kernel for the Airflow + Postgres stack."
//! airlift_version: "v0.1.0"
//! airlift_owner: "tbd"
//! ---
//! Sequencing of the environment lifecycle: stack teardown, working directory
//! reset, Airflow bootstrap, schema provisioning and startup.
//!
//! Every external program runs through a [`CommandExecutor`], so the whole
//! sequence can be driven against a fake in tests.

pub mod bootstrap;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod readiness;
pub mod schema;
pub mod stack;
pub mod workdirs;

pub use bootstrap::{AdminOutcome, BootstrapInitializer};
pub use error::{OperationError, ProcessError, StepError};
pub use executor::{run_checked, CommandExecutor, CommandOutput, CommandSpec, SystemExecutor};
pub use orchestrator::{Lifecycle, Operation, OperationReport, PlanOptions, Step, StepRecord};
pub use readiness::{wait_until, Readiness, ReadinessPolicy, Sleeper, ThreadSleeper};
pub use schema::{SchemaDocument, SchemaProvisioner};
pub use stack::StackController;
pub use workdirs::{DirectoryOutcome, DirectoryRole, ResetReport, WorkingDirectorySet};
