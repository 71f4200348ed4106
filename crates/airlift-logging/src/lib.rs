//! ---
//! airlift_section: "03-logging"
//! airlift_subsection: "module"
//! airlift_type: "source"
//! airlift_scope: "code"
//! airlift_description: "Structured logging adapters for lifecycle events."
//! airlift_version: "v0.1.0"
//! airlift_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Lifecycle-aware logging helpers: a small context carried through every
//! orchestration step and a standard success/fault event.

use tracing::Level;

pub mod macros;

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Composite operation being executed (`start`, `reset`, ...).
    pub operation: Option<&'a str>,
    /// Step within the operation.
    pub step: Option<&'a str>,
    /// Compose service the step targets, if any.
    pub service: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an operation name.
    pub fn with_operation(mut self, operation: &'a str) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Attach a step name.
    pub fn with_step(mut self, step: &'a str) -> Self {
        self.step = Some(step);
        self
    }

    /// Attach a compose service name.
    pub fn with_service(mut self, service: &'a str) -> Self {
        self.service = Some(service);
        self
    }
}

/// High-level outcome used when emitting lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEventOutcome {
    /// The operation completed successfully.
    Success,
    /// The operation failed or was aborted.
    Fault,
}

impl SystemEventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            SystemEventOutcome::Success => "success",
            SystemEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized lifecycle event with a success/fault outcome.
pub fn log_system_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: SystemEventOutcome,
) {
    let default = LogContext::default();
    let ctx = context.unwrap_or(&default);
    // `tracing::event!` needs a constant level, hence the two arms.
    match outcome {
        SystemEventOutcome::Success => tracing::event!(
            Level::INFO,
            event,
            outcome = outcome.as_str(),
            operation = ctx.operation.unwrap_or(""),
            step = ctx.step.unwrap_or(""),
            service = ctx.service.unwrap_or(""),
            message = %message
        ),
        SystemEventOutcome::Fault => tracing::event!(
            Level::ERROR,
            event,
            outcome = outcome.as_str(),
            operation = ctx.operation.unwrap_or(""),
            step = ctx.step.unwrap_or(""),
            service = ctx.service.unwrap_or(""),
            message = %message
        ),
    }
}
