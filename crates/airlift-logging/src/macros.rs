//! ---
//! airlift_section: "03-logging"
//! airlift_subsection: "module"
//! airlift_type: "source"
//! airlift_scope: "code"
//! airlift_description: "Structured logging adapters for lifecycle events."
//! airlift_version: "v0.1.0"
//! airlift_owner: "tbd"
//! ---
/// Emit an informational log enriched with lifecycle context.
#[macro_export]
macro_rules! airlift_info {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::INFO,
            operation = ctx.operation.unwrap_or(""),
            step = ctx.step.unwrap_or(""),
            service = ctx.service.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        let ctx = &$crate::LogContext::default();
        tracing::event!(
            tracing::Level::INFO,
            operation = ctx.operation.unwrap_or(""),
            step = ctx.step.unwrap_or(""),
            service = ctx.service.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit a debug log enriched with lifecycle context.
#[macro_export]
macro_rules! airlift_debug {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::DEBUG,
            operation = ctx.operation.unwrap_or(""),
            step = ctx.step.unwrap_or(""),
            service = ctx.service.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        let ctx = &$crate::LogContext::default();
        tracing::event!(
            tracing::Level::DEBUG,
            operation = ctx.operation.unwrap_or(""),
            step = ctx.step.unwrap_or(""),
            service = ctx.service.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit a warning enriched with lifecycle context.
#[macro_export]
macro_rules! airlift_warn {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::WARN,
            operation = ctx.operation.unwrap_or(""),
            step = ctx.step.unwrap_or(""),
            service = ctx.service.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        let ctx = &$crate::LogContext::default();
        tracing::event!(
            tracing::Level::WARN,
            operation = ctx.operation.unwrap_or(""),
            step = ctx.step.unwrap_or(""),
            service = ctx.service.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an error log enriched with lifecycle context.
#[macro_export]
macro_rules! airlift_error {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::ERROR,
            operation = ctx.operation.unwrap_or(""),
            step = ctx.step.unwrap_or(""),
            service = ctx.service.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        let ctx = &$crate::LogContext::default();
        tracing::event!(
            tracing::Level::ERROR,
            operation = ctx.operation.unwrap_or(""),
            step = ctx.step.unwrap_or(""),
            service = ctx.service.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}
