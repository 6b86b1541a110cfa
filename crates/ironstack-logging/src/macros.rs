//! ---
//! ironstack_section: "02-logging"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Context-enriched logging macros."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
/// Emit an informational log enriched with lifecycle context.
#[macro_export]
macro_rules! stack_info {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::INFO,
            action = ctx.action.unwrap_or(""),
            phase = ctx.phase.unwrap_or(""),
            component = ctx.component.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        $crate::stack_info!(context = $crate::LogContext::default(), $($arg)+)
    }};
}

/// Emit a debug log enriched with lifecycle context.
#[macro_export]
macro_rules! stack_debug {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::DEBUG,
            action = ctx.action.unwrap_or(""),
            phase = ctx.phase.unwrap_or(""),
            component = ctx.component.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        $crate::stack_debug!(context = $crate::LogContext::default(), $($arg)+)
    }};
}

/// Emit a warning log enriched with lifecycle context.
#[macro_export]
macro_rules! stack_warn {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::WARN,
            action = ctx.action.unwrap_or(""),
            phase = ctx.phase.unwrap_or(""),
            component = ctx.component.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        $crate::stack_warn!(context = $crate::LogContext::default(), $($arg)+)
    }};
}

/// Emit an error log enriched with lifecycle context.
#[macro_export]
macro_rules! stack_error {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::ERROR,
            action = ctx.action.unwrap_or(""),
            phase = ctx.phase.unwrap_or(""),
            component = ctx.component.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        $crate::stack_error!(context = $crate::LogContext::default(), $($arg)+)
    }};
}
