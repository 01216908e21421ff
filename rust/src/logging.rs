//! Verbosity-gated `tracing` events.
//!
//! A compilation carries a `verbosity` in its config. Each macro below checks
//! it before touching its arguments, then hands the message to `tracing` at a
//! matching level. The host installs whatever subscriber it likes.
//!
//! | verbosity | macro          | tracing level | what gets reported                                   |
//! |-----------|----------------|---------------|------------------------------------------------------|
//! | 0         | none           | none          | nothing; failures surface as returned errors          |
//! | 1         | `log_changes!` | `INFO`        | each compile stage, every activity placed on a resource |
//! | 2         | `log_checks!`  | `DEBUG`       | per-activity timings, resource candidates considered   |
//! | 3         | `log_debug!`   | `TRACE`       | dummy insertion and contraction, reduced edges         |

pub const VERBOSITY_SILENT: u8 = 0;
pub const VERBOSITY_CHANGES: u8 = 1;
pub const VERBOSITY_CHECKS: u8 = 2;
pub const VERBOSITY_DEBUG: u8 = 3;

#[doc(hidden)]
#[macro_export]
macro_rules! __log_gated {
    ($verbosity:expr, $threshold:expr, $level:expr, $($arg:tt)*) => {
        if $verbosity >= $threshold {
            ::tracing::event!($level, $($arg)*);
        }
    };
}

/// Stage boundaries of the compiler and scheduler placements.
#[macro_export]
macro_rules! log_changes {
    ($verbosity:expr, $($arg:tt)*) => {
        $crate::__log_gated!($verbosity, $crate::logging::VERBOSITY_CHANGES, ::tracing::Level::INFO, $($arg)*)
    };
}

/// Per-activity detail: computed times, eligibility of each resource.
#[macro_export]
macro_rules! log_checks {
    ($verbosity:expr, $($arg:tt)*) => {
        $crate::__log_gated!($verbosity, $crate::logging::VERBOSITY_CHECKS, ::tracing::Level::DEBUG, $($arg)*)
    };
}

/// Network surgery on the arrow graph.
#[macro_export]
macro_rules! log_debug {
    ($verbosity:expr, $($arg:tt)*) => {
        $crate::__log_gated!($verbosity, $crate::logging::VERBOSITY_DEBUG, ::tracing::Level::TRACE, $($arg)*)
    };
}
