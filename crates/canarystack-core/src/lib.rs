//! canarystack core crate.
//!
//! A growable `f64` stack whose every operation is checked by the integrity
//! membrane (`canarystack-membrane`), plus the diagnostic dump that renders
//! its internal state into a styled HTML log.

pub mod log_sink;
pub mod report;
pub mod stack;

pub use canarystack_membrane::{
    DEFAULT_CAPACITY, DiagnosticLevel, FaultStatus, Lifecycle, MINIMUM_CAPACITY, StackConfig,
    StackFault, Violation, diagnostic_level,
};
pub use log_sink::{DEFAULT_LOG_PATH, HtmlLog, LogColor, LogError, LogSink, global_html_log};
pub use report::{StackSnapshot, report};
pub use stack::{DYNAMIC_STACK_NAME, Stack, grown_capacity};
