// crates/mtp-sim/src/log.rs

use std::fmt::Write;

/// Trait for structs that provide metadata for logging
pub trait LogMetadata {
    fn meta(&self) -> String;
}

/// Context attached to log lines that concern a single tag.
pub struct TagContext<'a> {
    pub component: &'static str,
    pub key: &'a str,
}

impl LogMetadata for TagContext<'_> {
    fn meta(&self) -> String {
        let mut out = String::with_capacity(self.component.len() + self.key.len() + 16);
        let _ = write!(out, "component={}, key={}", self.component, self.key);
        out
    }
}

// =============================================
// Logging Macros (namespaced under crate::log)
// =============================================
//
// The plain-format arm comes first: a format literal followed by literal
// arguments must never be mistaken for a context expression.

// ===== sim_info! =====
macro_rules! sim_info {
    ($fmt:literal $(, $($arg:tt)+)?) => {{
        log::info!($fmt $(, $($arg)+)?);
    }};
    ($ctx:expr, $fmt:literal $(, $($arg:tt)+)?) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        log::info!(concat!("[{}] ", $fmt), meta $(, $($arg)+)?);
    }};
}

// ===== sim_warn! =====
macro_rules! sim_warn {
    ($fmt:literal $(, $($arg:tt)+)?) => {{
        log::warn!($fmt $(, $($arg)+)?);
    }};
    ($ctx:expr, $fmt:literal $(, $($arg:tt)+)?) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        log::warn!(concat!("[{}] ", $fmt), meta $(, $($arg)+)?);
    }};
}

// ===== sim_error! =====
macro_rules! sim_error {
    ($fmt:literal $(, $($arg:tt)+)?) => {{
        log::error!($fmt $(, $($arg)+)?);
    }};
    ($ctx:expr, $fmt:literal $(, $($arg:tt)+)?) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        log::error!(concat!("[{}] ", $fmt), meta $(, $($arg)+)?);
    }};
}

// ===== sim_debug! =====
macro_rules! sim_debug {
    ($fmt:literal $(, $($arg:tt)+)?) => {{
        log::debug!($fmt $(, $($arg)+)?);
    }};
    ($ctx:expr, $fmt:literal $(, $($arg:tt)+)?) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        log::debug!(concat!("[{}] ", $fmt), meta $(, $($arg)+)?);
    }};
}

// ===== sim_trace! =====
macro_rules! sim_trace {
    ($fmt:literal $(, $($arg:tt)+)?) => {{
        log::trace!($fmt $(, $($arg)+)?);
    }};
    ($ctx:expr, $fmt:literal $(, $($arg:tt)+)?) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        log::trace!(concat!("[{}] ", $fmt), meta $(, $($arg)+)?);
    }};
}

// Re-export macros for use in other files
pub(crate) use sim_debug;
pub(crate) use sim_error;
pub(crate) use sim_info;
pub(crate) use sim_trace;
pub(crate) use sim_warn;
