// Log module

mod config;
mod logger;

pub use config::*;
pub use logger::*;

// The level macros check the flag before formatting the message,
// so disabled levels cost a single branch.
// Usage: log_info!(logger, format!("..."))

#[macro_export]
macro_rules! log_error {
    ($logger:expr, $msg:expr) => {
        if $logger.config.error_enabled {
            $logger.log(&format!("[ERROR] {}", $msg));
        }
    };
}

#[macro_export]
macro_rules! log_warning {
    ($logger:expr, $msg:expr) => {
        if $logger.config.warning_enabled {
            $logger.log(&format!("[WARNING] {}", $msg));
        }
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $msg:expr) => {
        if $logger.config.info_enabled {
            $logger.log(&format!("[INFO] {}", $msg));
        }
    };
}

#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $msg:expr) => {
        if $logger.config.debug_enabled {
            $logger.log(&format!("[DEBUG] {}", $msg));
        }
    };
}

#[macro_export]
macro_rules! log_trace {
    ($logger:expr, $msg:expr) => {
        if $logger.config.trace_enabled {
            $logger.log(&format!("[TRACE] {}", $msg));
        }
    };
}
