// Log config

use std::{fs::File, sync::Arc};

use parking_lot::Mutex;

use crate::utils::{get_env_bool, get_env_string, get_env_u32};

/// Default verbosity: error, warning and info
const LOG_LEVEL_DEFAULT: u32 = 2;

/// Where log lines are written
#[derive(Clone)]
pub enum LogDestination {
    Stdout,
    Stderr,
    File(Arc<Mutex<File>>),
}

/// Logger configuration
#[derive(Clone)]
pub struct LogConfig {
    // Prefix for all the logs
    pub prefix: String,

    // Destination of the log lines
    pub destination: LogDestination,

    // Error messages enabled?
    pub error_enabled: bool,

    // Warning messages enabled?
    pub warning_enabled: bool,

    // Info messages enabled?
    pub info_enabled: bool,

    // Debug messages enabled?
    pub debug_enabled: bool,

    // Trace messages enabled?
    pub trace_enabled: bool,
}

impl LogConfig {
    /// Loads the log configuration from environment variables
    ///
    /// LOG_LEVEL sets the base verbosity (0 = error .. 4 = trace),
    /// then LOG_ERROR, LOG_WARNING, LOG_INFO, LOG_DEBUG and LOG_TRACE
    /// may override each level individually.
    ///
    /// LOG_FILE selects the destination: stdout (default), stderr or a file path
    ///
    /// # Return value
    ///
    /// Returns an error message if the log file cannot be opened
    pub fn load_from_env() -> Result<LogConfig, String> {
        let level = get_env_u32("LOG_LEVEL", LOG_LEVEL_DEFAULT);

        let log_file = get_env_string("LOG_FILE", "stdout");

        let destination = match log_file.as_str() {
            "" | "stdout" => LogDestination::Stdout,
            "stderr" => LogDestination::Stderr,
            path => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| format!("Could not open log file {}: {}", path, e))?;

                LogDestination::File(Arc::new(Mutex::new(file)))
            }
        };

        Ok(LogConfig {
            prefix: "".to_string(),
            destination,
            error_enabled: get_env_bool("LOG_ERROR", true),
            warning_enabled: get_env_bool("LOG_WARNING", level >= 1),
            info_enabled: get_env_bool("LOG_INFO", level >= 2),
            debug_enabled: get_env_bool("LOG_DEBUG", level >= 3),
            trace_enabled: get_env_bool("LOG_TRACE", level >= 4),
        })
    }

    /// Creates a child configuration for a child logger
    ///
    /// The prefix parameter will be appended to the parent's prefix
    ///
    /// Returns a new configuration for the child logger
    pub fn child_config(&self, prefix: &str) -> LogConfig {
        LogConfig {
            prefix: format!("{}{}", self.prefix, prefix),
            destination: self.destination.clone(),
            error_enabled: self.error_enabled,
            warning_enabled: self.warning_enabled,
            info_enabled: self.info_enabled,
            debug_enabled: self.debug_enabled,
            trace_enabled: self.trace_enabled,
        }
    }
}
