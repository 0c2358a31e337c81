// Logger

use std::io::Write;

use super::config::{LogConfig, LogDestination};
use chrono::{DateTime, Local};

/// Logger
pub struct Logger {
    /// Configuration
    pub config: LogConfig,
}

impl Logger {
    // Creates new logger
    pub fn new(config: LogConfig) -> Logger {
        Logger { config }
    }

    // Creates new fully disabled logger
    pub fn new_disabled() -> Logger {
        Logger {
            config: LogConfig {
                prefix: "".to_string(),
                destination: LogDestination::Stdout,
                error_enabled: false,
                warning_enabled: false,
                info_enabled: false,
                debug_enabled: false,
                trace_enabled: false,
            },
        }
    }

    /// Makes child logger
    pub fn make_child_logger(&self, prefix: &str) -> Logger {
        Logger {
            config: self.config.child_config(prefix),
        }
    }

    /// Logs a message
    pub fn log(&self, line: &str) {
        let time_local: DateTime<Local> = Local::now();
        let time_format = time_local.format("[%Y-%m-%d %H:%M:%S] ");

        match &self.config.destination {
            LogDestination::Stdout => {
                println!("{}{}{}", time_format, self.config.prefix, line);
            }
            LogDestination::Stderr => {
                eprintln!("{}{}{}", time_format, self.config.prefix, line);
            }
            LogDestination::File(file) => {
                let mut file = file.lock();
                // Nowhere left to report a failed log write
                let _ = writeln!(file, "{}{}{}", time_format, self.config.prefix, line);
            }
        }
    }

    /// Logs error message
    pub fn log_error(&self, line: &str) {
        if !self.config.error_enabled {
            return;
        }

        self.log(&format!("[ERROR] {}", line));
    }

    /// Logs warning message
    pub fn log_warning(&self, line: &str) {
        if !self.config.warning_enabled {
            return;
        }

        self.log(&format!("[WARNING] {}", line));
    }

    /// Logs info message
    pub fn log_info(&self, line: &str) {
        if !self.config.info_enabled {
            return;
        }

        self.log(&format!("[INFO] {}", line));
    }

    /// Logs debug message
    pub fn log_debug(&self, line: &str) {
        if !self.config.debug_enabled {
            return;
        }

        self.log(&format!("[DEBUG] {}", line));
    }

    /// Logs trace message
    pub fn log_trace(&self, line: &str) {
        if !self.config.trace_enabled {
            return;
        }

        self.log(&format!("[TRACE] {}", line));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_logger_extends_prefix() {
        let logger = Logger::new_disabled().make_child_logger("[SERVER] ");
        let child = logger.make_child_logger("[#1] ");

        assert_eq!(child.config.prefix, "[SERVER] [#1] ");
        assert!(!child.config.error_enabled);
    }

    #[test]
    fn test_file_destination() {
        let path = std::env::temp_dir().join(format!(
            "simple-rtmp-log-test-{}.log",
            std::process::id()
        ));

        let file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .unwrap();

        let mut config = Logger::new_disabled().config;
        config.destination = LogDestination::File(std::sync::Arc::new(parking_lot::Mutex::new(file)));
        config.info_enabled = true;

        let logger = Logger::new(config).make_child_logger("[TEST] ");

        logger.log_info("hello");
        logger.log_debug("hidden");

        let content = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert!(content.contains("[TEST] [INFO] hello"));
        assert!(!content.contains("hidden"));
    }
}
