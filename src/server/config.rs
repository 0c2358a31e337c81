// RTMP server configuration

use std::time::Duration;

use crate::{
    log::Logger,
    rtmp::{RTMP_CHUNK_SIZE, RTMP_MAX_MESSAGE_LENGTH},
    utils::{get_env_bool, get_env_string, get_env_u32},
};

/// Largest outbound chunk size accepted in the configuration
const MAX_OUT_CHUNK_SIZE: u32 = 65536;

/// Worker ids must fit in 10 bits
const MAX_SERVER_ID: u32 = 1023;

/// RTMP server configuration
#[derive(Clone, Debug)]
pub struct RtmpServerConfiguration {
    /// Port
    pub port: u32,

    /// Bind address
    pub bind_address: String,

    /// Outbound RTMP chunk size
    pub chunk_size: u32,

    /// Timeout for every read on a session
    pub read_timeout: Duration,

    /// Timeout for every write on a session
    pub write_timeout: Duration,

    /// Number of accept workers
    pub accept_workers: usize,

    /// Server identity, used as worker id of the unique ID source
    pub server_id: u32,

    /// Largest inbound message accepted
    pub max_message_size: usize,

    /// Capacity of the outbound queue of every player
    pub player_queue_size: usize,

    /// True to log requests
    pub log_requests: bool,
}

impl Default for RtmpServerConfiguration {
    fn default() -> Self {
        RtmpServerConfiguration {
            port: 1935,
            bind_address: "".to_string(),
            chunk_size: RTMP_CHUNK_SIZE as u32,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            accept_workers: default_accept_workers(),
            server_id: 1,
            max_message_size: RTMP_MAX_MESSAGE_LENGTH,
            player_queue_size: 256,
            log_requests: true,
        }
    }
}

fn default_accept_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl RtmpServerConfiguration {
    /// Loads the configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `logger` - Logger to report invalid values
    ///
    /// # Return value
    ///
    /// Returns Err(()) after logging the first invalid variable
    pub fn load_from_env(logger: &Logger) -> Result<RtmpServerConfiguration, ()> {
        let defaults = RtmpServerConfiguration::default();

        let port = get_env_u32("RTMP_PORT", defaults.port);

        if port == 0 || port > 65535 {
            logger.log_error(&format!("RTMP_PORT has an invalid value: {}", port));
            return Err(());
        }

        let bind_address = get_env_string("BIND_ADDRESS", "");

        let chunk_size = get_env_u32("RTMP_CHUNK_SIZE", defaults.chunk_size);

        if !(RTMP_CHUNK_SIZE as u32..=MAX_OUT_CHUNK_SIZE).contains(&chunk_size) {
            logger.log_error(&format!(
                "RTMP_CHUNK_SIZE has an invalid value: {}. Valid range: {}..{}",
                chunk_size, RTMP_CHUNK_SIZE, MAX_OUT_CHUNK_SIZE
            ));
            return Err(());
        }

        let read_timeout = get_env_u32("RTMP_READ_TIMEOUT", 30);
        let write_timeout = get_env_u32("RTMP_WRITE_TIMEOUT", 30);

        if read_timeout == 0 || write_timeout == 0 {
            logger.log_error("RTMP_READ_TIMEOUT and RTMP_WRITE_TIMEOUT must be greater than 0");
            return Err(());
        }

        let accept_workers = get_env_u32("ACCEPT_WORKERS", defaults.accept_workers as u32);

        if accept_workers == 0 {
            logger.log_error("ACCEPT_WORKERS must be greater than 0");
            return Err(());
        }

        let server_id = get_env_u32("SERVER_ID", defaults.server_id);

        if server_id > MAX_SERVER_ID {
            logger.log_error(&format!(
                "SERVER_ID has an invalid value: {}. Max value: {}",
                server_id, MAX_SERVER_ID
            ));
            return Err(());
        }

        let max_message_size =
            get_env_u32("MAX_MESSAGE_SIZE", defaults.max_message_size as u32) as usize;

        if max_message_size == 0 || max_message_size > RTMP_MAX_MESSAGE_LENGTH {
            logger.log_error(&format!(
                "MAX_MESSAGE_SIZE has an invalid value: {}",
                max_message_size
            ));
            return Err(());
        }

        let player_queue_size =
            get_env_u32("PLAYER_QUEUE_SIZE", defaults.player_queue_size as u32) as usize;

        if player_queue_size == 0 {
            logger.log_error("PLAYER_QUEUE_SIZE must be greater than 0");
            return Err(());
        }

        let log_requests = get_env_bool("LOG_REQUESTS", true);

        Ok(RtmpServerConfiguration {
            port,
            bind_address,
            chunk_size,
            read_timeout: Duration::from_secs(read_timeout as u64),
            write_timeout: Duration::from_secs(write_timeout as u64),
            accept_workers: accept_workers as usize,
            server_id,
            max_message_size,
            player_queue_size,
            log_requests,
        })
    }

    /// Gets the address for listening
    pub fn get_tcp_listen_addr(&self) -> String {
        let bind_address = if self.bind_address.is_empty() {
            "0.0.0.0"
        } else {
            self.bind_address.as_str()
        };

        format!("{}:{}", bind_address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_addr() {
        let mut config = RtmpServerConfiguration::default();

        assert_eq!(config.get_tcp_listen_addr(), "0.0.0.0:1935");

        config.bind_address = "127.0.0.1".to_string();
        config.port = 19350;

        assert_eq!(config.get_tcp_listen_addr(), "127.0.0.1:19350");
    }
}
