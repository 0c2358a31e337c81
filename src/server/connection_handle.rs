// Connection handling logic

use std::{net::SocketAddr, sync::Arc};

use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    log::Logger,
    session::{handle_rtmp_session, SessionContext, SessionError, SessionWriter},
};

use super::RtmpServerContext;

/// Handles incoming connection (after accepting it)
///
/// # Arguments
///
/// * `logger` - The server logger
/// * `server_context` - The server context
/// * `session_id` - Unique ID of the session
/// * `read_stream` - The stream to read from the client
/// * `write_stream` - The stream to write to the client
/// * `peer_addr` - Address of the client
/// * `local_addr` - Address the connection was accepted on
pub async fn handle_connection<
    TR: AsyncRead + Send + Unpin,
    TW: AsyncWrite + Send + Unpin + 'static,
>(
    logger: Arc<Logger>,
    server_context: RtmpServerContext,
    session_id: u64,
    read_stream: TR,
    write_stream: TW,
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
) {
    let config = server_context.config.clone();

    // Create a logger for the session
    let session_logger = Arc::new(logger.make_child_logger(&format!("[#{}] ", session_id)));

    if config.log_requests && session_logger.config.info_enabled {
        session_logger.log_info(&format!("Accept {} -> {}", peer_addr, local_addr));
    }

    let writer = Arc::new(SessionWriter::new(write_stream, config.write_timeout));

    let result = handle_rtmp_session(
        session_logger.clone(),
        server_context,
        SessionContext {
            id: session_id,
            peer_addr,
        },
        read_stream,
        writer.clone(),
    )
    .await;

    log_session_result(&session_logger, peer_addr, local_addr, &result);

    // Ensure connection is closed
    writer.shutdown().await;
}

/// Logs how a session ended
///
/// Errors are always logged with both endpoints,
/// a clean close by the client only in debug mode
fn log_session_result(
    logger: &Logger,
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
    result: &Result<(), SessionError>,
) {
    match result {
        Ok(_) => {
            if logger.config.debug_enabled {
                logger.log_debug(&format!(
                    "Connection closed by the client [{} -> {}]",
                    peer_addr, local_addr
                ));
            }
        }
        Err(e @ SessionError::Timeout(_)) => {
            if logger.config.warning_enabled {
                logger.log_warning(&format!(
                    "Session timed out [{} -> {}]: {}",
                    peer_addr, local_addr, e
                ));
            }
        }
        Err(e) => {
            if logger.config.error_enabled {
                logger.log_error(&format!(
                    "Session error [{} -> {}]: {}",
                    peer_addr, local_addr, e
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::log::LogDestination;

    #[test]
    fn test_session_errors_logged_with_endpoints() {
        let path = std::env::temp_dir().join(format!(
            "simple-rtmp-session-log-test-{}.log",
            std::process::id()
        ));

        let file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .unwrap();

        let mut config = Logger::new_disabled().config;
        config.destination = LogDestination::File(Arc::new(parking_lot::Mutex::new(file)));
        config.error_enabled = true;
        config.warning_enabled = true;

        let logger = Logger::new(config);

        let peer: SocketAddr = "10.0.0.2:50000".parse().unwrap();
        let local: SocketAddr = "10.0.0.1:1935".parse().unwrap();

        log_session_result(
            &logger,
            peer,
            local,
            &Err(SessionError::protocol("bad chunk header")),
        );
        log_session_result(&logger, peer, local, &Err(SessionError::Timeout("read")));
        log_session_result(&logger, peer, local, &Ok(()));

        let content = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert!(content.contains("[ERROR] Session error [10.0.0.2:50000 -> 10.0.0.1:1935]"));
        assert!(content.contains("bad chunk header"));
        assert!(content.contains("[WARNING] Session timed out [10.0.0.2:50000 -> 10.0.0.1:1935]"));
        assert!(!content.contains("closed by the client"));
    }
}
