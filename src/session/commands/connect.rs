// Connect command

use chrono::Utc;
use tokio::io::AsyncWrite;

use crate::{
    log::Logger,
    rtmp::{
        rtmp_make_connect_response, rtmp_make_peer_bandwidth_set_message,
        rtmp_make_stream_status_message, rtmp_make_window_ack, RtmpCommand, RTMP_CHUNK_SIZE,
        RTMP_PEER_BANDWIDTH, RTMP_PEER_BANDWIDTH_DYNAMIC, RTMP_WINDOW_ACK, STREAM_BEGIN,
    },
    server::{HandlerDecision, RtmpServerContext, SessionHandle},
    session::{RtmpSessionMessage, SessionError, SessionReadThreadContext, SessionState, SessionWriter},
};

/// Handles RTMP command: CONNECT
///
/// # Arguments
///
/// * `logger` - The session logger
/// * `server_context` - The server context
/// * `session_context` - The session context
/// * `writer` - The session writer
/// * `cmd` - The command
pub async fn handle_rtmp_command_connect<TW: AsyncWrite + Send + Unpin + 'static>(
    logger: &Logger,
    server_context: &RtmpServerContext,
    session_context: &mut SessionReadThreadContext,
    writer: &SessionWriter<TW>,
    cmd: &RtmpCommand,
) -> Result<(), SessionError> {
    if session_context.status.state != SessionState::Handshaken {
        return Err(SessionError::protocol(
            "connect received, but already connected",
        ));
    }

    // Load and validate parameters

    let cmd_obj = cmd
        .get_argument("cmdObj")
        .ok_or_else(|| SessionError::protocol("connect: cmdObj argument not provided"))?;

    let app = cmd_obj
        .get_object_property("app")
        .and_then(|a| a.as_string())
        .ok_or_else(|| SessionError::protocol("connect: app property not provided"))?
        .to_string();

    let object_encoding = cmd_obj
        .get_object_property("objectEncoding")
        .and_then(|oe| oe.as_number())
        .unwrap_or(0.0);

    let trans_id = cmd.get_transaction_id();

    // Ask the handler

    let handle = SessionHandle::new(
        session_context.id,
        session_context.peer_addr,
        &app,
        object_encoding,
        server_context.registry.clone(),
        session_context.session_msg_sender.clone(),
    );

    if let HandlerDecision::Reject(reason) = server_context.handler.on_connect(&handle) {
        return Err(SessionError::Rejected(reason));
    }

    // Respond

    {
        let mut write_stream = writer.lock().await;

        write_stream
            .write_bytes(&rtmp_make_window_ack(RTMP_WINDOW_ACK))
            .await?;

        write_stream
            .write_bytes(&rtmp_make_peer_bandwidth_set_message(
                RTMP_PEER_BANDWIDTH,
                RTMP_PEER_BANDWIDTH_DYNAMIC,
            ))
            .await?;

        write_stream
            .write_bytes(&rtmp_make_stream_status_message(STREAM_BEGIN, 0))
            .await?;

        let connect_response_bytes =
            rtmp_make_connect_response(trans_id, object_encoding, write_stream.out_chunk_size());
        write_stream.write_bytes(&connect_response_bytes).await?;

        let chunk_size = server_context.config.chunk_size;

        if chunk_size as usize != RTMP_CHUNK_SIZE {
            write_stream.set_out_chunk_size(chunk_size).await?;
        }
    }

    // Update the session status

    let status = &mut session_context.status;

    status.state.transition(SessionState::Connected)?;
    status.app = app;
    status.object_encoding = object_encoding;
    status.connect_time = Utc::now().timestamp_millis();
    status.handle = Some(handle);

    // Start the pings
    _ = session_context
        .session_msg_sender
        .send(RtmpSessionMessage::Connected)
        .await;

    if server_context.config.log_requests && logger.config.info_enabled {
        logger.log_info(&format!(
            "Connected: app={}, objectEncoding={}",
            status.app, status.object_encoding
        ));
    }

    Ok(())
}
