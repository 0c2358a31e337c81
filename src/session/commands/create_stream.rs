// Create stream command

use tokio::io::AsyncWrite;

use crate::{
    log::Logger,
    rtmp::{rtmp_make_create_stream_response, RtmpCommand},
    server::{HandlerDecision, RtmpServerContext},
    session::{SessionError, SessionReadThreadContext, SessionState, SessionWriter},
};

/// Handles RTMP command: createStream
///
/// # Arguments
///
/// * `logger` - The session logger
/// * `server_context` - The server context
/// * `session_context` - The session context
/// * `writer` - The session writer
/// * `cmd` - The command
pub async fn handle_rtmp_command_create_stream<TW: AsyncWrite + Send + Unpin + 'static>(
    logger: &Logger,
    server_context: &RtmpServerContext,
    session_context: &mut SessionReadThreadContext,
    writer: &SessionWriter<TW>,
    cmd: &RtmpCommand,
) -> Result<(), SessionError> {
    let stream_id = server_context.registry.next_stream_id();

    if let Some(handle) = &session_context.status.handle {
        if let HandlerDecision::Reject(reason) =
            server_context.handler.on_create_stream(handle, stream_id)
        {
            return Err(SessionError::Rejected(reason));
        }
    }

    session_context.status.streams.insert(stream_id);
    session_context
        .status
        .state
        .transition(SessionState::Streaming)?;

    let trans_id = cmd.get_transaction_id();

    writer
        .write_chunked(|out_chunk_size| {
            rtmp_make_create_stream_response(trans_id, stream_id, out_chunk_size)
        })
        .await?;

    if server_context.config.log_requests && logger.config.debug_enabled {
        logger.log_debug(&format!("Created stream {}", stream_id));
    }

    Ok(())
}
