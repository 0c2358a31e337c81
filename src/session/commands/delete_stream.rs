// Delete stream command

use tokio::io::AsyncWrite;

use crate::{
    log::Logger,
    rtmp::RtmpCommand,
    server::RtmpServerContext,
    session::{SessionError, SessionReadThreadContext, SessionWriter},
};

use super::end_stream_usage;

/// Handles RTMP command: deleteStream
///
/// # Arguments
///
/// * `logger` - The session logger
/// * `server_context` - The server context
/// * `session_context` - The session context
/// * `writer` - The session writer
/// * `cmd` - The command
pub async fn handle_rtmp_command_delete_stream<TW: AsyncWrite + Send + Unpin + 'static>(
    logger: &Logger,
    server_context: &RtmpServerContext,
    session_context: &mut SessionReadThreadContext,
    writer: &SessionWriter<TW>,
    cmd: &RtmpCommand,
) -> Result<(), SessionError> {
    let stream_id = match cmd.get_argument("streamId").and_then(|s| s.as_number()) {
        Some(id) if id >= 0.0 => id as u32,
        _ => return Err(SessionError::protocol("deleteStream: invalid stream ID")),
    };

    end_stream_usage(logger, server_context, session_context, writer, stream_id).await?;

    session_context.status.streams.remove(&stream_id);

    Ok(())
}
