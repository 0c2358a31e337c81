// Close stream command

use tokio::io::AsyncWrite;

use crate::{
    log::Logger,
    rtmp::RtmpPacket,
    server::RtmpServerContext,
    session::{SessionError, SessionReadThreadContext, SessionWriter},
};

/// Stops publishing or playing on a message stream of the session.
/// Does nothing if the message stream is not in use.
///
/// # Arguments
///
/// * `logger` - The session logger
/// * `server_context` - The server context
/// * `session_context` - The session context
/// * `writer` - The session writer
/// * `stream_id` - The message stream
pub async fn end_stream_usage<TW: AsyncWrite + Send + Unpin + 'static>(
    logger: &Logger,
    server_context: &RtmpServerContext,
    session_context: &mut SessionReadThreadContext,
    writer: &SessionWriter<TW>,
    stream_id: u32,
) -> Result<(), SessionError> {
    let status = &mut session_context.status;

    if status.is_publishing_on(stream_id) {
        if let Some(publishing) = status.publishing.take() {
            let stream = publishing.stream;

            server_context
                .registry
                .remove_if_owner(&stream.name, stream.id);
            stream.close();

            if logger.config.info_enabled {
                logger.log_info(&format!(
                    "UNPUBLISH ({}): '{}' (stream #{})",
                    stream_id, stream.name, stream.id
                ));
            }

            writer
                .send_status_message(
                    stream_id,
                    "status",
                    "NetStream.Unpublish.Success",
                    Some(&format!("{} is now unpublished.", stream.name)),
                )
                .await?;
        }
    }

    if matches!(&status.playing, Some(p) if p.stream_id == stream_id) {
        if let Some(playing) = status.playing.take() {
            playing.stream.remove_player(session_context.id);

            if server_context.config.log_requests && logger.config.debug_enabled {
                logger.log_debug(&format!(
                    "Stopped playing ({}): '{}'",
                    stream_id, playing.stream.name
                ));
            }

            writer
                .send_status_message(
                    stream_id,
                    "status",
                    "NetStream.Play.Stop",
                    Some("Stopped playing stream."),
                )
                .await?;
        }
    }

    Ok(())
}

/// Handles RTMP command: closeStream
/// The message stream is the one the command arrived on.
pub async fn handle_rtmp_command_close_stream<TW: AsyncWrite + Send + Unpin + 'static>(
    logger: &Logger,
    server_context: &RtmpServerContext,
    session_context: &mut SessionReadThreadContext,
    writer: &SessionWriter<TW>,
    packet: &RtmpPacket,
) -> Result<(), SessionError> {
    end_stream_usage(
        logger,
        server_context,
        session_context,
        writer,
        packet.header.stream_id,
    )
    .await
}
