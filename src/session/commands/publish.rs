// Publish command

use std::sync::Arc;

use tokio::io::AsyncWrite;

use crate::{
    log::Logger,
    rtmp::{RtmpCommand, RtmpPacket},
    server::{HandlerDecision, RtmpServerContext, StreamObject},
    session::{
        SessionError, SessionReadThreadContext, SessionState, SessionStreamBinding, SessionWriter,
    },
};

/// Gets the stream name argument of publish or play,
/// without the query string
pub fn get_stream_name_argument(cmd: &RtmpCommand) -> &str {
    let name = match cmd.get_argument("streamName") {
        Some(n) => n.get_string(),
        None => "",
    };

    match name.split_once('?') {
        Some((n, _)) => n,
        None => name,
    }
}

/// Tells the client why the publish failed.
/// Returns the error that ends the session.
async fn reject_publish<TW: AsyncWrite + Send + Unpin + 'static>(
    writer: &SessionWriter<TW>,
    stream_id: u32,
    code: &str,
    reason: &str,
) -> SessionError {
    if let Err(e) = writer
        .send_status_message(stream_id, "error", code, Some(reason))
        .await
    {
        return e;
    }

    SessionError::Rejected(format!("publish: {}", reason))
}

/// Handles RTMP command: publish
///
/// # Arguments
///
/// * `logger` - The session logger
/// * `server_context` - The server context
/// * `session_context` - The session context
/// * `writer` - The session writer
/// * `packet` - The packet carrying the command
/// * `cmd` - The command
pub async fn handle_rtmp_command_publish<TW: AsyncWrite + Send + Unpin + 'static>(
    logger: &Logger,
    server_context: &RtmpServerContext,
    session_context: &mut SessionReadThreadContext,
    writer: &SessionWriter<TW>,
    packet: &RtmpPacket,
    cmd: &RtmpCommand,
) -> Result<(), SessionError> {
    let publish_stream_id = packet.header.stream_id;

    // Validate

    let stream_name = get_stream_name_argument(cmd);

    if stream_name.is_empty() {
        return Err(reject_publish(
            writer,
            publish_stream_id,
            "NetStream.Publish.BadName",
            "Invalid stream name",
        )
        .await);
    }

    if !session_context.status.streams.contains(&publish_stream_id) {
        return Err(reject_publish(
            writer,
            publish_stream_id,
            "NetStream.Publish.BadConnection",
            "Stream not created",
        )
        .await);
    }

    if session_context.status.publishing.is_some() {
        return Err(reject_publish(
            writer,
            publish_stream_id,
            "NetStream.Publish.BadConnection",
            "Connection already publishing",
        )
        .await);
    }

    // Register

    let stream = Arc::new(StreamObject::new(
        stream_name,
        server_context.id_source.next_id()?,
        session_context.id,
        publish_stream_id,
    ));

    if let Some(handle) = &session_context.status.handle {
        if let HandlerDecision::Reject(reason) = server_context.handler.on_publish(handle, &stream)
        {
            return Err(reject_publish(
                writer,
                publish_stream_id,
                "NetStream.Publish.BadConnection",
                &reason,
            )
            .await);
        }
    }

    if server_context.registry.try_put(stream.clone()).is_err() {
        return Err(reject_publish(
            writer,
            publish_stream_id,
            "NetStream.Publish.BadName",
            "Stream already publishing",
        )
        .await);
    }

    session_context.status.publishing = Some(SessionStreamBinding {
        stream_id: publish_stream_id,
        stream: stream.clone(),
    });
    session_context
        .status
        .state
        .transition(SessionState::Streaming)?;

    if logger.config.info_enabled {
        logger.log_info(&format!(
            "PUBLISH ({}): '{}' (stream #{})",
            publish_stream_id, stream.name, stream.id
        ));
    }

    writer
        .send_status_message(
            publish_stream_id,
            "status",
            "NetStream.Publish.Start",
            Some(&format!("{} is now published.", stream.name)),
        )
        .await
}
