// Invoke packet handling logic

use tokio::io::AsyncWrite;

use crate::{
    log::Logger,
    rtmp::{RtmpCommand, RtmpPacket},
    server::RtmpServerContext,
};

use super::{
    handle_rtmp_command_close_stream, handle_rtmp_command_connect,
    handle_rtmp_command_create_stream, handle_rtmp_command_delete_stream,
    handle_rtmp_command_play, handle_rtmp_command_publish, SessionError, SessionReadThreadContext,
    SessionWriter,
};

/// Commands accepted and ignored
const IGNORED_COMMANDS: &[&str] = &[
    "releaseStream",
    "FCPublish",
    "FCUnpublish",
    "FCSubscribe",
    "getStreamLength",
    "_checkbw",
    "receiveAudio",
    "receiveVideo",
    "pause",
    "seek",
    "call",
];

/// Handles RTMP packet (INVOKE)
///
/// # Arguments
///
/// * `logger` - The session logger
/// * `server_context` - The server context
/// * `session_context` - The session context
/// * `writer` - The session writer
/// * `packet` - The packet carrying the command
/// * `payload` - The AMF0 encoded command
pub async fn handle_rtmp_packet_invoke<TW: AsyncWrite + Send + Unpin + 'static>(
    logger: &Logger,
    server_context: &RtmpServerContext,
    session_context: &mut SessionReadThreadContext,
    writer: &SessionWriter<TW>,
    packet: &RtmpPacket,
    payload: &[u8],
) -> Result<(), SessionError> {
    let cmd = RtmpCommand::decode(payload)
        .map_err(|_| SessionError::protocol("could not decode command"))?;

    if server_context.config.log_requests && logger.config.debug_enabled {
        logger.log_debug(&format!("COMMAND: {}", cmd.to_debug_string()));
    }

    if cmd.cmd != "connect" && !session_context.status.state.is_connected() {
        return Err(SessionError::protocol(format!(
            "command {} received before connect",
            cmd.cmd
        )));
    }

    match cmd.cmd.as_str() {
        "connect" => {
            handle_rtmp_command_connect(logger, server_context, session_context, writer, &cmd)
                .await
        }
        "createStream" => {
            handle_rtmp_command_create_stream(logger, server_context, session_context, writer, &cmd)
                .await
        }
        "publish" => {
            handle_rtmp_command_publish(
                logger,
                server_context,
                session_context,
                writer,
                packet,
                &cmd,
            )
            .await
        }
        "play" => {
            handle_rtmp_command_play(
                logger,
                server_context,
                session_context,
                writer,
                packet,
                &cmd,
            )
            .await
        }
        "deleteStream" => {
            handle_rtmp_command_delete_stream(logger, server_context, session_context, writer, &cmd)
                .await
        }
        "closeStream" => {
            handle_rtmp_command_close_stream(
                logger,
                server_context,
                session_context,
                writer,
                packet,
            )
            .await
        }
        c if IGNORED_COMMANDS.contains(&c) => Ok(()),
        c => Err(SessionError::protocol(format!("unrecognized command: {}", c))),
    }
}
