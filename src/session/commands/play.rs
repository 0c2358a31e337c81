// Play command

use tokio::io::AsyncWrite;

use crate::{
    log::Logger,
    rtmp::{
        rtmp_make_media_message, rtmp_make_sample_access_message, rtmp_make_stream_status_message,
        RtmpCommand, RtmpPacket, RTMP_TYPE_AUDIO, RTMP_TYPE_DATA, RTMP_TYPE_VIDEO, STREAM_BEGIN,
    },
    server::{HandlerDecision, RtmpServerContext},
    session::{
        SessionError, SessionReadThreadContext, SessionState, SessionStreamBinding, SessionWriter,
    },
};

use super::get_stream_name_argument;

/// Handles RTMP command: play
///
/// # Arguments
///
/// * `logger` - The session logger
/// * `server_context` - The server context
/// * `session_context` - The session context
/// * `writer` - The session writer
/// * `packet` - The packet carrying the command
/// * `cmd` - The command
pub async fn handle_rtmp_command_play<TW: AsyncWrite + Send + Unpin + 'static>(
    logger: &Logger,
    server_context: &RtmpServerContext,
    session_context: &mut SessionReadThreadContext,
    writer: &SessionWriter<TW>,
    packet: &RtmpPacket,
    cmd: &RtmpCommand,
) -> Result<(), SessionError> {
    let play_stream_id = packet.header.stream_id;
    let stream_name = get_stream_name_argument(cmd);

    let stream = match server_context.registry.get(stream_name) {
        Some(s) => s,
        None => {
            if server_context.config.log_requests && logger.config.debug_enabled {
                logger.log_debug(&format!("Play: stream not found: '{}'", stream_name));
            }

            return writer
                .send_status_message(
                    play_stream_id,
                    "error",
                    "NetStream.Play.StreamNotFound",
                    Some("Stream not found"),
                )
                .await;
        }
    };

    if let Some(handle) = &session_context.status.handle {
        if let HandlerDecision::Reject(reason) =
            server_context.handler.on_play(handle, &stream, play_stream_id)
        {
            writer
                .send_status_message(play_stream_id, "error", "NetStream.Play.Failed", Some(&reason))
                .await?;

            return Err(SessionError::Rejected(format!("play: {}", reason)));
        }
    }

    // A new play replaces the previous one
    if let Some(previous) = session_context.status.playing.take() {
        previous.stream.remove_player(session_context.id);
    }

    // The start sequence is written while holding the write stream,
    // so relayed packets queued after subscribing come after it.

    let mut write_stream = writer.lock().await;

    let start_info = match stream.add_player(
        session_context.id,
        play_stream_id,
        session_context.session_msg_sender.clone(),
    ) {
        Some(i) => i,
        None => {
            // Publisher left in the meantime
            return write_stream
                .send_status_message(
                    play_stream_id,
                    "error",
                    "NetStream.Play.StreamNotFound",
                    Some("Stream not found"),
                )
                .await;
        }
    };

    session_context.status.playing = Some(SessionStreamBinding {
        stream_id: play_stream_id,
        stream: stream.clone(),
    });
    session_context
        .status
        .state
        .transition(SessionState::Streaming)?;

    write_stream
        .write_bytes(&rtmp_make_stream_status_message(STREAM_BEGIN, play_stream_id))
        .await?;

    write_stream
        .send_status_message(
            play_stream_id,
            "status",
            "NetStream.Play.Reset",
            Some("Playing and resetting stream."),
        )
        .await?;

    write_stream
        .send_status_message(
            play_stream_id,
            "status",
            "NetStream.Play.Start",
            Some("Started playing stream."),
        )
        .await?;

    let out_chunk_size = write_stream.out_chunk_size();

    write_stream
        .write_bytes(&rtmp_make_sample_access_message(play_stream_id, out_chunk_size))
        .await?;

    let cached = [
        (RTMP_TYPE_DATA, &start_info.metadata),
        (RTMP_TYPE_AUDIO, &start_info.audio_sequence_header),
        (RTMP_TYPE_VIDEO, &start_info.video_sequence_header),
    ];

    for (packet_type, payload) in cached {
        if let Some(payload) = payload {
            write_stream
                .write_bytes(&rtmp_make_media_message(
                    packet_type,
                    play_stream_id,
                    payload,
                    0,
                    out_chunk_size,
                ))
                .await?;
        }
    }

    drop(write_stream);

    if logger.config.info_enabled {
        logger.log_info(&format!(
            "PLAY ({}): '{}' (stream #{})",
            play_stream_id, stream.name, stream.id
        ));
    }

    Ok(())
}
