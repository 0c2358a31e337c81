// Packet handling logic

use byteorder::{BigEndian, ByteOrder};
use tokio::io::AsyncWrite;

use crate::{
    log::Logger,
    rtmp::{
        rtmp_make_ping_response, RtmpPacket, PING_REQUEST, RTMP_TYPE_ABORT,
        RTMP_TYPE_ACKNOWLEDGEMENT, RTMP_TYPE_AGGREGATE, RTMP_TYPE_AUDIO, RTMP_TYPE_DATA,
        RTMP_TYPE_EVENT, RTMP_TYPE_FLEX_MESSAGE, RTMP_TYPE_FLEX_OBJECT, RTMP_TYPE_FLEX_STREAM,
        RTMP_TYPE_INVOKE, RTMP_TYPE_SET_CHUNK_SIZE, RTMP_TYPE_SET_PEER_BANDWIDTH,
        RTMP_TYPE_SHARED_OBJECT, RTMP_TYPE_VIDEO, RTMP_TYPE_WINDOW_ACKNOWLEDGEMENT_SIZE,
    },
    server::RtmpServerContext,
};

use super::{
    handle_rtmp_packet_invoke, handle_rtmp_packet_media, SessionError, SessionReadThreadContext,
    SessionWriter,
};

fn read_control_u32(packet: &RtmpPacket) -> Result<u32, SessionError> {
    if packet.payload.len() < 4 {
        return Err(SessionError::protocol(format!(
            "control message of type {} is too short",
            packet.header.packet_type
        )));
    }

    Ok(BigEndian::read_u32(&packet.payload[0..4]))
}

/// Handles a complete RTMP packet (message)
///
/// # Arguments
///
/// * `logger` - The session logger
/// * `server_context` - The server context
/// * `session_context` - The session context
/// * `writer` - The session writer
/// * `packet` - The packet to handle
///
/// # Return value
///
/// Returns Ok to keep reading. An error ends the session.
pub async fn handle_rtmp_packet<TW: AsyncWrite + Send + Unpin + 'static>(
    logger: &Logger,
    server_context: &RtmpServerContext,
    session_context: &mut SessionReadThreadContext,
    writer: &SessionWriter<TW>,
    packet: RtmpPacket,
) -> Result<(), SessionError> {
    match packet.header.packet_type {
        RTMP_TYPE_SET_CHUNK_SIZE => {
            let size = read_control_u32(&packet)?;

            if server_context.config.log_requests && logger.config.debug_enabled {
                logger.log_debug(&format!("Client chunk size set to {}", size));
            }

            session_context.chunk_reader.set_chunk_size(size)
        }
        RTMP_TYPE_ABORT => {
            let channel_id = read_control_u32(&packet)?;
            session_context.chunk_reader.abort(channel_id);
            Ok(())
        }
        RTMP_TYPE_WINDOW_ACKNOWLEDGEMENT_SIZE => {
            let size = read_control_u32(&packet)?;
            session_context.chunk_reader.set_ack_window(size);
            Ok(())
        }
        RTMP_TYPE_ACKNOWLEDGEMENT | RTMP_TYPE_SET_PEER_BANDWIDTH => Ok(()),
        RTMP_TYPE_EVENT => handle_user_control(logger, server_context, writer, &packet).await,
        RTMP_TYPE_AUDIO | RTMP_TYPE_VIDEO | RTMP_TYPE_AGGREGATE | RTMP_TYPE_DATA
        | RTMP_TYPE_FLEX_STREAM => {
            if !session_context.status.state.is_connected() {
                return Err(SessionError::protocol(format!(
                    "message of type {} received before connect",
                    packet.header.packet_type
                )));
            }

            handle_rtmp_packet_media(logger, server_context, session_context, packet);

            Ok(())
        }
        RTMP_TYPE_INVOKE => {
            handle_rtmp_packet_invoke(
                logger,
                server_context,
                session_context,
                writer,
                &packet,
                &packet.payload,
            )
            .await
        }
        RTMP_TYPE_FLEX_MESSAGE => {
            // AMF3 command messages start with a format byte
            let payload = packet.payload.get(1..).unwrap_or_default();

            handle_rtmp_packet_invoke(
                logger,
                server_context,
                session_context,
                writer,
                &packet,
                payload,
            )
            .await
        }
        RTMP_TYPE_SHARED_OBJECT | RTMP_TYPE_FLEX_OBJECT => {
            if server_context.config.log_requests && logger.config.debug_enabled {
                logger.log_debug("Ignored shared object message");
            }

            Ok(())
        }
        t => {
            if server_context.config.log_requests && logger.config.debug_enabled {
                logger.log_debug(&format!("Ignored message of unknown type {}", t));
            }

            Ok(())
        }
    }
}

async fn handle_user_control<TW: AsyncWrite + Send + Unpin + 'static>(
    logger: &Logger,
    server_context: &RtmpServerContext,
    writer: &SessionWriter<TW>,
    packet: &RtmpPacket,
) -> Result<(), SessionError> {
    if packet.payload.len() < 2 {
        return Err(SessionError::protocol("user control message is too short"));
    }

    let event = BigEndian::read_u16(&packet.payload[0..2]);

    if event == PING_REQUEST {
        if packet.payload.len() < 6 {
            return Err(SessionError::protocol("ping request is too short"));
        }

        let timestamp = BigEndian::read_u32(&packet.payload[2..6]);

        if server_context.config.log_requests && logger.config.trace_enabled {
            logger.log_trace(&format!("Ping request from client: {}", timestamp));
        }

        writer
            .write_bytes(&rtmp_make_ping_response(timestamp))
            .await?;
    }

    Ok(())
}
