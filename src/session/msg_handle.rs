// Writer task of a session

use std::{sync::Arc, time::Duration};

use tokio::{
    io::AsyncWrite,
    sync::mpsc::Receiver,
    time::{Instant, Interval},
};

use crate::{
    log::Logger,
    rtmp::{
        rtmp_make_ping_request, rtmp_make_stream_status_message, rtmp_media_channel,
        RTMP_PING_TIME, STREAM_EOF,
    },
    server::RtmpServerConfiguration,
};

use super::{RtmpSessionMessage, SessionError, SessionWriter};

/// Handles session message
///
/// # Arguments
///
/// * `msg` - The message
/// * `writer` - The session writer
///
/// # Return value
///
/// Returns Ok to keep running, an error if writing failed.
pub async fn handle_session_message<TW: AsyncWrite + Send + Unpin + 'static>(
    msg: RtmpSessionMessage,
    writer: &SessionWriter<TW>,
) -> Result<(), SessionError> {
    match msg {
        RtmpSessionMessage::PlayPacket { stream_id, packet } => {
            writer
                .write_chunked(|out_chunk_size| {
                    packet.create_chunks_for(
                        rtmp_media_channel(packet.header.packet_type),
                        stream_id,
                        out_chunk_size,
                    )
                })
                .await
        }
        RtmpSessionMessage::PlayStop { stream_id } => {
            let mut write_stream = writer.lock().await;

            write_stream
                .send_status_message(
                    stream_id,
                    "status",
                    "NetStream.Play.UnpublishNotify",
                    Some("Stream is now unpublished."),
                )
                .await?;

            write_stream
                .write_bytes(&rtmp_make_stream_status_message(STREAM_EOF, stream_id))
                .await
        }
        RtmpSessionMessage::Status {
            stream_id,
            level,
            code,
            description,
        } => {
            writer
                .send_status_message(stream_id, &level, &code, description.as_deref())
                .await
        }
        RtmpSessionMessage::Connected | RtmpSessionMessage::End => Ok(()),
    }
}

async fn next_ping(ping_interval: &mut Option<Interval>) {
    match ping_interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Creates a task to write session messages to the client.
/// Pings start once the session is connected.
///
/// # Arguments
///
/// * `logger` - The session logger
/// * `config` - The server configuration
/// * `writer` - The session writer
/// * `receiver` - Receiver of session messages
pub fn spawn_task_to_read_session_messages<TW: AsyncWrite + Send + Unpin + 'static>(
    logger: Arc<Logger>,
    config: Arc<RtmpServerConfiguration>,
    writer: Arc<SessionWriter<TW>>,
    mut receiver: Receiver<RtmpSessionMessage>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let ping_period = Duration::from_secs(RTMP_PING_TIME);
        let mut ping_interval: Option<Interval> = None;
        let mut connect_instant = Instant::now();

        loop {
            tokio::select! {
                msg = receiver.recv() => {
                    let msg = match msg {
                        Some(RtmpSessionMessage::End) | None => break,
                        Some(m) => m,
                    };

                    if let RtmpSessionMessage::Connected = msg {
                        connect_instant = Instant::now();
                        ping_interval = Some(tokio::time::interval_at(
                            connect_instant + ping_period,
                            ping_period,
                        ));
                        continue;
                    }

                    if let Err(e) = handle_session_message(msg, &writer).await {
                        if config.log_requests && logger.config.debug_enabled {
                            logger.log_debug(&format!("Send error: {}", e));
                        }

                        break;
                    }
                }
                _ = next_ping(&mut ping_interval) => {
                    let elapsed = connect_instant.elapsed().as_millis() as u32;

                    if config.log_requests && logger.config.trace_enabled {
                        logger.log_trace("Sending ping request to client");
                    }

                    if let Err(e) = writer.write_bytes(&rtmp_make_ping_request(elapsed)).await {
                        if config.log_requests && logger.config.debug_enabled {
                            logger.log_debug(&format!("Could not send ping request: {}", e));
                        }

                        break;
                    }
                }
            }
        }

        // Unblock the client side if writing failed
        writer.shutdown().await;
    })
}
