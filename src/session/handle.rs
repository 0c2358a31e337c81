// Logic to handle RTMP sessions

use std::sync::Arc;

use chrono::Utc;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    log::Logger,
    rtmp::rtmp_make_ack,
    server::RtmpServerContext,
};

use super::{
    do_session_cleanup, handle_rtmp_packet, perform_handshake, spawn_task_to_read_session_messages,
    ChunkReader, RtmpSessionMessage, RtmpSessionStatus, SessionContext, SessionError,
    SessionReadThreadContext, SessionState, SessionWriter,
};

/// Handles RTMP session
///
/// # Arguments
///
/// * `logger` - The session logger
/// * `server_context` - The server context
/// * `session_context` - The session context
/// * `read_stream` - The stream to read from the client
/// * `writer` - The session writer
///
/// # Return value
///
/// Returns Ok if the client closed the connection,
/// or the error that ended the session.
pub async fn handle_rtmp_session<
    TR: AsyncRead + Send + Unpin,
    TW: AsyncWrite + Send + Unpin + 'static,
>(
    logger: Arc<Logger>,
    server_context: RtmpServerContext,
    session_context: SessionContext,
    mut read_stream: TR,
    writer: Arc<SessionWriter<TW>>,
) -> Result<(), SessionError> {
    let config = server_context.config.clone();

    // Create channel for session messages

    let (msg_sender, msg_receiver) =
        tokio::sync::mpsc::channel::<RtmpSessionMessage>(config.player_queue_size.max(1));

    // Create a task to write messages

    let writer_task = spawn_task_to_read_session_messages(
        logger.clone(),
        config.clone(),
        writer.clone(),
        msg_receiver,
    );

    // Prepare read thread context

    let mut read_thread_context = SessionReadThreadContext {
        id: session_context.id,
        peer_addr: session_context.peer_addr,
        status: RtmpSessionStatus::new(),
        chunk_reader: ChunkReader::new(config.max_message_size, config.read_timeout),
        session_msg_sender: msg_sender,
    };

    let result = run_session(
        &logger,
        &server_context,
        &mut read_thread_context,
        &mut read_stream,
        &writer,
    )
    .await;

    do_session_cleanup(
        &logger,
        &server_context,
        read_thread_context.id,
        &mut read_thread_context.status,
    );

    // End of loop, make sure the writer task ends

    _ = read_thread_context
        .session_msg_sender
        .send(RtmpSessionMessage::End)
        .await;
    drop(read_thread_context);
    _ = writer_task.await;

    match result {
        Err(e) if e.is_disconnect() => Ok(()),
        r => r,
    }
}

async fn run_session<TR: AsyncRead + Send + Unpin, TW: AsyncWrite + Send + Unpin + 'static>(
    logger: &Logger,
    server_context: &RtmpServerContext,
    session_context: &mut SessionReadThreadContext,
    read_stream: &mut TR,
    writer: &SessionWriter<TW>,
) -> Result<(), SessionError> {
    ////////////////////
    //    Handshake   //
    ////////////////////

    session_context
        .status
        .state
        .transition(SessionState::Handshaking)?;

    perform_handshake(
        logger,
        read_stream,
        writer,
        server_context.config.read_timeout,
        Utc::now().timestamp() as u32,
    )
    .await?;

    session_context
        .status
        .state
        .transition(SessionState::Handshaken)?;

    if server_context.config.log_requests && logger.config.debug_enabled {
        logger.log_debug("Handshake successful. Entering main loop...");
    }

    ////////////////////
    //    Main loop   //
    ////////////////////

    loop {
        let packet = session_context.chunk_reader.read_chunk(read_stream).await?;

        if let Some(seq) = session_context.chunk_reader.take_pending_ack() {
            writer.write_bytes(&rtmp_make_ack(seq)).await?;
        }

        if let Some(packet) = packet {
            handle_rtmp_packet(logger, server_context, session_context, writer, packet).await?;
        }
    }
}
