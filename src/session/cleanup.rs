// Session cleanup logic

use crate::{log::Logger, server::RtmpServerContext};

use super::{RtmpSessionStatus, SessionState};

/// Performs session cleanup.
/// Unregisters the published stream, stops playing and tells the handler.
///
/// # Arguments
///
/// * `logger` - The session logger
/// * `server_context` - The server context
/// * `session_id` - Session ID
/// * `status` - Session status
pub fn do_session_cleanup(
    logger: &Logger,
    server_context: &RtmpServerContext,
    session_id: u64,
    status: &mut RtmpSessionStatus,
) {
    if let Some(publishing) = status.publishing.take() {
        let stream = publishing.stream;

        server_context
            .registry
            .remove_if_owner(&stream.name, stream.id);
        stream.close();

        if logger.config.info_enabled {
            logger.log_info(&format!(
                "UNPUBLISH ({}): '{}' (stream #{})",
                publishing.stream_id, stream.name, stream.id
            ));
        }
    }

    if let Some(playing) = status.playing.take() {
        playing.stream.remove_player(session_id);
    }

    if let Some(handle) = status.handle.take() {
        server_context.handler.on_close(&handle);
    }

    status.streams.clear();

    // Fails only if already closed
    _ = status.state.transition(SessionState::Closed);
}
