// Session status

use std::{collections::HashSet, sync::Arc};

use crate::server::{SessionHandle, StreamObject};

use super::SessionState;

/// A stream this session publishes or plays
pub struct SessionStreamBinding {
    /// Message stream of this session
    pub stream_id: u32,

    /// The registered stream
    pub stream: Arc<StreamObject>,
}

/// Status of an RTMP session.
/// Owned by the read loop of the session.
pub struct RtmpSessionStatus {
    /// Protocol state
    pub state: SessionState,

    /// Application name
    pub app: String,

    /// Object encoding requested on connect
    pub object_encoding: f64,

    /// Connect timestamp (unix milliseconds)
    pub connect_time: i64,

    /// Message streams created by the client
    pub streams: HashSet<u32>,

    /// Stream being published
    pub publishing: Option<SessionStreamBinding>,

    /// Stream being played
    pub playing: Option<SessionStreamBinding>,

    /// Handle given to the server handler, set once connected
    pub handle: Option<SessionHandle>,
}

impl Default for RtmpSessionStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl RtmpSessionStatus {
    /// Creates new status for a just accepted connection
    pub fn new() -> RtmpSessionStatus {
        RtmpSessionStatus {
            state: SessionState::Accepted,
            app: "".to_string(),
            object_encoding: 0.0,
            connect_time: 0,
            streams: HashSet::new(),
            publishing: None,
            playing: None,
            handle: None,
        }
    }

    /// Checks if the session publishes on the given message stream
    pub fn is_publishing_on(&self, stream_id: u32) -> bool {
        matches!(&self.publishing, Some(p) if p.stream_id == stream_id)
    }
}
