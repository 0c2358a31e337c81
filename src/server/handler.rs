// Pluggable server behavior

use std::{net::SocketAddr, sync::Arc};

use tokio::sync::mpsc::Sender;

use crate::session::RtmpSessionMessage;

use super::{StreamObject, StreamRegistry};

/// Decision of a handler at a protocol milestone
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerDecision {
    Accept,
    Reject(String),
}

/// View of a session given to the server handler
#[derive(Clone)]
pub struct SessionHandle {
    /// Session ID
    pub session_id: u64,

    /// Address of the client
    pub peer_addr: SocketAddr,

    /// Application name (from connect)
    pub app: String,

    /// Object encoding requested on connect
    pub object_encoding: f64,

    /// Stream registry of the server
    pub registry: Arc<StreamRegistry>,

    /// Writer queue of the session
    sender: Sender<RtmpSessionMessage>,
}

impl SessionHandle {
    /// Creates a session handle
    pub fn new(
        session_id: u64,
        peer_addr: SocketAddr,
        app: &str,
        object_encoding: f64,
        registry: Arc<StreamRegistry>,
        sender: Sender<RtmpSessionMessage>,
    ) -> SessionHandle {
        SessionHandle {
            session_id,
            peer_addr,
            app: app.to_string(),
            object_encoding,
            registry,
            sender,
        }
    }

    /// Queues an onStatus message to the client, without waiting
    ///
    /// # Arguments
    ///
    /// * `stream_id` - Message stream the status refers to
    /// * `level` - "status" or "error"
    /// * `code` - Status code
    /// * `description` - Optional description
    ///
    /// # Return value
    ///
    /// Returns false if the session queue is full or the session ended
    pub fn send_status(
        &self,
        stream_id: u32,
        level: &str,
        code: &str,
        description: Option<&str>,
    ) -> bool {
        self.sender
            .try_send(RtmpSessionMessage::Status {
                stream_id,
                level: level.to_string(),
                code: code.to_string(),
                description: description.map(|d| d.to_string()),
            })
            .is_ok()
    }
}

/// Application behavior invoked by sessions at protocol milestones.
///
/// Methods run on the session task that reached the milestone,
/// so they must not block for long.
pub trait ServerHandler: Send + Sync {
    /// Called after a valid connect command
    fn on_connect(&self, _session: &SessionHandle) -> HandlerDecision {
        HandlerDecision::Accept
    }

    /// Called when a message stream is created
    fn on_create_stream(&self, _session: &SessionHandle, _stream_id: u32) -> HandlerDecision {
        HandlerDecision::Accept
    }

    /// Called before a stream is registered for publishing
    fn on_publish(&self, _session: &SessionHandle, _stream: &StreamObject) -> HandlerDecision {
        HandlerDecision::Accept
    }

    /// Called before a session subscribes to a stream
    fn on_play(
        &self,
        _session: &SessionHandle,
        _stream: &StreamObject,
        _play_stream_id: u32,
    ) -> HandlerDecision {
        HandlerDecision::Accept
    }

    /// Called when a connected session ends
    fn on_close(&self, _session: &SessionHandle) {}
}

/// Handler that accepts everything
pub struct DefaultServerHandler;

impl ServerHandler for DefaultServerHandler {}
