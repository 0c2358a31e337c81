// Context types to group parameters

use std::net::SocketAddr;

use tokio::sync::mpsc::Sender;

use super::{ChunkReader, RtmpSessionMessage, RtmpSessionStatus};

/// Session context
#[derive(Clone, Debug)]
pub struct SessionContext {
    /// Session ID
    pub id: u64,

    /// Client address
    pub peer_addr: SocketAddr,
}

/// Session read thread context
pub struct SessionReadThreadContext {
    /// Session ID
    pub id: u64,

    /// Client address
    pub peer_addr: SocketAddr,

    /// Session status
    pub status: RtmpSessionStatus,

    /// Chunk reader
    pub chunk_reader: ChunkReader,

    /// Sender for session messages
    pub session_msg_sender: Sender<RtmpSessionMessage>,
}
