// Messages sent to the writer task of a session

use std::sync::Arc;

use crate::rtmp::RtmpPacket;

/// RTMP session message
#[derive(Clone, Debug)]
pub enum RtmpSessionMessage {
    /// Packet of a stream being played, to send on the player's message stream
    PlayPacket {
        stream_id: u32,
        packet: Arc<RtmpPacket>,
    },

    /// The publisher of a stream being played went away
    PlayStop { stream_id: u32 },

    /// Status message requested through the session handle
    Status {
        stream_id: u32,
        level: String,
        code: String,
        description: Option<String>,
    },

    /// The session completed connect (starts the ping timer)
    Connected,

    /// Sent at the end of the read loop
    End,
}
