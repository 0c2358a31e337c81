// RTMP packet model

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::{
    RTMP_CHUNK_TYPE_0, RTMP_CHUNK_TYPE_1, RTMP_CHUNK_TYPE_2, RTMP_CHUNK_TYPE_3,
    RTMP_EXTENDED_TIMESTAMP,
};

/// Header of an RTMP packet
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RtmpPacketHeader {
    /// Timestamp
    pub timestamp: u32,

    /// Chunk format of the first chunk
    pub format: u32,

    /// Chunk stream ID
    pub channel_id: u32,

    /// Packet (message) type
    pub packet_type: u32,

    /// Message stream ID
    pub stream_id: u32,

    // Payload length
    pub length: usize,
}

/// RTMP packet (a complete message)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RtmpPacket {
    /// Packet header
    pub header: RtmpPacketHeader,

    /// Packet payload
    pub payload: Vec<u8>,
}

impl RtmpPacket {
    /// Creates new blank RTMP packet
    pub fn new_blank() -> RtmpPacket {
        RtmpPacket::default()
    }

    /// Creates a packet with a form 0 header
    ///
    /// # Arguments
    ///
    /// * `channel_id` - Chunk stream to send it on
    /// * `packet_type` - Message type
    /// * `stream_id` - Message stream ID
    /// * `timestamp` - Message timestamp
    /// * `payload` - Message payload
    pub fn new(
        channel_id: u32,
        packet_type: u32,
        stream_id: u32,
        timestamp: u32,
        payload: Vec<u8>,
    ) -> RtmpPacket {
        RtmpPacket {
            header: RtmpPacketHeader {
                timestamp,
                format: RTMP_CHUNK_TYPE_0,
                channel_id,
                packet_type,
                stream_id,
                length: payload.len(),
            },
            payload,
        }
    }

    /// Serializes a basic header for a RTMP chunk
    ///
    /// # Arguments
    ///
    /// * `format` - Chunk format
    /// * `channel_id` - Chunk stream ID (2..=65599)
    ///
    /// Returns the serialized bytes
    pub fn serialize_basic_header(format: u32, channel_id: u32) -> Vec<u8> {
        let fmt_bits = ((format & 0x03) << 6) as u8;

        if channel_id >= 64 + 256 {
            let rest = channel_id - 64;
            vec![fmt_bits | 1, (rest & 0xFF) as u8, ((rest >> 8) & 0xFF) as u8]
        } else if channel_id >= 64 {
            vec![fmt_bits, (channel_id - 64) as u8]
        } else {
            vec![fmt_bits | (channel_id as u8)]
        }
    }

    /// Serializes the message header of the first chunk
    /// Returns the serialized bytes
    pub fn serialize_chunk_message_header(&self, stream_id: u32) -> Vec<u8> {
        let mut out: Vec<u8> = Vec::with_capacity(11);
        let mut b = [0u8; 4];

        if self.header.format <= RTMP_CHUNK_TYPE_2 {
            BigEndian::write_u32(&mut b, self.header.timestamp.min(RTMP_EXTENDED_TIMESTAMP));
            out.extend(&b[1..]);
        }

        if self.header.format <= RTMP_CHUNK_TYPE_1 {
            BigEndian::write_u32(&mut b, self.payload.len() as u32);
            out.extend(&b[1..]);
            out.push(self.header.packet_type as u8);
        }

        if self.header.format == RTMP_CHUNK_TYPE_0 {
            LittleEndian::write_u32(&mut b, stream_id);
            out.extend(b);
        }

        out
    }

    /// Creates the chunks for an RTMP packet.
    /// The first chunk carries the packet header, the rest are form 3.
    ///
    /// # Arguments
    ///
    /// * `out_chunk_size` - Size of the output chunks
    pub fn create_chunks(&self, out_chunk_size: usize) -> Vec<u8> {
        self.create_chunks_for(self.header.channel_id, self.header.stream_id, out_chunk_size)
    }

    /// Creates the chunks for an RTMP packet, overriding where it is sent.
    /// Used to relay a publisher's packet to players without copying it.
    ///
    /// # Arguments
    ///
    /// * `channel_id` - Chunk stream ID
    /// * `stream_id` - Message stream ID
    /// * `out_chunk_size` - Size of the output chunks
    pub fn create_chunks_for(
        &self,
        channel_id: u32,
        stream_id: u32,
        out_chunk_size: usize,
    ) -> Vec<u8> {
        let out_chunk_size = out_chunk_size.max(1);

        let use_extended_timestamp = self.header.timestamp >= RTMP_EXTENDED_TIMESTAMP;

        let mut extended_timestamp = [0u8; 4];
        BigEndian::write_u32(&mut extended_timestamp, self.header.timestamp);

        let continuation_header = Self::serialize_basic_header(RTMP_CHUNK_TYPE_3, channel_id);

        let chunk_count = self.payload.len().div_ceil(out_chunk_size).max(1);

        let mut chunks: Vec<u8> = Vec::with_capacity(
            self.payload.len() + 18 + (chunk_count - 1) * (continuation_header.len() + 4),
        );

        chunks.extend(Self::serialize_basic_header(self.header.format, channel_id));
        chunks.extend(self.serialize_chunk_message_header(stream_id));

        if use_extended_timestamp {
            chunks.extend(extended_timestamp);
        }

        for (i, sub_payload) in self.payload.chunks(out_chunk_size).enumerate() {
            if i > 0 {
                chunks.extend(&continuation_header);

                if use_extended_timestamp {
                    chunks.extend(extended_timestamp);
                }
            }

            chunks.extend(sub_payload);
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_header_forms() {
        assert_eq!(RtmpPacket::serialize_basic_header(0, 3), vec![0x03]);
        assert_eq!(RtmpPacket::serialize_basic_header(1, 63), vec![0x7F]);
        assert_eq!(RtmpPacket::serialize_basic_header(3, 64), vec![0xC0, 0x00]);
        assert_eq!(RtmpPacket::serialize_basic_header(0, 319), vec![0x00, 0xFF]);
        assert_eq!(RtmpPacket::serialize_basic_header(0, 320), vec![0x01, 0x00, 0x01]);
        assert_eq!(
            RtmpPacket::serialize_basic_header(0, 65599),
            vec![0x01, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_create_chunks_split() {
        let payload: Vec<u8> = (0..300u32).map(|i| i as u8).collect();
        let packet = RtmpPacket::new(4, 8, 1, 1000, payload.clone());

        let chunks = packet.create_chunks(128);

        // 1 + 11 header, then 2 continuation headers of 1 byte
        assert_eq!(chunks.len(), 12 + 300 + 2);
        assert_eq!(chunks[0], 0x04);
        assert_eq!(&chunks[4..7], &[0x00, 0x01, 0x2C]);
        assert_eq!(chunks[7], 8);
        assert_eq!(&chunks[8..12], &[1, 0, 0, 0]);
        assert_eq!(&chunks[12..140], &payload[..128]);
        assert_eq!(chunks[140], 0xC4);
        assert_eq!(chunks[269], 0xC4);
        assert_eq!(&chunks[270..], &payload[256..]);
    }

    #[test]
    fn test_create_chunks_extended_timestamp() {
        let packet = RtmpPacket::new(3, 20, 0, 0x0100_0000, vec![7; 200]);

        let chunks = packet.create_chunks(128);

        assert_eq!(&chunks[1..4], &[0xFF, 0xFF, 0xFF]);
        assert_eq!(&chunks[12..16], &[0x01, 0x00, 0x00, 0x00]);

        // Continuation chunk repeats the extended timestamp
        let cont = 16 + 128;
        assert_eq!(chunks[cont], 0xC3);
        assert_eq!(&chunks[cont + 1..cont + 5], &[0x01, 0x00, 0x00, 0x00]);
        assert_eq!(chunks.len(), 16 + 200 + 5);
    }

    #[test]
    fn test_create_chunks_for_other_stream() {
        let packet = RtmpPacket::new(4, 8, 1, 0, vec![1, 2, 3]);
        let chunks = packet.create_chunks_for(5, 7, 128);

        assert_eq!(chunks[0], 0x05);
        assert_eq!(&chunks[8..12], &[7, 0, 0, 0]);
        assert_eq!(&chunks[12..], &[1, 2, 3]);
    }

    #[test]
    fn test_create_chunks_empty_payload() {
        let packet = RtmpPacket::new(2, 4, 0, 0, Vec::new());
        assert_eq!(packet.create_chunks(128).len(), 12);
    }
}
