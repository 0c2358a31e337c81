// Chunk read logic

use std::{collections::HashMap, time::Duration};

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::rtmp::{
    get_rtmp_header_size, RtmpPacket, RtmpPacketHeader, RTMP_CHUNK_SIZE, RTMP_CHUNK_TYPE_0,
    RTMP_CHUNK_TYPE_1, RTMP_CHUNK_TYPE_2, RTMP_CHUNK_TYPE_3, RTMP_EXTENDED_TIMESTAMP,
    RTMP_MAX_CHUNK_SIZE,
};

use super::SessionError;

/// State of a chunk stream (keyed by chunk stream ID)
#[derive(Default)]
struct ChunkStreamState {
    /// Header of the last message (absolute timestamp)
    header: RtmpPacketHeader,

    /// Last timestamp delta, reused by form 3 headers
    timestamp_delta: u32,

    /// True if the last header carried an extended timestamp
    extended_timestamp: bool,

    /// Partial payload of the message being received
    payload: Vec<u8>,
}

/// Reads chunks from the client and reassembles messages
pub struct ChunkReader {
    streams: HashMap<u32, ChunkStreamState>,

    /// Chunk size announced by the client
    in_chunk_size: usize,

    /// Max accepted message length
    max_message_size: usize,

    /// Timeout for each read
    read_timeout: Duration,

    /// Total bytes read (for acknowledgements)
    bytes_read: u64,

    /// Window size announced by the client (0 = no acknowledgements)
    ack_window: u32,

    /// Value of bytes_read at the last acknowledgement
    last_ack: u64,
}

impl ChunkReader {
    /// Creates a chunk reader
    ///
    /// # Arguments
    ///
    /// * `max_message_size` - Max accepted message length
    /// * `read_timeout` - Max time to wait for each read
    pub fn new(max_message_size: usize, read_timeout: Duration) -> ChunkReader {
        ChunkReader {
            streams: HashMap::new(),
            in_chunk_size: RTMP_CHUNK_SIZE,
            max_message_size,
            read_timeout,
            bytes_read: 0,
            ack_window: 0,
            last_ack: 0,
        }
    }

    /// Chunk size used to read
    pub fn in_chunk_size(&self) -> usize {
        self.in_chunk_size
    }

    /// Applies a SetChunkSize from the client
    pub fn set_chunk_size(&mut self, size: u32) -> Result<(), SessionError> {
        if size == 0 || size > RTMP_MAX_CHUNK_SIZE {
            return Err(SessionError::protocol(format!("invalid chunk size: {}", size)));
        }

        self.in_chunk_size = size as usize;

        Ok(())
    }

    /// Discards the partial message of a chunk stream
    pub fn abort(&mut self, channel_id: u32) {
        if let Some(s) = self.streams.get_mut(&channel_id) {
            s.payload.clear();
        }
    }

    /// Applies a WindowAcknowledgementSize from the client
    pub fn set_ack_window(&mut self, size: u32) {
        self.ack_window = size;
        self.last_ack = self.bytes_read;
    }

    /// Total bytes read from the client
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Returns the sequence number to acknowledge,
    /// if a full window was received since the last acknowledgement
    pub fn take_pending_ack(&mut self) -> Option<u32> {
        if self.ack_window == 0 || self.bytes_read - self.last_ack < self.ack_window as u64 {
            return None;
        }

        self.last_ack = self.bytes_read;

        // Sequence number wraps at 32 bits
        Some(self.bytes_read as u32)
    }

    async fn read_exact<TR: AsyncRead + Unpin>(
        &mut self,
        read_stream: &mut TR,
        buf: &mut [u8],
    ) -> Result<(), SessionError> {
        match tokio::time::timeout(self.read_timeout, read_stream.read_exact(buf)).await {
            Ok(Ok(_)) => {
                self.bytes_read += buf.len() as u64;
                Ok(())
            }
            Ok(Err(e)) => Err(SessionError::Io(e)),
            Err(_) => Err(SessionError::Timeout("reading a chunk")),
        }
    }

    /// Reads a single chunk.
    ///
    /// # Arguments
    ///
    /// * `read_stream` - The stream to read from the client
    ///
    /// # Return value
    ///
    /// Returns the message when the chunk completes one,
    /// or None if more chunks are needed.
    /// A clean end of stream at a chunk boundary returns SessionError::ConnectionClosed.
    pub async fn read_chunk<TR: AsyncRead + Unpin>(
        &mut self,
        read_stream: &mut TR,
    ) -> Result<Option<RtmpPacket>, SessionError> {
        // Basic header

        let mut start_byte = [0u8; 1];

        match self.read_exact(read_stream, &mut start_byte).await {
            Ok(_) => {}
            Err(SessionError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(SessionError::ConnectionClosed);
            }
            Err(e) => return Err(e),
        }

        let format = (start_byte[0] >> 6) as u32;

        let channel_id: u32 = match start_byte[0] & 0x3F {
            0 => {
                let mut b = [0u8; 1];
                self.read_exact(read_stream, &mut b).await?;
                64 + b[0] as u32
            }
            1 => {
                let mut b = [0u8; 2];
                self.read_exact(read_stream, &mut b).await?;
                64 + b[0] as u32 + ((b[1] as u32) << 8)
            }
            id => id as u32,
        };

        // Message header

        let mut header = [0u8; 11];
        let header_size = get_rtmp_header_size(format);
        self.read_exact(read_stream, &mut header[..header_size])
            .await?;

        match self.streams.get(&channel_id) {
            Some(s) => {
                if format != RTMP_CHUNK_TYPE_3 && !s.payload.is_empty() {
                    return Err(SessionError::protocol(format!(
                        "new message header on chunk stream {} with a message in progress",
                        channel_id
                    )));
                }
            }
            None => {
                if format != RTMP_CHUNK_TYPE_0 {
                    return Err(SessionError::protocol(format!(
                        "compact header on unknown chunk stream {}",
                        channel_id
                    )));
                }
            }
        }

        let state = self.streams.entry(channel_id).or_default();

        let mut extended_timestamp = state.extended_timestamp;
        let mut timestamp_field: u32 = 0;

        if format <= RTMP_CHUNK_TYPE_2 {
            timestamp_field = BigEndian::read_u24(&header[0..3]);
            extended_timestamp = timestamp_field >= RTMP_EXTENDED_TIMESTAMP;
        }

        if extended_timestamp {
            let mut b = [0u8; 4];
            self.read_exact(read_stream, &mut b).await?;

            if format <= RTMP_CHUNK_TYPE_2 {
                timestamp_field = BigEndian::read_u32(&b);
            }
        }

        let max_message_size = self.max_message_size;
        let in_chunk_size = self.in_chunk_size;

        let state = self.streams.entry(channel_id).or_default();

        let starts_message = state.payload.is_empty();

        match format {
            RTMP_CHUNK_TYPE_0 => {
                state.header.timestamp = timestamp_field;
                state.timestamp_delta = 0;
                state.header.length = BigEndian::read_u24(&header[3..6]) as usize;
                state.header.packet_type = header[6] as u32;
                state.header.stream_id = LittleEndian::read_u32(&header[7..11]);
            }
            RTMP_CHUNK_TYPE_1 => {
                state.timestamp_delta = timestamp_field;
                state.header.timestamp = state.header.timestamp.wrapping_add(timestamp_field);
                state.header.length = BigEndian::read_u24(&header[3..6]) as usize;
                state.header.packet_type = header[6] as u32;
            }
            RTMP_CHUNK_TYPE_2 => {
                state.timestamp_delta = timestamp_field;
                state.header.timestamp = state.header.timestamp.wrapping_add(timestamp_field);
            }
            _ => {
                if starts_message {
                    state.header.timestamp =
                        state.header.timestamp.wrapping_add(state.timestamp_delta);
                }
            }
        }

        state.extended_timestamp = extended_timestamp;
        state.header.channel_id = channel_id;
        state.header.format = RTMP_CHUNK_TYPE_0;

        let length = state.header.length;

        if length > max_message_size {
            return Err(SessionError::protocol(format!(
                "message too large: {} > {}",
                length, max_message_size
            )));
        }

        // Payload

        let remaining = length - state.payload.len();
        let to_read = remaining.min(in_chunk_size);

        let start = state.payload.len();
        state.payload.resize(start + to_read, 0);

        let mut payload = std::mem::take(&mut state.payload);
        let read_res = self.read_exact(read_stream, &mut payload[start..]).await;

        let state = self.streams.entry(channel_id).or_default();

        read_res?;

        if payload.len() < length {
            state.payload = payload;
            return Ok(None);
        }

        Ok(Some(RtmpPacket {
            header: state.header.clone(),
            payload,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader() -> ChunkReader {
        ChunkReader::new(1024 * 1024, Duration::from_secs(1))
    }

    async fn read_all(reader: &mut ChunkReader, data: &[u8]) -> Vec<RtmpPacket> {
        let mut input = data;
        let mut packets = Vec::new();

        loop {
            match reader.read_chunk(&mut input).await {
                Ok(Some(p)) => packets.push(p),
                Ok(None) => {}
                Err(SessionError::ConnectionClosed) => break,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }

        packets
    }

    #[tokio::test]
    async fn test_reassembly() {
        let payload: Vec<u8> = (0..300u32).map(|i| i as u8).collect();
        let packet = RtmpPacket::new(4, 8, 1, 1000, payload.clone());
        let data = packet.create_chunks(128);

        let mut r = reader();
        let mut input = &data[..];

        assert!(r.read_chunk(&mut input).await.unwrap().is_none());
        assert!(r.read_chunk(&mut input).await.unwrap().is_none());

        let p = r.read_chunk(&mut input).await.unwrap().unwrap();

        assert_eq!(p.payload, payload);
        assert_eq!(p.header.timestamp, 1000);
        assert_eq!(p.header.packet_type, 8);
        assert_eq!(p.header.stream_id, 1);
        assert_eq!(p.header.channel_id, 4);
        assert_eq!(p.header.length, 300);
        assert_eq!(r.bytes_read(), data.len() as u64);

        assert!(matches!(
            r.read_chunk(&mut input).await,
            Err(SessionError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_compact_headers_inherit() {
        let mut data = RtmpPacket::new(4, 8, 1, 1000, vec![1, 2, 3]).create_chunks(128);

        // Form 2: delta 20, same length/type/stream
        data.extend([0x84, 0x00, 0x00, 20, 4, 5, 6]);

        // Form 3: new message, same delta
        data.extend([0xC4, 7, 8, 9]);

        // Form 1: delta 5, new length and type
        data.extend([0x44, 0x00, 0x00, 5, 0x00, 0x00, 0x02, 9, 10, 11]);

        let packets = read_all(&mut reader(), &data).await;

        assert_eq!(packets.len(), 4);

        assert_eq!(packets[1].header.timestamp, 1020);
        assert_eq!(packets[1].payload, vec![4, 5, 6]);
        assert_eq!(packets[1].header.packet_type, 8);
        assert_eq!(packets[1].header.stream_id, 1);

        assert_eq!(packets[2].header.timestamp, 1040);
        assert_eq!(packets[2].payload, vec![7, 8, 9]);

        assert_eq!(packets[3].header.timestamp, 1045);
        assert_eq!(packets[3].header.packet_type, 9);
        assert_eq!(packets[3].header.stream_id, 1);
        assert_eq!(packets[3].payload, vec![10, 11]);
    }

    #[tokio::test]
    async fn test_interleaved_chunk_streams() {
        let payload_a: Vec<u8> = (0..300u32).map(|i| i as u8).collect();
        let payload_b: Vec<u8> = (0..300u32).map(|i| (255 - (i % 256)) as u8).collect();

        let chunks_a = RtmpPacket::new(4, 8, 1, 100, payload_a.clone()).create_chunks(128);
        let chunks_b = RtmpPacket::new(5, 9, 1, 200, payload_b.clone()).create_chunks(128);

        // 12 + 128, 1 + 128, 1 + 44
        assert_eq!(chunks_a.len(), 314);
        assert_eq!(chunks_b.len(), 314);

        let mut data = Vec::new();

        for (start, end) in [(0, 140), (140, 269), (269, 314)] {
            data.extend(&chunks_a[start..end]);
            data.extend(&chunks_b[start..end]);
        }

        let packets = read_all(&mut reader(), &data).await;

        assert_eq!(packets.len(), 2);

        assert_eq!(packets[0].header.channel_id, 4);
        assert_eq!(packets[0].header.packet_type, 8);
        assert_eq!(packets[0].header.timestamp, 100);
        assert_eq!(packets[0].payload, payload_a);

        assert_eq!(packets[1].header.channel_id, 5);
        assert_eq!(packets[1].header.packet_type, 9);
        assert_eq!(packets[1].header.timestamp, 200);
        assert_eq!(packets[1].payload, payload_b);
    }

    #[tokio::test]
    async fn test_buffers_grow_with_received_bytes() {
        let mut r = ChunkReader::new(16 * 1024 * 1024, Duration::from_secs(1));

        let mut data = Vec::new();

        for csid in 3u8..40 {
            // Form 0 header announcing a message of almost 16 MiB
            data.extend([csid, 0, 0, 0, 0xFF, 0xFF, 0xFE, 9, 1, 0, 0, 0]);
            data.extend([0u8; 128]);
        }

        let mut input = &data[..];

        for _ in 3u8..40 {
            assert!(r.read_chunk(&mut input).await.unwrap().is_none());
        }

        let reserved: usize = r.streams.values().map(|s| s.payload.capacity()).sum();

        assert!(reserved <= 2 * data.len(), "reserved {} bytes", reserved);
    }

    #[tokio::test]
    async fn test_compact_header_on_unknown_stream() {
        let data = [0x84u8, 0x00, 0x00, 20];
        let mut input = &data[..];

        assert!(matches!(
            reader().read_chunk(&mut input).await,
            Err(SessionError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_new_header_during_message() {
        let mut data = RtmpPacket::new(4, 8, 1, 0, vec![0; 200]).create_chunks(128);
        data.truncate(12 + 128);
        data.extend([0x84, 0x00, 0x00, 20]);

        let mut r = reader();
        let mut input = &data[..];

        assert!(r.read_chunk(&mut input).await.unwrap().is_none());
        assert!(matches!(
            r.read_chunk(&mut input).await,
            Err(SessionError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_extended_timestamp_and_large_channel() {
        let packet = RtmpPacket::new(400, 9, 1, 0x0100_0000, vec![3; 300]);
        let data = packet.create_chunks(128);

        let packets = read_all(&mut reader(), &data).await;

        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].header.timestamp, 0x0100_0000);
        assert_eq!(packets[0].header.channel_id, 400);
        assert_eq!(packets[0].payload, vec![3; 300]);
    }

    #[tokio::test]
    async fn test_message_too_large() {
        let data = RtmpPacket::new(4, 8, 1, 0, vec![0; 100]).create_chunks(128);
        let mut r = ChunkReader::new(50, Duration::from_secs(1));
        let mut input = &data[..];

        assert!(matches!(
            r.read_chunk(&mut input).await,
            Err(SessionError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_chunk_size_and_abort() {
        let mut r = reader();

        assert!(r.set_chunk_size(0).is_err());
        r.set_chunk_size(4096).unwrap();

        let data = RtmpPacket::new(4, 8, 1, 0, vec![1; 1000]).create_chunks(4096);
        let packets = read_all(&mut r, &data).await;
        assert_eq!(packets.len(), 1);

        // Start a message, abort it, then a fresh one on the same chunk stream
        let mut r = reader();
        let partial = RtmpPacket::new(4, 8, 1, 0, vec![1; 200]).create_chunks(128);
        let mut input = &partial[..12 + 128];
        assert!(r.read_chunk(&mut input).await.unwrap().is_none());

        r.abort(4);

        let data = RtmpPacket::new(4, 8, 1, 0, vec![2; 10]).create_chunks(128);
        let packets = read_all(&mut r, &data).await;
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].payload, vec![2; 10]);
    }

    #[tokio::test]
    async fn test_zero_length_message() {
        let data = RtmpPacket::new(3, 20, 0, 0, Vec::new()).create_chunks(128);
        let packets = read_all(&mut reader(), &data).await;

        assert_eq!(packets.len(), 1);
        assert!(packets[0].payload.is_empty());
    }

    #[tokio::test]
    async fn test_ack_window() {
        let mut r = reader();
        r.set_ack_window(100);

        let data = RtmpPacket::new(4, 8, 1, 0, vec![0; 120]).create_chunks(128);
        read_all(&mut r, &data).await;

        assert_eq!(r.take_pending_ack(), Some(132));
        assert_eq!(r.take_pending_ack(), None);
    }
}
