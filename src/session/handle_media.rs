// Logic to handle media and data packets of a publisher

use std::sync::Arc;

use crate::{
    log::Logger,
    log_trace,
    rtmp::{
        rtmp_build_metadata, RtmpData, RtmpPacket, RTMP_TYPE_AUDIO, RTMP_TYPE_DATA,
        RTMP_TYPE_FLEX_STREAM, RTMP_TYPE_VIDEO,
    },
    server::{RtmpServerContext, StreamObject},
};

use super::SessionReadThreadContext;

/// AAC sound format
const AUDIO_FORMAT_AAC: u8 = 10;

/// AVC (H.264) codec ID
const VIDEO_CODEC_AVC: u8 = 7;

/// HEVC (H.265) codec ID
const VIDEO_CODEC_HEVC: u8 = 12;

/// Checks if an audio payload is an AAC sequence header
pub fn is_audio_sequence_header(payload: &[u8]) -> bool {
    payload.len() >= 2 && (payload[0] >> 4) == AUDIO_FORMAT_AAC && payload[1] == 0
}

/// Checks if a video payload is a codec sequence header
pub fn is_video_sequence_header(payload: &[u8]) -> bool {
    if payload.len() < 2 {
        return false;
    }

    if payload[0] & 0x80 != 0 {
        // Enhanced RTMP: packet type 0 is the sequence start
        return payload[0] & 0x0F == 0;
    }

    let frame_type = (payload[0] >> 4) & 0x0F;
    let codec_id = payload[0] & 0x0F;

    (codec_id == VIDEO_CODEC_AVC || codec_id == VIDEO_CODEC_HEVC)
        && frame_type == 1
        && payload[1] == 0
}

/// Handles a data message. Metadata is cached and relayed as onMetaData,
/// anything else is relayed as is.
fn handle_data(stream: &StreamObject, packet: RtmpPacket) -> RtmpPacket {
    let offset: usize = if packet.header.packet_type == RTMP_TYPE_FLEX_STREAM {
        1
    } else {
        0
    };

    let data = match packet.payload.get(offset..).map(RtmpData::decode) {
        Some(Ok(d)) => d,
        _ => return packet,
    };

    if data.tag != "@setDataFrame" && data.tag != "onMetaData" {
        return packet;
    }

    let metadata = rtmp_build_metadata(&data);

    stream.set_metadata(metadata.clone());

    RtmpPacket::new(
        packet.header.channel_id,
        RTMP_TYPE_DATA,
        packet.header.stream_id,
        packet.header.timestamp,
        metadata,
    )
}

/// Handles an audio, video, data or aggregate message
///
/// # Arguments
///
/// * `logger` - The session logger
/// * `server_context` - The server context
/// * `session_context` - The session context
/// * `packet` - The packet
pub fn handle_rtmp_packet_media(
    logger: &Logger,
    server_context: &RtmpServerContext,
    session_context: &SessionReadThreadContext,
    packet: RtmpPacket,
) {
    let stream = match &session_context.status.publishing {
        Some(p) if p.stream_id == packet.header.stream_id => p.stream.clone(),
        _ => {
            if server_context.config.log_requests && logger.config.debug_enabled {
                logger.log_debug(&format!(
                    "Packet of type {} ignored since it was not publishing on stream {}",
                    packet.header.packet_type, packet.header.stream_id
                ));
            }

            return;
        }
    };

    let packet = match packet.header.packet_type {
        RTMP_TYPE_AUDIO => {
            if is_audio_sequence_header(&packet.payload) {
                stream.set_audio_sequence_header(packet.payload.clone());
            }

            packet
        }
        RTMP_TYPE_VIDEO => {
            if is_video_sequence_header(&packet.payload) {
                stream.set_video_sequence_header(packet.payload.clone());
            }

            packet
        }
        RTMP_TYPE_DATA | RTMP_TYPE_FLEX_STREAM => handle_data(&stream, packet),
        _ => packet,
    };

    log_trace!(
        logger,
        format!(
            "MEDIA PACKET: type {}, {} bytes",
            packet.header.packet_type,
            packet.payload.len()
        )
    );

    let result = stream.broadcast(Arc::new(packet));

    if result.dropped > 0 && server_context.config.log_requests && logger.config.debug_enabled {
        logger.log_debug(&format!(
            "Packet dropped for {} slow players of '{}'",
            result.dropped, stream.name
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_header_detection() {
        assert!(is_audio_sequence_header(&[0xAF, 0x00, 0x12, 0x10]));
        assert!(!is_audio_sequence_header(&[0xAF, 0x01, 0x21]));
        assert!(!is_audio_sequence_header(&[0x2F, 0x00]));

        assert!(is_video_sequence_header(&[0x17, 0x00, 0, 0, 0]));
        assert!(is_video_sequence_header(&[0x1C, 0x00, 0, 0, 0]));
        assert!(!is_video_sequence_header(&[0x17, 0x01, 0, 0, 0]));
        assert!(!is_video_sequence_header(&[0x27, 0x00, 0, 0, 0]));

        // Enhanced RTMP sequence start / coded frames
        assert!(is_video_sequence_header(&[0x90, b'h', b'v', b'c', b'1']));
        assert!(!is_video_sequence_header(&[0x91, b'h', b'v', b'c', b'1']));
    }

    #[test]
    fn test_metadata_rewritten() {
        let stream = StreamObject::new("s", 1, 1, 65);

        let mut data = RtmpData::new("@setDataFrame");
        data.set_argument("method", crate::amf::AMF0Value::string("onMetaData"));
        data.set_argument(
            "dataObj",
            crate::amf::AMF0Value::Object {
                properties: [("width".to_string(), crate::amf::AMF0Value::number(1280.0))]
                    .into_iter()
                    .collect(),
            },
        );

        let packet = RtmpPacket::new(6, RTMP_TYPE_DATA, 65, 0, data.encode());
        let relayed = handle_data(&stream, packet);

        let decoded = RtmpData::decode(&relayed.payload).unwrap();
        assert_eq!(decoded.tag, "onMetaData");
        assert_eq!(
            decoded
                .get_argument("dataObj")
                .and_then(|o| o.get_object_property("width"))
                .and_then(|w| w.as_number()),
            Some(1280.0)
        );
    }
}
