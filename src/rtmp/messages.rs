// RTMP message generators

use std::collections::HashMap;

use byteorder::{BigEndian, ByteOrder};

use crate::amf::AMF0Value;

use super::{
    RtmpCommand, RtmpData, RtmpPacket, PING_REQUEST, PING_RESPONSE, RTMP_CHANNEL_AUDIO,
    RTMP_CHANNEL_DATA, RTMP_CHANNEL_INVOKE, RTMP_CHANNEL_PROTOCOL, RTMP_CHANNEL_VIDEO,
    RTMP_CHUNK_SIZE, RTMP_TYPE_ACKNOWLEDGEMENT, RTMP_TYPE_AGGREGATE, RTMP_TYPE_AUDIO,
    RTMP_TYPE_DATA, RTMP_TYPE_EVENT, RTMP_TYPE_INVOKE, RTMP_TYPE_SET_CHUNK_SIZE,
    RTMP_TYPE_SET_PEER_BANDWIDTH, RTMP_TYPE_VIDEO, RTMP_TYPE_WINDOW_ACKNOWLEDGEMENT_SIZE,
};

/// Makes a protocol control message (chunk stream 2, message stream 0).
/// Control payloads fit in the smallest chunk size.
fn rtmp_make_control_message(packet_type: u32, payload: Vec<u8>) -> Vec<u8> {
    RtmpPacket::new(RTMP_CHANNEL_PROTOCOL, packet_type, 0, 0, payload).create_chunks(RTMP_CHUNK_SIZE)
}

fn u32_payload(value: u32) -> Vec<u8> {
    let mut b = vec![0; 4];
    BigEndian::write_u32(&mut b, value);
    b
}

/// Makes RTMP ACK message
pub fn rtmp_make_ack(size: u32) -> Vec<u8> {
    rtmp_make_control_message(RTMP_TYPE_ACKNOWLEDGEMENT, u32_payload(size))
}

/// Makes RTMP window ACK
pub fn rtmp_make_window_ack(size: u32) -> Vec<u8> {
    rtmp_make_control_message(RTMP_TYPE_WINDOW_ACKNOWLEDGEMENT_SIZE, u32_payload(size))
}

/// Makes RTMP control message to indicate peer bandwidth
///
/// # Arguments
///
/// * `size` - Window size
/// * `limit_type` - 0 = hard, 1 = soft, 2 = dynamic
pub fn rtmp_make_peer_bandwidth_set_message(size: u32, limit_type: u8) -> Vec<u8> {
    let mut payload = u32_payload(size);
    payload.push(limit_type);

    rtmp_make_control_message(RTMP_TYPE_SET_PEER_BANDWIDTH, payload)
}

/// Makes RTMP control message to indicate chunk size
pub fn rtmp_make_chunk_size_set_message(size: u32) -> Vec<u8> {
    rtmp_make_control_message(RTMP_TYPE_SET_CHUNK_SIZE, u32_payload(size))
}

/// Makes a user control message carrying a 4 byte value
fn rtmp_make_user_control_message(event: u16, value: u32) -> Vec<u8> {
    let mut payload = vec![0; 6];

    BigEndian::write_u16(&mut payload[0..2], event);
    BigEndian::write_u32(&mut payload[2..6], value);

    rtmp_make_control_message(RTMP_TYPE_EVENT, payload)
}

/// Makes RTMP user control message to indicate stream status
/// Use STREAM_BEGIN or STREAM_EOF for the event
pub fn rtmp_make_stream_status_message(event: u16, stream_id: u32) -> Vec<u8> {
    rtmp_make_user_control_message(event, stream_id)
}

/// Makes RTMP ping request message
///
/// # Arguments
///
/// * `timestamp` - Milliseconds since the session connected
pub fn rtmp_make_ping_request(timestamp: u32) -> Vec<u8> {
    rtmp_make_user_control_message(PING_REQUEST, timestamp)
}

/// Makes RTMP ping response message, echoing the request timestamp
pub fn rtmp_make_ping_response(timestamp: u32) -> Vec<u8> {
    rtmp_make_user_control_message(PING_RESPONSE, timestamp)
}

/// Makes RTMP invoke command message
pub fn rtmp_make_invoke_message(
    cmd: &RtmpCommand,
    stream_id: u32,
    out_chunk_size: usize,
) -> Vec<u8> {
    RtmpPacket::new(RTMP_CHANNEL_INVOKE, RTMP_TYPE_INVOKE, stream_id, 0, cmd.encode())
        .create_chunks(out_chunk_size)
}

/// Makes RTMP data message
pub fn rtmp_make_data_message(data: &RtmpData, stream_id: u32, out_chunk_size: usize) -> Vec<u8> {
    RtmpPacket::new(RTMP_CHANNEL_DATA, RTMP_TYPE_DATA, stream_id, 0, data.encode())
        .create_chunks(out_chunk_size)
}

fn status_info(level: &str, code: &str, description: Option<&str>) -> AMF0Value {
    let mut info: HashMap<String, AMF0Value> = HashMap::new();

    info.insert("level".to_string(), AMF0Value::string(level));
    info.insert("code".to_string(), AMF0Value::string(code));

    if let Some(d) = description {
        info.insert("description".to_string(), AMF0Value::string(d));
    }

    AMF0Value::Object { properties: info }
}

/// Makes RTMP status message (onStatus)
///
/// # Arguments
///
/// * `stream_id` - Message stream the status refers to
/// * `level` - "status" or "error"
/// * `code` - Status code, e.g. NetStream.Publish.Start
/// * `description` - Optional human readable description
/// * `out_chunk_size` - Size of the output chunks
pub fn rtmp_make_status_message(
    stream_id: u32,
    level: &str,
    code: &str,
    description: Option<&str>,
    out_chunk_size: usize,
) -> Vec<u8> {
    let mut cmd = RtmpCommand::new("onStatus");

    cmd.set_argument("transId", AMF0Value::number(0.0));
    cmd.set_argument("cmdObj", AMF0Value::Null);
    cmd.set_argument("info", status_info(level, code, description));

    rtmp_make_invoke_message(&cmd, stream_id, out_chunk_size)
}

/// Makes RTMP sample access message
pub fn rtmp_make_sample_access_message(stream_id: u32, out_chunk_size: usize) -> Vec<u8> {
    let mut data = RtmpData::new("|RtmpSampleAccess");

    data.set_argument("bool1", AMF0Value::Bool { value: false });
    data.set_argument("bool2", AMF0Value::Bool { value: false });

    rtmp_make_data_message(&data, stream_id, out_chunk_size)
}

/// Makes message to respond to a connect message
///
/// # Arguments
///
/// * `trans_id` - Transaction ID of the connect command
/// * `object_encoding` - Object encoding requested by the client
/// * `out_chunk_size` - Size of the output chunks
pub fn rtmp_make_connect_response(
    trans_id: i64,
    object_encoding: f64,
    out_chunk_size: usize,
) -> Vec<u8> {
    let mut cmd = RtmpCommand::new("_result");

    cmd.set_argument("transId", AMF0Value::number(trans_id as f64));

    let mut cmd_obj: HashMap<String, AMF0Value> = HashMap::new();

    cmd_obj.insert("fmsVer".to_string(), AMF0Value::string("FMS/3,0,1,123"));
    cmd_obj.insert("capabilities".to_string(), AMF0Value::number(31.0));

    cmd.set_argument(
        "cmdObj",
        AMF0Value::Object {
            properties: cmd_obj,
        },
    );

    let mut info = status_info(
        "status",
        "NetConnection.Connect.Success",
        Some("Connection succeeded."),
    );

    if let AMF0Value::Object { properties } = &mut info {
        properties.insert(
            "objectEncoding".to_string(),
            AMF0Value::number(object_encoding),
        );
    }

    cmd.set_argument("info", info);

    rtmp_make_invoke_message(&cmd, 0, out_chunk_size)
}

/// Makes message to respond to a createStream message
pub fn rtmp_make_create_stream_response(
    trans_id: i64,
    stream_id: u32,
    out_chunk_size: usize,
) -> Vec<u8> {
    let mut cmd = RtmpCommand::new("_result");

    cmd.set_argument("transId", AMF0Value::number(trans_id as f64));
    cmd.set_argument("cmdObj", AMF0Value::Null);
    cmd.set_argument("info", AMF0Value::number(stream_id as f64));

    rtmp_make_invoke_message(&cmd, 0, out_chunk_size)
}

/// Chunk stream used to send a relayed message of the given type
pub fn rtmp_media_channel(packet_type: u32) -> u32 {
    match packet_type {
        RTMP_TYPE_AUDIO => RTMP_CHANNEL_AUDIO,
        RTMP_TYPE_VIDEO | RTMP_TYPE_AGGREGATE => RTMP_CHANNEL_VIDEO,
        _ => RTMP_CHANNEL_DATA,
    }
}

/// Makes a media (or data) message for a player, from a stored payload.
/// Used for metadata and codec sequence headers.
pub fn rtmp_make_media_message(
    packet_type: u32,
    play_stream_id: u32,
    payload: &[u8],
    timestamp: u32,
    out_chunk_size: usize,
) -> Vec<u8> {
    RtmpPacket::new(
        rtmp_media_channel(packet_type),
        packet_type,
        play_stream_id,
        timestamp,
        payload.to_vec(),
    )
    .create_chunks(out_chunk_size)
}

/// Builds the onMetaData payload stored for players,
/// from a @setDataFrame or onMetaData data message
pub fn rtmp_build_metadata(data: &RtmpData) -> Vec<u8> {
    let mut res = RtmpData::new("onMetaData");

    res.set_argument(
        "dataObj",
        data.get_argument("dataObj")
            .cloned()
            .unwrap_or(AMF0Value::Null),
    );

    res.encode()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::rtmp::{RTMP_PEER_BANDWIDTH_DYNAMIC, STREAM_BEGIN};

    #[test]
    fn test_control_message_layout() {
        assert_eq!(
            rtmp_make_window_ack(2_097_152),
            vec![0x02, 0, 0, 0, 0, 0, 4, 5, 0, 0, 0, 0, 0x00, 0x20, 0x00, 0x00]
        );

        assert_eq!(
            rtmp_make_peer_bandwidth_set_message(2_097_152, RTMP_PEER_BANDWIDTH_DYNAMIC),
            vec![0x02, 0, 0, 0, 0, 0, 5, 6, 0, 0, 0, 0, 0x00, 0x20, 0x00, 0x00, 0x02]
        );

        assert_eq!(
            rtmp_make_stream_status_message(STREAM_BEGIN, 1),
            vec![0x02, 0, 0, 0, 0, 0, 6, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]
        );
    }

    #[test]
    fn test_build_metadata_from_set_data_frame() {
        let mut data = RtmpData::new("@setDataFrame");
        data.set_argument("method", AMF0Value::string("onMetaData"));
        data.set_argument("dataObj", AMF0Value::number(1.0));

        let metadata = RtmpData::decode(&rtmp_build_metadata(&data)).unwrap();

        assert_eq!(metadata.tag, "onMetaData");
        assert_eq!(
            metadata.get_argument("dataObj").and_then(|v| v.as_number()),
            Some(1.0)
        );
    }
}
