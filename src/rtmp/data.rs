// RTMP data message

use std::{collections::HashMap, sync::LazyLock};

use crate::amf::{AMF0Value, AMFDecodingCursor};

/// RTMP data message (tag + named arguments)
#[derive(Clone, Debug)]
pub struct RtmpData {
    /// Data tag
    pub tag: String,

    /// Arguments
    pub arguments: HashMap<String, AMF0Value>,
}

static RTMP_DATA_CODES: LazyLock<HashMap<&'static str, &'static [&'static str]>> =
    LazyLock::new(|| {
        let mut m: HashMap<&'static str, &'static [&'static str]> = HashMap::new();

        m.insert("@setDataFrame", &["method", "dataObj"]);
        m.insert("onFI", &["info"]);
        m.insert("onMetaData", &["dataObj"]);
        m.insert("|RtmpSampleAccess", &["bool1", "bool2"]);

        m
    });

impl RtmpData {
    /// Creates RtmpData
    pub fn new(tag: &str) -> RtmpData {
        RtmpData {
            tag: tag.to_string(),
            arguments: HashMap::new(),
        }
    }

    /// Sets argument
    pub fn set_argument(&mut self, arg_name: &str, value: AMF0Value) {
        self.arguments.insert(arg_name.to_string(), value);
    }

    /// Gets argument
    pub fn get_argument(&self, arg_name: &str) -> Option<&AMF0Value> {
        self.arguments.get(arg_name)
    }

    /// Encodes data. Missing arguments are skipped.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = AMF0Value::string(&self.tag).encode();

        if let Some(arg_list) = RTMP_DATA_CODES.get(self.tag.as_str()) {
            for arg_name in arg_list.iter() {
                if let Some(val) = self.arguments.get(*arg_name) {
                    buf.extend(val.encode());
                }
            }
        }

        buf
    }

    /// Decodes data from bytes
    pub fn decode(data: &[u8]) -> Result<RtmpData, ()> {
        let mut cursor = AMFDecodingCursor::new(data);

        let tag_amf = AMF0Value::read(&mut cursor)?;
        let tag = tag_amf.as_string().ok_or(())?;

        let mut d = RtmpData::new(tag);

        if let Some(arg_list) = RTMP_DATA_CODES.get(tag) {
            for arg_name in arg_list.iter() {
                if cursor.ended() {
                    break;
                }

                let val = AMF0Value::read(&mut cursor)?;

                d.set_argument(arg_name, val);
            }
        }

        Ok(d)
    }
}
