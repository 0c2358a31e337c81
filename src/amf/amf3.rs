// AMF3 value
//
// Only scalar values are supported. AMF3 shows up in commands solely
// through the AMF0 "switch to AMF3" marker, where clients put plain
// numbers, strings and booleans.

use byteorder::{BigEndian, ByteOrder};

use super::AMFDecodingCursor;

const AMF3_TYPE_UNDEFINED: u8 = 0x00;
const AMF3_TYPE_NULL: u8 = 0x01;
const AMF3_TYPE_FALSE: u8 = 0x02;
const AMF3_TYPE_TRUE: u8 = 0x03;
const AMF3_TYPE_INTEGER: u8 = 0x04;
const AMF3_TYPE_DOUBLE: u8 = 0x05;
const AMF3_TYPE_STRING: u8 = 0x06;
const AMF3_TYPE_XML_DOC: u8 = 0x07;
const AMF3_TYPE_DATE: u8 = 0x08;
const AMF3_TYPE_XML: u8 = 0x0B;
const AMF3_TYPE_BYTE_ARRAY: u8 = 0x0C;

/// Largest value representable as U29
const AMF3_U29_MAX: u32 = 0x1FFF_FFFF;

/// AMF3 compatible value
#[derive(Clone, Debug, PartialEq)]
pub enum AMF3Value {
    Undefined,
    Null,
    False,
    True,
    Integer { value: i32 },
    Double { value: f64 },
    String { value: String },
    XmlDocument { content: String },
    Date { timestamp: f64 },
    Xml { value: String },
    ByteArray { value: Vec<u8> },
}

impl AMF3Value {
    /// Obtains a string representation of the value
    /// Used for debug logging purposes
    pub fn to_debug_string(&self) -> String {
        match self {
            AMF3Value::Undefined => "Undefined".to_string(),
            AMF3Value::Null => "Null".to_string(),
            AMF3Value::False => "False".to_string(),
            AMF3Value::True => "True".to_string(),
            AMF3Value::Integer { value } => format!("Integer({})", value),
            AMF3Value::Double { value } => format!("Double({})", value),
            AMF3Value::String { value } => format!("'{}'", value),
            AMF3Value::XmlDocument { content } => format!("XML_DOC'{}'", content),
            AMF3Value::Date { timestamp } => format!("DATE({})", timestamp),
            AMF3Value::Xml { value } => format!("XML'{}'", value),
            AMF3Value::ByteArray { value } => format!("Bytes({})", hex::encode(value)),
        }
    }

    /// Turns the AMF3 value into a boolean
    pub fn get_bool(&self) -> bool {
        matches!(self, AMF3Value::True)
    }

    /// Returns true if the value is undefined
    pub fn is_undefined(&self) -> bool {
        matches!(self, AMF3Value::Undefined)
    }

    /// Returns true if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, AMF3Value::Null)
    }

    /// Returns the value as number, if it is numeric
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AMF3Value::Integer { value } => Some(*value as f64),
            AMF3Value::Double { value } => Some(*value),
            _ => None,
        }
    }

    /// Returns the value as string, if it is a string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            AMF3Value::String { value } => Some(value.as_str()),
            AMF3Value::XmlDocument { content } => Some(content.as_str()),
            AMF3Value::Xml { value } => Some(value.as_str()),
            _ => None,
        }
    }

    // Encoding functions:

    /// Encodes value into bytes
    pub fn encode(&self) -> Vec<u8> {
        match self {
            AMF3Value::Undefined => vec![AMF3_TYPE_UNDEFINED],
            AMF3Value::Null => vec![AMF3_TYPE_NULL],
            AMF3Value::False => vec![AMF3_TYPE_FALSE],
            AMF3Value::True => vec![AMF3_TYPE_TRUE],
            AMF3Value::Integer { value } => {
                let mut buf = vec![AMF3_TYPE_INTEGER];
                buf.extend(Self::encode_ui29((*value as u32) & AMF3_U29_MAX));
                buf
            }
            AMF3Value::Double { value } => {
                let mut buf = vec![AMF3_TYPE_DOUBLE, 0, 0, 0, 0, 0, 0, 0, 0];
                BigEndian::write_f64(&mut buf[1..], *value);
                buf
            }
            AMF3Value::String { value } => Self::encode_with_bytes(AMF3_TYPE_STRING, value.as_bytes()),
            AMF3Value::XmlDocument { content } => {
                Self::encode_with_bytes(AMF3_TYPE_XML_DOC, content.as_bytes())
            }
            AMF3Value::Date { timestamp } => {
                let mut buf = vec![AMF3_TYPE_DATE];
                buf.extend(Self::encode_ui29(1));
                let mut ts = [0u8; 8];
                BigEndian::write_f64(&mut ts, *timestamp);
                buf.extend(ts);
                buf
            }
            AMF3Value::Xml { value } => Self::encode_with_bytes(AMF3_TYPE_XML, value.as_bytes()),
            AMF3Value::ByteArray { value } => Self::encode_with_bytes(AMF3_TYPE_BYTE_ARRAY, value),
        }
    }

    /// Encodes a marker followed by an inline (non-reference) byte sequence
    fn encode_with_bytes(marker: u8, bytes: &[u8]) -> Vec<u8> {
        let mut buf = vec![marker];
        buf.extend(Self::encode_ui29(((bytes.len() as u32) << 1) | 1));
        buf.extend(bytes);
        buf
    }

    /// Encodes unsigned integer with the format U29
    pub fn encode_ui29(num: u32) -> Vec<u8> {
        let num = num & AMF3_U29_MAX;

        if num < 0x80 {
            vec![num as u8]
        } else if num < 0x4000 {
            vec![((num >> 7) | 0x80) as u8, (num & 0x7F) as u8]
        } else if num < 0x20_0000 {
            vec![
                ((num >> 14) | 0x80) as u8,
                (((num >> 7) & 0x7F) | 0x80) as u8,
                (num & 0x7F) as u8,
            ]
        } else {
            vec![
                ((num >> 22) | 0x80) as u8,
                (((num >> 15) & 0x7F) | 0x80) as u8,
                (((num >> 8) & 0x7F) | 0x80) as u8,
                (num & 0xFF) as u8,
            ]
        }
    }

    // Decoding functions:

    /// Reads and decodes an integer in U29 format
    pub fn decode_ui29(cursor: &mut AMFDecodingCursor) -> Result<u32, ()> {
        let mut val: u32 = 0;

        for _ in 0..3 {
            let b = cursor.read_byte()?;

            val = (val << 7) | ((b & 0x7F) as u32);

            if b & 0x80 == 0 {
                return Ok(val);
            }
        }

        let b = cursor.read_byte()?;

        Ok((val << 8) | (b as u32))
    }

    /// Reads an instance of AMF3Value from a buffer
    pub fn read(cursor: &mut AMFDecodingCursor) -> Result<AMF3Value, ()> {
        let amf3_type = cursor.read_byte()?;

        match amf3_type {
            AMF3_TYPE_UNDEFINED => Ok(AMF3Value::Undefined),
            AMF3_TYPE_NULL => Ok(AMF3Value::Null),
            AMF3_TYPE_FALSE => Ok(AMF3Value::False),
            AMF3_TYPE_TRUE => Ok(AMF3Value::True),
            AMF3_TYPE_INTEGER => {
                let raw = Self::decode_ui29(cursor)?;

                // Sign-extend the 29 bit value
                let value = if raw & 0x1000_0000 != 0 {
                    (raw as i32) - 0x2000_0000
                } else {
                    raw as i32
                };

                Ok(AMF3Value::Integer { value })
            }
            AMF3_TYPE_DOUBLE => Ok(AMF3Value::Double {
                value: BigEndian::read_f64(cursor.read(8)?),
            }),
            AMF3_TYPE_DATE => {
                Self::decode_ui29(cursor)?;
                Ok(AMF3Value::Date {
                    timestamp: BigEndian::read_f64(cursor.read(8)?),
                })
            }
            AMF3_TYPE_STRING => Ok(AMF3Value::String {
                value: Self::read_string(cursor)?,
            }),
            AMF3_TYPE_XML => Ok(AMF3Value::Xml {
                value: Self::read_string(cursor)?,
            }),
            AMF3_TYPE_XML_DOC => Ok(AMF3Value::XmlDocument {
                content: Self::read_string(cursor)?,
            }),
            AMF3_TYPE_BYTE_ARRAY => Ok(AMF3Value::ByteArray {
                value: Self::read_inline_bytes(cursor)?.to_vec(),
            }),
            _ => Err(()),
        }
    }

    /// Reads an inline byte sequence (references are not supported)
    fn read_inline_bytes<'a>(cursor: &mut AMFDecodingCursor<'a>) -> Result<&'a [u8], ()> {
        let header = Self::decode_ui29(cursor)?;

        if header & 1 == 0 {
            return Err(());
        }

        cursor.read((header >> 1) as usize)
    }

    /// Reads string in AMF3 format from buffer
    pub fn read_string(cursor: &mut AMFDecodingCursor) -> Result<String, ()> {
        let bytes = Self::read_inline_bytes(cursor)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ())
    }
}
