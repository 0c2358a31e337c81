// AMF0 value

use byteorder::{BigEndian, ByteOrder};
use std::collections::HashMap;

use super::{AMF3Value, AMFDecodingCursor};

const AMF0_TYPE_NUMBER: u8 = 0x00;
const AMF0_TYPE_BOOL: u8 = 0x01;
const AMF0_TYPE_STRING: u8 = 0x02;
const AMF0_TYPE_OBJECT: u8 = 0x03;
const AMF0_TYPE_NULL: u8 = 0x05;
const AMF0_TYPE_UNDEFINED: u8 = 0x06;
const AMF0_TYPE_REF: u8 = 0x07;
const AMF0_TYPE_ARRAY: u8 = 0x08;
const AMF0_TYPE_STRICT_ARRAY: u8 = 0x0A;
const AMF0_TYPE_DATE: u8 = 0x0B;
const AMF0_TYPE_LONG_STRING: u8 = 0x0C;
const AMF0_TYPE_XML_DOC: u8 = 0x0F;
const AMF0_TYPE_TYPED_OBJ: u8 = 0x10;
const AMF0_TYPE_SWITCH_AMF3: u8 = 0x11;

const AMF0_OBJECT_TERM_CODE: u8 = 0x09;

/// Max nesting of objects and arrays accepted by the decoder
const AMF0_MAX_DEPTH: usize = 32;

/// AMF0 compatible value
#[derive(Clone, Debug, PartialEq)]
pub enum AMF0Value {
    Number {
        value: f64,
    },
    Bool {
        value: bool,
    },
    String {
        value: String,
    },
    Object {
        properties: HashMap<String, AMF0Value>,
    },
    Null,
    Undefined,
    Ref {
        addr: u16,
    },
    Array {
        items: HashMap<String, AMF0Value>,
    },
    StrictArray {
        items: Vec<AMF0Value>,
    },
    Date {
        timestamp: f64,
    },
    LongString {
        value: String,
    },
    XmlDocument {
        content: String,
    },
    TypedObject {
        type_name: String,
        properties: HashMap<String, AMF0Value>,
    },
    SwitchAmf3 {
        value: AMF3Value,
    },
}

impl AMF0Value {
    /// Creates a string value
    pub fn string(s: &str) -> AMF0Value {
        AMF0Value::String {
            value: s.to_string(),
        }
    }

    /// Creates a number value
    pub fn number(n: f64) -> AMF0Value {
        AMF0Value::Number { value: n }
    }

    /// Obtains a string representation of the value
    /// Used for debug logging purposes
    pub fn to_debug_string(&self, tabs: &str) -> String {
        match self {
            AMF0Value::Number { value } => format!("{}", value),
            AMF0Value::Bool { value } => {
                if *value {
                    "TRUE".to_string()
                } else {
                    "FALSE".to_string()
                }
            }
            AMF0Value::String { value } => format!("'{}'", value),
            AMF0Value::Object { properties } => {
                format!("{{\n{}{}}}", Self::debug_properties(properties, tabs), tabs)
            }
            AMF0Value::Null => "NULL".to_string(),
            AMF0Value::Undefined => "UNDEFINED".to_string(),
            AMF0Value::Ref { addr } => format!("REF#{}", addr),
            AMF0Value::Array { items } => {
                format!("ARRAY [\n{}{}]", Self::debug_properties(items, tabs), tabs)
            }
            AMF0Value::StrictArray { items } => {
                let mut res = "STRICT_ARRAY [\n".to_string();

                for value in items {
                    res.push_str(tabs);
                    res.push_str("    ");
                    res.push_str(&value.to_debug_string(&format!("{}    ", tabs)));
                    res.push('\n');
                }

                res.push_str(tabs);
                res.push(']');

                res
            }
            AMF0Value::Date { timestamp } => format!("DATE({})", timestamp),
            AMF0Value::LongString { value } => format!("L'{}'", value),
            AMF0Value::XmlDocument { content } => format!("XML'{}'", content),
            AMF0Value::TypedObject {
                type_name,
                properties,
            } => format!(
                "{} {{\n{}{}}}",
                type_name,
                Self::debug_properties(properties, tabs),
                tabs
            ),
            AMF0Value::SwitchAmf3 { value } => format!("AMF3({})", value.to_debug_string()),
        }
    }

    fn debug_properties(properties: &HashMap<String, AMF0Value>, tabs: &str) -> String {
        let mut keys: Vec<&String> = properties.keys().collect();
        keys.sort();

        let mut res = String::new();

        for key in keys {
            if let Some(value) = properties.get(key) {
                res.push_str(tabs);
                res.push_str("    '");
                res.push_str(key);
                res.push_str("' = ");
                res.push_str(&value.to_debug_string(&format!("{}    ", tabs)));
                res.push('\n');
            }
        }

        res
    }

    // Value check functions:

    /// Returns true if the value is undefined
    pub fn is_undefined(&self) -> bool {
        match self {
            AMF0Value::Undefined => true,
            AMF0Value::SwitchAmf3 { value } => value.is_undefined(),
            _ => false,
        }
    }

    /// Returns true if the value is null
    pub fn is_null(&self) -> bool {
        match self {
            AMF0Value::Null => true,
            AMF0Value::SwitchAmf3 { value } => value.is_null(),
            _ => false,
        }
    }

    /// Returns the value as boolean
    pub fn get_bool(&self) -> bool {
        match self {
            AMF0Value::Bool { value } => *value,
            AMF0Value::Number { value } => *value != 0.0,
            AMF0Value::SwitchAmf3 { value } => value.get_bool(),
            _ => false,
        }
    }

    /// Returns the value as number, if it is numeric
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AMF0Value::Number { value } => Some(*value),
            AMF0Value::SwitchAmf3 { value } => value.as_number(),
            _ => None,
        }
    }

    /// Returns the value as integer (0 if not numeric)
    pub fn get_integer(&self) -> i64 {
        self.as_number().map(|n| n as i64).unwrap_or(0)
    }

    /// Returns the value as string, if it is a string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            AMF0Value::String { value } => Some(value.as_str()),
            AMF0Value::LongString { value } => Some(value.as_str()),
            AMF0Value::XmlDocument { content } => Some(content.as_str()),
            AMF0Value::SwitchAmf3 { value } => value.as_string(),
            _ => None,
        }
    }

    /// Returns the value as string ("" if it is not a string)
    pub fn get_string(&self) -> &str {
        self.as_string().unwrap_or("")
    }

    /// Returns the value as object (HashMap)
    pub fn get_object(&self) -> Option<&HashMap<String, AMF0Value>> {
        match self {
            AMF0Value::Object { properties } => Some(properties),
            AMF0Value::Array { items } => Some(items),
            AMF0Value::TypedObject { properties, .. } => Some(properties),
            _ => None,
        }
    }

    /// Gets the value of a property (for objects)
    pub fn get_object_property(&self, property_name: &str) -> Option<&AMF0Value> {
        self.get_object().and_then(|o| o.get(property_name))
    }

    // Encoding functions:

    /// Encodes value into bytes
    pub fn encode(&self) -> Vec<u8> {
        match self {
            AMF0Value::Number { value } => {
                let mut buf = vec![AMF0_TYPE_NUMBER];
                buf.extend(Self::encode_number(*value));
                buf
            }
            AMF0Value::Bool { value } => vec![AMF0_TYPE_BOOL, if *value { 0x01 } else { 0x00 }],
            AMF0Value::String { value } => {
                let mut buf = vec![AMF0_TYPE_STRING];
                buf.extend(Self::encode_string(value));
                buf
            }
            AMF0Value::Object { properties } => {
                let mut buf = vec![AMF0_TYPE_OBJECT];
                buf.extend(Self::encode_object(properties));
                buf
            }
            AMF0Value::Null => vec![AMF0_TYPE_NULL],
            AMF0Value::Undefined => vec![AMF0_TYPE_UNDEFINED],
            AMF0Value::Ref { addr } => {
                let mut buf = vec![AMF0_TYPE_REF, 0, 0];
                BigEndian::write_u16(&mut buf[1..], *addr);
                buf
            }
            AMF0Value::Array { items } => {
                let mut buf = vec![AMF0_TYPE_ARRAY, 0, 0, 0, 0];
                BigEndian::write_u32(&mut buf[1..], items.len() as u32);
                buf.extend(Self::encode_object(items));
                buf
            }
            AMF0Value::StrictArray { items } => {
                let mut buf = vec![AMF0_TYPE_STRICT_ARRAY, 0, 0, 0, 0];
                BigEndian::write_u32(&mut buf[1..], items.len() as u32);

                for item in items {
                    buf.extend(item.encode());
                }

                buf
            }
            AMF0Value::Date { timestamp } => {
                let mut buf = vec![AMF0_TYPE_DATE];
                buf.extend(Self::encode_number(*timestamp));
                buf.extend([0x00, 0x00]);
                buf
            }
            AMF0Value::LongString { value } => {
                let mut buf = vec![AMF0_TYPE_LONG_STRING, 0, 0, 0, 0];
                BigEndian::write_u32(&mut buf[1..], value.len() as u32);
                buf.extend(value.as_bytes());
                buf
            }
            AMF0Value::XmlDocument { content } => {
                let mut buf = vec![AMF0_TYPE_XML_DOC, 0, 0, 0, 0];
                BigEndian::write_u32(&mut buf[1..], content.len() as u32);
                buf.extend(content.as_bytes());
                buf
            }
            AMF0Value::TypedObject {
                type_name,
                properties,
            } => {
                let mut buf = vec![AMF0_TYPE_TYPED_OBJ];
                buf.extend(Self::encode_string(type_name));
                buf.extend(Self::encode_object(properties));
                buf
            }
            AMF0Value::SwitchAmf3 { value } => {
                let mut buf = vec![AMF0_TYPE_SWITCH_AMF3];
                buf.extend(value.encode());
                buf
            }
        }
    }

    /// Encodes number value
    pub fn encode_number(num: f64) -> Vec<u8> {
        let mut buf = vec![0; 8];
        BigEndian::write_f64(&mut buf, num);
        buf
    }

    /// Encodes string value (without type marker)
    pub fn encode_string(s: &str) -> Vec<u8> {
        let str_bytes = s.as_bytes();
        let mut buf = vec![0x00; 2];
        BigEndian::write_u16(&mut buf, str_bytes.len() as u16);
        buf.extend(str_bytes);
        buf
    }

    /// Encodes object properties, followed by the end marker.
    /// Keys are sorted so the output is deterministic.
    pub fn encode_object(o: &HashMap<String, AMF0Value>) -> Vec<u8> {
        let mut buf = Vec::new();

        let mut keys: Vec<&String> = o.keys().collect();
        keys.sort();

        for key in keys {
            if let Some(value) = o.get(key) {
                buf.extend(Self::encode_string(key));
                buf.extend(value.encode());
            }
        }

        buf.extend(Self::encode_string(""));
        buf.push(AMF0_OBJECT_TERM_CODE);

        buf
    }

    // Decoding functions:

    /// Reads an AMF0 value from the cursor
    pub fn read(cursor: &mut AMFDecodingCursor) -> Result<AMF0Value, ()> {
        Self::read_depth(cursor, 0)
    }

    fn read_depth(cursor: &mut AMFDecodingCursor, depth: usize) -> Result<AMF0Value, ()> {
        if depth > AMF0_MAX_DEPTH {
            return Err(());
        }

        let amf_type = cursor.read_byte()?;

        match amf_type {
            AMF0_TYPE_NUMBER => Ok(AMF0Value::Number {
                value: BigEndian::read_f64(cursor.read(8)?),
            }),
            AMF0_TYPE_BOOL => Ok(AMF0Value::Bool {
                value: cursor.read_byte()? != 0,
            }),
            AMF0_TYPE_STRING => Ok(AMF0Value::String {
                value: Self::read_string(cursor)?,
            }),
            AMF0_TYPE_OBJECT => Ok(AMF0Value::Object {
                properties: Self::read_object(cursor, depth)?,
            }),
            AMF0_TYPE_NULL => Ok(AMF0Value::Null),
            AMF0_TYPE_UNDEFINED => Ok(AMF0Value::Undefined),
            AMF0_TYPE_REF => Ok(AMF0Value::Ref {
                addr: BigEndian::read_u16(cursor.read(2)?),
            }),
            AMF0_TYPE_ARRAY => {
                // Associative count is advisory, the end marker terminates
                cursor.skip(4)?;
                Ok(AMF0Value::Array {
                    items: Self::read_object(cursor, depth)?,
                })
            }
            AMF0_TYPE_STRICT_ARRAY => {
                let count = BigEndian::read_u32(cursor.read(4)?) as usize;

                // Every item takes at least one byte
                if count > cursor.remaining() {
                    return Err(());
                }

                let mut items = Vec::with_capacity(count);

                for _ in 0..count {
                    items.push(Self::read_depth(cursor, depth + 1)?);
                }

                Ok(AMF0Value::StrictArray { items })
            }
            AMF0_TYPE_DATE => {
                let timestamp = BigEndian::read_f64(cursor.read(8)?);
                cursor.skip(2)?; // Timezone, unused
                Ok(AMF0Value::Date { timestamp })
            }
            AMF0_TYPE_LONG_STRING => Ok(AMF0Value::LongString {
                value: Self::read_long_string(cursor)?,
            }),
            AMF0_TYPE_XML_DOC => Ok(AMF0Value::XmlDocument {
                content: Self::read_long_string(cursor)?,
            }),
            AMF0_TYPE_TYPED_OBJ => {
                let type_name = Self::read_string(cursor)?;
                Ok(AMF0Value::TypedObject {
                    type_name,
                    properties: Self::read_object(cursor, depth)?,
                })
            }
            AMF0_TYPE_SWITCH_AMF3 => Ok(AMF0Value::SwitchAmf3 {
                value: AMF3Value::read(cursor)?,
            }),
            _ => Err(()),
        }
    }

    /// Reads a string with a 16 bit length prefix
    pub fn read_string(cursor: &mut AMFDecodingCursor) -> Result<String, ()> {
        let len = BigEndian::read_u16(cursor.read(2)?) as usize;
        String::from_utf8(cursor.read(len)?.to_vec()).map_err(|_| ())
    }

    /// Reads a string with a 32 bit length prefix
    fn read_long_string(cursor: &mut AMFDecodingCursor) -> Result<String, ()> {
        let len = BigEndian::read_u32(cursor.read(4)?) as usize;
        String::from_utf8(cursor.read(len)?.to_vec()).map_err(|_| ())
    }

    /// Reads object properties up to the end marker
    fn read_object(
        cursor: &mut AMFDecodingCursor,
        depth: usize,
    ) -> Result<HashMap<String, AMF0Value>, ()> {
        let mut properties = HashMap::new();

        loop {
            if cursor.look(3)? == [0x00, 0x00, AMF0_OBJECT_TERM_CODE] {
                cursor.skip(3)?;
                return Ok(properties);
            }

            let key = Self::read_string(cursor)?;
            let value = Self::read_depth(cursor, depth + 1)?;

            properties.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_connect_object() {
        let mut properties = HashMap::new();
        properties.insert("app".to_string(), AMF0Value::string("live"));
        properties.insert("objectEncoding".to_string(), AMF0Value::number(0.0));
        properties.insert(
            "tcUrl".to_string(),
            AMF0Value::LongString {
                value: "rtmp://localhost/live".to_string(),
            },
        );

        let original = AMF0Value::Object { properties };
        let encoded = original.encode();

        let mut cursor = AMFDecodingCursor::new(&encoded);
        let decoded = AMF0Value::read(&mut cursor).unwrap();

        assert!(cursor.ended());
        assert_eq!(decoded, original);
        assert_eq!(
            decoded.get_object_property("app").and_then(|v| v.as_string()),
            Some("live")
        );
    }

    #[test]
    fn test_strict_array_header() {
        let value = AMF0Value::StrictArray {
            items: vec![AMF0Value::Null, AMF0Value::Bool { value: true }],
        };

        let encoded = value.encode();

        assert_eq!(&encoded[..5], &[AMF0_TYPE_STRICT_ARRAY, 0, 0, 0, 2]);

        let mut cursor = AMFDecodingCursor::new(&encoded);
        assert_eq!(AMF0Value::read(&mut cursor), Ok(value));
    }

    #[test]
    fn test_switch_to_amf3() {
        let data = [AMF0_TYPE_SWITCH_AMF3, 0x06, 0x09, b'l', b'i', b'v', b'e'];
        let mut cursor = AMFDecodingCursor::new(&data);
        let value = AMF0Value::read(&mut cursor).unwrap();

        assert_eq!(value.as_string(), Some("live"));
    }

    #[test]
    fn test_truncated_input() {
        let encoded = AMF0Value::string("publish").encode();
        let mut cursor = AMFDecodingCursor::new(&encoded[..encoded.len() - 1]);

        assert!(AMF0Value::read(&mut cursor).is_err());

        let unterminated = [AMF0_TYPE_OBJECT, 0x00, 0x01, b'a', AMF0_TYPE_NULL];
        let mut cursor = AMFDecodingCursor::new(&unterminated);

        assert!(AMF0Value::read(&mut cursor).is_err());
    }
}
