// RTMP command

use std::{collections::HashMap, sync::LazyLock};

use crate::amf::{AMF0Value, AMFDecodingCursor};

/// RTMP command message (name + positional arguments, stored by name)
#[derive(Clone, Debug)]
pub struct RtmpCommand {
    /// Command name
    pub cmd: String,

    /// Arguments
    pub arguments: HashMap<String, AMF0Value>,
}

/// Positional argument names of every known command
static RTMP_COMMAND_CODES: LazyLock<HashMap<&'static str, &'static [&'static str]>> =
    LazyLock::new(|| {
        let mut m: HashMap<&'static str, &'static [&'static str]> = HashMap::new();

        m.insert("_result", &["transId", "cmdObj", "info"]);
        m.insert("_error", &["transId", "cmdObj", "info", "streamId"]);
        m.insert("onStatus", &["transId", "cmdObj", "info"]);
        m.insert("onFCPublish", &["transId", "cmdObj", "info"]);

        m.insert("connect", &["transId", "cmdObj", "args"]);
        m.insert("call", &["transId", "cmdObj", "args"]);
        m.insert("_checkbw", &["transId", "cmdObj"]);

        m.insert("createStream", &["transId", "cmdObj"]);
        m.insert("deleteStream", &["transId", "cmdObj", "streamId"]);
        m.insert("closeStream", &["transId", "cmdObj"]);
        m.insert("close", &["transId", "cmdObj"]);

        m.insert("publish", &["transId", "cmdObj", "streamName", "type"]);
        m.insert("releaseStream", &["transId", "cmdObj", "streamName"]);
        m.insert("FCPublish", &["transId", "cmdObj", "streamName"]);
        m.insert("FCUnpublish", &["transId", "cmdObj", "streamName"]);

        m.insert(
            "play",
            &["transId", "cmdObj", "streamName", "start", "duration", "reset"],
        );
        m.insert("FCSubscribe", &["transId", "cmdObj", "streamName"]);
        m.insert("getStreamLength", &["transId", "cmdObj", "streamId"]);
        m.insert("receiveAudio", &["transId", "cmdObj", "bool"]);
        m.insert("receiveVideo", &["transId", "cmdObj", "bool"]);
        m.insert("seek", &["transId", "cmdObj", "ms"]);
        m.insert("pause", &["transId", "cmdObj", "pause", "ms"]);

        m
    });

impl RtmpCommand {
    /// Creates RtmpCommand
    pub fn new(cmd: &str) -> RtmpCommand {
        RtmpCommand {
            cmd: cmd.to_string(),
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

    /// Gets the transaction ID (0 if missing)
    pub fn get_transaction_id(&self) -> i64 {
        self.get_argument("transId")
            .map(|t| t.get_integer())
            .unwrap_or(0)
    }

    /// Gets string representation of the command for debug logging
    pub fn to_debug_string(&self) -> String {
        let mut names: Vec<&String> = self.arguments.keys().collect();
        names.sort();

        let mut s = format!("{} {{\n", self.cmd);

        for arg_name in names {
            if let Some(arg_val) = self.arguments.get(arg_name) {
                s.push_str(&format!(
                    "    '{}' = {}\n",
                    arg_name,
                    arg_val.to_debug_string("    ")
                ));
            }
        }

        s.push('}');

        s
    }

    /// Encodes command.
    /// Missing arguments are encoded as undefined, to keep their positions.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = AMF0Value::string(&self.cmd).encode();

        if let Some(arg_list) = RTMP_COMMAND_CODES.get(self.cmd.as_str()) {
            for arg_name in arg_list.iter() {
                match self.arguments.get(*arg_name) {
                    Some(val) => buf.extend(val.encode()),
                    None => buf.extend(AMF0Value::Undefined.encode()),
                }
            }
        }

        buf
    }

    /// Decodes command from bytes.
    /// Arguments of unknown commands are not decoded.
    pub fn decode(data: &[u8]) -> Result<RtmpCommand, ()> {
        let mut cursor = AMFDecodingCursor::new(data);

        let cmd_amf = AMF0Value::read(&mut cursor)?;
        let cmd = cmd_amf.as_string().ok_or(())?;

        let mut c = RtmpCommand::new(cmd);

        if let Some(arg_list) = RTMP_COMMAND_CODES.get(cmd) {
            for arg_name in arg_list.iter() {
                if cursor.ended() {
                    break;
                }

                let val = AMF0Value::read(&mut cursor)?;

                c.set_argument(arg_name, val);
            }
        }

        Ok(c)
    }
}
