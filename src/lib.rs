// RTMP server library

pub mod amf;
pub mod log;
pub mod rtmp;
pub mod server;
pub mod session;
pub mod utils;
