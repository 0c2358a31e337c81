// RTMP session

mod chunk_read;
mod cleanup;
mod commands;
mod context;
mod error;
mod handle;
mod handle_invoke;
mod handle_media;
mod handle_packet;
mod handshake;
mod message;
mod msg_handle;
mod state;
mod status;
mod write;

pub use chunk_read::*;
pub use cleanup::*;
pub use commands::*;
pub use context::*;
pub use error::*;
pub use handle::*;
pub use handle_invoke::*;
pub use handle_media::*;
pub use handle_packet::*;
pub use handshake::*;
pub use message::*;
pub use msg_handle::*;
pub use state::*;
pub use status::*;
pub use write::*;
