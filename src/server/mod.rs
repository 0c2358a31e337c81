// RTMP server

mod config;
mod connection_handle;
mod context;
mod handler;
mod id_generator;
mod registry;
mod tcp;

pub use config::*;
pub use connection_handle::*;
pub use context::*;
pub use handler::*;
pub use id_generator::*;
pub use registry::*;
pub use tcp::*;
