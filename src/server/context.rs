// Server context shared by every session

use std::sync::Arc;

use super::{IdSource, RtmpServerConfiguration, ServerHandler, StreamRegistry};

/// RTMP server context
#[derive(Clone)]
pub struct RtmpServerContext {
    /// Server configuration
    pub config: Arc<RtmpServerConfiguration>,

    /// Published streams
    pub registry: Arc<StreamRegistry>,

    /// Unique ID source for sessions and streams
    pub id_source: Arc<dyn IdSource>,

    /// Application handler
    pub handler: Arc<dyn ServerHandler>,
}

impl RtmpServerContext {
    /// Creates a server context with an empty registry
    pub fn new(
        config: Arc<RtmpServerConfiguration>,
        id_source: Arc<dyn IdSource>,
        handler: Arc<dyn ServerHandler>,
    ) -> RtmpServerContext {
        RtmpServerContext {
            config,
            registry: Arc::new(StreamRegistry::new()),
            id_source,
            handler,
        }
    }
}
