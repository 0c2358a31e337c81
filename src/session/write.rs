// Session write stream

use std::time::Duration;

use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::{Mutex, MutexGuard},
};

use crate::rtmp::{rtmp_make_chunk_size_set_message, rtmp_make_status_message, RTMP_CHUNK_SIZE};

use super::SessionError;

/// Write half of a session, plus the chunk size the client expects from us
pub struct SessionWriteStream<TW: AsyncWrite + Send + Unpin> {
    stream: TW,
    out_chunk_size: usize,
    write_timeout: Duration,
}

impl<TW: AsyncWrite + Send + Unpin> SessionWriteStream<TW> {
    /// Chunk size to use for outgoing messages
    pub fn out_chunk_size(&self) -> usize {
        self.out_chunk_size
    }

    /// Writes bytes to the client, failing if the write takes
    /// longer than the write timeout
    pub async fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        match tokio::time::timeout(self.write_timeout, self.stream.write_all(bytes)).await {
            Ok(r) => r.map_err(SessionError::Io),
            Err(_) => Err(SessionError::Timeout("writing to the client")),
        }
    }

    /// Tells the client the new chunk size and starts using it
    pub async fn set_out_chunk_size(&mut self, size: u32) -> Result<(), SessionError> {
        self.write_bytes(&rtmp_make_chunk_size_set_message(size))
            .await?;
        self.out_chunk_size = size as usize;
        Ok(())
    }

    /// Sends RTMP status message to the client
    ///
    /// # Arguments
    ///
    /// * `stream_id` - Stream ID subject of the status message
    /// * `level` - Status message level
    /// * `code` - Status code
    /// * `description` - Status description
    pub async fn send_status_message(
        &mut self,
        stream_id: u32,
        level: &str,
        code: &str,
        description: Option<&str>,
    ) -> Result<(), SessionError> {
        let msg_bytes =
            rtmp_make_status_message(stream_id, level, code, description, self.out_chunk_size);
        self.write_bytes(&msg_bytes).await
    }
}

/// Shared write side of a session.
/// The read loop and the writer task both write through it.
pub struct SessionWriter<TW: AsyncWrite + Send + Unpin> {
    inner: Mutex<SessionWriteStream<TW>>,
}

impl<TW: AsyncWrite + Send + Unpin> SessionWriter<TW> {
    /// Creates the writer. The chunk size starts at the protocol default.
    pub fn new(stream: TW, write_timeout: Duration) -> SessionWriter<TW> {
        SessionWriter {
            inner: Mutex::new(SessionWriteStream {
                stream,
                out_chunk_size: RTMP_CHUNK_SIZE,
                write_timeout,
            }),
        }
    }

    /// Locks the write stream, for sequences that must not be interleaved
    pub async fn lock(&self) -> MutexGuard<'_, SessionWriteStream<TW>> {
        self.inner.lock().await
    }

    /// Writes bytes to the session write stream
    pub async fn write_bytes(&self, bytes: &[u8]) -> Result<(), SessionError> {
        self.inner.lock().await.write_bytes(bytes).await
    }

    /// Builds a message with the current chunk size and writes it
    pub async fn write_chunked<F: FnOnce(usize) -> Vec<u8>>(
        &self,
        make_chunks: F,
    ) -> Result<(), SessionError> {
        let mut stream = self.inner.lock().await;
        let bytes = make_chunks(stream.out_chunk_size);
        stream.write_bytes(&bytes).await
    }

    /// Sends RTMP status message to the client
    pub async fn send_status_message(
        &self,
        stream_id: u32,
        level: &str,
        code: &str,
        description: Option<&str>,
    ) -> Result<(), SessionError> {
        self.inner
            .lock()
            .await
            .send_status_message(stream_id, level, code, description)
            .await
    }

    /// Shuts the write stream down. Errors are ignored, the peer may be gone.
    pub async fn shutdown(&self) {
        let mut stream = self.inner.lock().await;
        let timeout = stream.write_timeout;
        let _ = tokio::time::timeout(timeout, stream.stream.shutdown()).await;
    }
}
