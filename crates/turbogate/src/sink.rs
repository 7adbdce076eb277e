//! Network-facing response writer seam
//!
//! The gateway never owns a socket. It writes through a [`ResponseSink`]
//! supplied by whatever terminates the connection. A failed write is treated
//! as a client disconnect.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use thiserror::Error;
use turbogate_types::TransportResponse;

/// Write failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SinkError {
    /// The client went away
    #[error("Client disconnected")]
    Disconnected,

    /// Any other write failure
    #[error("Write failed: {0}")]
    Write(String),
}

/// Destination for the client-visible response
#[async_trait]
pub trait ResponseSink: Send + Sync {
    /// Write a complete non-streaming response
    async fn send_response(&self, response: &TransportResponse) -> Result<(), SinkError>;

    /// Write the status and headers that open a stream
    async fn start_stream(&self, head: &TransportResponse) -> Result<(), SinkError>;

    /// Write one framed chunk
    async fn send_chunk(&self, frame: Bytes) -> Result<(), SinkError>;

    /// Write a final error frame and close the stream
    async fn abort_stream(&self, frame: Bytes) -> Result<(), SinkError>;

    /// Write the terminating frame and close the stream
    async fn finish_stream(&self, frame: Bytes) -> Result<(), SinkError>;
}

/// How a buffered stream ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// Finished normally
    Finished(Bytes),
    /// Aborted with an error frame
    Aborted(Bytes),
}

#[derive(Debug, Default)]
struct Buffered {
    response: Option<TransportResponse>,
    head: Option<TransportResponse>,
    frames: Vec<Bytes>,
    end: Option<StreamEnd>,
}

/// Sink that keeps everything in memory
///
/// Useful for embedding the gateway behind another server and for tests.
/// [`BufferedSink::disconnect_after`] simulates a client that drops the
/// connection after a number of chunks.
#[derive(Debug, Default)]
pub struct BufferedSink {
    inner: Mutex<Buffered>,
    disconnect_after: Option<usize>,
}

impl BufferedSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose chunk writes fail once `frames` chunks have been written
    pub fn disconnect_after(frames: usize) -> Self {
        Self {
            inner: Mutex::default(),
            disconnect_after: Some(frames),
        }
    }

    /// The non-streaming response, if one was written
    pub fn response(&self) -> Option<TransportResponse> {
        self.inner.lock().response.clone()
    }

    /// The stream head, if a stream was started
    pub fn stream_head(&self) -> Option<TransportResponse> {
        self.inner.lock().head.clone()
    }

    /// Chunk frames written so far
    pub fn frames(&self) -> Vec<Bytes> {
        self.inner.lock().frames.clone()
    }

    /// How the stream ended, if it did
    pub fn stream_end(&self) -> Option<StreamEnd> {
        self.inner.lock().end.clone()
    }

    fn ensure_open(&self, buffered: &Buffered) -> Result<(), SinkError> {
        if buffered.end.is_some() {
            return Err(SinkError::Write("stream already closed".into()));
        }
        match self.disconnect_after {
            Some(limit) if buffered.frames.len() >= limit => Err(SinkError::Disconnected),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ResponseSink for BufferedSink {
    async fn send_response(&self, response: &TransportResponse) -> Result<(), SinkError> {
        let mut inner = self.inner.lock();
        if inner.response.is_some() || inner.head.is_some() {
            return Err(SinkError::Write("response already sent".into()));
        }
        inner.response = Some(response.clone());
        Ok(())
    }

    async fn start_stream(&self, head: &TransportResponse) -> Result<(), SinkError> {
        let mut inner = self.inner.lock();
        if inner.response.is_some() || inner.head.is_some() {
            return Err(SinkError::Write("response already sent".into()));
        }
        inner.head = Some(head.clone());
        Ok(())
    }

    async fn send_chunk(&self, frame: Bytes) -> Result<(), SinkError> {
        let mut inner = self.inner.lock();
        self.ensure_open(&inner)?;
        inner.frames.push(frame);
        Ok(())
    }

    async fn abort_stream(&self, frame: Bytes) -> Result<(), SinkError> {
        let mut inner = self.inner.lock();
        self.ensure_open(&inner)?;
        inner.end = Some(StreamEnd::Aborted(frame));
        Ok(())
    }

    async fn finish_stream(&self, frame: Bytes) -> Result<(), SinkError> {
        let mut inner = self.inner.lock();
        self.ensure_open(&inner)?;
        inner.end = Some(StreamEnd::Finished(frame));
        Ok(())
    }
}
