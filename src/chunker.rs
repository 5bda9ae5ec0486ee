//! Bounded, acknowledgment-gated reader for media sources.
//!
//! The chunker holds at most one segment in flight. `next_segment` refuses to
//! read until the previous segment has been acknowledged, which keeps memory
//! bounded to one chunk regardless of network latency. End of data is only
//! reported once the source is exhausted and the last segment acknowledged.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{
    errors::{Error, Result, ValidationError},
    UPLOAD_CHUNK_SIZE,
};

/// One bounded slice of the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    index: u32,
    bytes: Vec<u8>,
}

impl Segment {
    /// Zero-based position within the source.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Segment encoded for transport.
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }
}

pub struct StreamChunker<R> {
    // Dropped as soon as the source is exhausted or fails.
    reader: Option<R>,
    chunk_size: usize,
    next_index: u32,
    in_flight: Option<u32>,
}

impl StreamChunker<tokio::fs::File> {
    /// Open a file with the default 5 MiB chunk size.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_chunk_size(path, UPLOAD_CHUNK_SIZE).await
    }

    pub async fn open_with_chunk_size(path: impl AsRef<Path>, chunk_size: usize) -> Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self::new(file, chunk_size))
    }
}

impl<R: AsyncRead + Unpin> StreamChunker<R> {
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader: Some(reader),
            chunk_size: chunk_size.max(1),
            next_index: 0,
            in_flight: None,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of segments handed out so far.
    pub fn segments_emitted(&self) -> u32 {
        self.next_index
    }

    /// Pull the next segment.
    ///
    /// Returns `Ok(None)` once the source is exhausted. A read error ends the
    /// sequence: it is returned once and later calls yield `Ok(None)`.
    pub async fn next_segment(&mut self) -> Result<Option<Segment>> {
        if let Some(pending) = self.in_flight {
            return Err(Error::Validation(ValidationError::new(format!(
                "segment {pending} has not been acknowledged"
            ))));
        }
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        let mut bytes = Vec::with_capacity(self.chunk_size);
        let read = reader
            .take(self.chunk_size as u64)
            .read_to_end(&mut bytes)
            .await;
        if let Err(err) = read {
            self.reader = None;
            return Err(err.into());
        }

        // A short read only happens at end of data.
        if bytes.len() < self.chunk_size {
            self.reader = None;
        }
        if bytes.is_empty() {
            return Ok(None);
        }

        let index = self.next_index;
        self.next_index += 1;
        self.in_flight = Some(index);
        Ok(Some(Segment { index, bytes }))
    }

    /// Signal that `index` has been handed to the network, allowing the next read.
    pub fn acknowledge(&mut self, index: u32) -> Result<()> {
        match self.in_flight {
            Some(pending) if pending == index => {
                self.in_flight = None;
                Ok(())
            }
            _ => Err(Error::Validation(ValidationError::new(format!(
                "segment {index} is not in flight"
            )))),
        }
    }

    /// True once the source has been fully read and every segment acknowledged.
    pub fn is_finished(&self) -> bool {
        self.reader.is_none() && self.in_flight.is_none()
    }
}
