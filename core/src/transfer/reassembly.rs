use std::io::Write;

use super::TransferChunk;
use crate::errors::{FileEngineError, Result};

/// Validates an incoming chunk sequence and writes payloads to a sink.
///
/// The sink defaults to an in-memory `Vec<u8>`; any [`Write`] works, which
/// lets downloads stream straight into a file.
#[derive(Debug)]
pub struct Reassembler<W = Vec<u8>> {
    sink: W,
    next_seq: u64,
    bytes: u64,
    complete: bool,
    limit: Option<u64>,
}

impl Reassembler<Vec<u8>> {
    pub fn new() -> Self {
        Self::with_sink(Vec::new())
    }
}

impl Default for Reassembler<Vec<u8>> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Reassembler<W> {
    pub fn with_sink(sink: W) -> Self {
        Self {
            sink,
            next_seq: 0,
            bytes: 0,
            complete: false,
            limit: None,
        }
    }

    /// Fail with [`FileEngineError::PayloadTooLarge`] past `limit` bytes.
    pub fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    /// Accept the next chunk. Returns `true` once the final chunk is in.
    pub fn push(&mut self, chunk: TransferChunk) -> Result<bool> {
        if self.complete {
            return Err(FileEngineError::TransferCorrupted(format!(
                "chunk {} received after the final chunk",
                chunk.seq
            )));
        }
        if chunk.seq > self.next_seq {
            return Err(FileEngineError::TransferCorrupted(format!(
                "gap in chunk sequence: expected {}, got {}",
                self.next_seq, chunk.seq
            )));
        }
        if chunk.seq < self.next_seq {
            return Err(FileEngineError::TransferCorrupted(format!(
                "duplicate or out-of-order chunk: expected {}, got {}",
                self.next_seq, chunk.seq
            )));
        }

        let len = chunk.data.len() as u64;
        if let Some(limit) = self.limit {
            if self.bytes + len > limit {
                return Err(FileEngineError::over_limit(limit));
            }
        }

        self.sink.write_all(&chunk.data)?;
        self.bytes += len;
        self.next_seq += 1;
        self.complete = chunk.is_final;
        Ok(self.complete)
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn chunks_received(&self) -> u64 {
        self.next_seq
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes
    }

    /// Close the transfer and hand back the sink.
    ///
    /// Fails with [`FileEngineError::TransferTruncated`] if the final chunk
    /// never arrived, including when no chunk arrived at all.
    pub fn finish(mut self) -> Result<W> {
        if !self.complete {
            return Err(FileEngineError::truncated_after(self.next_seq));
        }
        self.sink.flush()?;
        Ok(self.sink)
    }
}

/// Reassemble a complete chunk sequence into one buffer.
pub fn reassemble<I>(chunks: I, limit: Option<u64>) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = TransferChunk>,
{
    let mut reassembler = Reassembler::new().with_limit(limit);
    for chunk in chunks {
        reassembler.push(chunk)?;
    }
    reassembler.finish()
}
