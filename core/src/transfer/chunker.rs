use std::io::Read;

use super::TransferChunk;
use crate::errors::{FileEngineError, Result};

/// Lazily splits a byte source into ordered chunks of at most `chunk_size`.
///
/// Works over anything that implements [`Read`]: byte slices, files,
/// cursors, sockets. At most two chunks are buffered (the one being yielded
/// and a look-ahead that decides whether it is final). After the final chunk
/// or an error the iterator is exhausted.
pub struct Chunker<R> {
    source: R,
    chunk_size: usize,
    limit: Option<u64>,
    next_seq: u64,
    total: u64,
    lookahead: Option<Vec<u8>>,
    done: bool,
}

impl<R: Read> Chunker<R> {
    /// # Panics
    ///
    /// Panics if `chunk_size` is 0.
    pub fn new(source: R, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk_size must be non-zero");
        Self {
            source,
            chunk_size,
            limit: None,
            next_seq: 0,
            total: 0,
            lookahead: None,
            done: false,
        }
    }

    /// Fail with [`FileEngineError::PayloadTooLarge`] once more than `limit`
    /// bytes have been read.
    pub fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    /// Total payload bytes yielded so far.
    pub fn bytes_read(&self) -> u64 {
        self.total
    }

    /// Read up to one chunk. A short result means the source is exhausted.
    fn fill(&mut self) -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.chunk_size);
        (&mut self.source)
            .take(self.chunk_size as u64)
            .read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn next_chunk(&mut self) -> Result<TransferChunk> {
        let current = match self.lookahead.take() {
            Some(buf) => buf,
            None => self.fill()?,
        };

        let is_final = if current.len() < self.chunk_size {
            true
        } else {
            let next = self.fill()?;
            if next.is_empty() {
                true
            } else {
                self.lookahead = Some(next);
                false
            }
        };

        self.total += current.len() as u64;
        if let Some(limit) = self.limit {
            if self.total > limit {
                return Err(FileEngineError::over_limit(limit));
            }
        }

        let chunk = TransferChunk::new(self.next_seq, current, is_final);
        self.next_seq += 1;
        Ok(chunk)
    }
}

impl<R: Read> Iterator for Chunker<R> {
    type Item = Result<TransferChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = self.next_chunk();
        self.done = match &result {
            Ok(chunk) => chunk.is_final,
            Err(_) => true,
        };
        Some(result)
    }
}
