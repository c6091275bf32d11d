//! Chunked transfer codec.
//!
//! Uploads split a byte source into an ordered, bounded sequence of
//! [`TransferChunk`]s ([`Chunker`]); downloads validate and concatenate a
//! received sequence ([`Reassembler`]). Both sides enforce the same
//! invariants: sequence numbers start at 0 with no gaps, exactly the last
//! chunk is final, and an empty transfer is still one (empty, final) chunk.

mod chunker;
mod reassembly;

pub use chunker::Chunker;
pub use reassembly::{reassemble, Reassembler};

/// Default upload chunk size: 256 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Largest chunk whose base64 form still fits a 1 MiB protocol line.
pub const MAX_CHUNK_SIZE: usize = 512 * 1024;

/// One piece of a payload in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferChunk {
    pub seq: u64,
    pub data: Vec<u8>,
    pub is_final: bool,
}

impl TransferChunk {
    pub fn new(seq: u64, data: Vec<u8>, is_final: bool) -> Self {
        Self {
            seq,
            data,
            is_final,
        }
    }
}
