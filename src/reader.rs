//! Chunked input reading that never splits a record.

use std::io::{self, ErrorKind, Read};

use crossbeam_channel::Sender;
use tracing::debug;

/// Default block size. Large enough to amortize read syscalls over tens of
/// millions of records.
pub const DEFAULT_BLOCK_SIZE: usize = 32 * 1024 * 1024;

/// Streams a source in fixed-size blocks and emits record-aligned chunks.
///
/// Each block is cut at its last newline: everything up to and including
/// that newline, prefixed by the leftover tail of the previous block, is
/// sent as one chunk; the remainder is carried forward. A block with no
/// newline at all just extends the leftover. At end of stream any
/// remaining leftover (a final record with no trailing newline) is sent as
/// a last chunk. Chunks therefore contain only whole records, and their
/// concatenation reproduces the source byte for byte.
pub struct ChunkReader<R> {
    source: R,
    block_size: usize,
    leftover: Vec<u8>,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(source: R, block_size: usize) -> Self {
        assert!(block_size > 0, "block size must be non-zero");
        ChunkReader {
            source,
            block_size,
            leftover: Vec::new(),
        }
    }

    /// Reads the source to completion, sending chunks in file order.
    ///
    /// Any read error other than end-of-stream is fatal and propagated.
    /// A closed channel means the consumers are gone; the reader stops
    /// without treating that as an error of its own.
    pub fn run(mut self, chunks: &Sender<Vec<u8>>) -> io::Result<()> {
        let mut block = vec![0u8; self.block_size];
        let mut sent = 0usize;
        loop {
            let n = match self.source.read(&mut block) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if n == 0 {
                if !self.leftover.is_empty() {
                    if chunks.send(std::mem::take(&mut self.leftover)).is_err() {
                        return Ok(());
                    }
                    sent += 1;
                }
                debug!(chunks = sent, "input fully read");
                return Ok(());
            }

            let mut chunk = std::mem::take(&mut self.leftover);
            chunk.extend_from_slice(&block[..n]);
            match memchr::memrchr(b'\n', &chunk) {
                Some(last) => {
                    self.leftover.extend_from_slice(&chunk[last + 1..]);
                    chunk.truncate(last + 1);
                    if chunks.send(chunk).is_err() {
                        return Ok(());
                    }
                    sent += 1;
                }
                // No record boundary yet, keep accumulating.
                None => self.leftover = chunk,
            }
        }
    }
}
