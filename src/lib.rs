//! Per-key aggregate statistics (min/mean/max/count) over very large
//! `key;value` delimited text files, with a sorted, human-readable
//! summary as output.
//!
//! The pipeline is: one reader thread streaming the file in large
//! record-aligned chunks, a fixed pool of workers each turning chunks
//! into private partial maps, and a merge stage folding the partials
//! into the final map. The only shared state is the pair of channels;
//! aggregate maps are always owned by exactly one thread.

pub mod error;
pub mod parse;
pub mod reader;
pub mod stats;

pub use error::{Error, Result};
pub use parse::MalformedPolicy;
pub use stats::KeyStats;

use std::io::{Read, Write};
use std::num::NonZeroUsize;
use std::thread;

use bstr::BString;

use parse::{aggregate_chunk, PartialMap};
use reader::ChunkReader;

/// Pipeline tuning knobs.
#[derive(Debug, Clone)]
pub struct Config {
    /// Read block size in bytes.
    pub block_size: usize,
    /// Number of worker threads.
    pub workers: usize,
    /// What to do with records lacking a separator.
    pub malformed: MalformedPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            block_size: reader::DEFAULT_BLOCK_SIZE,
            workers: thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            malformed: MalformedPolicy::default(),
        }
    }
}

// Strategy:
// - One scoped reader thread pushes record-aligned chunks onto a bounded
//   channel; the bound keeps the reader from racing arbitrarily far ahead
//   of the workers and caps memory.
// - Each worker drains the chunk channel, aggregates locally without any
//   locking, and ships one partial map per chunk to the result channel.
// - The calling thread is the single consumer of the result channel and
//   merges partials as they arrive. Merge order is irrelevant because the
//   combination rule is commutative and associative.
// - Errors surface through the join handles after the channels drain, so
//   a failed run never produces partial output.

/// Aggregates every record in `source` and returns the per-key stats
/// sorted byte-wise by key.
pub fn process<R: Read + Send>(source: R, config: &Config) -> Result<Vec<(BString, KeyStats)>> {
    let workers = config.workers.max(1);
    let block_size = config.block_size;
    let policy = config.malformed;

    let (chunk_tx, chunk_rx) = crossbeam_channel::bounded::<Vec<u8>>(workers * 2);
    let (result_tx, result_rx) = crossbeam_channel::bounded::<PartialMap>(workers * 2);

    let merged = thread::scope(|s| -> Result<PartialMap> {
        let reader = s.spawn(move || ChunkReader::new(source, block_size).run(&chunk_tx));

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let chunk_rx = chunk_rx.clone();
            let result_tx = result_tx.clone();
            handles.push(s.spawn(move || -> Result<()> {
                for chunk in chunk_rx {
                    let partial = aggregate_chunk(&chunk, policy)?;
                    if result_tx.send(partial).is_err() {
                        break;
                    }
                }
                Ok(())
            }));
        }
        // The clones above keep the channels alive; the originals must go
        // so that closing is driven by the reader and workers finishing.
        drop(chunk_rx);
        drop(result_tx);

        let mut merged = PartialMap::default();
        for partial in result_rx {
            for (key, stats) in partial {
                merged
                    .entry(key)
                    .and_modify(|existing| existing.merge(&stats))
                    .or_insert(stats);
            }
        }

        reader.join().unwrap()?;
        for handle in handles {
            handle.join().unwrap()?;
        }
        Ok(merged)
    })?;

    // A HashMap is much cheaper to aggregate into than a BTreeMap, even
    // counting the cost of collecting and sorting the entries afterwards.
    let mut entries = merged.into_iter().collect::<Vec<_>>();
    entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}

/// Renders sorted entries as `key=min/mean/max, ` with one decimal place,
/// every entry followed by the separator.
pub fn write_summary(out: &mut impl Write, entries: &[(BString, KeyStats)]) -> std::io::Result<()> {
    for (key, stats) in entries {
        write!(out, "{key}={stats}, ")?;
    }
    Ok(())
}
