//! Splitting a validated record set into bounded chunks.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::{CoreError, RawRecord};

/// A bounded slice of the input batch processed as one queue job.
///
/// Chunks are immutable once cut; `index` is the position in dispatch order
/// and `offset` the position of the first record in the original input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub offset: usize,
    pub records: Vec<RawRecord>,
}

impl Chunk {
    /// Number of records in this chunk.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the chunk carries no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Label used when the chunk as a whole is reported, e.g.
    /// `chunk 2 (records 101-200)`. Both numbers are 1-based.
    pub fn label(&self) -> String {
        format!(
            "chunk {} (records {}-{})",
            self.index + 1,
            self.offset + 1,
            self.offset + self.records.len()
        )
    }
}

/// Lazy, restartable chunk boundaries over a borrowed record slice.
///
/// Boundaries are a pure function of the input length and chunk size, so
/// iterating the same plan twice yields identical chunks.
#[derive(Debug, Clone, Copy)]
pub struct ChunkPlan<'a> {
    records: &'a [RawRecord],
    size: NonZeroUsize,
}

impl<'a> ChunkPlan<'a> {
    /// Plan chunks of at most `max_chunk_size` records.
    ///
    /// A zero chunk size is a configuration error and is never defaulted.
    pub fn new(records: &'a [RawRecord], max_chunk_size: usize) -> Result<Self, CoreError> {
        let size = NonZeroUsize::new(max_chunk_size).ok_or_else(|| {
            CoreError::Config("maxChunkSize must be a positive integer, got 0".to_string())
        })?;
        Ok(Self { records, size })
    }

    /// Number of chunks, `ceil(len / size)`.
    pub fn len(&self) -> usize {
        self.records.len().div_ceil(self.size.get())
    }

    /// Returns true if there is nothing to chunk.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Maximum records per chunk.
    pub fn chunk_size(&self) -> usize {
        self.size.get()
    }

    /// Iterate chunks in input order. Each call starts from the beginning.
    pub fn iter(&self) -> impl Iterator<Item = Chunk> + 'a {
        let size = self.size.get();
        self.records
            .chunks(size)
            .enumerate()
            .map(move |(index, records)| Chunk {
                index,
                offset: index * size,
                records: records.to_vec(),
            })
    }
}
