/// An inclusive byte range of the remote resource fetched as one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub start: u64,
    pub end: u64,
}

impl Chunk {
    pub fn new(index: usize, start: u64, end: u64) -> Self {
        Self { index, start, end }
    }

    pub fn size(&self) -> u64 {
        if self.end >= self.start {
            self.end - self.start + 1
        } else {
            0
        }
    }
}

/// How the transfer is split once the remote resource has been probed.
///
/// Ranged chunks are derived from their index on demand, so a tiny chunk
/// size on a huge resource costs nothing up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkPlan {
    /// One request without a `Range` header; size may be unknown.
    Single,
    /// Contiguous ranged requests of `chunk_size` bytes, the last one
    /// absorbing the remainder.
    Ranged { total_bytes: u64, chunk_size: u64 },
}

impl ChunkPlan {
    pub fn len(&self) -> usize {
        match self {
            ChunkPlan::Single => 1,
            ChunkPlan::Ranged {
                total_bytes,
                chunk_size,
            } => usize::try_from(total_bytes.div_ceil(*chunk_size)).unwrap_or(usize::MAX),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_ranged(&self) -> bool {
        matches!(self, ChunkPlan::Ranged { .. })
    }

    pub fn chunk_size(&self) -> u64 {
        match self {
            ChunkPlan::Single => 0,
            ChunkPlan::Ranged { chunk_size, .. } => *chunk_size,
        }
    }

    pub fn chunk(&self, index: usize) -> Option<Chunk> {
        match *self {
            ChunkPlan::Single => (index == 0).then(|| Chunk::new(0, 0, 0)),
            ChunkPlan::Ranged {
                total_bytes,
                chunk_size,
            } => {
                let start = u64::try_from(index).ok()?.checked_mul(chunk_size)?;
                if start >= total_bytes {
                    return None;
                }
                let end = start.saturating_add(chunk_size - 1).min(total_bytes - 1);
                Some(Chunk::new(index, start, end))
            }
        }
    }
}

/// Chunk size the engine settles on when the caller left it at `0`.
pub fn effective_chunk_size(
    total_bytes: u64,
    requested: u64,
    concurrency: u32,
    min_chunk_size: u64,
    max_chunk_size: u64,
) -> u64 {
    if requested > 0 {
        return requested;
    }
    let mut size = total_bytes / u64::from(concurrency.max(1));
    if size < min_chunk_size {
        size = min_chunk_size;
    }
    if max_chunk_size > 0 && size > max_chunk_size {
        size = max_chunk_size;
    }
    size.max(1)
}

pub fn plan_chunks(
    total_bytes: u64,
    accept_ranges: bool,
    requested: u64,
    concurrency: u32,
    min_chunk_size: u64,
    max_chunk_size: u64,
) -> ChunkPlan {
    if total_bytes == 0 || !accept_ranges {
        return ChunkPlan::Single;
    }
    let chunk_size = effective_chunk_size(
        total_bytes,
        requested,
        concurrency,
        min_chunk_size,
        max_chunk_size,
    );
    ChunkPlan::Ranged {
        total_bytes,
        chunk_size: chunk_size.clamp(1, total_bytes),
    }
}
