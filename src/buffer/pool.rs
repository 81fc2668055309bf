//! Pool of fixed-size read-ahead buffers.
//!
//! # Responsibilities
//! - Hand out buffers with a fixed capacity
//! - Take buffers back when their guard drops
//! - Track checkouts so leaks are observable

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use crossbeam_queue::ArrayQueue;

/// Default read-ahead buffer size (16 MiB).
pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// Default number of idle buffers kept for reuse.
pub const DEFAULT_MAX_IDLE: usize = 32;

struct Shared {
    idle: ArrayQueue<Vec<u8>>,
    buffer_size: usize,
    allocations: AtomicU64,
    reuses: AtomicU64,
    outstanding: AtomicUsize,
}

/// Thread-safe pool of read-ahead buffers.
///
/// Cloning is cheap; all clones share the same idle queue.
#[derive(Clone)]
pub struct BufferPool {
    shared: Arc<Shared>,
}

impl BufferPool {
    /// Create a pool handing out buffers of `buffer_size` bytes and keeping
    /// at most `max_idle` of them around between uses.
    pub fn new(buffer_size: usize, max_idle: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                idle: ArrayQueue::new(max_idle.max(1)),
                buffer_size,
                allocations: AtomicU64::new(0),
                reuses: AtomicU64::new(0),
                outstanding: AtomicUsize::new(0),
            }),
        }
    }

    /// Check out an empty buffer.
    ///
    /// The buffer goes back to the pool when the returned guard (or any
    /// [`Bytes`] frozen from it) is dropped.
    pub fn checkout(&self) -> PooledBuffer {
        let buf = match self.shared.idle.pop() {
            Some(buf) => {
                self.shared.reuses.fetch_add(1, Ordering::Relaxed);
                buf
            }
            None => {
                self.shared.allocations.fetch_add(1, Ordering::Relaxed);
                Vec::with_capacity(self.shared.buffer_size)
            }
        };
        self.shared.outstanding.fetch_add(1, Ordering::Relaxed);

        PooledBuffer {
            buf,
            shared: self.shared.clone(),
        }
    }

    /// Capacity of every buffer handed out by this pool.
    pub fn buffer_size(&self) -> usize {
        self.shared.buffer_size
    }

    /// Point-in-time counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            idle: self.shared.idle.len(),
            outstanding: self.shared.outstanding.load(Ordering::Relaxed),
            allocations: self.shared.allocations.load(Ordering::Relaxed),
            reuses: self.shared.reuses.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("buffer_size", &self.shared.buffer_size)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Snapshot of pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Buffers sitting in the idle queue.
    pub idle: usize,
    /// Buffers currently checked out.
    pub outstanding: usize,
    /// Checkouts that had to allocate.
    pub allocations: u64,
    /// Checkouts served from the idle queue.
    pub reuses: u64,
}

/// A checked-out buffer. Returned to its pool on drop.
pub struct PooledBuffer {
    buf: Vec<u8>,
    shared: Arc<Shared>,
}

impl PooledBuffer {
    /// Bytes that can still be written before the buffer is full.
    pub fn remaining(&self) -> usize {
        self.shared.buffer_size - self.buf.len()
    }

    pub fn is_full(&self) -> bool {
        self.remaining() == 0
    }

    /// Append as much of `data` as fits and return the number of bytes taken.
    pub fn fill_from(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.remaining());
        self.buf.extend_from_slice(&data[..n]);
        n
    }

    /// Turn the filled part into [`Bytes`] without copying.
    ///
    /// The buffer returns to the pool once the last clone of the `Bytes` is
    /// dropped.
    pub fn freeze(self) -> Bytes {
        Bytes::from_owner(self)
    }
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl AsRef<[u8]> for PooledBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

impl fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.buf.len())
            .field("capacity", &self.shared.buffer_size)
            .finish()
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let mut buf = std::mem::take(&mut self.buf);
        buf.clear();
        self.shared.outstanding.fetch_sub(1, Ordering::Relaxed);

        // A full idle queue frees the surplus buffer.
        let _ = self.shared.idle.push(buf);
    }
}
