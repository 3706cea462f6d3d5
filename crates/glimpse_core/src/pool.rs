//! Process-wide recyclable byte buffers.
//!
//! A [`PooledBuffer`] is an RAII borrow: it derefs to `Vec<u8>` and goes back
//! to its pool when dropped, so a buffer has exactly one holder and cannot be
//! touched after it is returned.

use parking_lot::Mutex;
use std::io::{self, Read};
use std::ops::{Deref, DerefMut};
use std::sync::LazyLock;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Capacity reserved for a freshly allocated buffer.
pub const MIN_BUF_SIZE: usize = 10 << 10;

/// Buffers larger than this are freed instead of retained.
pub const MAX_RETAINED_CAPACITY: usize = 64 << 20;

/// Most idle buffers kept by one pool.
pub const MAX_IDLE_BUFFERS: usize = 64;

static GLOBAL: LazyLock<BufferPool> = LazyLock::new(BufferPool::new);

/// Bounded free list of byte buffers, safe to share between threads.
#[derive(Debug)]
pub struct BufferPool {
    idle: Mutex<Vec<Vec<u8>>>,
    max_idle: usize,
    max_capacity: usize,
    high_water_mark: AtomicUsize,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::with_limits(MAX_IDLE_BUFFERS, MAX_RETAINED_CAPACITY)
    }

    pub fn with_limits(max_idle: usize, max_capacity: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
            max_capacity,
            high_water_mark: AtomicUsize::new(0),
        }
    }

    /// The shared pool used when no other pool is supplied.
    pub fn global() -> &'static BufferPool {
        &GLOBAL
    }

    /// Borrows an empty buffer with at least [`MIN_BUF_SIZE`] capacity.
    pub fn take(&self) -> PooledBuffer<'_> {
        self.take_with_capacity(MIN_BUF_SIZE)
    }

    /// Borrows an empty buffer with room for at least `hint` bytes.
    pub fn take_with_capacity(&self, hint: usize) -> PooledBuffer<'_> {
        let recycled = self.idle.lock().pop();
        let mut buf = recycled.unwrap_or_default();
        buf.reserve(hint.max(MIN_BUF_SIZE));
        PooledBuffer {
            buf: Some(buf),
            pool: self,
        }
    }

    /// Reads `reader` to the end into a pooled buffer.
    pub fn read_all<R: Read + ?Sized>(&self, reader: &mut R) -> io::Result<PooledBuffer<'_>> {
        let mut buf = self.take();
        reader.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Number of idle buffers currently retained.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    /// Largest length any returned buffer has reached.
    #[inline]
    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark.load(Ordering::Relaxed)
    }

    fn give_back(&self, mut buf: Vec<u8>) {
        self.high_water_mark.fetch_max(buf.len(), Ordering::Relaxed);
        if buf.capacity() > self.max_capacity {
            return;
        }
        buf.clear();
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(buf);
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

/// A buffer on loan from a [`BufferPool`].
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    // Only `None` after `into_vec` or during drop.
    buf: Option<Vec<u8>>,
    pool: &'a BufferPool,
}

impl PooledBuffer<'_> {
    /// Detaches the buffer from the pool. It will not be recycled.
    pub fn into_vec(mut self) -> Vec<u8> {
        self.buf.take().unwrap_or_default()
    }
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    #[inline]
    fn deref(&self) -> &Vec<u8> {
        // `buf` is only vacated by consuming methods and Drop.
        self.buf.as_ref().unwrap_or(&EMPTY)
    }
}

impl DerefMut for PooledBuffer<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        self.buf.get_or_insert_with(Vec::new)
    }
}

impl AsRef<[u8]> for PooledBuffer<'_> {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.give_back(buf);
        }
    }
}

static EMPTY: Vec<u8> = Vec::new();
