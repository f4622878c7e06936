//! Bump arena allocator for bulk allocations outside the hot path
//! (batch construction of synthetic load, scratch buffers for a
//! benchmark run).
//!
//! COMPLIANCE:
//! - Pre-allocated chunks
//! - No allocations in hot paths
//! - Cache-line aligned
//! - Fast reset for reuse

use std::alloc::{alloc, dealloc, Layout};
use std::mem::{align_of, size_of};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

const CACHE_LINE_SIZE: usize = 64;

/// Bump allocator over pre-allocated chunks. `alloc` never grows the
/// chunk list; `reset` reclaims everything in O(chunks) without
/// deallocating.
pub struct Arena {
    chunks: Vec<ArenaChunk>,
    current: AtomicUsize,
    chunk_size: usize,
}

struct ArenaChunk {
    data: NonNull<u8>,
    size: usize,
    used: AtomicUsize,
}

unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

impl Arena {
    /// Pre-allocate a single chunk of (at least) `chunk_size` bytes,
    /// rounded up to a cache-line multiple.
    pub fn new(chunk_size: usize) -> Result<Self, String> {
        let mut chunks = Vec::with_capacity(16);

        if chunk_size > 0 {
            const ALIGN: usize = CACHE_LINE_SIZE;
            let size = (chunk_size + ALIGN - 1) & !(ALIGN - 1);

            let layout = Layout::from_size_align(size, ALIGN).map_err(|e| format!("invalid layout: {e}"))?;

            let data = unsafe {
                let ptr = alloc(layout);
                if ptr.is_null() {
                    return Err(format!("failed to allocate {size} bytes for arena chunk"));
                }
                NonNull::new_unchecked(ptr)
            };

            chunks.push(ArenaChunk { data, size, used: AtomicUsize::new(0) });
        }

        Ok(Self { chunks, current: AtomicUsize::new(0), chunk_size })
    }

    /// Allocate space for one `T` from the current chunk. `None` if
    /// `T` doesn't fit in a chunk, or the current chunk is full
    /// (growing requires a new `Arena`; this type doesn't grow itself).
    #[inline]
    #[must_use]
    pub fn alloc<T>(&self) -> Option<&mut T> {
        let size = size_of::<T>();
        let align = align_of::<T>();

        if size > self.chunk_size {
            return None;
        }

        let current_idx = self.current.load(Ordering::Acquire);
        if current_idx >= self.chunks.len() {
            return None;
        }
        let chunk = &self.chunks[current_idx];

        loop {
            let current_offset = chunk.used.load(Ordering::Acquire);
            let aligned_offset = (current_offset + align - 1) & !(align - 1);
            let end_offset = aligned_offset + size;

            if end_offset > chunk.size {
                return None;
            }

            if chunk.used.compare_exchange_weak(current_offset, end_offset, Ordering::Release, Ordering::Acquire).is_ok()
            {
                let ptr = unsafe { chunk.data.as_ptr().add(aligned_offset).cast::<T>() };
                return Some(unsafe { &mut *ptr });
            }
        }
    }

    /// Reclaim all chunks for reuse without deallocating them.
    pub fn reset(&mut self) {
        for chunk in &self.chunks {
            chunk.used.store(0, Ordering::Release);
        }
        self.current.store(0, Ordering::Release);
    }

    /// Current utilization, for benchmark reporting.
    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        let mut total_size = 0;
        let mut total_used = 0;
        for chunk in &self.chunks {
            total_size += chunk.size;
            total_used += chunk.used.load(Ordering::Relaxed);
        }
        ArenaStats { chunks: self.chunks.len(), total_size, total_used, chunk_size: self.chunk_size }
    }
}

impl Drop for ArenaChunk {
    fn drop(&mut self) {
        unsafe {
            let layout = Layout::from_size_align_unchecked(self.size, CACHE_LINE_SIZE);
            dealloc(self.data.as_ptr(), layout);
        }
    }
}

/// Arena utilization snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ArenaStats {
    /// Number of chunks allocated.
    pub chunks: usize,
    /// Total bytes across all chunks.
    pub total_size: usize,
    /// Bytes currently claimed across all chunks.
    pub total_used: usize,
    /// Configured per-chunk size.
    pub chunk_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_and_reads_back_distinct_types() {
        let arena = Arena::new(1024).unwrap();

        let obj1: &mut i32 = arena.alloc().unwrap();
        *obj1 = 42;
        let obj2: &mut i64 = arena.alloc().unwrap();
        *obj2 = 100;

        assert_eq!(*obj1, 42);
        assert_eq!(*obj2, 100);
        assert!(arena.stats().total_used > 0);
    }

    #[test]
    fn alignment_is_respected_across_mixed_sizes() {
        let arena = Arena::new(1024).unwrap();

        let byte: &mut u8 = arena.alloc().unwrap();
        *byte = 1;
        let dword: &mut u64 = arena.alloc().unwrap();

        let addr = dword as *mut u64 as usize;
        assert_eq!(addr % align_of::<u64>(), 0);
    }

    #[test]
    fn reset_reclaims_without_deallocating_chunks() {
        let mut arena = Arena::new(1024).unwrap();
        for i in 0..10 {
            let obj: &mut i32 = arena.alloc().unwrap();
            *obj = i;
        }
        let before = arena.stats();
        assert!(before.total_used > 0);

        arena.reset();
        let after = arena.stats();
        assert_eq!(after.total_used, 0);
        assert_eq!(after.chunks, before.chunks);
    }
}
