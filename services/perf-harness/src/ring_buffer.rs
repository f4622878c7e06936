//! Lock-free SPSC ring buffer for inter-thread communication.
//!
//! COMPLIANCE:
//! - Zero allocations
//! - Single producer, single consumer
//! - Cache-line aligned to prevent false sharing
//! - Wait-free push/pop

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Wait-free single-producer/single-consumer ring buffer, stack or
/// heap allocated depending on where the caller places it. Used as
/// the handoff queue between a feed reader thread and the processor
/// chain.
#[repr(C, align(64))]
pub struct RingBuffer<T, const N: usize> {
    buffer: [UnsafeCell<MaybeUninit<T>>; N],
    head: AtomicUsize,
    tail: AtomicUsize,
    cached_head: UnsafeCell<usize>,
    cached_tail: UnsafeCell<usize>,
    _padding: [u8; 48],
}

unsafe impl<T: Send, const N: usize> Send for RingBuffer<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for RingBuffer<T, N> {}

impl<T, const N: usize> RingBuffer<T, N> {
    /// An empty ring buffer. All storage is inline; no heap allocation
    /// happens here or on subsequent push/pop calls.
    #[must_use]
    pub const fn new() -> Self {
        let buffer = unsafe { MaybeUninit::<[UnsafeCell<MaybeUninit<T>>; N]>::uninit().assume_init() };

        Self {
            buffer,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            cached_head: UnsafeCell::new(0),
            cached_tail: UnsafeCell::new(0),
            _padding: [0; 48],
        }
    }

    /// Push a value from the single producer. Returns `false` if full.
    #[inline(always)]
    pub fn push(&self, value: T) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let next_tail = (tail + 1) % N;

        let cached_head = unsafe { *self.cached_head.get() };
        if next_tail == cached_head {
            let head = self.head.load(Ordering::Acquire);
            unsafe { *self.cached_head.get() = head };
            if next_tail == head {
                return false;
            }
        }

        unsafe {
            let slot = &mut *self.buffer[tail].get();
            slot.write(value);
        }

        self.tail.store(next_tail, Ordering::Release);
        true
    }

    /// Pop a value from the single consumer. Returns `None` if empty.
    #[inline(always)]
    pub fn pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);

        let cached_tail = unsafe { *self.cached_tail.get() };
        if head == cached_tail {
            let tail = self.tail.load(Ordering::Acquire);
            unsafe { *self.cached_tail.get() = tail };
            if head == tail {
                return None;
            }
        }

        let value = unsafe {
            let slot = &*self.buffer[head].get();
            slot.assume_init_read()
        };

        let next_head = (head + 1) % N;
        self.head.store(next_head, Ordering::Release);

        Some(value)
    }

    /// Whether the buffer currently holds no items.
    #[inline(always)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Relaxed) == self.tail.load(Ordering::Acquire)
    }

    /// Whether the buffer currently has no free slots.
    #[inline(always)]
    #[must_use]
    pub fn is_full(&self) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let next_tail = (tail + 1) % N;
        next_tail == self.head.load(Ordering::Acquire)
    }

    /// Number of items currently in the buffer.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        if tail >= head {
            tail - head
        } else {
            N - head + tail
        }
    }

    /// Usable capacity; one slot is always kept empty to distinguish
    /// full from empty.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N - 1
    }
}

impl<T, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_preserves_fifo_order() {
        let buffer = RingBuffer::<i32, 4>::new();

        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 3);

        assert!(buffer.push(1));
        assert!(buffer.push(2));
        assert!(buffer.push(3));
        assert!(!buffer.push(4));
        assert!(buffer.is_full());

        assert_eq!(buffer.pop(), Some(1));
        assert_eq!(buffer.pop(), Some(2));
        assert_eq!(buffer.pop(), Some(3));
        assert_eq!(buffer.pop(), None);
        assert!(buffer.is_empty());
    }

    #[test]
    fn wraps_around_across_many_fill_drain_cycles() {
        let buffer = RingBuffer::<i32, 4>::new();

        for round in 0..10 {
            for i in 0..3 {
                assert!(buffer.push(round * 10 + i));
            }
            for i in 0..3 {
                assert_eq!(buffer.pop(), Some(round * 10 + i));
            }
        }
    }

    #[test]
    fn concurrent_producer_consumer_preserves_order() {
        use std::sync::Arc;
        use std::thread;

        let buffer = Arc::new(RingBuffer::<i32, 1024>::new());
        let count = 10_000usize;

        let producer_buffer = Arc::clone(&buffer);
        let producer = thread::spawn(move || {
            for i in 0..count {
                while !producer_buffer.push(i as i32) {
                    std::thread::yield_now();
                }
            }
        });

        let consumer_buffer = Arc::clone(&buffer);
        let consumer = thread::spawn(move || {
            let mut received = Vec::with_capacity(count);
            while received.len() < count {
                if let Some(val) = consumer_buffer.pop() {
                    received.push(val);
                } else {
                    std::thread::yield_now();
                }
            }
            received
        });

        producer.join().unwrap();
        let received = consumer.join().unwrap();

        for (i, val) in received.iter().enumerate() {
            assert_eq!(*val, i as i32);
        }
    }
}
