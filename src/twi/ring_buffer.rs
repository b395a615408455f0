// Licensed under the Apache-2.0 license

//! Fixed-capacity byte queues connecting caller code and the bus engines.
//!
//! Each queue has exactly one producer and one consumer. Master queues live in
//! `BusSession` (foreground), target queues in `TargetPort` (interrupt), so
//! index updates need no locking.

/// Circular byte queue with head (producer) and tail (consumer) indices.
///
/// One slot is always left free to tell "full" from "empty", so at most
/// `N - 1` bytes are queued at once. A push into a full queue is rejected;
/// unread data is never overwritten.
pub struct RingBuffer<const N: usize> {
    storage: [u8; N],
    head: usize,
    tail: usize,
}

impl<const N: usize> RingBuffer<N> {
    const VALID: () = assert!(N >= 2, "ring buffer needs at least two slots");

    #[must_use]
    pub const fn new() -> Self {
        let () = Self::VALID;
        Self {
            storage: [0; N],
            head: 0,
            tail: 0,
        }
    }

    /// Next index after `pos`, masked for power-of-two sizes.
    #[inline]
    const fn advance(pos: usize) -> usize {
        let next = pos + 1;
        if N.is_power_of_two() {
            next & (N - 1)
        } else if next >= N {
            0
        } else {
            next
        }
    }

    /// Append a byte. Returns false, leaving the queue untouched, when full.
    pub fn try_push(&mut self, byte: u8) -> bool {
        let next = Self::advance(self.head);
        if next == self.tail {
            return false;
        }
        match self.storage.get_mut(self.head) {
            Some(slot) => {
                *slot = byte;
                self.head = next;
                true
            }
            None => false,
        }
    }

    pub fn pop(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.tail = Self::advance(self.tail);
        Some(byte)
    }

    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        if self.is_empty() {
            None
        } else {
            self.storage.get(self.tail).copied()
        }
    }

    /// Number of queued bytes.
    #[must_use]
    pub fn available(&self) -> usize {
        if self.head >= self.tail {
            self.head - self.tail
        } else {
            N + self.head - self.tail
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        Self::advance(self.head) == self.tail
    }

    /// Drop everything queued.
    pub fn reset(&mut self) {
        self.tail = self.head;
    }

    /// Keep the oldest `len` bytes and drop anything pushed after them.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.available() {
            return;
        }
        let head = self.tail + len;
        self.head = if head >= N { head - N } else { head };
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Most bytes the queue can hold at once.
    #[must_use]
    pub const fn usable_capacity(&self) -> usize {
        N - 1
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Transmit and receive queue for one bus role.
#[derive(Default)]
pub struct BufferPair<const N: usize> {
    pub tx: RingBuffer<N>,
    pub rx: RingBuffer<N>,
}

impl<const N: usize> BufferPair<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tx: RingBuffer::new(),
            rx: RingBuffer::new(),
        }
    }

    pub fn reset(&mut self) {
        self.tx.reset();
        self.rx.reset();
    }
}
