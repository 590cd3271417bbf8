//! Ring buffer: a fixed-capacity, monotonic-indexed log store that
//! survives overwrite. Implemented as a fixed-size array plus a
//! `base_abs_index` counter; slot `i` holds absolute index
//! `base + i`. `head`/`tail` manage wraparound.

use std::cell::RefCell;

use parking_lot::ReentrantMutex;

/// Fixed-capacity circular store keyed by a 64-bit absolute index
/// that strictly increases across the buffer's lifetime and is never
/// reused, even past overwrite.
pub struct RingBuffer<T> {
    capacity: usize,
    slots: Vec<Option<T>>,
    /// Absolute index of the oldest live slot once the buffer has
    /// received at least one element. Also the physical index into
    /// `slots` of that oldest element's predecessor wraparound base.
    base_abs_index: u64,
    /// Physical index (into `slots`) of the oldest live element.
    head: usize,
    len: usize,
    next_abs_index: u64,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be nonzero");
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        RingBuffer {
            capacity,
            slots,
            base_abs_index: 0,
            head: 0,
            len: 0,
            next_abs_index: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Absolute index of the oldest live element, or `None` if empty.
    pub fn head_index(&self) -> Option<u64> {
        if self.len == 0 {
            None
        } else {
            Some(self.next_abs_index - self.len as u64)
        }
    }

    /// Absolute index of the newest live element, or `None` if empty.
    pub fn tail_index(&self) -> Option<u64> {
        if self.len == 0 {
            None
        } else {
            Some(self.next_abs_index - 1)
        }
    }

    /// Always succeeds; overwrites the oldest element and advances
    /// the head once the buffer is at capacity.
    pub fn append(&mut self, item: T) {
        let physical = (self.head + self.len) % self.capacity;
        if self.len == self.capacity {
            self.slots[self.head] = None;
            self.head = (self.head + 1) % self.capacity;
        } else {
            self.len += 1;
        }
        self.slots[physical] = Some(item);
        self.next_abs_index += 1;
        self.base_abs_index = self.next_abs_index - self.len as u64;
    }

    fn physical_index(&self, abs_idx: u64) -> Option<usize> {
        let head_idx = self.head_index()?;
        let tail_idx = self.tail_index()?;
        if abs_idx < head_idx || abs_idx > tail_idx {
            return None;
        }
        let offset = (abs_idx - head_idx) as usize;
        Some((self.head + offset) % self.capacity)
    }

    /// Returns the element at `abs_idx`, or `None` if it has either
    /// already been overwritten or not yet been appended.
    pub fn get(&self, abs_idx: u64) -> Option<&T> {
        let physical = self.physical_index(abs_idx)?;
        self.slots[physical].as_ref()
    }

    /// The `min(n, len())` newest elements, oldest-first.
    pub fn latest(&self, n: usize) -> Vec<&T> {
        let take = n.min(self.len);
        let Some(tail) = self.tail_index() else {
            return Vec::new();
        };
        let start = tail + 1 - take as u64;
        self.slice_from(start, take)
    }

    /// Elements beginning at `max(abs_start, head_index())`, clipped
    /// to the tail, in order. Empty if the buffer holds nothing in
    /// that range.
    pub fn slice_from(&self, abs_start: u64, n: usize) -> Vec<&T> {
        let Some(head_idx) = self.head_index() else {
            return Vec::new();
        };
        let tail_idx = self.tail_index().unwrap();
        let start = abs_start.max(head_idx);
        if start > tail_idx {
            return Vec::new();
        }
        let available = (tail_idx - start + 1).min(n as u64);
        (0..available)
            .filter_map(|i| self.get(start + i))
            .collect()
    }

    /// Reverse iteration from the newest element to the oldest.
    pub fn iter_rev(&self) -> impl Iterator<Item = &T> {
        let tail = self.tail_index();
        let len = self.len;
        (0..len).filter_map(move |i| {
            let idx = tail? - i as u64;
            self.get(idx)
        })
    }
}

/// Wraps a [`RingBuffer`] in a reentrant lock: the UI thread's
/// input-handling code may need to query `head_index`/`tail_index`
/// while a timer-driven redraw is itself mid-append, on the same
/// thread. A plain `Mutex` would deadlock in that case; `ReentrantMutex`
/// permits the same thread to re-acquire it.
pub struct SharedRingBuffer<T> {
    inner: ReentrantMutex<RefCell<RingBuffer<T>>>,
}

impl<T> SharedRingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        SharedRingBuffer {
            inner: ReentrantMutex::new(RefCell::new(RingBuffer::new(capacity))),
        }
    }

    pub fn append(&self, item: T) {
        self.inner.lock().borrow_mut().append(item);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().borrow().is_empty()
    }

    pub fn head_index(&self) -> Option<u64> {
        self.inner.lock().borrow().head_index()
    }

    pub fn tail_index(&self) -> Option<u64> {
        self.inner.lock().borrow().tail_index()
    }

    /// Replace the buffer with a fresh, empty one of the same
    /// capacity. Used by the UI when `clear_on_reload` is set.
    pub fn clear(&self) {
        let guard = self.inner.lock();
        let capacity = guard.borrow().capacity();
        *guard.borrow_mut() = RingBuffer::new(capacity);
    }
}

impl<T: Clone> SharedRingBuffer<T> {
    pub fn latest(&self, n: usize) -> Vec<T> {
        self.inner
            .lock()
            .borrow()
            .latest(n)
            .into_iter()
            .cloned()
            .collect()
    }
}
