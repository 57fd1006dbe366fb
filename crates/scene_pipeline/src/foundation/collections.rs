//! Specialized collection types
//!
//! The cull and sort stages run once per frame and must not churn the heap.
//! Both collections here keep their slots alive across frames and only ever
//! grow by a fixed increment.

use log::debug;

/// Preallocated array of reusable slots with an explicit fill cursor.
///
/// Slots past the cursor keep whatever the previous frame wrote into them so
/// their inner allocations can be recycled; callers overwrite a slot in place
/// after obtaining it from [`GrowableBuffer::next_slot`].
#[derive(Debug)]
pub struct GrowableBuffer<T> {
    items: Vec<T>,
    count: usize,
    increment: usize,
}

impl<T: Default> GrowableBuffer<T> {
    /// Create a buffer with `capacity` ready slots that grows by `increment`
    pub fn new(capacity: usize, increment: usize) -> Self {
        let mut items = Vec::with_capacity(capacity);
        items.resize_with(capacity, T::default);
        Self {
            items,
            count: 0,
            increment: increment.max(1),
        }
    }

    /// Claim the next slot, growing the backing array when it is full.
    ///
    /// Already-written slots are preserved across the reallocation.
    pub fn next_slot(&mut self) -> &mut T {
        if self.count == self.items.len() {
            self.grow(self.increment);
        }
        let slot = &mut self.items[self.count];
        self.count += 1;
        slot
    }

    /// Add `additional` empty slots to the end of the array
    pub fn grow(&mut self, additional: usize) {
        let new_len = self.items.len() + additional;
        debug!("Growing buffer from {} to {} slots", self.items.len(), new_len);
        self.items.resize_with(new_len, T::default);
    }
}

impl<T> GrowableBuffer<T> {
    /// Number of slots written this frame
    pub fn len(&self) -> usize {
        self.count
    }

    /// Check if nothing has been written this frame
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of allocated slots
    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    /// Reset the cursor; slots stay allocated for reuse
    pub fn clear(&mut self) {
        self.count = 0;
    }

    /// Written slots
    pub fn as_slice(&self) -> &[T] {
        &self.items[..self.count]
    }

    /// Written slots, mutable
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items[..self.count]
    }
}

/// Array-backed stack whose entries survive a pop.
///
/// `depth` is the number of live entries. Popping only moves the cursor, so a
/// later push overwrites the slot in place, and the entry beneath the top is
/// always the exact value that was current before the push.
#[derive(Debug)]
pub struct StateStack<T> {
    entries: Vec<T>,
    depth: usize,
    increment: usize,
}

impl<T> StateStack<T> {
    /// Create an empty stack with room for `capacity` entries
    pub fn new(capacity: usize, increment: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            depth: 0,
            increment: increment.max(1),
        }
    }

    /// Push an entry, overwriting a previously popped slot when available
    pub fn push(&mut self, value: T) {
        if self.depth < self.entries.len() {
            self.entries[self.depth] = value;
        } else {
            if self.entries.len() == self.entries.capacity() {
                debug!(
                    "Growing state stack from {} to {} entries",
                    self.entries.capacity(),
                    self.entries.capacity() + self.increment
                );
                self.entries.reserve_exact(self.increment);
            }
            self.entries.push(value);
        }
        self.depth += 1;
    }

    /// Pop the top entry. Returns false when the stack was already empty.
    pub fn pop(&mut self) -> bool {
        if self.depth == 0 {
            return false;
        }
        self.depth -= 1;
        true
    }

    /// Pop `count` entries
    pub fn pop_n(&mut self, count: usize) {
        self.depth = self.depth.saturating_sub(count);
    }

    /// Current top entry
    pub fn top(&self) -> Option<&T> {
        self.depth.checked_sub(1).map(|i| &self.entries[i])
    }

    /// Number of live entries
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Live entries, bottom first
    pub fn as_slice(&self) -> &[T] {
        &self.entries[..self.depth]
    }

    /// Drop every live entry
    pub fn clear(&mut self) {
        self.depth = 0;
    }
}
