//! Growable buffers that keep their high water mark.

/// A buffer with a logical length tracked separately from its initialized storage.
///
/// Storage only grows, by 30% at a time unless more is requested. Everything past [`GrowBuffer::len`] stays initialized so a host that reads
/// by capacity never sees uninitialized memory, and [`GrowBuffer::zero_tail`] resets it to the
/// default value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GrowBuffer<T> {
    items: Vec<T>,
    len: usize,
}

impl<T: Copy + Default> GrowBuffer<T> {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            len: 0,
        }
    }

    /// Create an empty buffer with `capacity` initialized slots.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: vec![T::default(); capacity],
            len: 0,
        }
    }

    /// Logical length.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the logical length is zero.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of initialized slots.
    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    /// Grow storage to hold at least `capacity` items.
    pub fn reserve_total(&mut self, capacity: usize) {
        let current = self.items.len();
        if capacity > current {
            let grown = (current + current * 3 / 10).max(capacity);
            self.items.resize(grown, T::default());
        }
    }

    /// Set the logical length, growing storage if needed. New slots keep whatever the storage held.
    pub fn set_len(&mut self, len: usize) {
        self.reserve_total(len);
        self.len = len;
    }

    /// Reset the logical length. Storage is kept.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Append one item.
    pub fn push(&mut self, item: T) {
        let index = self.len;
        self.set_len(index + 1);
        self.items[index] = item;
    }

    /// Append a slice.
    pub fn extend_from_slice(&mut self, items: &[T]) {
        let start = self.len;
        self.set_len(start + items.len());
        self.items[start..self.len].copy_from_slice(items);
    }

    /// Append every item of an iterator.
    pub fn extend(&mut self, items: impl IntoIterator<Item = T>) {
        for item in items {
            self.push(item);
        }
    }

    /// Append `count` copies of `item`.
    pub fn extend_repeat(&mut self, item: T, count: usize) {
        let start = self.len;
        self.set_len(start + count);
        self.items[start..self.len].fill(item);
    }

    /// Overwrite everything past the logical length with the default value.
    pub fn zero_tail(&mut self) {
        self.items[self.len..].fill(T::default());
    }

    /// The logically used items.
    pub fn as_slice(&self) -> &[T] {
        &self.items[..self.len]
    }

    /// The logically used items, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items[..self.len]
    }

    /// All initialized storage, including the tail past the logical length.
    pub fn as_capacity_slice(&self) -> &[T] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_geometrically() {
        let mut buffer = GrowBuffer::<u32>::with_capacity(10);
        buffer.set_len(11);
        assert_eq!(buffer.capacity(), 13);
        buffer.set_len(40);
        assert_eq!(buffer.capacity(), 40);
        buffer.set_len(2);
        assert_eq!(buffer.capacity(), 40);
    }

    #[test]
    fn zeroes_stale_tail() {
        let mut buffer = GrowBuffer::new();
        buffer.extend_from_slice(&[1u32, 2, 3, 4]);
        buffer.clear();
        buffer.push(9);
        assert_eq!(buffer.as_slice(), &[9]);
        assert_eq!(buffer.as_capacity_slice(), &[9, 2, 3, 4]);

        buffer.zero_tail();
        assert_eq!(buffer.as_capacity_slice(), &[9, 0, 0, 0]);
    }

    #[test]
    fn extend_variants() {
        let mut buffer = GrowBuffer::new();
        buffer.extend([1u8, 2]);
        buffer.extend_repeat(7, 3);
        assert_eq!(buffer.as_slice(), &[1, 2, 7, 7, 7]);
        assert_eq!(buffer.len(), 5);
        assert!(!buffer.is_empty());
    }
}
