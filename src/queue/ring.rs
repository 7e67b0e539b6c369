/// Largest supported value for the capacity exponent.
pub const MAX_CAPACITY_LOG2: u32 = 30;

/// Bounded FIFO over a power-of-two slot array.
///
/// Slot positions are reduced modulo the capacity with a bit mask. The buffer
/// performs no synchronization of its own; the queue that owns it provides
/// mutual exclusion.
pub struct RingBuffer<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    len: usize,
}

impl<T> RingBuffer<T> {
    /// Creates a buffer holding up to `2^capacity_log2` elements.
    ///
    /// # Panics
    ///
    /// Panics if `capacity_log2` exceeds [`MAX_CAPACITY_LOG2`].
    pub fn new(capacity_log2: u32) -> Self {
        assert!(
            capacity_log2 <= MAX_CAPACITY_LOG2,
            "capacity_log2 must be at most {MAX_CAPACITY_LOG2}, got {capacity_log2}"
        );
        let capacity = 1usize << capacity_log2;
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    /// Appends `item` at the tail, handing it back when the buffer is full.
    pub fn offer(&mut self, item: T) -> Result<(), T> {
        if self.is_full() {
            return Err(item);
        }
        let tail = (self.head + self.len) & self.mask();
        self.slots[tail] = Some(item);
        self.len += 1;
        Ok(())
    }

    /// Removes and returns the head element.
    pub fn poll(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let item = self.slots[self.head].take();
        debug_assert!(item.is_some(), "live slot must be occupied");
        self.head = (self.head + 1) & self.mask();
        self.len -= 1;
        item
    }

    /// Removes every element in FIFO order and resets the buffer.
    pub fn drain(&mut self) -> Vec<T> {
        let mut drained = Vec::with_capacity(self.len);
        while let Some(item) = self.poll() {
            drained.push(item);
        }
        self.head = 0;
        drained
    }
}
