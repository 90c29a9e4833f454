//! Fixed-capacity circular buffer of readings.
//!
//! The buffer is a `Vec<Option<Reading>>` plus a `head` index pointing at the
//! most recently written slot. Pushing advances `head` and overwrites whatever
//! was there, so once the buffer is full the oldest reading is evicted. There
//! is no overflow error.
//!
//! Offsets passed to [`RingBuffer::peek`] count backwards from `head` and may
//! be any integer; they wrap with Euclidean remainder so negative offsets land
//! on valid slots.

use airmon_types::Reading;
use tracing::debug;

use crate::error::{Error, Result};
use crate::snapshot;

/// Capacity used when `0` is requested: two days of one-minute samples.
pub const DEFAULT_CAPACITY: usize = 48 * 60;

/// A fixed-capacity ring of optional readings.
///
/// # Example
///
/// ```
/// use airmon_store::RingBuffer;
/// use airmon_types::Reading;
///
/// let mut ring = RingBuffer::new(4);
/// for v in 1..=5 {
///     ring.push(Reading::from_unix(v, v as f64)?);
/// }
///
/// assert_eq!(ring.peek(0).map(|r| r.concentration), Some(5.0));
/// assert_eq!(ring.peek(3).map(|r| r.concentration), Some(2.0));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RingBuffer {
    head: usize,
    slots: Vec<Option<Reading>>,
}

impl RingBuffer {
    /// Create an empty buffer. A capacity of `0` selects [`DEFAULT_CAPACITY`].
    pub fn new(capacity: usize) -> Self {
        let capacity = effective_capacity(capacity);
        Self {
            head: capacity - 1,
            slots: vec![None; capacity],
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Index of the most recently written slot.
    pub fn head(&self) -> usize {
        self.head
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Whether every slot is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Write `reading` into the slot after `head`, evicting whatever was there.
    pub fn push(&mut self, reading: Reading) {
        self.push_slot(Some(reading));
    }

    fn push_slot(&mut self, slot: Option<Reading>) {
        self.head = self.normalize(self.head as i128 + 1);
        self.slots[self.head] = slot;
    }

    /// The reading `offset` steps older than `head`. `0` is the newest.
    pub fn peek(&self, offset: isize) -> Option<Reading> {
        self.slots[self.normalize(self.head as i128 - offset as i128)]
    }

    /// Up to `count` slots, newest first.
    ///
    /// A `count` of `0` means the whole buffer. Asking for more than the
    /// capacity fails with [`Error::Range`].
    pub fn peek_latest(&self, count: usize) -> Result<Vec<Option<Reading>>> {
        let capacity = self.capacity();
        let count = match count {
            0 => capacity,
            n if n > capacity => {
                return Err(Error::Range {
                    requested: n,
                    capacity,
                });
            }
            n => n,
        };

        Ok(self.iter_newest().take(count).collect())
    }

    /// Every slot from newest to oldest, empty ones included.
    pub fn iter_newest(&self) -> impl Iterator<Item = Option<Reading>> + '_ {
        (0..self.capacity()).map(move |offset| self.peek(offset as isize))
    }

    /// Remove and return the reading at `head`, stepping `head` back one slot.
    pub fn pop(&mut self) -> Option<Reading> {
        let value = self.slots[self.head].take();
        self.head = self.normalize(self.head as i128 - 1);
        value
    }

    /// Change the capacity, keeping the most recent readings in order.
    ///
    /// Shrinking keeps the newest `capacity` slots; growing keeps everything
    /// and leaves the new slots empty. A capacity of `0` selects
    /// [`DEFAULT_CAPACITY`].
    pub fn resize(&mut self, capacity: usize) {
        let capacity = effective_capacity(capacity);
        let old_capacity = self.capacity();
        if capacity == old_capacity {
            return;
        }

        let kept: Vec<Option<Reading>> = self
            .iter_newest()
            .take(old_capacity.min(capacity))
            .collect();

        self.slots = vec![None; capacity];
        self.head = capacity - 1;
        for slot in kept.into_iter().rev() {
            self.push_slot(slot);
        }

        debug!("Resized ring buffer from {} to {} slots", old_capacity, capacity);
    }

    /// Empty every slot and reset `head` to the last index.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.head = self.capacity() - 1;
    }

    /// Serialize `{version, index, values}` as JSON.
    pub fn encode(&self, pretty: bool) -> Result<Vec<u8>> {
        snapshot::encode_buffer(self.head, &self.slots, pretty)
    }

    /// Replace the contents with a decoded snapshot.
    ///
    /// The buffer adopts the capacity implied by the snapshot's slot array;
    /// call [`RingBuffer::resize`] afterwards to return to a nominal capacity.
    /// On error the buffer is left untouched.
    pub fn decode(&mut self, raw: &[u8]) -> Result<()> {
        let (head, slots) = snapshot::decode_buffer(raw)?;
        self.head = head;
        self.slots = slots;
        Ok(())
    }

    fn normalize(&self, raw: i128) -> usize {
        raw.rem_euclid(self.capacity() as i128) as usize
    }
}

fn effective_capacity(capacity: usize) -> usize {
    if capacity == 0 {
        DEFAULT_CAPACITY
    } else {
        capacity
    }
}
