use std::fmt;
use std::sync::Weak;

use engine::Symmetry;

use super::slot::{ResultSlot, SlotShared};

/// Lifecycle of the shared buffer. `Empty -> Filling` on the first pushed row,
/// `Filling -> Claimed` when a server takes the rows, `Claimed -> Empty` once the buffer is reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferState {
    Empty,
    Filling,
    Claimed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferFull;

impl fmt::Display for BufferFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "the batch buffer is full")
    }
}

impl std::error::Error for BufferFull {}

/// Fixed capacity storage for a batch of rows. The buffer and every server scratch own one each;
/// claiming a batch swaps them.
pub struct RowStorage {
    capacity: usize,
    row_width: usize,
    policy_size: usize,
    features: Vec<f32>,
    legal: Vec<bool>,
    symmetries: Vec<Symmetry>,
    slots: Vec<Weak<SlotShared>>,
}

impl RowStorage {
    pub fn new(capacity: usize, row_width: usize, policy_size: usize) -> Self {
        Self {
            capacity,
            row_width,
            policy_size,
            features: vec![0.0; capacity * row_width],
            legal: vec![false; capacity * policy_size],
            symmetries: vec![Symmetry::IDENTITY; capacity],
            slots: vec![Weak::new(); capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn row_width(&self) -> usize {
        self.row_width
    }

    pub fn policy_size(&self) -> usize {
        self.policy_size
    }

    pub fn features(&self, index: usize) -> &[f32] {
        &self.features[index * self.row_width..(index + 1) * self.row_width]
    }

    pub fn legal(&self, index: usize) -> &[bool] {
        &self.legal[index * self.policy_size..(index + 1) * self.policy_size]
    }

    pub fn symmetry(&self, index: usize) -> Symmetry {
        self.symmetries[index]
    }

    pub fn symmetries(&self, count: usize) -> &[Symmetry] {
        &self.symmetries[..count]
    }

    pub fn set_symmetry(&mut self, index: usize, symmetry: Symmetry) {
        self.symmetries[index] = symmetry;
    }

    pub(crate) fn write_row(&mut self, index: usize, slot: &ResultSlot) {
        let row = slot.staged_row();
        let legal = slot.staged_legal();
        assert_eq!(row.len(), self.row_width, "Staged row has the wrong width");
        assert_eq!(legal.len(), self.policy_size, "Staged legal mask has the wrong size");

        self.features[index * self.row_width..(index + 1) * self.row_width].copy_from_slice(row);
        self.legal[index * self.policy_size..(index + 1) * self.policy_size].copy_from_slice(legal);
        self.symmetries[index] = Symmetry::IDENTITY;
        self.slots[index] = std::sync::Arc::downgrade(slot.shared());
    }

    /// Detaches the slot references of the first `count` rows.
    pub(crate) fn take_slots(&mut self, count: usize) -> impl Iterator<Item = Weak<SlotShared>> + '_ {
        self.slots[..count].iter_mut().map(std::mem::take)
    }

    fn same_shape(&self, other: &RowStorage) -> bool {
        self.capacity == other.capacity
            && self.row_width == other.row_width
            && self.policy_size == other.policy_size
    }
}

/// The rows that client threads have queued for the next batch. Row `i < len()` is fully
/// written and references its slot; a row only becomes visible once `len()` is incremented.
pub struct BatchBuffer {
    rows: RowStorage,
    count: usize,
    state: BufferState,
}

impl BatchBuffer {
    pub fn new(capacity: usize, row_width: usize, policy_size: usize) -> Self {
        Self {
            rows: RowStorage::new(capacity, row_width, policy_size),
            count: 0,
            state: BufferState::Empty,
        }
    }

    pub fn state(&self) -> BufferState {
        self.state
    }

    pub fn capacity(&self) -> usize {
        self.rows.capacity()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == self.rows.capacity()
    }

    pub fn rows(&self) -> &RowStorage {
        &self.rows
    }

    /// Copies the slot's staged row into the next free row and returns its index.
    pub fn push(&mut self, slot: &ResultSlot) -> Result<usize, BufferFull> {
        if self.is_full() {
            return Err(BufferFull);
        }

        let index = self.count;
        self.rows.write_row(index, slot);
        self.count += 1;
        self.state = BufferState::Filling;

        Ok(index)
    }

    /// Moves every queued row into `rows` and leaves the buffer empty. Returns the number of rows
    /// claimed, or `None` if there was nothing to claim.
    pub fn claim(&mut self, rows: &mut RowStorage) -> Option<usize> {
        if self.state != BufferState::Filling {
            return None;
        }

        assert!(self.rows.same_shape(rows), "Row storage shape does not match the buffer");

        self.state = BufferState::Claimed;
        std::mem::swap(&mut self.rows, rows);
        let count = self.count;
        self.reset();

        Some(count)
    }

    /// Empties the buffer, returning the slots of the rows that were queued.
    pub(crate) fn drain_slots(&mut self) -> Vec<Weak<SlotShared>> {
        let slots = self.rows.take_slots(self.count).collect();
        self.reset();

        slots
    }

    fn reset(&mut self) {
        let capacity = self.rows.capacity();
        self.rows.take_slots(capacity).for_each(drop);
        self.count = 0;
        self.state = BufferState::Empty;
    }
}
