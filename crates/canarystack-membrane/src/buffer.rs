//! Owned byte allocation with explicit guard and checksum ranges.
//!
//! Layout, parts present only when their layer is enabled:
//!
//! ```text
//! [ left guard | slot 0 .. slot cap-1 | right guard | checksum ]
//!   4 bytes      8 bytes per slot        4 bytes       8 bytes
//! ```
//!
//! Guards sit directly against the numeric region so a one-slot overrun
//! lands on the right guard first. Slots are read and written only through
//! bounds-checked accessors; raw access exists for fault injection and
//! bypasses every layer.

use std::ops::Range;

use serde::Serialize;
use thiserror::Error;

use crate::checksum::CHECKSUM_SIZE;
use crate::config::DiagnosticLevel;
use crate::guard::{self, GUARD_SIZE, GuardPair, GuardSide};

/// Size in bytes of one numeric slot.
pub const SLOT_SIZE: usize = std::mem::size_of::<f64>();

/// Why an allocation was not produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// Byte size does not fit in `usize`.
    #[error("allocation size overflows for {capacity} slots")]
    CapacityOverflow { capacity: usize },
    /// Request exceeds the configured allocation limit.
    #[error("allocation of {requested} bytes exceeds limit of {limit} bytes")]
    LimitExceeded { requested: usize, limit: usize },
    /// The global allocator refused the request.
    #[error("allocator refused {requested} bytes")]
    Refused { requested: usize },
}

/// Byte ranges of one allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BufferLayout {
    /// Numeric slot count.
    pub capacity: usize,
    /// Guard words present.
    pub guards: bool,
    /// Checksum slot present.
    pub checksum: bool,
}

impl BufferLayout {
    /// Layout for `capacity` slots at `level`.
    #[must_use]
    pub const fn new(capacity: usize, level: DiagnosticLevel) -> Self {
        Self {
            capacity,
            guards: level.guards_enabled(),
            checksum: level.checksum_enabled(),
        }
    }

    /// Same flags, different capacity.
    #[must_use]
    pub const fn resized(self, capacity: usize) -> Self {
        Self { capacity, ..self }
    }

    const fn guard_len(&self) -> usize {
        if self.guards { GUARD_SIZE } else { 0 }
    }

    /// Left guard range (empty without guards).
    #[must_use]
    pub fn header(&self) -> Range<usize> {
        0..self.guard_len()
    }

    /// Numeric region.
    #[must_use]
    pub fn slots(&self) -> Range<usize> {
        let start = self.guard_len();
        start..start + self.capacity * SLOT_SIZE
    }

    /// Right guard range (empty without guards).
    #[must_use]
    pub fn footer(&self) -> Range<usize> {
        let start = self.slots().end;
        start..start + self.guard_len()
    }

    /// Checksum slot range (empty without checksum).
    #[must_use]
    pub fn checksum_slot(&self) -> Range<usize> {
        let start = self.footer().end;
        let len = if self.checksum { CHECKSUM_SIZE } else { 0 };
        start..start + len
    }

    /// Total allocation size, `None` on overflow.
    #[must_use]
    pub fn total_bytes(&self) -> Option<usize> {
        let slots = self.capacity.checked_mul(SLOT_SIZE)?;
        let guards = 2 * self.guard_len();
        let checksum = if self.checksum { CHECKSUM_SIZE } else { 0 };
        slots.checked_add(guards)?.checked_add(checksum)
    }
}

/// Exclusively owned storage for a container's slots.
#[derive(Debug)]
pub struct GuardedBuffer {
    bytes: Vec<u8>,
    layout: BufferLayout,
}

impl GuardedBuffer {
    /// Allocate a zeroed buffer for `layout`, honouring `limit` in bytes.
    pub fn allocate(layout: BufferLayout, limit: Option<usize>) -> Result<Self, AllocError> {
        let requested = layout.total_bytes().ok_or(AllocError::CapacityOverflow {
            capacity: layout.capacity,
        })?;
        if let Some(limit) = limit
            && requested > limit
        {
            return Err(AllocError::LimitExceeded { requested, limit });
        }

        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(requested)
            .map_err(|_| AllocError::Refused { requested })?;
        bytes.resize(requested, 0);
        Ok(Self { bytes, layout })
    }

    /// Allocate a new buffer with `capacity` slots and copy over as many
    /// leading slots as fit. `self` is left untouched either way.
    pub fn reallocate(&self, capacity: usize, limit: Option<usize>) -> Result<Self, AllocError> {
        let mut fresh = Self::allocate(self.layout.resized(capacity), limit)?;
        let keep = self.layout.capacity.min(capacity) * SLOT_SIZE;
        let src = self.layout.slots().start;
        let dst = fresh.layout.slots().start;
        fresh.bytes[dst..dst + keep].copy_from_slice(&self.bytes[src..src + keep]);
        Ok(fresh)
    }

    /// Allocation layout.
    #[must_use]
    pub const fn layout(&self) -> BufferLayout {
        self.layout
    }

    /// Numeric slot count.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.layout.capacity
    }

    /// Address of the allocation's first byte.
    #[must_use]
    pub fn base_address(&self) -> usize {
        self.bytes.as_ptr() as usize
    }

    /// Address of slot 0.
    #[must_use]
    pub fn slots_address(&self) -> usize {
        self.base_address() + self.layout.slots().start
    }

    fn slot_range(&self, index: usize) -> Option<Range<usize>> {
        if index >= self.layout.capacity {
            return None;
        }
        let start = self.layout.slots().start + index * SLOT_SIZE;
        Some(start..start + SLOT_SIZE)
    }

    /// Read slot `index`.
    #[must_use]
    pub fn slot(&self, index: usize) -> Option<f64> {
        let range = self.slot_range(index)?;
        let raw: [u8; SLOT_SIZE] = self.bytes[range].try_into().ok()?;
        Some(f64::from_le_bytes(raw))
    }

    /// Write slot `index`. Returns `false` when out of range.
    pub fn set_slot(&mut self, index: usize, value: f64) -> bool {
        match self.slot_range(index) {
            Some(range) => {
                self.bytes[range].copy_from_slice(&value.to_le_bytes());
                true
            }
            None => false,
        }
    }

    /// Write `value` into every slot of `range`, clamped to capacity.
    pub fn fill_slots(&mut self, range: Range<usize>, value: f64) {
        let end = range.end.min(self.layout.capacity);
        for index in range.start..end {
            self.set_slot(index, value);
        }
    }

    /// The numeric region as bytes.
    #[must_use]
    pub fn slot_bytes(&self) -> &[u8] {
        &self.bytes[self.layout.slots()]
    }

    /// Read one guard word, `None` without guards.
    #[must_use]
    pub fn guard(&self, side: GuardSide) -> Option<u32> {
        if !self.layout.guards {
            return None;
        }
        let range = match side {
            GuardSide::Left => self.layout.header(),
            GuardSide::Right => self.layout.footer(),
        };
        let raw: [u8; GUARD_SIZE] = self.bytes[range].try_into().ok()?;
        Some(guard::from_bytes(raw))
    }

    /// Write both guard words. No-op without guards.
    pub fn write_guards(&mut self, pair: GuardPair) {
        if !self.layout.guards {
            return;
        }
        let header = self.layout.header();
        let footer = self.layout.footer();
        self.bytes[header].copy_from_slice(&guard::to_bytes(pair.left));
        self.bytes[footer].copy_from_slice(&guard::to_bytes(pair.right));
    }

    /// Read the stored checksum, `None` without a checksum slot.
    #[must_use]
    pub fn stored_checksum(&self) -> Option<u64> {
        if !self.layout.checksum {
            return None;
        }
        let raw: [u8; CHECKSUM_SIZE] = self.bytes[self.layout.checksum_slot()].try_into().ok()?;
        Some(u64::from_le_bytes(raw))
    }

    /// Store a checksum. No-op without a checksum slot.
    pub fn store_checksum(&mut self, value: u64) {
        if !self.layout.checksum {
            return;
        }
        let range = self.layout.checksum_slot();
        self.bytes[range].copy_from_slice(&value.to_le_bytes());
    }

    /// Whole allocation, guards and checksum included.
    #[must_use]
    pub fn raw_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Mutable access to the whole allocation. Writes through this slice
    /// bypass every integrity layer; it exists to simulate corruption.
    pub fn raw_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}
