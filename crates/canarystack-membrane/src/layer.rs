//! Integrity layers as composable strategy objects.
//!
//! Each layer reacts to construction and to structural mutation, and can
//! validate a buffer against a live prefix length. A [`LayerSet`] holds the
//! layers enabled by a [`DiagnosticLevel`] in the fixed order
//! poison -> guard -> checksum: the checksum must see the final poison fill,
//! and validation reports the cheapest-to-explain violation first.

use serde::Serialize;
use thiserror::Error;

use crate::buffer::GuardedBuffer;
use crate::checksum::rolling_checksum;
use crate::config::DiagnosticLevel;
use crate::fault::StackFault;
use crate::guard::{GuardPair, GuardSide, GuardTarget};
use crate::poison::{self, POISON, PoisonFault};

/// Identifies a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Poison,
    Guard,
    Checksum,
}

/// A violated integrity invariant.
#[derive(Debug, Clone, Copy, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    #[error("size {size} exceeds capacity {capacity}")]
    SizeExceedsCapacity { size: usize, capacity: usize },
    #[error("buffer missing for active stack")]
    MissingBuffer,
    #[error("live slot {index} holds poison")]
    PoisonedLiveSlot { index: usize },
    #[error("unused slot {index} is not poisoned")]
    UnpoisonedFreeSlot { index: usize },
    #[error("{target:?} {side:?} guard is {found:#010x}, expected {expected:#010x}")]
    GuardMismatch {
        target: GuardTarget,
        side: GuardSide,
        expected: u32,
        found: u32,
    },
    #[error("stored checksum {stored:#018x} differs from computed {computed:#018x}")]
    ChecksumMismatch { stored: u64, computed: u64 },
}

impl Violation {
    /// Fault latched for this violation.
    #[must_use]
    pub const fn fault(&self) -> StackFault {
        StackFault::CorruptionDetected
    }

    /// Layer that observed the violation, `None` for bookkeeping checks.
    #[must_use]
    pub const fn layer(&self) -> Option<LayerKind> {
        match self {
            Self::SizeExceedsCapacity { .. } | Self::MissingBuffer => None,
            Self::PoisonedLiveSlot { .. } | Self::UnpoisonedFreeSlot { .. } => {
                Some(LayerKind::Poison)
            }
            Self::GuardMismatch { .. } => Some(LayerKind::Guard),
            Self::ChecksumMismatch { .. } => Some(LayerKind::Checksum),
        }
    }
}

impl From<PoisonFault> for Violation {
    fn from(fault: PoisonFault) -> Self {
        match fault {
            PoisonFault::PoisonedLive { index } => Self::PoisonedLiveSlot { index },
            PoisonFault::UnpoisonedFree { index } => Self::UnpoisonedFreeSlot { index },
        }
    }
}

/// A toggleable integrity check over a [`GuardedBuffer`].
pub trait IntegrityLayer: std::fmt::Debug {
    /// Which layer this is.
    fn kind(&self) -> LayerKind;

    /// Initialize a freshly allocated buffer holding `size` live slots.
    fn on_construct(&self, buffer: &mut GuardedBuffer, size: usize) {
        self.on_mutate(buffer, size);
    }

    /// Refresh after a structural change left `size` live slots.
    fn on_mutate(&self, buffer: &mut GuardedBuffer, size: usize);

    /// Check the buffer against `size` live slots.
    fn validate(&self, buffer: &GuardedBuffer, size: usize) -> Result<(), Violation>;
}

/// Poison fill over `[size, capacity)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PoisonLayer;

impl IntegrityLayer for PoisonLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Poison
    }

    fn on_mutate(&self, buffer: &mut GuardedBuffer, size: usize) {
        let capacity = buffer.capacity();
        buffer.fill_slots(size..capacity, POISON);
    }

    fn validate(&self, buffer: &GuardedBuffer, size: usize) -> Result<(), Violation> {
        for index in 0..buffer.capacity() {
            let value = buffer.slot(index).unwrap_or(POISON);
            if let Some(fault) = poison::classify(index, value, size) {
                return Err(fault.into());
            }
        }
        Ok(())
    }
}

/// Guard words around the numeric region.
#[derive(Debug, Clone, Copy)]
pub struct GuardLayer {
    pair: GuardPair,
}

impl Default for GuardLayer {
    fn default() -> Self {
        Self {
            pair: GuardPair::BUFFER,
        }
    }
}

impl IntegrityLayer for GuardLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Guard
    }

    fn on_mutate(&self, buffer: &mut GuardedBuffer, _size: usize) {
        buffer.write_guards(self.pair);
    }

    fn validate(&self, buffer: &GuardedBuffer, _size: usize) -> Result<(), Violation> {
        for side in [GuardSide::Left, GuardSide::Right] {
            let expected = self.pair.expected(side);
            let found = buffer.guard(side).unwrap_or(!expected);
            if found != expected {
                return Err(Violation::GuardMismatch {
                    target: GuardTarget::Buffer,
                    side,
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }
}

/// Rolling checksum stored after the numeric region.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChecksumLayer;

impl ChecksumLayer {
    /// Checksum the buffer should hold for `size` live slots.
    #[must_use]
    pub fn compute(buffer: &GuardedBuffer, size: usize) -> u64 {
        rolling_checksum(buffer.slot_bytes(), size, buffer.capacity())
    }
}

impl IntegrityLayer for ChecksumLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Checksum
    }

    fn on_mutate(&self, buffer: &mut GuardedBuffer, size: usize) {
        let value = Self::compute(buffer, size);
        buffer.store_checksum(value);
    }

    fn validate(&self, buffer: &GuardedBuffer, size: usize) -> Result<(), Violation> {
        let computed = Self::compute(buffer, size);
        let stored = buffer.stored_checksum().unwrap_or(!computed);
        if stored == computed {
            Ok(())
        } else {
            Err(Violation::ChecksumMismatch { stored, computed })
        }
    }
}

/// Ordered set of active layers.
#[derive(Debug, Default)]
pub struct LayerSet {
    layers: Vec<Box<dyn IntegrityLayer>>,
}

impl LayerSet {
    /// Layers enabled at `level`.
    #[must_use]
    pub fn for_level(level: DiagnosticLevel) -> Self {
        let mut layers: Vec<Box<dyn IntegrityLayer>> = Vec::with_capacity(3);
        if level.poison_enabled() {
            layers.push(Box::new(PoisonLayer));
        }
        if level.guards_enabled() {
            layers.push(Box::new(GuardLayer::default()));
        }
        if level.checksum_enabled() {
            layers.push(Box::new(ChecksumLayer));
        }
        Self { layers }
    }

    /// Active layer kinds, in application order.
    #[must_use]
    pub fn kinds(&self) -> Vec<LayerKind> {
        self.layers.iter().map(|layer| layer.kind()).collect()
    }

    /// Returns true if `kind` is active.
    #[must_use]
    pub fn contains(&self, kind: LayerKind) -> bool {
        self.layers.iter().any(|layer| layer.kind() == kind)
    }

    /// Returns true when no layer is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Run every layer's construction hook.
    pub fn on_construct(&self, buffer: &mut GuardedBuffer, size: usize) {
        for layer in &self.layers {
            layer.on_construct(buffer, size);
        }
    }

    /// Run every layer's mutation hook.
    pub fn on_mutate(&self, buffer: &mut GuardedBuffer, size: usize) {
        for layer in &self.layers {
            layer.on_mutate(buffer, size);
        }
    }

    /// First violation reported by any layer.
    pub fn validate(&self, buffer: &GuardedBuffer, size: usize) -> Result<(), Violation> {
        self.validate_with(buffer, size, || Ok(()))
    }

    /// Like [`validate`](Self::validate), with `guard_check` run right after
    /// the guard layer and before the checksum. Skipped when no guard layer
    /// is active.
    pub fn validate_with<F>(
        &self,
        buffer: &GuardedBuffer,
        size: usize,
        mut guard_check: F,
    ) -> Result<(), Violation>
    where
        F: FnMut() -> Result<(), Violation>,
    {
        for layer in &self.layers {
            layer.validate(buffer, size)?;
            if layer.kind() == LayerKind::Guard {
                guard_check()?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferLayout;

    fn fresh(level: DiagnosticLevel, capacity: usize) -> (LayerSet, GuardedBuffer) {
        let layers = LayerSet::for_level(level);
        let mut buffer = GuardedBuffer::allocate(BufferLayout::new(capacity, level), None).unwrap();
        layers.on_construct(&mut buffer, 0);
        (layers, buffer)
    }

    #[test]
    fn layer_sets_follow_level() {
        assert!(LayerSet::for_level(DiagnosticLevel::None).is_empty());
        assert_eq!(
            LayerSet::for_level(DiagnosticLevel::Level1).kinds(),
            vec![LayerKind::Poison]
        );
        assert_eq!(
            LayerSet::for_level(DiagnosticLevel::Level3).kinds(),
            vec![LayerKind::Poison, LayerKind::Guard, LayerKind::Checksum]
        );
    }

    #[test]
    fn fresh_buffer_validates_at_every_level() {
        for level in [
            DiagnosticLevel::None,
            DiagnosticLevel::Level1,
            DiagnosticLevel::Level2,
            DiagnosticLevel::Level3,
        ] {
            let (layers, buffer) = fresh(level, 4);
            assert_eq!(layers.validate(&buffer, 0), Ok(()), "level {level}");
        }
    }

    #[test]
    fn poison_layer_flags_stray_write() {
        let (layers, mut buffer) = fresh(DiagnosticLevel::Level1, 4);
        buffer.set_slot(3, 7.0);
        assert_eq!(
            layers.validate(&buffer, 0),
            Err(Violation::UnpoisonedFreeSlot { index: 3 })
        );
    }

    #[test]
    fn guard_layer_flags_overrun() {
        let (layers, mut buffer) = fresh(DiagnosticLevel::Level2, 4);
        let footer = buffer.layout().footer();
        buffer.raw_bytes_mut()[footer.start] ^= 0xFF;
        let err = layers.validate(&buffer, 0).unwrap_err();
        assert!(matches!(
            err,
            Violation::GuardMismatch {
                target: GuardTarget::Buffer,
                side: GuardSide::Right,
                ..
            }
        ));
        assert_eq!(err.layer(), Some(LayerKind::Guard));
    }

    #[test]
    fn guard_hook_runs_between_poison_and_checksum() {
        let struct_side = || {
            Err(Violation::GuardMismatch {
                target: GuardTarget::Struct,
                side: GuardSide::Left,
                expected: 1,
                found: 0,
            })
        };

        let (layers, buffer) = fresh(DiagnosticLevel::Level3, 4);
        assert!(matches!(
            layers.validate_with(&buffer, 0, struct_side),
            Err(Violation::GuardMismatch {
                target: GuardTarget::Struct,
                ..
            })
        ));

        let (layers, mut buffer) = fresh(DiagnosticLevel::Level3, 4);
        buffer.set_slot(2, 9.0);
        assert_eq!(
            layers.validate_with(&buffer, 0, struct_side),
            Err(Violation::UnpoisonedFreeSlot { index: 2 })
        );

        // No guard layer, no hook.
        let (layers, buffer) = fresh(DiagnosticLevel::Level1, 4);
        assert_eq!(layers.validate_with(&buffer, 0, struct_side), Ok(()));
    }

    #[test]
    fn checksum_layer_flags_in_range_flip() {
        let (layers, mut buffer) = fresh(DiagnosticLevel::Level3, 4);
        buffer.set_slot(0, 1.25);
        layers.on_mutate(&mut buffer, 1);
        assert_eq!(layers.validate(&buffer, 1), Ok(()));

        // Flip a mantissa bit: still a live, non-poison value.
        let start = buffer.layout().slots().start;
        buffer.raw_bytes_mut()[start] ^= 0x01;
        let err = layers.validate(&buffer, 1).unwrap_err();
        assert_eq!(err.layer(), Some(LayerKind::Checksum));
        assert_eq!(err.fault(), StackFault::CorruptionDetected);
    }

    #[test]
    fn violation_serializes_with_kind_tag() {
        let json = serde_json::to_value(Violation::PoisonedLiveSlot { index: 2 }).unwrap();
        assert_eq!(json["kind"], "poisoned_live_slot");
        assert_eq!(json["index"], 2);
    }
}
