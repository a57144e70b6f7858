//! Integration test: layer sets over raw guarded buffers, without a container.
//!
//! Run: cargo test -p canarystack-membrane --test layer_composition_test

use std::sync::atomic::{AtomicUsize, Ordering};

use canarystack_membrane::checksum::CHECKSUM_SIZE;
use canarystack_membrane::guard::GUARD_SIZE;
use canarystack_membrane::{
    BufferLayout, DiagnosticLevel, GuardSide, GuardedBuffer, IntegrityLayer, LayerKind, LayerSet,
    SLOT_SIZE, Violation, is_poison,
};

fn live_buffer(
    level: DiagnosticLevel,
    capacity: usize,
    values: &[f64],
) -> (LayerSet, GuardedBuffer) {
    let layers = LayerSet::for_level(level);
    let mut buffer = GuardedBuffer::allocate(BufferLayout::new(capacity, level), None).unwrap();
    layers.on_construct(&mut buffer, 0);
    for (i, &v) in values.iter().enumerate() {
        assert!(buffer.set_slot(i, v));
        layers.on_mutate(&mut buffer, i + 1);
    }
    (layers, buffer)
}

#[test]
fn layout_sizes_per_level() {
    let total = |level| BufferLayout::new(10, level).total_bytes().unwrap();
    assert_eq!(total(DiagnosticLevel::None), 10 * SLOT_SIZE);
    assert_eq!(total(DiagnosticLevel::Level1), 10 * SLOT_SIZE);
    assert_eq!(total(DiagnosticLevel::Level2), 10 * SLOT_SIZE + 2 * GUARD_SIZE);
    assert_eq!(
        total(DiagnosticLevel::Level3),
        10 * SLOT_SIZE + 2 * GUARD_SIZE + CHECKSUM_SIZE
    );
    assert_eq!(BufferLayout::new(usize::MAX, DiagnosticLevel::None).total_bytes(), None);
}

#[test]
fn reallocation_carries_prefix_and_layers_reapply() {
    let level = DiagnosticLevel::Level3;
    let (layers, buffer) = live_buffer(level, 4, &[1.0, 2.0, 3.0, 4.0]);
    assert_eq!(layers.validate(&buffer, 4), Ok(()));

    let mut grown = buffer.reallocate(7, None).unwrap();
    layers.on_construct(&mut grown, 4);
    assert_eq!(layers.validate(&grown, 4), Ok(()));
    for i in 0..4 {
        assert_eq!(grown.slot(i), Some(f64::from(i as u32 + 1)));
    }
    for i in 4..7 {
        assert!(grown.slot(i).is_some_and(is_poison));
    }
    // The source stays untouched until the caller drops it.
    assert_eq!(layers.validate(&buffer, 4), Ok(()));
}

#[test]
fn validation_order_is_poison_guard_checksum() {
    let level = DiagnosticLevel::Level3;
    let (layers, mut buffer) = live_buffer(level, 5, &[1.0, 2.0]);

    let footer = buffer.layout().footer();
    buffer.raw_bytes_mut()[footer].fill(0);
    let slot = buffer.layout().slots().start + 3 * SLOT_SIZE;
    buffer.raw_bytes_mut()[slot..slot + SLOT_SIZE].fill(0);

    // Both the poison rule and the right guard are broken; poison reports first.
    assert_eq!(
        layers.validate(&buffer, 2),
        Err(Violation::UnpoisonedFreeSlot { index: 3 })
    );
    assert_eq!(buffer.guard(GuardSide::Right), Some(0));
}

#[test]
fn size_change_without_refresh_is_caught() {
    let (layers, buffer) = live_buffer(DiagnosticLevel::Level3, 6, &[5.0, 6.0, 7.0]);
    // Claiming one more live slot than was written exposes poison in the live range.
    assert_eq!(
        layers.validate(&buffer, 4),
        Err(Violation::PoisonedLiveSlot { index: 3 })
    );

    let (layers, buffer) = live_buffer(DiagnosticLevel::Level3, 6, &[5.0, 6.0, 7.0]);
    // Claiming one fewer leaves a number in a free slot.
    assert_eq!(
        layers.validate(&buffer, 2),
        Err(Violation::UnpoisonedFreeSlot { index: 2 })
    );
}

#[derive(Debug, Default)]
struct CountingLayer {
    mutations: AtomicUsize,
}

impl IntegrityLayer for CountingLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Checksum
    }

    fn on_mutate(&self, _buffer: &mut GuardedBuffer, _size: usize) {
        self.mutations.fetch_add(1, Ordering::Relaxed);
    }

    fn validate(&self, _buffer: &GuardedBuffer, size: usize) -> Result<(), Violation> {
        if size > 2 {
            Err(Violation::ChecksumMismatch {
                stored: 0,
                computed: size as u64,
            })
        } else {
            Ok(())
        }
    }
}

#[test]
fn custom_layer_hooks_run() {
    let layer = CountingLayer::default();
    let mut buffer =
        GuardedBuffer::allocate(BufferLayout::new(4, DiagnosticLevel::None), None).unwrap();
    layer.on_construct(&mut buffer, 0);
    layer.on_mutate(&mut buffer, 1);
    assert_eq!(layer.mutations.load(Ordering::Relaxed), 2);
    assert_eq!(layer.validate(&buffer, 2), Ok(()));
    assert!(matches!(
        layer.validate(&buffer, 3),
        Err(Violation::ChecksumMismatch { computed: 3, .. })
    ));
}
