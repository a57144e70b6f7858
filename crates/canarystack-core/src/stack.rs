//! Growable `f64` stack wrapped in the integrity membrane.
//!
//! Every operation runs the same pipeline:
//! 1. fast-fail on a latched fault or a non-active lifecycle,
//! 2. full validation when the diagnostic level enables it,
//! 3. the structural change,
//! 4. layer refresh (poison boundary, guards, checksum),
//! 5. validation again.
//!
//! The first failure latches into the stack's [`FaultStatus`] and is
//! returned as the operation's `Err`. A latched stack refuses every later
//! operation without touching memory; [`Stack::reconstruct`] is the only way
//! back.

use canarystack_membrane::guard::{STRUCT_GUARD_LEFT, STRUCT_GUARD_RIGHT};
use canarystack_membrane::{
    FaultStatus, GuardPair, GuardTarget, GuardedBuffer, IntegrityMetrics, LayerSet,
    Lifecycle, MINIMUM_CAPACITY, StackConfig, StackFault, Violation, global_metrics,
};
use canarystack_membrane::{BufferLayout, DiagnosticLevel};

/// Name given to stacks created without one while diagnostics are on.
pub const DYNAMIC_STACK_NAME: &str = "no name, created dynamically";

/// Growth multiplier as a ratio: capacity grows to `capacity * 9 / 5`.
const GROWTH_NUMERATOR: usize = 9;
const GROWTH_DENOMINATOR: usize = 5;

/// Capacity after one growth step from `capacity`, `None` on overflow.
#[must_use]
pub fn grown_capacity(capacity: usize) -> Option<usize> {
    let scaled = capacity.checked_mul(GROWTH_NUMERATOR)? / GROWTH_DENOMINATOR;
    Some(scaled.max(capacity.checked_add(1)?))
}

/// Integrity-checked stack of `f64`.
///
/// The first and last fields are guard words; with guards enabled any
/// overrun into the struct from either neighbour shows up as a mismatch.
#[repr(C)]
#[derive(Debug)]
pub struct Stack {
    guard_left: u32,
    name: Option<String>,
    size: usize,
    capacity: usize,
    buffer: Option<GuardedBuffer>,
    lifecycle: Lifecycle,
    status: FaultStatus,
    violation: Option<Violation>,
    config: StackConfig,
    layers: LayerSet,
    guard_right: u32,
}

impl Stack {
    /// Declare a stack without constructing it. Every operation except
    /// [`construct`](Self::construct) latches `UseBeforeConstruction`.
    #[must_use]
    pub fn declare(name: Option<&str>, config: StackConfig) -> Self {
        let name = if config.level.validation_enabled() {
            Some(name.unwrap_or(DYNAMIC_STACK_NAME).to_string())
        } else {
            None
        };
        Self {
            guard_left: STRUCT_GUARD_LEFT,
            name,
            size: 0,
            capacity: 0,
            buffer: None,
            lifecycle: Lifecycle::Uninitialized,
            status: FaultStatus::clear(),
            violation: None,
            config,
            layers: LayerSet::for_level(config.level),
            guard_right: STRUCT_GUARD_RIGHT,
        }
    }

    /// Construct a stack with the configured default capacity.
    pub fn new(config: StackConfig) -> Result<Self, StackFault> {
        let mut stack = Self::declare(None, config);
        stack.construct(None)?;
        Ok(stack)
    }

    /// Construct a stack with at least `capacity` slots.
    pub fn with_capacity(capacity: usize, config: StackConfig) -> Result<Self, StackFault> {
        let mut stack = Self::declare(None, config);
        stack.construct(Some(capacity))?;
        Ok(stack)
    }

    /// Allocate `max(capacity, MINIMUM_CAPACITY)` slots (the configured
    /// default when `None`) and become active.
    ///
    /// Only valid on a declared stack. Constructing an active stack latches
    /// `ConstructionFailed`, a destroyed one `UseAfterDestruction`. A refused
    /// allocation latches `ConstructionFailed` and leaves the stack unusable.
    pub fn construct(&mut self, capacity: Option<usize>) -> Result<(), StackFault> {
        self.status.check()?;
        let Some(next) = self.lifecycle.advance(Lifecycle::Active) else {
            let fault = match self.lifecycle {
                Lifecycle::Destroyed => StackFault::UseAfterDestruction,
                _ => StackFault::ConstructionFailed,
            };
            return Err(self.fail(fault));
        };

        let capacity = capacity
            .unwrap_or(self.config.default_capacity)
            .max(MINIMUM_CAPACITY);
        let layout = BufferLayout::new(capacity, self.config.level);
        let mut buffer = match GuardedBuffer::allocate(layout, self.config.allocation_limit) {
            Ok(buffer) => buffer,
            Err(_) => return Err(self.fail(StackFault::ConstructionFailed)),
        };
        self.layers.on_construct(&mut buffer, 0);

        self.buffer = Some(buffer);
        self.size = 0;
        self.capacity = capacity;
        self.lifecycle = next;
        self.verify()
    }

    /// Replace this stack with a freshly constructed one, keeping its name
    /// and configuration. Clears any latched fault.
    pub fn reconstruct(&mut self, capacity: Option<usize>) -> Result<(), StackFault> {
        let name = self.name.take();
        *self = Self::declare(name.as_deref(), self.config);
        self.construct(capacity)
    }

    /// Push `value`, growing by 1.8x when full.
    ///
    /// A refused growth latches `ReallocationFailed`; the existing buffer
    /// and its contents are kept as they were.
    pub fn push(&mut self, value: f64) -> Result<(), StackFault> {
        self.verify()?;

        if self.size == self.capacity {
            let Some(capacity) = grown_capacity(self.capacity) else {
                return Err(self.fail(StackFault::ReallocationFailed));
            };
            self.resize_buffer(capacity)?;
        }

        let index = self.size;
        let written = self
            .buffer
            .as_mut()
            .is_some_and(|buffer| buffer.set_slot(index, value));
        if !written {
            return Err(self.corrupt(Violation::MissingBuffer));
        }
        self.size += 1;
        self.refresh();
        self.verify()
    }

    /// Remove and return the top value.
    ///
    /// On an empty stack latches `PopFromEmpty` without touching the buffer.
    pub fn pop(&mut self) -> Result<f64, StackFault> {
        self.verify()?;
        if self.size == 0 {
            return Err(self.fail(StackFault::PopFromEmpty));
        }

        let value = self.read_slot(self.size - 1)?;
        self.size -= 1;
        self.refresh();
        self.verify()?;
        Ok(value)
    }

    /// Return the top value without removing it.
    ///
    /// On an empty stack latches `TopFromEmpty`.
    pub fn top(&mut self) -> Result<f64, StackFault> {
        self.verify()?;
        if self.size == 0 {
            return Err(self.fail(StackFault::TopFromEmpty));
        }
        self.read_slot(self.size - 1)
    }

    /// Drop every element. Capacity is first shrunk to the current size
    /// (see [`shrink_to_fit`](Self::shrink_to_fit)), then the whole numeric
    /// region is repoisoned.
    pub fn clear(&mut self) -> Result<(), StackFault> {
        self.verify()?;
        self.shrink_to_fit()?;
        self.size = 0;
        self.refresh();
        self.verify()
    }

    /// Reallocate to exactly `size` slots.
    ///
    /// Returns `Ok(false)` without reallocating when capacity is already at
    /// the floor, when `size` is below the floor, or when there is no slack.
    /// A refused allocation latches `ReallocationFailed` and keeps the
    /// current buffer.
    pub fn shrink_to_fit(&mut self) -> Result<bool, StackFault> {
        self.verify()?;
        if self.capacity <= MINIMUM_CAPACITY
            || self.size < MINIMUM_CAPACITY
            || self.size == self.capacity
        {
            return Ok(false);
        }
        self.resize_buffer(self.size)?;
        self.verify()?;
        Ok(true)
    }

    /// Release the buffer and become destroyed. A second call latches
    /// `UseAfterDestruction`.
    pub fn destruct(&mut self) -> Result<(), StackFault> {
        self.verify()?;
        self.buffer = None;
        self.size = 0;
        self.capacity = 0;
        self.lifecycle = self.lifecycle.join(Lifecycle::Destroyed);
        Ok(())
    }

    /// Run the full validation pipeline, latching the first failure.
    pub fn validate(&mut self) -> Result<(), StackFault> {
        self.verify()
    }

    /// [`validate`](Self::validate) as a boolean.
    pub fn is_healthy(&mut self) -> bool {
        self.verify().is_ok()
    }

    /// Check integrity invariants without latching anything. Ignores the
    /// fault status and lifecycle; an inactive stack reports
    /// `MissingBuffer`.
    pub fn inspect(&self) -> Result<(), Violation> {
        let level = self.config.level;
        if level.validation_enabled() && self.size > self.capacity {
            return Err(Violation::SizeExceedsCapacity {
                size: self.size,
                capacity: self.capacity,
            });
        }
        let Some(buffer) = &self.buffer else {
            return Err(Violation::MissingBuffer);
        };
        if !level.validation_enabled() {
            return Ok(());
        }
        // Struct guards share the guard step: poison, guards, checksum.
        self.layers
            .validate_with(buffer, self.size, || self.check_struct_guards())
    }

    /// Live element count.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Allocated slot count.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns true when no element is live.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Latched fault, if any.
    #[must_use]
    pub const fn fault(&self) -> Option<StackFault> {
        self.status.get()
    }

    /// Full fault status.
    #[must_use]
    pub const fn status(&self) -> FaultStatus {
        self.status
    }

    /// First integrity violation observed, if any.
    #[must_use]
    pub const fn violation(&self) -> Option<Violation> {
        self.violation
    }

    /// Lifecycle state.
    #[must_use]
    pub const fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Debug name, present only with diagnostics enabled.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Active diagnostic level.
    #[must_use]
    pub const fn level(&self) -> DiagnosticLevel {
        self.config.level
    }

    /// Configuration the stack was declared with.
    #[must_use]
    pub const fn config(&self) -> StackConfig {
        self.config
    }

    /// Active integrity layers.
    #[must_use]
    pub const fn layers(&self) -> &LayerSet {
        &self.layers
    }

    /// Owned buffer while active.
    #[must_use]
    pub const fn buffer(&self) -> Option<&GuardedBuffer> {
        self.buffer.as_ref()
    }

    /// Current struct guard words `(left, right)`.
    #[must_use]
    pub const fn struct_guards(&self) -> (u32, u32) {
        (self.guard_left, self.guard_right)
    }

    /// Address of the stack itself.
    #[must_use]
    pub fn address(&self) -> usize {
        std::ptr::from_ref(self) as usize
    }

    /// Hand the raw allocation (guards and checksum included) to `f`.
    /// Writes bypass every layer; this exists to simulate corruption.
    #[cfg(any(test, feature = "fault-injection"))]
    pub fn inject_raw<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> Option<R> {
        self.buffer
            .as_mut()
            .map(|buffer| f(buffer.raw_bytes_mut()))
    }

    /// Overwrite the struct guard words, simulating a neighbouring overrun.
    #[cfg(any(test, feature = "fault-injection"))]
    pub fn inject_struct_guards(&mut self, left: u32, right: u32) {
        self.guard_left = left;
        self.guard_right = right;
    }

    /// Overwrite the size field, simulating a stray write into the struct.
    #[cfg(any(test, feature = "fault-injection"))]
    pub fn inject_size(&mut self, size: usize) {
        self.size = size;
    }

    fn verify(&mut self) -> Result<(), StackFault> {
        self.status.check()?;
        if let Err(fault) = self.lifecycle.check() {
            return Err(self.fail(fault));
        }
        if self.config.level.validation_enabled() {
            IntegrityMetrics::inc(&global_metrics().validations);
        }
        match self.inspect() {
            Ok(()) => Ok(()),
            Err(violation) => Err(self.corrupt(violation)),
        }
    }

    fn check_struct_guards(&self) -> Result<(), Violation> {
        match GuardPair::STRUCT.first_mismatch(self.guard_left, self.guard_right) {
            None => Ok(()),
            Some((side, found)) => Err(Violation::GuardMismatch {
                target: GuardTarget::Struct,
                side,
                expected: GuardPair::STRUCT.expected(side),
                found,
            }),
        }
    }

    fn fail(&mut self, fault: StackFault) -> StackFault {
        if !self.status.is_set() {
            global_metrics().record_fault(fault);
        }
        self.status.latch(fault)
    }

    fn corrupt(&mut self, violation: Violation) -> StackFault {
        if self.violation.is_none() {
            global_metrics().record_violation(&violation);
            self.violation = Some(violation);
        }
        self.fail(violation.fault())
    }

    fn refresh(&mut self) {
        if let Some(buffer) = self.buffer.as_mut() {
            self.layers.on_mutate(buffer, self.size);
        }
    }

    fn read_slot(&mut self, index: usize) -> Result<f64, StackFault> {
        match self.buffer.as_ref().and_then(|buffer| buffer.slot(index)) {
            Some(value) => Ok(value),
            None => Err(self.corrupt(Violation::MissingBuffer)),
        }
    }

    /// Swap in a buffer of `capacity` slots. The old buffer stays in place
    /// until the new one is fully initialized.
    fn resize_buffer(&mut self, capacity: usize) -> Result<(), StackFault> {
        let resized = match &self.buffer {
            Some(buffer) => buffer.reallocate(capacity, self.config.allocation_limit),
            None => return Err(self.corrupt(Violation::MissingBuffer)),
        };
        let mut fresh = match resized {
            Ok(fresh) => fresh,
            Err(_) => return Err(self.fail(StackFault::ReallocationFailed)),
        };
        self.layers.on_construct(&mut fresh, self.size);

        let metrics = global_metrics();
        if capacity > self.capacity {
            IntegrityMetrics::inc(&metrics.growths);
        } else {
            IntegrityMetrics::inc(&metrics.shrinks);
        }
        self.buffer = Some(fresh);
        self.capacity = capacity;
        Ok(())
    }
}
