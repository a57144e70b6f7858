//! Poison fill for unused slots.
//!
//! Every NaN counts as poison, so any NaN bit pattern written into an unused
//! slot still reads back as poison. The flip side: a caller that pushes NaN
//! produces a live slot that is indistinguishable from corruption.

/// The value written into unused slots.
pub const POISON: f64 = f64::NAN;

/// Returns true if `value` is poison.
#[inline]
#[must_use]
pub fn is_poison(value: f64) -> bool {
    value.is_nan()
}

/// A slot that breaks the fill rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoisonFault {
    /// A live slot holds poison.
    PoisonedLive { index: usize },
    /// An unused slot holds something other than poison.
    UnpoisonedFree { index: usize },
}

/// Classify slot `index` against a live prefix of length `size`. Returns
/// `None` when the slot obeys the rule.
#[must_use]
pub fn classify(index: usize, value: f64, size: usize) -> Option<PoisonFault> {
    let live = index < size;
    match (live, is_poison(value)) {
        (true, true) => Some(PoisonFault::PoisonedLive { index }),
        (false, false) => Some(PoisonFault::UnpoisonedFree { index }),
        _ => None,
    }
}
