//! Guard words bracketing a memory block.
//!
//! Two fixed 32-bit constants sit immediately before and after the block.
//! A write that spills over either boundary changes one of them. Corruption
//! strictly inside the block is invisible to this layer.

use serde::Serialize;

/// Size in bytes of one guard word.
pub const GUARD_SIZE: usize = 4;

/// Expected word before the numeric region of a buffer.
pub const BUFFER_GUARD_LEFT: u32 = 0xBADC_0FFE;
/// Expected word after the numeric region of a buffer.
pub const BUFFER_GUARD_RIGHT: u32 = 0xDEAD_BEEF;
/// Expected first field of a container.
pub const STRUCT_GUARD_LEFT: u32 = 0xDEDD_ED32;
/// Expected last field of a container.
pub const STRUCT_GUARD_RIGHT: u32 = 0xFACE_BEEF;

/// Which end of a guarded block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardSide {
    Left,
    Right,
}

/// What a guard protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardTarget {
    /// The heap buffer's numeric region.
    Buffer,
    /// The container's own fields.
    Struct,
}

/// A pair of expected guard words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GuardPair {
    pub left: u32,
    pub right: u32,
}

impl GuardPair {
    /// Guards around a buffer's numeric region.
    pub const BUFFER: Self = Self {
        left: BUFFER_GUARD_LEFT,
        right: BUFFER_GUARD_RIGHT,
    };

    /// Guards around a container's fields.
    pub const STRUCT: Self = Self {
        left: STRUCT_GUARD_LEFT,
        right: STRUCT_GUARD_RIGHT,
    };

    /// Expected word for one side.
    #[must_use]
    pub const fn expected(&self, side: GuardSide) -> u32 {
        match side {
            GuardSide::Left => self.left,
            GuardSide::Right => self.right,
        }
    }

    /// First side whose observed word differs from the expected one.
    #[must_use]
    pub fn first_mismatch(&self, left: u32, right: u32) -> Option<(GuardSide, u32)> {
        if left != self.left {
            Some((GuardSide::Left, left))
        } else if right != self.right {
            Some((GuardSide::Right, right))
        } else {
            None
        }
    }
}

/// Serialize a guard word.
#[must_use]
pub const fn to_bytes(word: u32) -> [u8; GUARD_SIZE] {
    word.to_le_bytes()
}

/// Deserialize a guard word.
#[must_use]
pub const fn from_bytes(bytes: [u8; GUARD_SIZE]) -> u32 {
    u32::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_roundtrip() {
        assert_eq!(from_bytes(to_bytes(BUFFER_GUARD_LEFT)), BUFFER_GUARD_LEFT);
    }

    #[test]
    fn intact_pair_has_no_mismatch() {
        let pair = GuardPair::BUFFER;
        assert_eq!(pair.first_mismatch(BUFFER_GUARD_LEFT, BUFFER_GUARD_RIGHT), None);
    }

    #[test]
    fn mismatch_reports_side_and_value() {
        let pair = GuardPair::STRUCT;
        assert_eq!(
            pair.first_mismatch(0, STRUCT_GUARD_RIGHT),
            Some((GuardSide::Left, 0))
        );
        assert_eq!(
            pair.first_mismatch(STRUCT_GUARD_LEFT, 0xFFFF_FFFF),
            Some((GuardSide::Right, 0xFFFF_FFFF))
        );
    }

    #[test]
    fn all_constants_distinct() {
        let words = [
            BUFFER_GUARD_LEFT,
            BUFFER_GUARD_RIGHT,
            STRUCT_GUARD_LEFT,
            STRUCT_GUARD_RIGHT,
        ];
        for (i, a) in words.iter().enumerate() {
            for b in &words[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
