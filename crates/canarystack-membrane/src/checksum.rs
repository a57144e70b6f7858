//! Rolling rotate-and-XOR checksum over a numeric region.
//!
//! The accumulator is seeded from the container's `size` and `capacity`, so
//! the value covers structural state as well as content. Every byte of the
//! region, live and poisoned alike, is folded in.
//!
//! The accumulator is linear over XOR: changing any single byte always
//! changes the result. Paired changes can cancel; this is an integrity
//! check, not a MAC.

/// Size in bytes of the stored checksum slot.
pub const CHECKSUM_SIZE: usize = 8;

const SEED: u64 = 0x6A09_E667_F3BC_C908;
const SIZE_MIX: u64 = 0x9E37_79B9_7F4A_7C15;
const ROTATION: u32 = 5;

/// Initial accumulator for a container with `size` live slots out of `capacity`.
#[must_use]
pub const fn seed(size: usize, capacity: usize) -> u64 {
    SEED ^ (size as u64).rotate_left(32) ^ (capacity as u64).wrapping_mul(SIZE_MIX)
}

/// Checksum of `region` for the given structural state.
#[must_use]
pub fn rolling_checksum(region: &[u8], size: usize, capacity: usize) -> u64 {
    region
        .iter()
        .fold(seed(size, capacity), |acc, &byte| {
            acc.rotate_left(ROTATION) ^ u64::from(byte)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let data = [1_u8, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(
            rolling_checksum(&data, 1, 3),
            rolling_checksum(&data, 1, 3)
        );
    }

    #[test]
    fn structural_state_changes_checksum() {
        let data = [0xAB_u8; 24];
        let base = rolling_checksum(&data, 2, 3);
        assert_ne!(base, rolling_checksum(&data, 1, 3));
        assert_ne!(base, rolling_checksum(&data, 2, 4));
    }

    #[test]
    fn every_single_byte_flip_is_detected() {
        let data: Vec<u8> = (0..80_u8).collect();
        let base = rolling_checksum(&data, 4, 10);
        for i in 0..data.len() {
            for mask in [0x01_u8, 0x80, 0xFF] {
                let mut corrupted = data.clone();
                corrupted[i] ^= mask;
                assert_ne!(
                    rolling_checksum(&corrupted, 4, 10),
                    base,
                    "flip of byte {i} with mask {mask:#x} went unnoticed"
                );
            }
        }
    }

    #[test]
    fn empty_region_is_seed() {
        assert_eq!(rolling_checksum(&[], 0, 3), seed(0, 3));
    }
}
