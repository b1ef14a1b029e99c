use crate::models::wellness::FIT_EPOCH_OFFSET;

const COUNTER_MASK: i64 = 0xFFFF;

/// Recover an absolute timestamp from a 16-bit rolling counter.
///
/// The counter is taken to have advanced forward from the low 16 bits of
/// `reference_ts`, so the result is never earlier than the reference and its
/// low 16 bits equal `counter16`. When `reference_is_absolute` is false the
/// reference is a UNIX timestamp and the arithmetic is done relative to the
/// device epoch, then shifted back.
///
/// Arithmetic wraps at the `i64` limits; the low 16 bits still match the
/// counter there.
pub fn reconcile(reference_ts: i64, counter16: i64, reference_is_absolute: bool) -> i64 {
    let offset = if reference_is_absolute { 0 } else { FIT_EPOCH_OFFSET };
    let base = reference_ts.wrapping_sub(offset);
    let distance = counter16.wrapping_sub(base & COUNTER_MASK) & COUNTER_MASK;
    base.wrapping_add(distance).wrapping_add(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn low16(v: i64) -> i64 {
        v & COUNTER_MASK
    }

    #[test]
    fn counter_equal_to_reference_bits_is_reference() {
        assert_eq!(reconcile(100_000, low16(100_000), true), 100_000);
    }

    #[test]
    fn counter_ahead_adds_forward_distance() {
        assert_eq!(reconcile(100_000, (low16(100_000) + 5) % 65536, true), 100_005);
    }

    #[test]
    fn counter_just_behind_wraps_forward() {
        let counter = (low16(100_000) - 1).rem_euclid(65536);
        assert_eq!(reconcile(100_000, counter, true), 100_000 + 65_535);
    }

    #[test]
    fn device_relative_reference_matches_raw_arithmetic() {
        // raw device timestamp and its UNIX equivalent must reconcile to the same instant
        let raw_reference = 1_000_000_000_i64;
        let counter = (low16(raw_reference) + 30) % 65536;
        let from_unix = reconcile(raw_reference + FIT_EPOCH_OFFSET, counter, false);
        let from_raw = reconcile(raw_reference, counter, true) + FIT_EPOCH_OFFSET;
        assert_eq!(from_unix, from_raw);
        assert_eq!(from_unix, raw_reference + 30 + FIT_EPOCH_OFFSET);
    }

    #[test]
    fn extreme_references_wrap_instead_of_overflowing() {
        let ts = reconcile(i64::MAX - 10, 0, true);
        assert_eq!(ts & COUNTER_MASK, 0);
        let ts = reconcile(i64::MIN + 3, 7, false);
        assert_eq!((ts.wrapping_sub(FIT_EPOCH_OFFSET)) & COUNTER_MASK, 7);
    }

    proptest! {
        #[test]
        fn never_goes_backwards(reference in 0i64..4_000_000_000, counter in 0i64..65536) {
            let ts = reconcile(reference, counter, true);
            prop_assert!(ts >= reference);
            prop_assert!(ts - reference < 65536);
            prop_assert_eq!(ts.rem_euclid(65536), counter);
        }

        #[test]
        fn device_epoch_result_keeps_counter_bits(reference in FIT_EPOCH_OFFSET..4_000_000_000, counter in 0i64..65536) {
            let ts = reconcile(reference, counter, false);
            prop_assert!(ts >= reference);
            prop_assert_eq!((ts - FIT_EPOCH_OFFSET).rem_euclid(65536), counter);
        }
    }
}
