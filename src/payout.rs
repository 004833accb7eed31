//! Static keno payout table
//!
//! Multipliers are house-edge-calibrated domain constants keyed by
//! (selection size, match count). The table is built once at first use and
//! never mutated, so concurrent lookups need no locking.

use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Numbers are drawn from 1..=POOL_SIZE.
pub const POOL_SIZE: usize = 40;
/// Every draw contains exactly this many distinct numbers.
pub const DRAW_SIZE: usize = 10;
/// A selection holds between 1 and this many numbers.
pub const MAX_SELECTION: usize = 10;

/// Row `size - 1` covers selection size `size`; index within a row is the
/// match count, so each row has `size + 1` entries. A zero entry is a valid
/// "no win", distinct from a missing selection size.
static TABLE: Lazy<[Vec<Decimal>; MAX_SELECTION]> = Lazy::new(|| {
    [
        vec![dec!(0), dec!(3.96)],
        vec![dec!(0), dec!(1.9), dec!(4.5)],
        vec![dec!(0), dec!(1.0), dec!(3.1), dec!(10.4)],
        vec![dec!(0), dec!(0.8), dec!(1.8), dec!(5.0), dec!(22.5)],
        vec![dec!(0), dec!(0.25), dec!(1.4), dec!(4.1), dec!(16.5), dec!(36.0)],
        vec![
            dec!(0),
            dec!(0),
            dec!(1.0),
            dec!(3.68),
            dec!(7.0),
            dec!(16.5),
            dec!(40.0),
        ],
        vec![
            dec!(0),
            dec!(0),
            dec!(0.47),
            dec!(3.0),
            dec!(4.5),
            dec!(14.0),
            dec!(31.0),
            dec!(60.0),
        ],
        vec![
            dec!(0),
            dec!(0),
            dec!(0),
            dec!(2.2),
            dec!(4.0),
            dec!(13.0),
            dec!(22.0),
            dec!(55.0),
            dec!(70.0),
        ],
        vec![
            dec!(0),
            dec!(0),
            dec!(0),
            dec!(1.55),
            dec!(3.0),
            dec!(8.0),
            dec!(15.0),
            dec!(44.0),
            dec!(60.0),
            dec!(70.0),
        ],
        vec![
            dec!(0),
            dec!(0),
            dec!(0),
            dec!(1.4),
            dec!(2.25),
            dec!(4.5),
            dec!(8.0),
            dec!(17.0),
            dec!(50.0),
            dec!(80.0),
            dec!(100.0),
        ],
    ]
});

/// Look up the multiplier for a selection size and match count.
///
/// Returns `None` when the selection size has no table row or the match
/// count exceeds the row, both of which indicate an invalid selection
/// upstream rather than a losing wager.
pub fn multiplier(selection_size: usize, match_count: usize) -> Option<Decimal> {
    TABLE
        .get(selection_size.checked_sub(1)?)
        .and_then(|row| row.get(match_count))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_row_covers_all_match_counts() {
        for size in 1..=MAX_SELECTION {
            for matches in 0..=size {
                assert!(
                    multiplier(size, matches).is_some(),
                    "missing entry for size {} matches {}",
                    size,
                    matches
                );
            }
            assert_eq!(multiplier(size, size + 1), None);
        }
    }

    #[test]
    fn out_of_range_sizes_have_no_row() {
        assert_eq!(multiplier(0, 0), None);
        assert_eq!(multiplier(MAX_SELECTION + 1, 0), None);
    }

    #[test]
    fn known_entries_match_the_house_table() {
        assert_eq!(multiplier(1, 1), Some(dec!(3.96)));
        assert_eq!(multiplier(5, 2), Some(dec!(1.4)));
        assert_eq!(multiplier(5, 5), Some(dec!(36.0)));
        assert_eq!(multiplier(10, 10), Some(dec!(100.0)));
        // low match counts on large selections pay nothing but are valid
        assert_eq!(multiplier(8, 2), Some(Decimal::ZERO));
    }
}
