//! Deterministic equal-split fallback.

/// Divide 100% among `count` programs in 5% increments, as evenly as
/// possible.
///
/// Works in 20 five-percent units: every program gets `20 / count` units and
/// the first `20 % count` programs get one extra. The result always sums to
/// exactly 100 for `count >= 1`; `count == 0` yields an empty vector.
pub fn equal_split(count: usize) -> Vec<i64> {
    if count == 0 {
        return Vec::new();
    }
    let base = (20 / count) as i64;
    let remainder = 20 % count;
    let mut allocations = vec![base * 5; count];
    for slot in allocations.iter_mut().take(remainder) {
        *slot += 5;
    }
    allocations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_programs_yields_empty() {
        assert!(equal_split(0).is_empty());
    }

    #[test]
    fn sums_to_hundred_with_matching_length() {
        for n in 1..=50 {
            let split = equal_split(n);
            assert_eq!(split.len(), n, "length for n={n}");
            assert_eq!(split.iter().sum::<i64>(), 100, "sum for n={n}");
        }
    }

    #[test]
    fn every_value_is_a_nonnegative_multiple_of_five() {
        for n in 1..=50 {
            for value in equal_split(n) {
                assert!(value >= 0, "negative value for n={n}");
                assert_eq!(value % 5, 0, "{value} not a multiple of 5 for n={n}");
            }
        }
    }

    #[test]
    fn spread_never_exceeds_one_increment() {
        for n in 1..=50 {
            let split = equal_split(n);
            let max = split.iter().max().unwrap();
            let min = split.iter().min().unwrap();
            assert!(max - min <= 5, "spread {} for n={n}", max - min);
        }
    }

    #[test]
    fn extra_units_go_to_the_front() {
        // 20 units over 3 programs: 7, 7, 6 units -> 35, 35, 30.
        assert_eq!(equal_split(3), vec![35, 35, 30]);
        // One program takes everything.
        assert_eq!(equal_split(1), vec![100]);
        // More programs than units: the tail gets nothing.
        assert_eq!(equal_split(25)[..5], [5, 5, 5, 5, 5]);
        assert_eq!(equal_split(25)[20..], [0, 0, 0, 0, 0]);
    }
}
