/// Highest level the inverse lookup searches.
pub const MAX_LEVEL: u32 = 2500;

/// Total experience needed to reach `level`.
///
/// Closed form of `sum(50k^2 - 150k + 200)` for `k = 1..level-1`, evaluated in
/// integers so it can be used as an exact threshold. Results beyond `u64`
/// saturate at `u64::MAX`.
pub fn cumulative_required(level: u32) -> u64 {
    if level <= 1 {
        return 0;
    }

    // u128 holds every intermediate for any u32 level.
    let m = u128::from(level - 1);
    let sum_k2 = m * (m + 1) * (2 * m + 1) / 6;
    let sum_k = m * (m + 1) / 2;
    // Adding before subtracting keeps every intermediate non-negative.
    let total = 50 * sum_k2 + 200 * m - 150 * sum_k;
    u64::try_from(total).unwrap_or(u64::MAX)
}

/// Largest level whose requirement is covered by `total_experience`.
pub fn level_for_experience(total_experience: u64) -> u32 {
    let (mut low, mut high) = (1u32, MAX_LEVEL);
    while low < high {
        let mid = (low + high + 1) / 2;
        if cumulative_required(mid) <= total_experience {
            low = mid;
        } else {
            high = mid - 1;
        }
    }
    low
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_levels_match_known_thresholds() {
        assert_eq!(cumulative_required(0), 0);
        assert_eq!(cumulative_required(1), 0);
        assert_eq!(cumulative_required(2), 100);
        assert_eq!(cumulative_required(3), 200);
        assert_eq!(cumulative_required(8), 4_200);
        assert_eq!(cumulative_required(100), 15_694_800);
    }

    #[test]
    fn requirement_is_strictly_increasing() {
        for level in 1..MAX_LEVEL {
            assert!(cumulative_required(level + 1) > cumulative_required(level));
        }
    }

    #[test]
    fn top_level_does_not_overflow_32_bits_silently() {
        assert!(cumulative_required(MAX_LEVEL) > u64::from(u32::MAX));
    }

    #[test]
    fn huge_levels_saturate_instead_of_overflowing() {
        assert!(cumulative_required(1_000_000) < u64::MAX);
        assert!(cumulative_required(1_000_000) > cumulative_required(MAX_LEVEL));
        assert_eq!(cumulative_required(1_100_000), u64::MAX);
        assert_eq!(cumulative_required(3_000_000), u64::MAX);
        assert_eq!(cumulative_required(u32::MAX), u64::MAX);
    }

    #[test]
    fn inverse_round_trips_every_level() {
        for level in 1..=MAX_LEVEL {
            assert_eq!(level_for_experience(cumulative_required(level)), level);
        }
    }

    #[test]
    fn just_below_a_threshold_stays_on_previous_level() {
        assert_eq!(level_for_experience(cumulative_required(500) - 1), 499);
    }

    #[test]
    fn below_level_two_is_level_one() {
        for xp in 0..cumulative_required(2) {
            assert_eq!(level_for_experience(xp), 1);
        }
    }

    #[test]
    fn experience_beyond_ceiling_is_clamped() {
        assert_eq!(level_for_experience(u64::MAX), MAX_LEVEL);
    }
}
