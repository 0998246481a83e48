//! Deterministic trust heuristic.
//!
//! An earlier revision of this pipeline drew the trust score from a random
//! distribution, which turned the trust term into pure noise. This formula is
//! the deterministic replacement: warm reactions and longer posts raise trust,
//! angry reactions lower it, and the floor of 0.4 keeps a single hostile post
//! from zeroing a page out.

use crate::features::FeatureRow;

/// `clamp(0.6·love + 0.2·haha + 0.1·(len/max_len) + 0.1·(1 − angry), 0.4, 1.0)`.
/// `max_len` is the batch maximum; a zero max contributes nothing.
pub fn trust_score(row: &FeatureRow, max_post_length: usize) -> f64 {
    let length_term = if max_post_length > 0 {
        row.post_length as f64 / max_post_length as f64
    } else {
        0.0
    };
    let raw = 0.6 * row.love_ratio
        + 0.2 * row.haha_ratio
        + 0.1 * length_term
        + 0.1 * (1.0 - row.angry_ratio);
    raw.clamp(0.4, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(love: f64, haha: f64, angry: f64, len: usize) -> FeatureRow {
        FeatureRow {
            love_ratio: love,
            haha_ratio: haha,
            angry_ratio: angry,
            post_length: len,
            ..FeatureRow::default()
        }
    }

    #[test]
    fn warm_long_post_reaches_the_ceiling() {
        assert_eq!(trust_score(&row(1.0, 1.0, 0.0, 100), 100), 1.0);
    }

    #[test]
    fn hostile_post_hits_the_floor() {
        assert_eq!(trust_score(&row(0.0, 0.0, 1.0, 0), 100), 0.4);
    }

    #[test]
    fn mid_range_value_is_exact() {
        // 0.6·0.5 + 0.2·0.0 + 0.1·0.5 + 0.1·(1 − 0.2) = 0.43
        let t = trust_score(&row(0.5, 0.0, 0.2, 50), 100);
        assert!((t - 0.43).abs() < 1e-12);
    }

    #[test]
    fn empty_batch_max_length_contributes_zero() {
        let t = trust_score(&row(1.0, 0.0, 0.0, 0), 0);
        // 0.6 + 0.1 = 0.7, no length term, no division by zero.
        assert!((t - 0.7).abs() < 1e-12);
    }

    #[test]
    fn always_within_declared_bounds() {
        for love in [0.0, 0.3, 1.0] {
            for angry in [0.0, 0.5, 1.0] {
                let t = trust_score(&row(love, 0.1, angry, 10), 40);
                assert!((0.4..=1.0).contains(&t));
            }
        }
    }
}
