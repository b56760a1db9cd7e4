//! Per-question timing anomaly analysis.
//!
//! Pure functions over the per-question time samples submitted with an
//! attempt. Three rules, all evaluated against a single arithmetic mean
//! computed once per call:
//!
//! | Rule | Fires when |
//! |------|-----------|
//! | too fast | `t < 10%` of mean AND `t < 5000 ms` |
//! | consistent timing | `\|t − mean\| / mean < 0.05`, samples > 5 |
//! | copy-paste pattern | adjacent pair: `t < 2000 ms` then `next > 1.5 × mean` |
//!
//! A question index may fire more than one rule; reasons accumulate.

use serde::{Deserialize, Serialize};

/// Absolute ceiling below which a fast answer is considered anomalous.
const FAST_CEILING_MS: u64 = 5_000;
/// Fraction of the mean below which an answer is "too fast".
const FAST_MEAN_FRACTION: f64 = 0.10;
/// Relative deviation below which a sample counts as uniform.
const UNIFORM_TOLERANCE: f64 = 0.05;
/// Uniformity is only judged on samples larger than this, to avoid false
/// positives on short assessments.
const UNIFORM_MIN_SAMPLES: usize = 5;
/// Leading answer of a copy-paste pair must be under this.
const PASTE_LEAD_MS: u64 = 2_000;
/// Trailing answer of a copy-paste pair must exceed mean × this.
const PASTE_FOLLOW_FACTOR: f64 = 1.5;

/// Time spent on one question of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionTiming {
    /// Zero-based question index.
    pub question_index: u32,
    /// Milliseconds spent on the question.
    pub time_spent_ms: u64,
}

impl QuestionTiming {
    #[must_use]
    pub const fn new(question_index: u32, time_spent_ms: u64) -> Self {
        Self {
            question_index,
            time_spent_ms,
        }
    }
}

/// Verdict of the timing analyzer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingAnalysis {
    /// True iff at least one rule fired.
    pub suspicious: bool,
    /// Human-readable reason per fired rule instance.
    pub reasons: Vec<String>,
}

/// Analyze per-question timings for cheating signatures.
///
/// Empty input is non-suspicious. A zero mean (all samples zero) disables
/// the ratio-based rules instead of propagating NaN.
#[must_use]
pub fn analyze_timings(timings: &[QuestionTiming]) -> TimingAnalysis {
    let mut analysis = TimingAnalysis::default();
    if timings.is_empty() {
        return analysis;
    }

    let total: u64 = timings.iter().map(|t| t.time_spent_ms).sum();
    #[allow(clippy::cast_precision_loss)]
    let mean = total as f64 / timings.len() as f64;

    for timing in timings {
        #[allow(clippy::cast_precision_loss)]
        let spent = timing.time_spent_ms as f64;

        // Too fast: well under the mean and under the absolute ceiling.
        if mean > 0.0 && spent < mean * FAST_MEAN_FRACTION && timing.time_spent_ms < FAST_CEILING_MS
        {
            analysis.reasons.push(format!(
                "Question {} answered too quickly ({} ms, mean {:.0} ms)",
                timing.question_index, timing.time_spent_ms, mean
            ));
        }

        // Suspiciously uniform: only judged on samples larger than
        // UNIFORM_MIN_SAMPLES.
        if timings.len() > UNIFORM_MIN_SAMPLES
            && mean > 0.0
            && ((spent - mean).abs() / mean) < UNIFORM_TOLERANCE
        {
            analysis.reasons.push(format!(
                "Suspiciously consistent timing on question {} ({} ms, mean {:.0} ms)",
                timing.question_index, timing.time_spent_ms, mean
            ));
        }
    }

    // Copy-paste signature: a near-instant answer followed by a long one.
    for pair in timings.windows(2) {
        let (current, next) = (&pair[0], &pair[1]);
        #[allow(clippy::cast_precision_loss)]
        let next_spent = next.time_spent_ms as f64;
        if current.time_spent_ms < PASTE_LEAD_MS && mean > 0.0 && next_spent > mean * PASTE_FOLLOW_FACTOR
        {
            analysis.reasons.push(format!(
                "Possible copy-paste pattern between questions {} and {}",
                current.question_index, next.question_index
            ));
        }
    }

    analysis.suspicious = !analysis.reasons.is_empty();
    analysis
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn timings(samples: &[(u32, u64)]) -> Vec<QuestionTiming> {
        samples
            .iter()
            .map(|&(i, t)| QuestionTiming::new(i, t))
            .collect()
    }

    // --- Baseline behavior ---

    #[test]
    fn empty_input_is_not_suspicious() {
        let analysis = analyze_timings(&[]);
        assert!(!analysis.suspicious);
        assert!(analysis.reasons.is_empty());
    }

    #[test]
    fn normal_spread_is_not_suspicious() {
        let analysis = analyze_timings(&timings(&[(0, 30_000), (1, 45_000), (2, 60_000)]));
        assert!(!analysis.suspicious, "reasons: {:?}", analysis.reasons);
    }

    #[test]
    fn zero_durations_do_not_produce_nan_or_panic() {
        let analysis = analyze_timings(&timings(&[(0, 0)]));
        assert!(!analysis.suspicious);

        let analysis = analyze_timings(&timings(&[(0, 0), (1, 0), (2, 0)]));
        assert!(!analysis.suspicious);
    }

    // --- Too-fast rule ---

    #[test]
    fn fast_answer_against_slow_mean_is_flagged() {
        // mean = 33000; 1000 < 3300 and 1000 < 5000.
        let analysis = analyze_timings(&timings(&[(0, 50_000), (1, 48_000), (2, 1_000)]));
        assert!(analysis.suspicious);
        assert!(
            analysis
                .reasons
                .iter()
                .any(|r| r.contains("too quickly") && r.contains("Question 2")),
            "reasons: {:?}",
            analysis.reasons
        );
    }

    #[test]
    fn fast_answer_needs_both_conditions() {
        // 4000 ms is under the ceiling but not under 10% of the mean.
        let analysis = analyze_timings(&timings(&[(0, 10_000), (1, 12_000), (2, 4_000)]));
        assert!(
            !analysis.reasons.iter().any(|r| r.contains("too quickly")),
            "reasons: {:?}",
            analysis.reasons
        );
    }

    // --- Consistent-timing rule ---

    #[test]
    fn near_identical_timings_over_five_samples_are_flagged() {
        let analysis = analyze_timings(&timings(&[
            (0, 500),
            (1, 520),
            (2, 510),
            (3, 505),
            (4, 515),
            (5, 495),
        ]));
        assert!(analysis.suspicious);
        assert!(
            analysis
                .reasons
                .iter()
                .any(|r| r.contains("consistent timing")),
            "reasons: {:?}",
            analysis.reasons
        );
    }

    #[test]
    fn uniformity_not_judged_on_short_samples() {
        // Identical timings, but only 3 samples.
        let analysis = analyze_timings(&timings(&[(0, 500), (1, 500), (2, 500)]));
        assert!(
            !analysis
                .reasons
                .iter()
                .any(|r| r.contains("consistent timing")),
            "reasons: {:?}",
            analysis.reasons
        );
    }

    // --- Copy-paste rule ---

    #[test]
    fn instant_then_long_answer_is_flagged() {
        // mean = 20500; pair (1000, 40000): 1000 < 2000, 40000 > 30750.
        let analysis = analyze_timings(&timings(&[(0, 20_500), (1, 1_000), (2, 40_000)]));
        assert!(analysis.suspicious);
        assert!(
            analysis
                .reasons
                .iter()
                .any(|r| r.contains("copy-paste") && r.contains("1") && r.contains("2")),
            "reasons: {:?}",
            analysis.reasons
        );
    }

    // --- Multi-reason overlap ---

    #[test]
    fn one_question_may_fire_multiple_rules() {
        // Six samples, five uniform and one near-zero: the near-zero one
        // is too fast, the rest are consistent.
        let analysis = analyze_timings(&timings(&[
            (0, 10_000),
            (1, 10_100),
            (2, 9_900),
            (3, 10_050),
            (4, 9_950),
            (5, 100),
        ]));
        assert!(analysis.suspicious);
        assert!(analysis.reasons.iter().any(|r| r.contains("too quickly")));
        assert!(
            analysis
                .reasons
                .iter()
                .any(|r| r.contains("consistent timing"))
        );
    }

    // --- Properties ---

    proptest! {
        #[test]
        fn never_panics_and_reasons_match_verdict(
            samples in proptest::collection::vec((0u32..200, 0u64..600_000), 0..40)
        ) {
            let input = timings(&samples);
            let analysis = analyze_timings(&input);
            prop_assert_eq!(analysis.suspicious, !analysis.reasons.is_empty());
        }

        #[test]
        fn single_sample_never_suspicious(index in 0u32..100, spent in 0u64..600_000) {
            // One sample equals its own mean: no rule can fire.
            let analysis = analyze_timings(&[QuestionTiming::new(index, spent)]);
            prop_assert!(!analysis.suspicious);
        }
    }
}
