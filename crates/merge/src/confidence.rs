/// Bonus added to the mean when the same fact is observed again.
pub const DUPLICATE_BONUS: f64 = 0.05;

pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// `min(1, mean(old, new) + 0.05)`, rounded to 4 places. A missing side
/// yields the other unchanged.
pub fn merge_confidence(old: Option<f64>, new: Option<f64>) -> Option<f64> {
    match (old, new) {
        (None, new) => new,
        (old, None) => old,
        (Some(a), Some(b)) => Some(round4(((a + b) / 2.0 + DUPLICATE_BONUS).min(1.0))),
    }
}

/// Scales a confidence by a source weight and clamps it into [0, 1].
pub fn apply_weight(confidence: Option<f64>, weight: f64) -> Option<f64> {
    confidence.map(|c| round4((c * weight).clamp(0.0, 1.0)))
}
