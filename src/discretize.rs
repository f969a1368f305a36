/// Maps `value` onto one of `buckets` equal-width buckets spanning `range`.
///
/// Buckets are half-open `[lo, hi)` except the last one, which also takes the
/// upper bound. Returns `None` for values outside the closed range, NaN, or an
/// empty bucket count; callers treat that as "excluded from aggregation".
pub fn discretize(value: f64, range: (f64, f64), buckets: usize) -> Option<usize> {
    let (min, max) = range;
    if buckets == 0 || value.is_nan() || value < min || value > max {
        return None;
    }
    let span = max - min;
    if span <= 0.0 {
        return Some(0);
    }
    let pos = ((value - min) / span * buckets as f64).floor() as usize;
    Some(pos.min(buckets - 1))
}
