use std::f64::consts::TAU;

pub const DIRECTION_BUCKETS: usize = 8;

/// Quantizes a displacement into a compass sector.
///
/// Sector 0 is centred on +x and sectors advance counter-clockwise, each
/// `360 / DIRECTION_BUCKETS` degrees wide. A zero or non-finite displacement
/// has no heading and lands in sector 0.
pub fn rot(delta: [f64; 2]) -> usize {
    let [dx, dy] = delta;
    if !dx.is_finite() || !dy.is_finite() || (dx == 0.0 && dy == 0.0) {
        return 0;
    }
    let sector = TAU / DIRECTION_BUCKETS as f64;
    let angle = dy.atan2(dx).rem_euclid(TAU);
    ((angle / sector).round() as usize) % DIRECTION_BUCKETS
}

pub fn bucket_heading(bucket: usize) -> [f64; 2] {
    let angle = (bucket % DIRECTION_BUCKETS) as f64 * TAU / DIRECTION_BUCKETS as f64;
    [angle.cos(), angle.sin()]
}
