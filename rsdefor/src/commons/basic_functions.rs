/// Median of a set of observations, `None` when empty.
///
/// The values are ordered with `total_cmp` before picking the middle, so the
/// result depends only on the multiset of inputs and never on their order.
/// Even counts average the two middle values.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

/// Signed area of a closed ring of (x, y) points by the shoelace formula,
/// positive when counter-clockwise
pub fn signed_ring_area(points: &[(f64, f64)]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..points.len() {
        let (x1, y1) = points[i];
        let (x2, y2) = points[(i + 1) % points.len()];
        sum += x1 * y2 - x2 * y1;
    }
    sum / 2.0
}
