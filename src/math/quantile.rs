//! Weighted order statistics.
//!
//! Two families of routines live here:
//!
//! - **Exact weighted** (`weighted_quantile`, `weighted_trimmed_mean`): inputs are
//!   `(value, weight)` pairs sorted ascending by value. Each point owns the
//!   cumulative-weight interval `[c_{i-1}, c_i]`.
//!   - Quantiles interpolate linearly between the mid-mass positions
//!     `c_i - w_i/2` and clamp to the extreme values outside them.
//!   - The trimmed mean keeps the part of every interval that overlaps the
//!     window `[lower·W, upper·W]`, so the retained mass is always exactly
//!     `(upper - lower)·W` no matter how many points there are.
//! - **Unweighted sorted samples** (`quantile_sorted`, `trimmed_mean_sorted`):
//!   used by the replicated method, where weights were already turned into
//!   repetition counts.
//!
//! Points with non-positive weight carry no mass and are ignored.

/// Tolerance used when converting fractional positions to indices.
const INDEX_EPS: f64 = 1e-9;

/// Weighted `q`-quantile (`q` in `[0, 1]`) of sorted `(value, weight)` pairs.
pub fn weighted_quantile(points: &[(f64, f64)], q: f64) -> Option<f64> {
    if !(0.0..=1.0).contains(&q) {
        return None;
    }
    let pts: Vec<(f64, f64)> = points.iter().copied().filter(|&(_, w)| w > 0.0).collect();
    let total: f64 = pts.iter().map(|&(_, w)| w).sum();
    if pts.is_empty() || !(total.is_finite() && total > 0.0) {
        return None;
    }

    let mut positions = Vec::with_capacity(pts.len());
    let mut cum = 0.0;
    for &(_, w) in &pts {
        cum += w;
        positions.push((cum - w / 2.0) / total);
    }

    let first = pts[0].0;
    let last = pts[pts.len() - 1].0;
    if q <= positions[0] {
        return Some(first);
    }
    if q >= positions[positions.len() - 1] {
        return Some(last);
    }

    // positions is strictly increasing because all weights are positive.
    let upper = positions.partition_point(|&p| p < q);
    let lower = upper - 1;
    let (p0, p1) = (positions[lower], positions[upper]);
    let (v0, v1) = (pts[lower].0, pts[upper].0);
    let t = (q - p0) / (p1 - p0);
    Some(v0 + t * (v1 - v0))
}

/// Weight retained from each point under the window `[lower, upper]`
/// (fractions of total weight). Output is aligned with `points`.
pub fn trim_overlaps(points: &[(f64, f64)], lower: f64, upper: f64) -> Vec<f64> {
    let total: f64 = points.iter().map(|&(_, w)| w.max(0.0)).sum();
    let lo = lower * total;
    let hi = upper * total;

    let mut out = Vec::with_capacity(points.len());
    let mut start = 0.0;
    for &(_, w) in points {
        let w = w.max(0.0);
        let end = start + w;
        out.push((end.min(hi) - start.max(lo)).max(0.0));
        start = end;
    }
    out
}

/// Weighted trimmed mean of sorted `(value, weight)` pairs.
pub fn weighted_trimmed_mean(points: &[(f64, f64)], lower: f64, upper: f64) -> Option<f64> {
    if !(0.0..=1.0).contains(&lower) || !(0.0..=1.0).contains(&upper) || lower >= upper {
        return None;
    }
    let overlaps = trim_overlaps(points, lower, upper);
    let retained: f64 = overlaps.iter().sum();
    if !(retained.is_finite() && retained > 0.0) {
        return None;
    }
    let weighted: f64 = points.iter().zip(&overlaps).map(|(&(v, _), &o)| v * o).sum();
    Some(weighted / retained)
}

/// Linear-interpolation quantile of an ascending sample (rank `q·(n-1)`).
pub fn quantile_sorted(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let pos = q * (values.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let t = pos - lo as f64;
    Some(values[lo] + t * (values[hi] - values[lo]))
}

/// Mean of the index positions `floor(lower·n) .. ceil(upper·n)` of an
/// ascending sample. At least one element is always retained.
///
/// Runs of equal values are weighted by their share of the retained slice,
/// and a constant slice returns its value exactly.
pub fn trimmed_mean_sorted(values: &[f64], lower: f64, upper: f64) -> Option<f64> {
    let n = values.len();
    if n == 0 || lower >= upper {
        return None;
    }
    let mut start = ((lower * n as f64) + INDEX_EPS).floor() as usize;
    let mut end = ((upper * n as f64) - INDEX_EPS).ceil() as usize;
    start = start.min(n - 1);
    end = end.clamp(start + 1, n);

    let slice = &values[start..end];
    let (lo, hi) = (slice[0], slice[slice.len() - 1]);
    if lo == hi {
        return Some(lo);
    }
    let total = slice.len() as f64;
    let mean: f64 = slice
        .chunk_by(|a, b| a == b)
        .map(|run| run[0] * (run.len() as f64 / total))
        .sum();
    Some(mean.max(lo).min(hi))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_point_is_its_own_median_and_trim() {
        let pts = [(0.0123, 1.0)];
        assert_eq!(weighted_quantile(&pts, 0.5), Some(0.0123));
        assert_eq!(weighted_trimmed_mean(&pts, 0.25, 0.75), Some(0.0123));
        assert_eq!(quantile_sorted(&[0.0123], 0.5), Some(0.0123));
        assert_eq!(trimmed_mean_sorted(&[0.0123], 0.25, 0.75), Some(0.0123));
    }

    #[test]
    fn repeated_copies_do_not_drift() {
        let copies = vec![0.0031; 10_000];
        assert_eq!(trimmed_mean_sorted(&copies, 0.25, 0.75), Some(0.0031));

        let mut mixed = vec![0.001; 5_000];
        mixed.extend(vec![0.003; 5_000]);
        let tm = trimmed_mean_sorted(&mixed, 0.25, 0.75).unwrap();
        assert!((tm - 0.002).abs() < 1e-15);
    }

    #[test]
    fn equal_weights_median_interpolates() {
        let pts = [(1.0, 0.25), (2.0, 0.25), (3.0, 0.25), (4.0, 0.25)];
        let m = weighted_quantile(&pts, 0.5).unwrap();
        assert!((m - 2.5).abs() < 1e-12);
    }

    #[test]
    fn dominant_weight_pulls_median() {
        let pts = [(1.0, 0.1), (2.0, 0.8), (10.0, 0.1)];
        assert!((weighted_quantile(&pts, 0.5).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn trimmed_mean_keeps_window_mass() {
        let pts = [(0.002, 0.5), (0.003, 0.3), (0.5, 0.2)];
        let overlaps = trim_overlaps(&pts, 0.25, 0.75);
        assert!((overlaps.iter().sum::<f64>() - 0.5).abs() < 1e-12);
        assert!(overlaps[2].abs() < 1e-12);

        let tm = weighted_trimmed_mean(&pts, 0.25, 0.75).unwrap();
        assert!((tm - 0.0025).abs() < 1e-12);
    }

    #[test]
    fn zero_weights_are_ignored() {
        let pts = [(1.0, 0.0), (5.0, 1.0)];
        assert_eq!(weighted_quantile(&pts, 0.5), Some(5.0));
        assert_eq!(weighted_quantile(&[(1.0, 0.0)], 0.5), None);
    }

    #[test]
    fn sorted_sample_trim_uses_index_window() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        // positions 2..6 -> 3,4,5,6
        let tm = trimmed_mean_sorted(&values, 0.25, 0.75).unwrap();
        assert!((tm - 4.5).abs() < 1e-12);
        assert!((quantile_sorted(&values, 0.5).unwrap() - 4.5).abs() < 1e-12);
    }
}
