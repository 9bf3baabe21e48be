//! Long-run behavior extraction: local extrema of a trajectory component.

use crate::error::EngineError;
use rand::Rng;

/// Scans a numeric series for local minima and maxima.
///
/// A flat series (max == min) represents a fixed point and collapses to the
/// single value `mean(series)` regardless of length. Otherwise the series
/// must hold at least 3 samples and each interior value `x[i-1]` is recorded
/// when `x[i-2] > x[i-1] && x[i-1] < x[i]` (minimum) or the reversed strict
/// inequalities hold (maximum). Ties never count, and the endpoints are
/// never recorded: they are integration-window artifacts, not extrema.
///
/// The three-point comparison is kept exactly as stated even though its
/// index alignment differs from the textbook sign-change test; downstream
/// bifurcation figures were generated against this definition.
pub fn local_extrema(series: &[f64]) -> Result<Vec<f64>, EngineError> {
    if series.is_empty() {
        return Err(EngineError::DegenerateSeries { len: 0 });
    }

    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &value in series {
        lo = lo.min(value);
        hi = hi.max(value);
    }
    if lo == hi {
        let mean = series.iter().sum::<f64>() / series.len() as f64;
        return Ok(vec![mean]);
    }

    if series.len() < 3 {
        return Err(EngineError::DegenerateSeries { len: series.len() });
    }

    let mut extrema = Vec::new();
    for i in 2..series.len() {
        let before = series[i - 2];
        let middle = series[i - 1];
        let after = series[i];
        if before > middle && middle < after {
            extrema.push(middle);
        } else if before < middle && middle > after {
            extrema.push(middle);
        }
    }
    Ok(extrema)
}

/// Optional post-processing of an extrema set.
///
/// `unique` deduplicates to distinct values; a nonzero `max_out` then
/// uniformly subsamples without replacement down to that cap. Subsampling
/// is a lossy compression to bound output size and does not preserve the
/// distributional shape of the extrema population.
pub fn reduce_extrema(
    mut values: Vec<f64>,
    unique: bool,
    max_out: usize,
    rng: &mut impl Rng,
) -> Vec<f64> {
    if unique {
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        values.dedup();
    }

    if max_out > 0 && values.len() > max_out {
        let mut picked = rand::seq::index::sample(rng, values.len(), max_out).into_vec();
        picked.sort_unstable();
        values = picked.into_iter().map(|i| values[i]).collect();
    }

    values
}
