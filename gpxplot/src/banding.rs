//! Split a value sequence into contiguous runs of equal color band.
//!
//! Runs share their boundary point (`end` of one run equals `start` of the
//! next) so polylines drawn per run join without gaps.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::TrackError;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Run {
    pub start: usize,
    /// Inclusive.
    pub end: usize,
    pub band: usize,
}

impl Run {
    pub fn indices(&self) -> std::ops::RangeInclusive<usize> {
        self.start..=self.end
    }
}

/// Observed `(min, max)` over defined, finite values.
pub fn value_range(values: &[Option<f64>]) -> Option<(f64, f64)> {
    let finite = || values.iter().flatten().copied().filter(|v| v.is_finite());
    let min = finite().map(OrderedFloat).min()?;
    let max = finite().map(OrderedFloat).max()?;
    Some((min.0, max.0))
}

/// Band id per value.
///
/// Undefined values take the band of the closest preceding defined value;
/// leading undefined values take the band of the first defined one. When no
/// value is defined every point gets band 0.
pub fn assign_bands(values: &[Option<f64>], num_bands: usize) -> Result<Vec<usize>, TrackError> {
    if num_bands == 0 {
        return Err(TrackError::Configuration(
            "number of color bands must be positive".into(),
        ));
    }
    let Some((min, max)) = value_range(values) else {
        return Ok(vec![0; values.len()]);
    };
    let width = (max - min) / num_bands as f64;
    let bucket = |v: f64| -> usize {
        if width <= 0.0 {
            return 0;
        }
        let idx = ((v - min) / width).floor();
        (idx.max(0.0) as usize).min(num_bands - 1)
    };

    let direct: Vec<Option<usize>> = values
        .iter()
        .map(|v| v.filter(|v| v.is_finite()).map(bucket))
        .collect();
    let first = direct.iter().flatten().next().copied().unwrap_or(0);
    let mut last = first;
    Ok(direct
        .into_iter()
        .map(|b| {
            if let Some(b) = b {
                last = b;
            }
            last
        })
        .collect())
}

/// Maximal runs of identical ids, neighbouring runs sharing one point.
pub fn runs(ids: &[usize]) -> Vec<Run> {
    let mut out = Vec::new();
    let Some(&first) = ids.first() else {
        return out;
    };
    let mut start = 0;
    let mut current = first;
    for (i, &id) in ids.iter().enumerate().skip(1) {
        if id != current {
            out.push(Run {
                start,
                end: i,
                band: current,
            });
            start = i;
            current = id;
        }
    }
    out.push(Run {
        start,
        end: ids.len() - 1,
        band: current,
    });
    out
}

/// Band `values` into `num_bands` equal-width buckets and return the runs.
pub fn band(values: &[Option<f64>], num_bands: usize) -> Result<Vec<Run>, TrackError> {
    Ok(runs(&assign_bands(values, num_bands)?))
}
