use serde::{Deserialize, Serialize};

use crate::TrackError;

/// Default maximum heart rate (bpm) for percent-of-max zones.
pub const DEFAULT_MAX_HEART_RATE: f64 = 187.0;

/// Lower bounds of zones 1-5 as fractions of the maximum heart rate.
pub const DEFAULT_ZONE_FRACTIONS: [f64; 5] = [0.5, 0.6, 0.7, 0.8, 0.9];

/// Heart-rate zone boundaries, ascending. Zone `k` (1-based) starts at the
/// `k`-th boundary; values below the first boundary fall in zone 1 and
/// values above the last in zone `n`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HeartRateZones {
    PercentOfMax {
        max_heart_rate: f64,
        fractions: Vec<f64>,
    },
    Absolute {
        bpm: Vec<f64>,
    },
}

impl Default for HeartRateZones {
    fn default() -> Self {
        HeartRateZones::PercentOfMax {
            max_heart_rate: DEFAULT_MAX_HEART_RATE,
            fractions: DEFAULT_ZONE_FRACTIONS.to_vec(),
        }
    }
}

impl HeartRateZones {
    pub fn percent_of_max(max_heart_rate: f64) -> Self {
        HeartRateZones::PercentOfMax {
            max_heart_rate,
            fractions: DEFAULT_ZONE_FRACTIONS.to_vec(),
        }
    }

    pub fn max_heart_rate(&self) -> Option<f64> {
        match self {
            HeartRateZones::PercentOfMax { max_heart_rate, .. } => Some(*max_heart_rate),
            HeartRateZones::Absolute { .. } => None,
        }
    }

    /// Zone boundaries in bpm.
    pub fn boundaries(&self) -> Vec<f64> {
        match self {
            HeartRateZones::PercentOfMax {
                max_heart_rate,
                fractions,
            } => fractions.iter().map(|f| f * max_heart_rate).collect(),
            HeartRateZones::Absolute { bpm } => bpm.clone(),
        }
    }

    pub fn zone_count(&self) -> usize {
        match self {
            HeartRateZones::PercentOfMax { fractions, .. } => fractions.len(),
            HeartRateZones::Absolute { bpm } => bpm.len(),
        }
    }

    pub fn validate(&self) -> Result<(), TrackError> {
        if let Some(max) = self.max_heart_rate() {
            if !max.is_finite() || max <= 0.0 {
                return Err(TrackError::Configuration(format!(
                    "max heart rate must be positive, got {}",
                    max
                )));
            }
        }
        let bounds = self.boundaries();
        if bounds.is_empty() {
            return Err(TrackError::Configuration(
                "heart-rate zones need at least one boundary".into(),
            ));
        }
        if bounds.iter().any(|b| !b.is_finite() || *b < 0.0) {
            return Err(TrackError::Configuration(
                "heart-rate zone boundaries must be finite and non-negative".into(),
            ));
        }
        if bounds.windows(2).any(|w| w[1] <= w[0]) {
            return Err(TrackError::Configuration(
                "heart-rate zone boundaries must be strictly ascending".into(),
            ));
        }
        Ok(())
    }

    /// Boundaries resolved once, for per-point lookups.
    pub fn table(&self) -> ZoneTable {
        ZoneTable {
            bounds: self.boundaries(),
            max_heart_rate: self.max_heart_rate(),
        }
    }

    /// Integer zone for `bpm`, in `1..=n`.
    pub fn zone(&self, bpm: f64) -> u8 {
        self.table().zone(bpm)
    }

    /// Continuous zone for `bpm`, linear between neighbouring boundaries.
    pub fn zone_float(&self, bpm: f64) -> f64 {
        self.table().zone_float(bpm)
    }

    /// Fraction of the maximum heart rate, when the zones carry one.
    pub fn fraction(&self, bpm: f64) -> Option<f64> {
        self.max_heart_rate().map(|max| bpm / max)
    }

    /// `(lower, upper)` bpm per zone; the top zone is open-ended unless the
    /// maximum heart rate is known.
    pub fn limits(&self) -> Vec<(f64, Option<f64>)> {
        let bounds = self.boundaries();
        let top = self.max_heart_rate();
        bounds
            .iter()
            .enumerate()
            .map(|(i, &lo)| (lo, bounds.get(i + 1).copied().or(top)))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ZoneTable {
    bounds: Vec<f64>,
    max_heart_rate: Option<f64>,
}

impl ZoneTable {
    pub fn zone(&self, bpm: f64) -> u8 {
        let reached = self.bounds.iter().filter(|b| **b <= bpm).count();
        reached.clamp(1, self.bounds.len().max(1)) as u8
    }

    pub fn zone_float(&self, bpm: f64) -> f64 {
        let bounds = &self.bounds;
        let n = bounds.len();
        if n == 0 || bpm <= bounds[0] {
            return 1.0;
        }
        if bpm >= bounds[n - 1] {
            return n as f64;
        }
        for k in 1..n {
            let (lo, hi) = (bounds[k - 1], bounds[k]);
            if bpm < hi {
                return k as f64 + (bpm - lo) / (hi - lo);
            }
        }
        n as f64
    }

    pub fn fraction(&self, bpm: f64) -> Option<f64> {
        self.max_heart_rate.map(|max| bpm / max)
    }
}

/// Velocity tiers as `(threshold_kmh, level)` pairs, ascending by threshold.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VelocityLevels {
    pub thresholds: Vec<(f64, u8)>,
}

impl Default for VelocityLevels {
    fn default() -> Self {
        Self {
            thresholds: vec![
                (0.5, 1),
                (3.0, 2),
                (6.0, 3),
                (10.0, 4),
                (15.0, 5),
                (25.0, 6),
            ],
        }
    }
}

impl VelocityLevels {
    pub fn validate(&self) -> Result<(), TrackError> {
        if self.thresholds.iter().any(|(t, _)| !t.is_finite()) {
            return Err(TrackError::Configuration(
                "velocity thresholds must be finite".into(),
            ));
        }
        if self.thresholds.windows(2).any(|w| w[1].0 <= w[0].0) {
            return Err(TrackError::Configuration(
                "velocity thresholds must be strictly ascending".into(),
            ));
        }
        Ok(())
    }

    /// Level of the highest threshold reached; 0 when undefined or below all.
    pub fn level(&self, velocity_kmh: Option<f64>) -> u8 {
        let Some(v) = velocity_kmh.filter(|v| v.is_finite()) else {
            return 0;
        };
        self.thresholds
            .iter()
            .take_while(|(t, _)| v >= *t)
            .last()
            .map(|(_, level)| *level)
            .unwrap_or(0)
    }

    pub fn max_level(&self) -> u8 {
        self.thresholds.iter().map(|(_, l)| *l).max().unwrap_or(0)
    }
}
