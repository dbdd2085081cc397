//! Per-point and aggregate metrics for one track segment.

use chrono::{DateTime, Utc};
use ndarray::Array1;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::track::{Segment, TrackPoint};
use crate::zones::{HeartRateZones, VelocityLevels};
use crate::{haversine_distance, TrackError};

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    pub heart_rate_zones: HeartRateZones,
    pub velocity_levels: VelocityLevels,
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<(), TrackError> {
        self.heart_rate_zones.validate()?;
        self.velocity_levels.validate()
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl Stats {
    /// Min/max/mean over the finite values; `None` when there are none.
    pub fn from_values<I>(values: I) -> Option<Stats>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut min: Option<OrderedFloat<f64>> = None;
        let mut max: Option<OrderedFloat<f64>> = None;
        let mut sum = 0.0;
        let mut count = 0usize;
        for v in values.into_iter().filter(|v| v.is_finite()) {
            let v = OrderedFloat(v);
            min = Some(min.map_or(v, |m| m.min(v)));
            max = Some(max.map_or(v, |m| m.max(v)));
            sum += v.0;
            count += 1;
        }
        Some(Stats {
            min: min?.0,
            max: max?.0,
            mean: sum / count as f64,
        })
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SegmentSummary {
    pub point_count: usize,
    pub total_distance_m: f64,
    /// Span between the first and last timestamp, 0 without timestamps.
    pub total_time_s: f64,
    pub elevation_up_m: f64,
    pub elevation_down_m: f64,
    /// Time-weighted when at least two timed samples exist.
    pub average_hr: Option<f64>,
    pub max_hr: Option<f64>,
    pub average_velocity_kmh: Option<f64>,
    pub elevation: Option<Stats>,
    pub heart_rate: Option<Stats>,
    pub velocity: Option<Stats>,
    pub cadence: Option<Stats>,
    pub power: Option<Stats>,
}

fn validate_point(index: usize, point: &TrackPoint) -> Result<(), TrackError> {
    let invalid = |reason: String| TrackError::Validation { index, reason };
    if !point.latitude.is_finite() || !point.longitude.is_finite() {
        return Err(invalid(format!(
            "non-finite coordinate ({}, {})",
            point.latitude, point.longitude
        )));
    }
    if !(-90.0..=90.0).contains(&point.latitude) {
        return Err(invalid(format!("latitude {} out of range", point.latitude)));
    }
    if !(-180.0..=180.0).contains(&point.longitude) {
        return Err(invalid(format!(
            "longitude {} out of range",
            point.longitude
        )));
    }
    if let Some(ele) = point.elevation {
        if !ele.is_finite() {
            return Err(invalid(format!("non-finite elevation {}", ele)));
        }
    }
    Ok(())
}

fn seconds_between(base: DateTime<Utc>, t: DateTime<Utc>) -> f64 {
    (t - base).num_milliseconds() as f64 / 1000.0
}

fn cumulative_distance(points: &[TrackPoint]) -> Array1<f64> {
    let mut dist = Array1::zeros(points.len());
    for i in 1..points.len() {
        let (a, b) = (&points[i - 1], &points[i]);
        dist[i] = dist[i - 1] + haversine_distance(a.latitude, a.longitude, b.latitude, b.longitude);
    }
    dist
}

/// Running climb/descent sums; missing elevations are skipped and the next
/// reading is compared against the last known one.
fn elevation_running_sums(points: &[TrackPoint]) -> (Vec<f64>, Vec<f64>) {
    let mut gain = Vec::with_capacity(points.len());
    let mut drop = Vec::with_capacity(points.len());
    let mut up = 0.0;
    let mut down = 0.0;
    let mut last: Option<f64> = None;
    for point in points {
        if let Some(ele) = point.elevation {
            if let Some(prev) = last {
                let delta = ele - prev;
                if delta > 0.0 {
                    up += delta;
                } else {
                    down -= delta;
                }
            }
            last = Some(ele);
        }
        gain.push(up);
        drop.push(down);
    }
    (gain, drop)
}

fn velocities(distance: &Array1<f64>, elapsed: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(elapsed.len());
    for i in 0..elapsed.len() {
        if i == 0 {
            out.push(None);
            continue;
        }
        let v = match (elapsed[i - 1], elapsed[i]) {
            (Some(t0), Some(t1)) if t1 - t0 > 0.0 => {
                let km = (distance[i] - distance[i - 1]) / 1000.0;
                let hours = (t1 - t0) / 3600.0;
                Some(km / hours)
            }
            _ => None,
        };
        out.push(v);
    }
    out
}

fn average_heart_rate(elapsed: &[Option<f64>], points: &[TrackPoint]) -> Option<f64> {
    let samples: Vec<(f64, f64)> = elapsed
        .iter()
        .zip(points)
        .filter_map(|(t, p)| Some(((*t)?, f64::from(p.heart_rate?))))
        .collect();
    if samples.len() >= 2 {
        let span = samples[samples.len() - 1].0 - samples[0].0;
        if span > 0.0 {
            let area: f64 = samples
                .windows(2)
                .map(|w| 0.5 * (w[0].1 + w[1].1) * (w[1].0 - w[0].0))
                .sum();
            return Some(area / span);
        }
    }
    Stats::from_values(points.iter().filter_map(|p| p.heart_rate.map(f64::from))).map(|s| s.mean)
}

/// Derive every per-point series and the aggregates for one segment.
pub fn compute_segment(
    points: &[TrackPoint],
    config: &MetricsConfig,
) -> Result<Segment, TrackError> {
    config.validate()?;
    for (index, point) in points.iter().enumerate() {
        validate_point(index, point)?;
    }

    let distance = cumulative_distance(points);

    let base = points.iter().find_map(|p| p.time);
    let elapsed_time: Vec<Option<f64>> = points
        .iter()
        .map(|p| Some(seconds_between(base?, p.time?)))
        .collect();

    let velocity = velocities(&distance, &elapsed_time);
    let pace: Vec<Option<f64>> = velocity
        .iter()
        .map(|v| v.filter(|v| *v > 0.0).map(|v| 60.0 / v))
        .collect();
    let velocity_level: Vec<u8> = velocity
        .iter()
        .map(|v| config.velocity_levels.level(*v))
        .collect();

    let zones = config.heart_rate_zones.table();
    let hr: Vec<Option<f64>> = points.iter().map(|p| p.heart_rate.map(f64::from)).collect();
    let hr_zone = hr.iter().map(|h| h.map(|b| zones.zone(b))).collect();
    let hr_zone_float = hr.iter().map(|h| h.map(|b| zones.zone_float(b))).collect();
    let hr_fraction = hr.iter().map(|h| h.and_then(|b| zones.fraction(b))).collect();

    let (elevation_gain, elevation_drop) = elevation_running_sums(points);

    let timed: Vec<f64> = elapsed_time.iter().flatten().copied().collect();
    let total_time_s = match (timed.first(), timed.last()) {
        (Some(first), Some(last)) => last - first,
        _ => 0.0,
    };
    let total_distance_m = distance.last().copied().unwrap_or(0.0);
    let heart_rate = Stats::from_values(hr.iter().flatten().copied());

    let summary = SegmentSummary {
        point_count: points.len(),
        total_distance_m,
        total_time_s,
        elevation_up_m: elevation_gain.last().copied().unwrap_or(0.0),
        elevation_down_m: elevation_drop.last().copied().unwrap_or(0.0),
        average_hr: average_heart_rate(&elapsed_time, points),
        max_hr: heart_rate.map(|s| s.max),
        average_velocity_kmh: (total_time_s > 0.0)
            .then(|| (total_distance_m / 1000.0) / (total_time_s / 3600.0)),
        elevation: Stats::from_values(points.iter().filter_map(|p| p.elevation)),
        heart_rate,
        velocity: Stats::from_values(velocity.iter().flatten().copied()),
        cadence: Stats::from_values(points.iter().filter_map(|p| p.cadence.map(f64::from))),
        power: Stats::from_values(points.iter().filter_map(|p| p.power.map(f64::from))),
    };

    Ok(Segment {
        points: points.to_vec(),
        distance,
        elapsed_time,
        velocity,
        pace,
        velocity_level,
        hr_zone,
        hr_zone_float,
        hr_fraction,
        elevation_gain,
        elevation_drop,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    /// Latitude step (degrees) that is exactly `km` along a meridian.
    fn lat_step(km: f64) -> f64 {
        (km * 1000.0 / crate::EARTH_RADIUS_M).to_degrees()
    }

    fn walk(n: usize) -> Vec<TrackPoint> {
        (0..n)
            .map(|i| {
                TrackPoint::new(63.4 + lat_step(0.01) * i as f64, 10.4 + 0.0001 * (i % 3) as f64)
                    .with_elevation(100.0 + ((i * 7) % 11) as f64)
                    .with_time(at(5 * i as i64))
                    .with_heart_rate(120 + (i % 40) as u16)
            })
            .collect()
    }

    #[test]
    fn test_distance_starts_at_zero_and_grows() {
        let points = walk(25);
        let segment = compute_segment(&points, &MetricsConfig::default()).unwrap();
        assert_eq!(segment.distance.len(), points.len());
        assert_eq!(segment.distance[0], 0.0);
        for w in segment.distance.windows(2) {
            assert!(w[1] >= w[0]);
        }
        for len in [
            segment.elapsed_time.len(),
            segment.velocity.len(),
            segment.pace.len(),
            segment.velocity_level.len(),
            segment.hr_zone.len(),
            segment.hr_zone_float.len(),
            segment.hr_fraction.len(),
            segment.elevation_gain.len(),
            segment.elevation_drop.len(),
        ] {
            assert_eq!(len, points.len());
        }
    }

    #[test]
    fn test_velocity_one_km_in_a_minute() {
        let points = vec![
            TrackPoint::new(60.0, 5.0).with_time(at(0)),
            TrackPoint::new(60.0 + lat_step(1.0), 5.0).with_time(at(60)),
        ];
        let segment = compute_segment(&points, &MetricsConfig::default()).unwrap();
        assert_eq!(segment.velocity[0], None);
        let v = segment.velocity[1].unwrap();
        assert!((v - 60.0).abs() < 1e-6, "velocity {}", v);
        assert!((segment.pace[1].unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(segment.velocity_level[1], 6);
        assert_eq!(segment.velocity_level[0], 0);
        assert!((segment.summary.total_distance_m - 1000.0).abs() < 1e-6);
        assert_eq!(segment.summary.total_time_s, 60.0);
        assert!((segment.summary.average_velocity_kmh.unwrap() - 60.0).abs() < 1e-6);
    }

    #[test]
    fn test_elevation_up_and_down() {
        let points: Vec<TrackPoint> = [100.0, 105.0, 95.0, 110.0]
            .iter()
            .enumerate()
            .map(|(i, &e)| TrackPoint::new(10.0 + 0.001 * i as f64, 20.0).with_elevation(e))
            .collect();
        let segment = compute_segment(&points, &MetricsConfig::default()).unwrap();
        assert_eq!(segment.summary.elevation_up_m, 20.0);
        assert_eq!(segment.summary.elevation_down_m, 10.0);
        assert_eq!(segment.elevation_gain, vec![0.0, 5.0, 5.0, 20.0]);
        assert_eq!(segment.elevation_drop, vec![0.0, 0.0, 10.0, 10.0]);
        assert_eq!(
            segment.summary.elevation_up_m - segment.summary.elevation_down_m,
            110.0 - 100.0
        );
    }

    #[test]
    fn test_net_elevation_matches_endpoints() {
        let points = walk(40);
        let segment = compute_segment(&points, &MetricsConfig::default()).unwrap();
        let first = points[0].elevation.unwrap();
        let last = points[points.len() - 1].elevation.unwrap();
        let net = segment.summary.elevation_up_m - segment.summary.elevation_down_m;
        assert!((net - (last - first)).abs() < 1e-9);
    }

    #[test]
    fn test_missing_elevation_uses_last_known() {
        let mut points: Vec<TrackPoint> = (0..4)
            .map(|i| TrackPoint::new(10.0 + 0.001 * i as f64, 20.0))
            .collect();
        points[0].elevation = Some(100.0);
        points[2].elevation = Some(90.0);
        points[3].elevation = Some(95.0);
        let segment = compute_segment(&points, &MetricsConfig::default()).unwrap();
        assert_eq!(segment.summary.elevation_down_m, 10.0);
        assert_eq!(segment.summary.elevation_up_m, 5.0);
        assert_eq!(segment.elevation_drop[1], 0.0);
    }

    #[test]
    fn test_missing_timestamps_propagate() {
        let points = vec![
            TrackPoint::new(60.0, 5.0).with_time(at(0)),
            TrackPoint::new(60.001, 5.0),
            TrackPoint::new(60.002, 5.0).with_time(at(20)),
            TrackPoint::new(60.003, 5.0).with_time(at(30)),
        ];
        let segment = compute_segment(&points, &MetricsConfig::default()).unwrap();
        assert_eq!(segment.elapsed_time, vec![Some(0.0), None, Some(20.0), Some(30.0)]);
        assert_eq!(segment.velocity[1], None);
        assert_eq!(segment.velocity[2], None);
        assert!(segment.velocity[3].is_some());
        assert_eq!(segment.velocity_level[1], 0);
        assert_eq!(segment.summary.total_time_s, 30.0);
    }

    #[test]
    fn test_zero_time_delta_is_undefined() {
        let points = vec![
            TrackPoint::new(60.0, 5.0).with_time(at(0)),
            TrackPoint::new(60.001, 5.0).with_time(at(0)),
        ];
        let segment = compute_segment(&points, &MetricsConfig::default()).unwrap();
        assert_eq!(segment.velocity[1], None);
        assert_eq!(segment.pace[1], None);
    }

    #[test]
    fn test_empty_segment_has_no_data() {
        let segment = compute_segment(&[], &MetricsConfig::default()).unwrap();
        assert!(segment.is_empty());
        assert_eq!(segment.summary.total_distance_m, 0.0);
        assert_eq!(segment.summary.total_time_s, 0.0);
        assert_eq!(segment.summary.elevation_up_m, 0.0);
        assert_eq!(segment.summary.average_hr, None);
        assert_eq!(segment.summary.max_hr, None);
        assert_eq!(segment.summary.velocity, None);
    }

    #[test]
    fn test_heart_rate_aggregates() {
        let points = vec![
            TrackPoint::new(60.0, 5.0).with_time(at(0)).with_heart_rate(100),
            TrackPoint::new(60.001, 5.0).with_time(at(10)).with_heart_rate(140),
            TrackPoint::new(60.002, 5.0).with_time(at(30)).with_heart_rate(160),
        ];
        let segment = compute_segment(&points, &MetricsConfig::default()).unwrap();
        // (100+140)/2*10 + (140+160)/2*20 = 1200 + 3000 over 30 s
        assert!((segment.summary.average_hr.unwrap() - 140.0).abs() < 1e-9);
        assert_eq!(segment.summary.max_hr, Some(160.0));
        let stats = segment.summary.heart_rate.unwrap();
        assert_eq!(stats.min, 100.0);
        assert!((stats.mean - 400.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_untimed_heart_rate_uses_plain_mean() {
        let points = vec![
            TrackPoint::new(60.0, 5.0).with_heart_rate(100),
            TrackPoint::new(60.001, 5.0).with_heart_rate(150),
        ];
        let segment = compute_segment(&points, &MetricsConfig::default()).unwrap();
        assert_eq!(segment.summary.average_hr, Some(125.0));
        assert_eq!(segment.hr_zone, vec![Some(1), Some(4)]);
        assert!((segment.hr_fraction[1].unwrap() - 150.0 / 187.0).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_coordinate_rejected() {
        let points = vec![TrackPoint::new(60.0, 5.0), TrackPoint::new(f64::NAN, 5.0)];
        match compute_segment(&points, &MetricsConfig::default()) {
            Err(TrackError::Validation { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected validation error, got {:?}", other),
        }
        let points = vec![TrackPoint::new(91.0, 5.0)];
        assert!(compute_segment(&points, &MetricsConfig::default()).is_err());
        let points = vec![TrackPoint::new(0.0, 5.0).with_elevation(f64::INFINITY)];
        assert!(compute_segment(&points, &MetricsConfig::default()).is_err());
    }

    #[test]
    fn test_bad_config_rejected() {
        let config = MetricsConfig {
            heart_rate_zones: HeartRateZones::Absolute {
                bpm: vec![150.0, 140.0],
            },
            ..MetricsConfig::default()
        };
        assert!(matches!(
            compute_segment(&walk(3), &config),
            Err(TrackError::Configuration(_))
        ));
    }

    #[test]
    fn test_compute_is_idempotent() {
        let points = walk(30);
        let config = MetricsConfig::default();
        let a = compute_segment(&points, &config).unwrap();
        let b = compute_segment(&points, &config).unwrap();
        assert_eq!(a, b);
        let bits = |s: &Segment| s.distance.iter().map(|d| d.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn test_config_defaults_from_partial_json() {
        let config: MetricsConfig =
            serde_json::from_str(r#"{"velocity_levels":{"thresholds":[[1.0,1],[8.0,2]]}}"#)
                .unwrap();
        assert_eq!(config.heart_rate_zones, HeartRateZones::default());
        assert_eq!(config.velocity_levels.max_level(), 2);
    }
}
