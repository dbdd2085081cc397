use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::banding::runs;
use crate::metrics::SegmentSummary;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
    pub time: Option<DateTime<Utc>>,
    pub heart_rate: Option<u16>,
    pub cadence: Option<u16>,
    pub power: Option<u16>,
}

impl TrackPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation: None,
            time: None,
            heart_rate: None,
            cadence: None,
            power: None,
        }
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_heart_rate(mut self, bpm: u16) -> Self {
        self.heart_rate = Some(bpm);
        self
    }
}

/// One recorded stretch of a track with its derived per-point series.
///
/// Every per-point vector has exactly `points.len()` entries.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub points: Vec<TrackPoint>,
    /// Cumulative distance in metres.
    pub distance: Array1<f64>,
    /// Seconds since the first timestamp of the segment.
    pub elapsed_time: Vec<Option<f64>>,
    /// km/h, undefined for the first point and for untimed intervals.
    pub velocity: Vec<Option<f64>>,
    /// min/km
    pub pace: Vec<Option<f64>>,
    pub velocity_level: Vec<u8>,
    pub hr_zone: Vec<Option<u8>>,
    pub hr_zone_float: Vec<Option<f64>>,
    pub hr_fraction: Vec<Option<f64>>,
    /// Running sum of climbs in metres.
    pub elevation_gain: Vec<f64>,
    /// Running sum of descents in metres (positive).
    pub elevation_drop: Vec<f64>,
    pub summary: SegmentSummary,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Per-point values of `var`, aligned with `points`.
    pub fn series(&self, var: ColorVariable) -> Vec<Option<f64>> {
        match var {
            ColorVariable::Elevation => self.points.iter().map(|p| p.elevation).collect(),
            ColorVariable::HeartRate => self
                .points
                .iter()
                .map(|p| p.heart_rate.map(f64::from))
                .collect(),
            ColorVariable::Cadence => self
                .points
                .iter()
                .map(|p| p.cadence.map(f64::from))
                .collect(),
            ColorVariable::Power => self.points.iter().map(|p| p.power.map(f64::from)).collect(),
            ColorVariable::HrZone => self.hr_zone.iter().map(|z| z.map(f64::from)).collect(),
            ColorVariable::HrZoneFloat => self.hr_zone_float.clone(),
            ColorVariable::Velocity => self.velocity.clone(),
            ColorVariable::VelocityLevel => self
                .velocity_level
                .iter()
                .map(|&l| Some(f64::from(l)))
                .collect(),
            ColorVariable::Pace => self.pace.clone(),
            ColorVariable::Distance => self.distance.iter().map(|&d| Some(d)).collect(),
            ColorVariable::ElapsedTime => self.elapsed_time.clone(),
        }
    }

    /// Contiguous heart-rate zone regions as `(start, end, zone)`.
    ///
    /// Points without heart rate inherit the previous zone so regions stay
    /// contiguous.
    pub fn hr_regions(&self) -> Vec<(usize, usize, u8)> {
        let mut last: Option<u8> = self.hr_zone.iter().flatten().next().copied();
        let ids: Vec<usize> = self
            .hr_zone
            .iter()
            .map(|z| {
                if z.is_some() {
                    last = *z;
                }
                last.unwrap_or(0) as usize
            })
            .collect();
        runs(&ids)
            .into_iter()
            .map(|r| (r.start, r.end, r.band as u8))
            .collect()
    }

    /// Seconds spent in each heart-rate zone.
    ///
    /// The interval between two consecutive timed points counts towards the
    /// zone of the earlier point.
    pub fn time_in_zones(&self) -> BTreeMap<u8, f64> {
        let mut out = BTreeMap::new();
        for i in 1..self.len() {
            let (Some(t0), Some(t1)) = (self.elapsed_time[i - 1], self.elapsed_time[i]) else {
                continue;
            };
            let Some(zone) = self.hr_zone[i - 1] else {
                continue;
            };
            let dt = t1 - t0;
            if dt > 0.0 {
                *out.entry(zone).or_insert(0.0) += dt;
            }
        }
        out
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Track {
    pub name: Option<String>,
    /// Activity type as recorded in the file (`<type>`).
    pub kind: Option<String>,
    pub segments: Vec<Segment>,
}

impl Track {
    /// `name: type` heading used for chart captions.
    pub fn title(&self) -> String {
        match (self.name.as_deref(), self.kind.as_deref()) {
            (Some(name), Some(kind)) => format!("{}: {}", name, kind),
            (Some(name), None) => name.to_string(),
            (None, Some(kind)) => kind.to_string(),
            (None, None) => "Track".to_string(),
        }
    }
}

/// Per-point quantity a chart axis or a color scale can be bound to.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ColorVariable {
    Elevation,
    HeartRate,
    HrZone,
    HrZoneFloat,
    Velocity,
    VelocityLevel,
    Pace,
    Cadence,
    Power,
    Distance,
    ElapsedTime,
}

impl ColorVariable {
    pub fn label(&self) -> &'static str {
        match self {
            ColorVariable::Elevation => "Elevation / m",
            ColorVariable::HeartRate => "Heart rate / bpm",
            ColorVariable::HrZone => "Heart rate zone",
            ColorVariable::HrZoneFloat => "Heart rate zone",
            ColorVariable::Velocity => "Velocity / km/h",
            ColorVariable::VelocityLevel => "Velocity level",
            ColorVariable::Pace => "Pace / min/km",
            ColorVariable::Cadence => "Cadence / rpm",
            ColorVariable::Power => "Power / W",
            ColorVariable::Distance => "Distance / m",
            ColorVariable::ElapsedTime => "Time",
        }
    }
}
