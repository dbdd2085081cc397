//! Track metrics, heart-rate zones and color banding for GPX/FIT activities.

use thiserror::Error;

pub mod banding;
pub mod color;
pub mod metrics;
pub mod overlay;
pub mod read;
pub mod track;
pub mod zones;

pub use banding::{assign_bands, band, runs, Run};
pub use color::{Palette, Rgb};
pub use metrics::{compute_segment, MetricsConfig, SegmentSummary, Stats};
pub use overlay::{MapOverlay, Marker, OverlayLine, OverlayOptions};
pub use read::{parse_tracks, read_fit, read_gpx, RawTrack};
pub use track::{ColorVariable, Segment, Track, TrackPoint};
pub use zones::{HeartRateZones, VelocityLevels, ZoneTable};

#[derive(Error, Debug)]
pub enum TrackError {
    #[error("invalid track point {index}: {reason}")]
    Validation { index: usize, reason: String },
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to parse GPX file: {0}")]
    GpxParse(String),
    #[error("failed to parse FIT file: {0}")]
    FitParse(String),
    #[error("insufficient data")]
    InsufficientData,
}

/// Mean Earth radius used for all great-circle distances.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in metres between two lat/lon pairs (degrees).
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let to_rad = |deg: f64| deg.to_radians();
    let dlat = to_rad(lat2 - lat1);
    let dlon = to_rad(lon2 - lon1);
    let a = (dlat / 2.0).sin().powi(2)
        + to_rad(lat1).cos() * to_rad(lat2).cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Run the metrics computation over every segment of a raw track.
pub fn build_track(raw: RawTrack, config: &MetricsConfig) -> Result<Track, TrackError> {
    let mut segments = Vec::with_capacity(raw.segments.len());
    for points in &raw.segments {
        segments.push(compute_segment(points, config)?);
    }
    Ok(Track {
        name: raw.name,
        kind: raw.kind,
        segments,
    })
}

/// Read and compute every track in a GPX/FIT payload.
pub fn load_tracks(
    input: &[u8],
    format: &str,
    config: &MetricsConfig,
) -> Result<Vec<Track>, TrackError> {
    parse_tracks(input, format)?
        .into_iter()
        .map(|raw| build_track(raw, config))
        .collect()
}

/// Format elapsed seconds as `hh:mm:ss` (negative values clamp to zero).
pub fn format_elapsed(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}
