//! Map overlays: colored polylines plus start/end markers, exported as
//! GeoJSON for any web map.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::banding::band;
use crate::color::{Palette, Rgb};
use crate::track::{ColorVariable, Segment};
use crate::TrackError;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OverlayOptions {
    pub color_by: Option<ColorVariable>,
    pub num_bands: usize,
    pub palette: Palette,
    /// Line color when `color_by` is unset.
    pub line_color: Rgb,
    pub line_weight: f64,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            color_by: None,
            num_bands: 8,
            palette: Palette::Viridis,
            line_color: Rgb(0x37, 0x7e, 0xb8),
            line_weight: 4.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OverlayLine {
    /// `(lat, lon)` pairs.
    pub coordinates: Vec<(f64, f64)>,
    pub band: Option<usize>,
    pub color: Rgb,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Marker {
    pub location: (f64, f64),
    pub tooltip: String,
    pub color: Rgb,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MapOverlay {
    pub lines: Vec<OverlayLine>,
    pub line_weight: f64,
    pub start: Marker,
    pub end: Marker,
    pub center: (f64, f64),
    /// `[(south, west), (north, east)]`
    pub bounds: [(f64, f64); 2],
    pub zoom: u8,
}

impl MapOverlay {
    pub fn from_segment(segment: &Segment, opts: &OverlayOptions) -> Result<Self, TrackError> {
        let latlon: Vec<(f64, f64)> = segment
            .points
            .iter()
            .map(|p| (p.latitude, p.longitude))
            .collect();
        let (Some(&first), Some(&last)) = (latlon.first(), latlon.last()) else {
            return Err(TrackError::InsufficientData);
        };

        let lines = match opts.color_by {
            None => vec![OverlayLine {
                coordinates: latlon.clone(),
                band: None,
                color: opts.line_color,
            }],
            Some(var) => band(&segment.series(var), opts.num_bands)?
                .into_iter()
                .map(|run| OverlayLine {
                    coordinates: latlon[run.start..=run.end].to_vec(),
                    band: Some(run.band),
                    color: opts.palette.band_color(run.band, opts.num_bands),
                })
                .collect(),
        };

        let n = latlon.len() as f64;
        let center = (
            latlon.iter().map(|p| p.0).sum::<f64>() / n,
            latlon.iter().map(|p| p.1).sum::<f64>() / n,
        );
        let mut south_west = (f64::INFINITY, f64::INFINITY);
        let mut north_east = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for &(lat, lon) in &latlon {
            south_west = (south_west.0.min(lat), south_west.1.min(lon));
            north_east = (north_east.0.max(lat), north_east.1.max(lon));
        }
        let bounds = [south_west, north_east];

        Ok(MapOverlay {
            lines,
            line_weight: opts.line_weight,
            start: Marker {
                location: first,
                tooltip: "Start".into(),
                color: Rgb(0x4d, 0xaf, 0x4a),
            },
            end: Marker {
                location: last,
                tooltip: "End".into(),
                color: Rgb(0xd3, 0xd3, 0xd3),
            },
            center,
            bounds,
            zoom: 15,
        })
    }

    /// GeoJSON FeatureCollection with simplestyle properties.
    pub fn to_geojson(&self) -> JsonValue {
        let mut features: Vec<JsonValue> = self
            .lines
            .iter()
            .map(|line| {
                let coords: Vec<[f64; 2]> =
                    line.coordinates.iter().map(|(lat, lon)| [*lon, *lat]).collect();
                json!({
                    "type": "Feature",
                    "geometry": { "type": "LineString", "coordinates": coords },
                    "properties": {
                        "stroke": line.color.to_hex(),
                        "stroke-width": self.line_weight,
                        "band": line.band,
                    },
                })
            })
            .collect();
        for marker in [&self.start, &self.end] {
            let (lat, lon) = marker.location;
            features.push(json!({
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [lon, lat] },
                "properties": {
                    "title": marker.tooltip,
                    "marker-color": marker.color.to_hex(),
                },
            }));
        }
        let [(south, west), (north, east)] = self.bounds;
        json!({
            "type": "FeatureCollection",
            "bbox": [west, south, east, north],
            "properties": {
                "center": [self.center.1, self.center.0],
                "zoom": self.zoom,
            },
            "features": features,
        })
    }
}

/// Merge several overlays into one FeatureCollection whose `bbox` spans all
/// of them. The center is the middle of that box and the zoom the widest
/// (smallest) of the inputs.
pub fn merge_geojson(overlays: &[MapOverlay]) -> JsonValue {
    let features: Vec<JsonValue> = overlays
        .iter()
        .flat_map(|o| {
            o.to_geojson()["features"]
                .as_array()
                .cloned()
                .unwrap_or_default()
        })
        .collect();
    if overlays.is_empty() {
        return json!({ "type": "FeatureCollection", "features": features });
    }

    let mut south_west = (f64::INFINITY, f64::INFINITY);
    let mut north_east = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for [(south, west), (north, east)] in overlays.iter().map(|o| o.bounds) {
        south_west = (south_west.0.min(south), south_west.1.min(west));
        north_east = (north_east.0.max(north), north_east.1.max(east));
    }
    let center = (
        (south_west.0 + north_east.0) / 2.0,
        (south_west.1 + north_east.1) / 2.0,
    );
    let zoom = overlays.iter().map(|o| o.zoom).min().unwrap_or(15);
    json!({
        "type": "FeatureCollection",
        "bbox": [south_west.1, south_west.0, north_east.1, north_east.0],
        "properties": {
            "center": [center.1, center.0],
            "zoom": zoom,
        },
        "features": features,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{compute_segment, MetricsConfig};
    use crate::track::TrackPoint;

    fn segment() -> Segment {
        let points: Vec<TrackPoint> = (0..10)
            .map(|i| {
                TrackPoint::new(63.0 + 0.001 * i as f64, 10.0 + 0.002 * i as f64)
                    .with_elevation(100.0 + i as f64)
            })
            .collect();
        compute_segment(&points, &MetricsConfig::default()).unwrap()
    }

    #[test]
    fn test_plain_line() {
        let overlay = MapOverlay::from_segment(&segment(), &OverlayOptions::default()).unwrap();
        assert_eq!(overlay.lines.len(), 1);
        assert_eq!(overlay.lines[0].coordinates.len(), 10);
        assert_eq!(overlay.start.location, (63.0, 10.0));
        assert!((overlay.center.0 - 63.0045).abs() < 1e-9);
        assert_eq!(overlay.bounds[0], (63.0, 10.0));
    }

    #[test]
    fn test_banded_lines_share_endpoints() {
        let opts = OverlayOptions {
            color_by: Some(ColorVariable::Elevation),
            num_bands: 2,
            ..OverlayOptions::default()
        };
        let overlay = MapOverlay::from_segment(&segment(), &opts).unwrap();
        assert_eq!(overlay.lines.len(), 2);
        assert_eq!(
            overlay.lines[0].coordinates.last(),
            overlay.lines[1].coordinates.first()
        );
        assert_ne!(overlay.lines[0].color, overlay.lines[1].color);
    }

    #[test]
    fn test_empty_segment() {
        let empty = compute_segment(&[], &MetricsConfig::default()).unwrap();
        assert!(matches!(
            MapOverlay::from_segment(&empty, &OverlayOptions::default()),
            Err(TrackError::InsufficientData)
        ));
    }

    #[test]
    fn test_geojson_lon_lat_order() {
        let overlay = MapOverlay::from_segment(&segment(), &OverlayOptions::default()).unwrap();
        let geo = overlay.to_geojson();
        assert_eq!(geo["type"], "FeatureCollection");
        let features = geo["features"].as_array().unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(features[0]["geometry"]["coordinates"][0][0], 10.0);
        assert_eq!(features[0]["geometry"]["coordinates"][0][1], 63.0);
        assert_eq!(features[1]["properties"]["title"], "Start");
        let merged = merge_geojson(&[overlay.clone(), overlay]);
        assert_eq!(merged["features"].as_array().unwrap().len(), 6);
    }

    #[test]
    fn test_merged_bbox_spans_all_overlays() {
        let first = MapOverlay::from_segment(&segment(), &OverlayOptions::default()).unwrap();
        let points: Vec<TrackPoint> = (0..5)
            .map(|i| TrackPoint::new(62.0 + 0.001 * i as f64, 11.0 + 0.001 * i as f64))
            .collect();
        let second_segment = compute_segment(&points, &MetricsConfig::default()).unwrap();
        let second = MapOverlay::from_segment(&second_segment, &OverlayOptions::default()).unwrap();

        let merged = merge_geojson(&[first, second]);
        let bbox: Vec<f64> = merged["bbox"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_f64().unwrap())
            .collect();
        // [west, south, east, north]
        assert!((bbox[0] - 10.0).abs() < 1e-9);
        assert!((bbox[1] - 62.0).abs() < 1e-9);
        assert!((bbox[2] - 11.004).abs() < 1e-9);
        assert!((bbox[3] - 63.009).abs() < 1e-9);
        let center = merged["properties"]["center"].as_array().unwrap();
        assert!((center[0].as_f64().unwrap() - 10.502).abs() < 1e-9);
        assert!((center[1].as_f64().unwrap() - 62.5045).abs() < 1e-9);
        assert_eq!(merged["properties"]["zoom"], 15);
        assert!(merge_geojson(&[])["features"].as_array().unwrap().is_empty());
    }
}
