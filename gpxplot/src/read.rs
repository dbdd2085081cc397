//! GPX and FIT readers producing raw (not yet computed) track points.

use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::track::TrackPoint;
use crate::TrackError;

/// A track as read from file: metadata plus one point list per segment.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RawTrack {
    pub name: Option<String>,
    pub kind: Option<String>,
    pub segments: Vec<Vec<TrackPoint>>,
}

impl RawTrack {
    pub fn point_count(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }
}

/// Parse GPX or FIT bytes using the provided format hint (extension).
pub fn parse_tracks(input: &[u8], format: &str) -> Result<Vec<RawTrack>, TrackError> {
    let format_lc = format.to_ascii_lowercase();
    if format_lc.ends_with(".gpx") || format_lc == "gpx" {
        read_gpx(input)
    } else if format_lc.ends_with(".fit") || format_lc == "fit" {
        read_fit(input)
    } else {
        Err(TrackError::UnsupportedFormat(format.to_string()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    Name,
    Kind,
    Elevation,
    Time,
    HeartRate,
    Cadence,
    Power,
}

/// `track_child` is set only for direct children of `<trk>`, so `<link><type>`
/// and similar nested elements are not taken as track metadata.
fn field_for(name: &[u8], track_child: bool, in_point: bool) -> Option<Field> {
    if in_point {
        match name {
            b"ele" => Some(Field::Elevation),
            b"time" => Some(Field::Time),
            b"hr" | b"heartrate" => Some(Field::HeartRate),
            b"cad" | b"cadence" => Some(Field::Cadence),
            b"power" | b"watts" | b"PowerInWatts" => Some(Field::Power),
            _ => None,
        }
    } else if track_child {
        match name {
            b"name" => Some(Field::Name),
            b"type" => Some(Field::Kind),
            _ => None,
        }
    } else {
        None
    }
}

fn gpx_err(err: impl std::fmt::Display) -> TrackError {
    TrackError::GpxParse(err.to_string())
}

fn parse_number(text: &str, what: &str) -> Result<f64, TrackError> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| TrackError::GpxParse(format!("invalid {} value '{}'", what, text)))
}

fn parse_count(text: &str, what: &str) -> Result<u16, TrackError> {
    let value = parse_number(text, what)?;
    if !value.is_finite() || value < 0.0 || value > u16::MAX as f64 {
        return Err(TrackError::GpxParse(format!(
            "{} value '{}' out of range",
            what, text
        )));
    }
    Ok(value.round() as u16)
}

/// RFC 3339, falling back to a zone-less timestamp read as UTC.
fn parse_time(text: &str) -> Result<DateTime<Utc>, TrackError> {
    let text = text.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Ok(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|t| t.and_utc())
        .map_err(|_| TrackError::GpxParse(format!("invalid time '{}'", text)))
}

fn start_point(e: &BytesStart) -> Result<TrackPoint, TrackError> {
    let mut lat = None;
    let mut lon = None;
    for attr in e.attributes() {
        let attr = attr.map_err(gpx_err)?;
        let value = attr.unescape_value().map_err(gpx_err)?;
        match attr.key.local_name().as_ref() {
            b"lat" => lat = Some(parse_number(&value, "lat")?),
            b"lon" => lon = Some(parse_number(&value, "lon")?),
            _ => {}
        }
    }
    match (lat, lon) {
        (Some(lat), Some(lon)) => Ok(TrackPoint::new(lat, lon)),
        _ => Err(TrackError::GpxParse("trkpt without lat/lon".into())),
    }
}

fn apply_text(
    field: Field,
    text: &str,
    track: &mut Option<RawTrack>,
    point: &mut Option<TrackPoint>,
) -> Result<(), TrackError> {
    match field {
        Field::Name => {
            if let Some(track) = track.as_mut() {
                track.name = Some(text.trim().to_string());
            }
        }
        Field::Kind => {
            if let Some(track) = track.as_mut() {
                track.kind = Some(text.trim().to_string());
            }
        }
        _ => {
            let Some(point) = point.as_mut() else {
                return Ok(());
            };
            match field {
                Field::Elevation => point.elevation = Some(parse_number(text, "ele")?),
                Field::Time => point.time = Some(parse_time(text)?),
                Field::HeartRate => point.heart_rate = Some(parse_count(text, "hr")?),
                Field::Cadence => point.cadence = Some(parse_count(text, "cad")?),
                Field::Power => point.power = Some(parse_count(text, "power")?),
                Field::Name | Field::Kind => {}
            }
        }
    }
    Ok(())
}

/// Read every `<trk>` of a GPX document.
///
/// Extension elements (`hr`, `cad`, `power`) are matched by local name so
/// any namespace prefix works.
pub fn read_gpx(input: &[u8]) -> Result<Vec<RawTrack>, TrackError> {
    let mut reader = Reader::from_reader(input);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut tracks = Vec::new();
    let mut track: Option<RawTrack> = None;
    let mut segment: Option<Vec<TrackPoint>> = None;
    let mut point: Option<TrackPoint> = None;
    let mut field: Option<Field> = None;
    // element nesting depth, and the depth of the open <trk>
    let mut depth = 0usize;
    let mut track_depth: Option<usize> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                depth += 1;
                match e.local_name().as_ref() {
                    b"trk" => {
                        track = Some(RawTrack::default());
                        track_depth = Some(depth);
                    }
                    b"trkseg" if track.is_some() => segment = Some(Vec::new()),
                    b"trkpt" if segment.is_some() => point = Some(start_point(&e)?),
                    name => {
                        let track_child = track_depth.map_or(false, |d| depth == d + 1);
                        field = field_for(name, track_child, point.is_some());
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"trkpt" {
                    if let Some(points) = segment.as_mut() {
                        points.push(start_point(&e)?);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(f) = field {
                    let text = t.unescape().map_err(gpx_err)?;
                    apply_text(f, &text, &mut track, &mut point)?;
                }
            }
            Ok(Event::CData(t)) => {
                if let Some(f) = field {
                    let text = String::from_utf8_lossy(&t).into_owned();
                    apply_text(f, &text, &mut track, &mut point)?;
                }
            }
            Ok(Event::End(e)) => {
                field = None;
                depth = depth.saturating_sub(1);
                match e.local_name().as_ref() {
                    b"trkpt" => {
                        if let (Some(p), Some(points)) = (point.take(), segment.as_mut()) {
                            points.push(p);
                        }
                    }
                    b"trkseg" => {
                        if let (Some(points), Some(trk)) = (segment.take(), track.as_mut()) {
                            trk.segments.push(points);
                        }
                    }
                    b"trk" => {
                        track_depth = None;
                        if let Some(trk) = track.take() {
                            tracks.push(trk);
                        }
                    }
                    _ => {}
                }
            }
            Ok(_) => {}
            Err(e) => return Err(gpx_err(e)),
        }
        buf.clear();
    }

    for trk in &tracks {
        let points = trk.segments.iter().flatten();
        let untimed = points.clone().filter(|p| p.time.is_none()).count();
        let no_ele = points.filter(|p| p.elevation.is_none()).count();
        debug!(
            "GPX track {:?}: {} segments, {} points ({} without time, {} without elevation)",
            trk.name,
            trk.segments.len(),
            trk.point_count(),
            untimed,
            no_ele
        );
    }
    Ok(tracks)
}

const SEMICIRCLE_TO_DEG: f64 = 180.0 / 2_147_483_648.0;

/// Read FIT `record` messages into a single-segment track. Records without
/// a position fix are skipped.
pub fn read_fit(input: &[u8]) -> Result<Vec<RawTrack>, TrackError> {
    use fitparser::de::from_bytes;
    use fitparser::profile::MesgNum;

    let records = from_bytes(input).map_err(|e| TrackError::FitParse(e.to_string()))?;
    let mut points = Vec::new();
    let mut sport: Option<String> = None;
    let mut skipped = 0usize;

    for record in records.into_iter() {
        match record.kind() {
            MesgNum::Sport | MesgNum::Session => {
                if sport.is_none() {
                    sport = record
                        .fields()
                        .iter()
                        .find(|f| f.name() == "sport")
                        .map(|f| f.value().to_string());
                }
            }
            MesgNum::Record => {
                let mut lat = None;
                let mut lon = None;
                let mut row = TrackPoint::new(0.0, 0.0);
                for field in record.fields() {
                    match field.name() {
                        "timestamp" => {
                            if let fitparser::Value::Timestamp(ts) = field.value() {
                                row.time = Some(ts.with_timezone(&Utc));
                            }
                        }
                        "position_lat" => {
                            lat = fit_value_to_f64(field.value()).map(|v| v * SEMICIRCLE_TO_DEG)
                        }
                        "position_long" => {
                            lon = fit_value_to_f64(field.value()).map(|v| v * SEMICIRCLE_TO_DEG)
                        }
                        "enhanced_altitude" => row.elevation = fit_value_to_f64(field.value()),
                        "altitude" => {
                            if row.elevation.is_none() {
                                row.elevation = fit_value_to_f64(field.value());
                            }
                        }
                        "heart_rate" => row.heart_rate = fit_value_to_u16(field.value()),
                        "cadence" => row.cadence = fit_value_to_u16(field.value()),
                        "power" => row.power = fit_value_to_u16(field.value()),
                        _ => {}
                    }
                }
                match (lat, lon) {
                    (Some(lat), Some(lon)) => {
                        row.latitude = lat;
                        row.longitude = lon;
                        points.push(row);
                    }
                    _ => skipped += 1,
                }
            }
            _ => {}
        }
    }

    debug!(
        "FIT records: {} points, {} without position fix",
        points.len(),
        skipped
    );
    Ok(vec![RawTrack {
        name: None,
        kind: sport,
        segments: vec![points],
    }])
}

fn fit_value_to_f64(value: &fitparser::Value) -> Option<f64> {
    match value {
        fitparser::Value::Float32(v) => Some(*v as f64),
        fitparser::Value::Float64(v) => Some(*v),
        fitparser::Value::SInt8(v) => Some(*v as f64),
        fitparser::Value::SInt16(v) => Some(*v as f64),
        fitparser::Value::SInt32(v) => Some(*v as f64),
        fitparser::Value::SInt64(v) => Some(*v as f64),
        fitparser::Value::UInt8(v) => Some(*v as f64),
        fitparser::Value::UInt16(v) => Some(*v as f64),
        fitparser::Value::UInt32(v) => Some(*v as f64),
        fitparser::Value::UInt64(v) => Some(*v as f64),
        fitparser::Value::UInt8z(v) => Some(*v as f64),
        fitparser::Value::UInt16z(v) => Some(*v as f64),
        fitparser::Value::UInt32z(v) => Some(*v as f64),
        fitparser::Value::Byte(v) => Some(*v as f64),
        fitparser::Value::Array(values) => values.iter().find_map(fit_value_to_f64),
        _ => None,
    }
}

fn fit_value_to_u16(value: &fitparser::Value) -> Option<u16> {
    fit_value_to_f64(value)
        .filter(|v| v.is_finite() && *v >= 0.0 && *v <= u16::MAX as f64)
        .map(|v| v.round() as u16)
}
