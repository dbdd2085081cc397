use std::panic;
use std::path::Path;

use anyhow::{anyhow, Result};
use gpxplot::banding::{band, value_range};
use gpxplot::{format_elapsed, ColorVariable, HeartRateZones, Palette, Rgb, Segment};
use plotters::prelude::*;
use plotters::style::{FontDesc, FontFamily, FontStyle};

/// Chart styling shared by every rendered figure.
#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub line_width: u32,
    pub background: RGBColor,
    pub line_color: RGBColor,
    pub palette: Palette,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            line_width: 2,
            background: RGBColor(245, 245, 245),
            line_color: RGBColor(0x26, 0x26, 0x26),
            palette: Palette::Viridis,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub enum ChartKind {
    Png,
    Svg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XAxis {
    Distance,
    ElapsedTime,
}

impl XAxis {
    fn label(&self) -> &'static str {
        match self {
            XAxis::Distance => "Distance / km",
            XAxis::ElapsedTime => "Elapsed time",
        }
    }
}

/// What a profile chart shows.
#[derive(Clone, Debug)]
pub struct ProfileSpec {
    pub title: String,
    pub x: XAxis,
    pub y: ColorVariable,
    pub color_by: Option<ColorVariable>,
    pub bands: usize,
    pub filled: bool,
    pub zones: HeartRateZones,
    /// Horizontal zone bands behind a heart-rate series.
    pub zone_bands: bool,
    /// Background shading by contiguous heart-rate zone regions.
    pub hr_regions: bool,
}

/// Run a renderer, turning errors and backend panics into a message the
/// caller can log.
pub fn render_chart_guard<F>(render: F) -> Result<(), String>
where
    F: FnOnce() -> Result<()>,
{
    panic::catch_unwind(panic::AssertUnwindSafe(render))
        .map_err(|_| "plotting backend panicked".to_string())?
        .map_err(|err| format!("plotting error: {}", err))
}

fn to_plotters(c: Rgb) -> RGBColor {
    RGBColor(c.0, c.1, c.2)
}

fn axis_font() -> FontDesc<'static> {
    FontDesc::new(FontFamily::SansSerif, 18.0, FontStyle::Normal)
}

fn caption_font() -> FontDesc<'static> {
    FontDesc::new(FontFamily::SansSerif, 26.0, FontStyle::Normal)
}

fn x_values(segment: &Segment, x: XAxis) -> Vec<Option<f64>> {
    match x {
        XAxis::Distance => segment.distance.iter().map(|d| Some(d / 1000.0)).collect(),
        XAxis::ElapsedTime => segment.elapsed_time.clone(),
    }
}

/// Per-point `(x, y)` pairs, `None` where either coordinate is undefined.
fn profile_points(segment: &Segment, x: XAxis, y: ColorVariable) -> Vec<Option<(f64, f64)>> {
    x_values(segment, x)
        .into_iter()
        .zip(segment.series(y))
        .map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some((x, y)),
            _ => None,
        })
        .collect()
}

/// `(lower, upper, zone index)` per heart-rate zone, clipped to `y_lo..y_hi`.
/// Zone 1 extends down to `y_lo` since readings below it are clamped into it.
fn zone_band_spans(limits: &[(f64, Option<f64>)], y_lo: f64, y_hi: f64) -> Vec<(f64, f64, usize)> {
    limits
        .iter()
        .enumerate()
        .filter_map(|(i, &(lo, hi))| {
            let lo = if i == 0 { y_lo } else { lo.max(y_lo) };
            let hi = hi.unwrap_or(y_hi).min(y_hi);
            (hi > lo).then_some((lo, hi, i))
        })
        .collect()
}

/// `(x_start, x_end, zone)` for each heart-rate region of the segment.
fn hr_region_spans(segment: &Segment, x: XAxis) -> Vec<(f64, f64, u8)> {
    let xs = x_values(segment, x);
    segment
        .hr_regions()
        .into_iter()
        .filter(|(_, _, zone)| *zone > 0)
        .filter_map(|(start, end, zone)| {
            let span = &xs[start..=end];
            let x0 = span.iter().flatten().copied().next()?;
            let x1 = span.iter().rev().flatten().copied().next()?;
            (x1 > x0).then_some((x0, x1, zone))
        })
        .collect()
}

fn padded(min: f64, max: f64) -> (f64, f64) {
    let span = max - min;
    if span <= 0.0 {
        (min - 1.0, max + 1.0)
    } else {
        (min - span * 0.05, max + span * 0.05)
    }
}

pub fn render_profile(
    segment: &Segment,
    spec: &ProfileSpec,
    style: &PlotStyle,
    path: &Path,
    kind: ChartKind,
) -> Result<()> {
    let size = (style.width, style.height);
    match kind {
        ChartKind::Png => {
            let root = BitMapBackend::new(path, size).into_drawing_area();
            draw_profile(root, segment, spec, style)
        }
        ChartKind::Svg => {
            let root = SVGBackend::new(path, size).into_drawing_area();
            draw_profile(root, segment, spec, style)
        }
    }
}

fn draw_profile<DB>(
    root: DrawingArea<DB, plotters::coord::Shift>,
    segment: &Segment,
    spec: &ProfileSpec,
    style: &PlotStyle,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let points = profile_points(segment, spec.x, spec.y);
    let xs: Vec<Option<f64>> = points.iter().map(|p| p.map(|p| p.0)).collect();
    let ys: Vec<Option<f64>> = points.iter().map(|p| p.map(|p| p.1)).collect();
    let (x_min, x_max) = value_range(&xs)
        .ok_or_else(|| anyhow!("no plottable values for {}", spec.y.label()))?;
    let (y_min, y_max) = value_range(&ys)
        .ok_or_else(|| anyhow!("no plottable values for {}", spec.y.label()))?;
    let (y_lo, y_hi) = padded(y_min, y_max);
    let x_hi = if x_max > x_min { x_max } else { x_min + 1.0 };

    let area = root;
    area.fill(&style.background)?;
    let mut chart = ChartBuilder::on(&area)
        .caption(&spec.title, caption_font())
        .margin(25)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 45)
        .build_cartesian_2d(x_min..x_hi, y_lo..y_hi)?;

    let x_axis = spec.x;
    let x_fmt = move |v: &f64| match x_axis {
        XAxis::ElapsedTime => format_elapsed(*v),
        XAxis::Distance => format!("{:.1}", v),
    };
    chart
        .configure_mesh()
        .x_desc(spec.x.label())
        .y_desc(spec.y.label())
        .x_label_formatter(&x_fmt)
        .y_label_formatter(&|v| format!("{:.0}", v))
        .label_style(axis_font())
        .draw()?;

    let zone_count = spec.zones.zone_count();
    if spec.hr_regions {
        chart.draw_series(hr_region_spans(segment, spec.x).into_iter().map(
            |(x0, x1, zone)| {
                let color = to_plotters(Palette::Zones.band_color(zone as usize - 1, zone_count));
                Rectangle::new([(x0, y_lo), (x1, y_hi)], color.mix(0.35).filled())
            },
        ))?;
    }
    if spec.zone_bands && spec.y == ColorVariable::HeartRate {
        let limits = spec.zones.limits();
        chart.draw_series(zone_band_spans(&limits, y_lo, y_hi).into_iter().map(
            |(lo, hi, zone)| {
                let color = to_plotters(Palette::Zones.band_color(zone, zone_count));
                Rectangle::new([(x_min, lo), (x_hi, hi)], color.mix(0.25).filled())
            },
        ))?;
    }

    let defined = |range: std::ops::RangeInclusive<usize>| -> Vec<(f64, f64)> {
        points[range].iter().flatten().copied().collect()
    };

    match spec.color_by {
        None => {
            let line = ShapeStyle {
                color: style.line_color.to_rgba(),
                filled: false,
                stroke_width: style.line_width,
            };
            let series = defined(0..=points.len() - 1);
            if spec.filled {
                chart.draw_series(
                    AreaSeries::new(series, y_lo, style.line_color.mix(0.3)).border_style(line),
                )?;
            } else {
                chart.draw_series(LineSeries::new(series, line))?;
            }
        }
        Some(var) => {
            let values = segment.series(var);
            let runs = band(&values, spec.bands)?;
            let range = value_range(&values);
            let mut labelled = vec![false; spec.bands];
            for run in runs {
                let color = to_plotters(style.palette.band_color(run.band, spec.bands));
                let line = ShapeStyle {
                    color: color.to_rgba(),
                    filled: false,
                    stroke_width: style.line_width,
                };
                let series = defined(run.indices());
                let drawn = if spec.filled {
                    chart.draw_series(
                        AreaSeries::new(series, y_lo, color.mix(0.8)).border_style(line),
                    )?
                } else {
                    chart.draw_series(LineSeries::new(series, line))?
                };
                if !labelled[run.band] {
                    labelled[run.band] = true;
                    drawn
                        .label(band_label(var, range, run.band, spec.bands))
                        .legend(move |(x, y)| {
                            PathElement::new(vec![(x, y), (x + 30, y)], color.stroke_width(3))
                        });
                }
            }
            chart
                .configure_series_labels()
                .background_style(&WHITE.mix(0.7))
                .border_style(&BLACK.mix(0.3))
                .label_font(axis_font().color(&BLACK))
                .position(SeriesLabelPosition::UpperRight)
                .draw()?;
        }
    }

    area.present()?;
    Ok(())
}

fn band_label(var: ColorVariable, range: Option<(f64, f64)>, band: usize, bands: usize) -> String {
    let Some((min, max)) = range else {
        return var.label().to_string();
    };
    let width = (max - min) / bands as f64;
    let lo = min + width * band as f64;
    format!("{:.1} to {:.1}", lo, lo + width)
}

pub fn render_zones(
    segment: &Segment,
    zones: &HeartRateZones,
    title: &str,
    style: &PlotStyle,
    path: &Path,
    kind: ChartKind,
) -> Result<()> {
    let size = (style.width, style.height);
    match kind {
        ChartKind::Png => {
            let root = BitMapBackend::new(path, size).into_drawing_area();
            draw_zones(root, segment, zones, title, style)
        }
        ChartKind::Svg => {
            let root = SVGBackend::new(path, size).into_drawing_area();
            draw_zones(root, segment, zones, title, style)
        }
    }
}

/// Fraction of timed heart-rate samples spent in each zone `1..=n`.
pub fn zone_fractions(segment: &Segment, zone_count: usize) -> Option<Vec<f64>> {
    let seconds = segment.time_in_zones();
    let total: f64 = seconds.values().sum();
    if total <= 0.0 {
        return None;
    }
    Some(
        (1..=zone_count)
            .map(|z| seconds.get(&(z as u8)).copied().unwrap_or(0.0) / total)
            .collect(),
    )
}

fn draw_zones<DB>(
    root: DrawingArea<DB, plotters::coord::Shift>,
    segment: &Segment,
    zones: &HeartRateZones,
    title: &str,
    style: &PlotStyle,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let n = zones.zone_count();
    let fractions =
        zone_fractions(segment, n).ok_or_else(|| anyhow!("no timed heart-rate samples"))?;
    let limits = zones.limits();
    let y_max = fractions.iter().copied().fold(0.0, f64::max).max(0.05) * 1.15;

    let caption = match segment.summary.average_hr {
        Some(avg) => format!("{} (average heart rate {:.0} bpm)", title, avg),
        None => title.to_string(),
    };

    let area = root;
    area.fill(&style.background)?;
    let mut chart = ChartBuilder::on(&area)
        .caption(caption, caption_font())
        .margin(25)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 45)
        .build_cartesian_2d(0.5..(n as f64 + 0.5), 0.0..y_max)?;

    let zone_label = |v: &f64| -> String {
        let z = v.round();
        if (v - z).abs() > 1e-6 || z < 1.0 || z as usize > n {
            return String::new();
        }
        match limits.get(z as usize - 1) {
            Some((lo, Some(hi))) => format!("Z{} ({:.0}-{:.0})", z, lo, hi),
            Some((lo, None)) => format!("Z{} (>{:.0})", z, lo),
            None => format!("Z{}", z),
        }
    };
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_desc("Heart rate zone (bpm)")
        .y_desc("Fraction of time / %")
        .x_label_formatter(&zone_label)
        .y_label_formatter(&|v| format!("{:.0}", v * 100.0))
        .label_style(axis_font())
        .draw()?;

    chart.draw_series(fractions.iter().enumerate().map(|(i, &frac)| {
        let z = (i + 1) as f64;
        let color = to_plotters(Palette::Zones.band_color(i, n));
        Rectangle::new([(z - 0.4, 0.0), (z + 0.4, frac)], color.filled())
    }))?;
    chart.draw_series(fractions.iter().enumerate().map(|(i, &frac)| {
        Text::new(
            format!("{:.0} %", frac * 100.0),
            ((i + 1) as f64 - 0.1, frac + y_max * 0.03),
            axis_font(),
        )
    }))?;

    area.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use gpxplot::{compute_segment, MetricsConfig, TrackPoint};

    fn segment() -> Segment {
        let t0 = Utc.timestamp_opt(1_600_000_000, 0).unwrap();
        let points: Vec<TrackPoint> = [(0, 100u16), (60, 100), (90, 180), (120, 180)]
            .iter()
            .enumerate()
            .map(|(i, &(secs, hr))| {
                TrackPoint::new(60.0 + 0.001 * i as f64, 10.0)
                    .with_elevation(10.0 * i as f64)
                    .with_time(t0 + chrono::Duration::seconds(secs))
                    .with_heart_rate(hr)
            })
            .collect();
        compute_segment(&points, &MetricsConfig::default()).unwrap()
    }

    #[test]
    fn test_zone_fractions() {
        let fractions = zone_fractions(&segment(), 5).unwrap();
        assert_eq!(fractions.len(), 5);
        assert!((fractions[0] - 0.75).abs() < 1e-9);
        assert!((fractions[4] - 0.25).abs() < 1e-9);
        assert!((fractions.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_profile_points_skip_undefined() {
        let seg = segment();
        let pts = profile_points(&seg, XAxis::ElapsedTime, ColorVariable::Velocity);
        assert_eq!(pts.len(), 4);
        assert!(pts[0].is_none());
        assert_eq!(pts[1].unwrap().0, 60.0);
        let pts = profile_points(&seg, XAxis::Distance, ColorVariable::Elevation);
        assert_eq!(pts[0], Some((0.0, 0.0)));
    }

    #[test]
    fn test_zone_band_spans_clip_to_axis() {
        let limits = HeartRateZones::default().limits();
        let spans = zone_band_spans(&limits, 100.0, 160.0);
        assert_eq!(spans.len(), 4);
        assert_eq!(spans[0].0, 100.0);
        assert!((spans[0].1 - 0.6 * 187.0).abs() < 1e-9);
        assert_eq!(spans[3].1, 160.0);
        assert_eq!(spans.iter().map(|s| s.2).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_hr_region_spans_follow_zones() {
        let spans = hr_region_spans(&segment(), XAxis::ElapsedTime);
        assert_eq!(spans, vec![(0.0, 90.0, 1), (90.0, 120.0, 5)]);

        let points: Vec<TrackPoint> = (0..3)
            .map(|i| TrackPoint::new(60.0 + 0.001 * i as f64, 10.0))
            .collect();
        let untimed = compute_segment(&points, &MetricsConfig::default()).unwrap();
        assert!(hr_region_spans(&untimed, XAxis::Distance).is_empty());
    }

    #[test]
    fn test_band_label() {
        let label = band_label(ColorVariable::Elevation, Some((0.0, 100.0)), 1, 4);
        assert_eq!(label, "25.0 to 50.0");
        assert_eq!(
            band_label(ColorVariable::Power, None, 0, 4),
            ColorVariable::Power.label()
        );
    }

    #[test]
    fn test_guard_reports_errors_and_panics() {
        let err = render_chart_guard(|| Err(anyhow!("boom"))).unwrap_err();
        assert!(err.contains("boom"));
        let err = render_chart_guard(|| panic!("backend")).unwrap_err();
        assert_eq!(err, "plotting backend panicked");
    }
}
