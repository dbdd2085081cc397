use std::collections::BTreeMap;
use std::fs;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::SecondsFormat;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use gpxplot::overlay::merge_geojson;
use gpxplot::{
    format_elapsed, load_tracks, ColorVariable, HeartRateZones, MapOverlay, MetricsConfig,
    OverlayOptions, Palette, Segment, SegmentSummary, Track,
};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod plot;

use plot::{ChartKind, PlotStyle, ProfileSpec, XAxis};

#[derive(Parser, Debug)]
#[command(author, version, about = "GPX/FIT track metrics, charts and map overlays", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Per-point metrics table (CSV) or per-segment summaries (JSON)
    Summary(SummaryArgs),
    /// Profile chart of one variable, optionally colored by another
    Plot(PlotArgs),
    /// Bar chart of time spent in each heart-rate zone
    Zones(ZonesArgs),
    /// GeoJSON map overlay of each segment
    Map(MapArgs),
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// GPX/FIT files to ingest
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    inputs: Vec<PathBuf>,

    /// Metrics configuration JSON (heart-rate zones, velocity levels)
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Maximum heart rate for percent-of-max zones
    #[arg(long)]
    max_heart_rate: Option<f64>,

    /// Color palette for banded output
    #[arg(long, value_enum, default_value_t = PaletteOpt::Viridis)]
    palette: PaletteOpt,

    /// Verbose logging
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct SummaryArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Output path (`-` for stdout)
    #[arg(short, long, default_value = "-", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Write per-segment JSON summaries instead of the per-point CSV
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Parser, Debug)]
struct PlotArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Horizontal axis
    #[arg(long, value_enum, default_value_t = XAxisOpt::Distance)]
    x: XAxisOpt,

    /// Plotted variable
    #[arg(long, value_enum, default_value_t = VariableOpt::Elevation)]
    y: VariableOpt,

    /// Color the profile by this variable's bands
    #[arg(long, value_enum)]
    color_by: Option<VariableOpt>,

    /// Number of color bands
    #[arg(long, default_value_t = 8)]
    bands: usize,

    /// Fill the area under the profile
    #[arg(long, action = ArgAction::SetTrue)]
    filled: bool,

    /// Shade heart-rate zone bands behind a `--y heart-rate` profile
    #[arg(long, action = ArgAction::SetTrue)]
    zone_bands: bool,

    /// Shade the background by contiguous heart-rate zone regions
    #[arg(long, action = ArgAction::SetTrue)]
    hr_regions: bool,

    /// Output PNG figure path (default `profile.png` when no SVG is given)
    #[arg(long, value_hint = ValueHint::FilePath)]
    png: Option<PathBuf>,

    /// Output SVG figure path
    #[arg(long, value_hint = ValueHint::FilePath)]
    svg: Option<PathBuf>,

    /// Figure width in pixels
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Figure height in pixels
    #[arg(long, default_value_t = 720)]
    height: u32,
}

#[derive(Parser, Debug)]
struct ZonesArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Output PNG figure path (default `zones.png` when no SVG is given)
    #[arg(long, value_hint = ValueHint::FilePath)]
    png: Option<PathBuf>,

    /// Output SVG figure path
    #[arg(long, value_hint = ValueHint::FilePath)]
    svg: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct MapArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Output GeoJSON path (`-` for stdout)
    #[arg(short, long, default_value = "track.geojson", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Color the line by this variable's bands
    #[arg(long, value_enum)]
    color_by: Option<VariableOpt>,

    /// Number of color bands
    #[arg(long, default_value_t = 8)]
    bands: usize,

    /// Line width
    #[arg(long, default_value_t = 4.0)]
    line_weight: f64,

    /// Write all segments into one FeatureCollection
    #[arg(long, action = ArgAction::SetTrue)]
    merged: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum PaletteOpt {
    Viridis,
    Reds,
    RdPu,
    Zones,
}

impl From<PaletteOpt> for Palette {
    fn from(value: PaletteOpt) -> Self {
        match value {
            PaletteOpt::Viridis => Palette::Viridis,
            PaletteOpt::Reds => Palette::Reds,
            PaletteOpt::RdPu => Palette::RdPu,
            PaletteOpt::Zones => Palette::Zones,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum XAxisOpt {
    Distance,
    ElapsedTime,
}

impl From<XAxisOpt> for XAxis {
    fn from(value: XAxisOpt) -> Self {
        match value {
            XAxisOpt::Distance => XAxis::Distance,
            XAxisOpt::ElapsedTime => XAxis::ElapsedTime,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum VariableOpt {
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

impl From<VariableOpt> for ColorVariable {
    fn from(value: VariableOpt) -> Self {
        match value {
            VariableOpt::Elevation => ColorVariable::Elevation,
            VariableOpt::HeartRate => ColorVariable::HeartRate,
            VariableOpt::HrZone => ColorVariable::HrZone,
            VariableOpt::HrZoneFloat => ColorVariable::HrZoneFloat,
            VariableOpt::Velocity => ColorVariable::Velocity,
            VariableOpt::VelocityLevel => ColorVariable::VelocityLevel,
            VariableOpt::Pace => ColorVariable::Pace,
            VariableOpt::Cadence => ColorVariable::Cadence,
            VariableOpt::Power => ColorVariable::Power,
            VariableOpt::Distance => ColorVariable::Distance,
            VariableOpt::ElapsedTime => ColorVariable::ElapsedTime,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Command::Summary(args) => args.common.verbose,
        Command::Plot(args) => args.common.verbose,
        Command::Zones(args) => args.common.verbose,
        Command::Map(args) => args.common.verbose,
    };
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Summary(args) => handle_summary(args),
        Command::Plot(args) => handle_plot(args),
        Command::Zones(args) => handle_zones(args),
        Command::Map(args) => handle_map(args),
    }
}

/// One computed segment together with its position in the input set.
struct SegmentRef<'a> {
    source: &'a Path,
    track_id: usize,
    segment_id: usize,
    title: String,
    segment: &'a Segment,
}

struct Loaded {
    tracks: Vec<(PathBuf, Track)>,
    config: MetricsConfig,
}

impl Loaded {
    fn segments(&self) -> Vec<SegmentRef<'_>> {
        self.tracks
            .iter()
            .enumerate()
            .flat_map(|(track_id, (source, track))| {
                let title = track.title();
                track
                    .segments
                    .iter()
                    .enumerate()
                    .map(move |(segment_id, segment)| SegmentRef {
                        source: source.as_path(),
                        track_id,
                        segment_id,
                        title: title.clone(),
                        segment,
                    })
            })
            .collect()
    }
}

fn load_config(common: &CommonArgs) -> Result<MetricsConfig> {
    let mut config = match common.config.as_ref() {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str::<MetricsConfig>(&text)
                .with_context(|| format!("{} is not a valid metrics config", path.display()))?
        }
        None => MetricsConfig::default(),
    };
    if let Some(max) = common.max_heart_rate {
        match &mut config.heart_rate_zones {
            HeartRateZones::PercentOfMax { max_heart_rate, .. } => *max_heart_rate = max,
            HeartRateZones::Absolute { .. } => {
                warn!("--max-heart-rate ignored: config uses absolute heart-rate zones");
            }
        }
    }
    config.validate()?;
    debug!("Metrics config: {:?}", config);
    Ok(config)
}

fn load_inputs(common: &CommonArgs) -> Result<Loaded> {
    if common.inputs.is_empty() {
        return Err(anyhow!("no input files supplied"));
    }
    let config = load_config(common)?;

    let inputs: Vec<(usize, PathBuf)> = common.inputs.iter().cloned().enumerate().collect();
    let mut parsed: Vec<(usize, PathBuf, Vec<Track>)> = inputs
        .par_iter()
        .map(|(file_id, path)| -> Result<(usize, PathBuf, Vec<Track>)> {
            let data =
                fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
            let hint = path
                .extension()
                .and_then(|ext| ext.to_str())
                .unwrap_or("gpx");
            let tracks = load_tracks(&data, hint, &config)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            Ok((*file_id, path.clone(), tracks))
        })
        .collect::<Result<Vec<_>>>()?;

    // Restore input ordering by file_id
    parsed.sort_by_key(|(id, _, _)| *id);
    let tracks: Vec<(PathBuf, Track)> = parsed
        .into_iter()
        .flat_map(|(_, path, tracks)| tracks.into_iter().map(move |t| (path.clone(), t)))
        .collect();
    if tracks.is_empty() {
        warn!("No tracks found in the supplied inputs");
    }
    let loaded = Loaded { tracks, config };
    for seg in loaded.segments() {
        log_summary(&seg);
    }
    Ok(loaded)
}

fn log_summary(seg: &SegmentRef<'_>) {
    let s = &seg.segment.summary;
    let hr = s
        .average_hr
        .map(|v| format!(", avg HR {:.0} bpm", v))
        .unwrap_or_default();
    info!(
        "{} [t{} s{}] {}: {} points, {:.2} km, {}, +{:.0} m / -{:.0} m{}",
        seg.source.display(),
        seg.track_id,
        seg.segment_id,
        seg.title,
        s.point_count,
        s.total_distance_m / 1000.0,
        format_elapsed(s.total_time_s),
        s.elevation_up_m,
        s.elevation_down_m,
        hr
    );
}

/// `base` with a `_t{track}_s{segment}` suffix when more than one segment is
/// written.
fn indexed_path(base: &Path, track: usize, segment: usize, many: bool) -> PathBuf {
    if !many {
        return base.to_path_buf();
    }
    let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or("track");
    let name = match base.extension().and_then(|s| s.to_str()) {
        Some(ext) => format!("{}_t{}_s{}.{}", stem, track, segment, ext),
        None => format!("{}_t{}_s{}", stem, track, segment),
    };
    base.with_file_name(name)
}

fn chart_targets(png: Option<&PathBuf>, svg: Option<&PathBuf>, default: &str) -> Vec<(PathBuf, ChartKind)> {
    let mut out = Vec::new();
    if let Some(path) = png {
        out.push((path.clone(), ChartKind::Png));
    }
    if let Some(path) = svg {
        out.push((path.clone(), ChartKind::Svg));
    }
    if out.is_empty() {
        out.push((PathBuf::from(default), ChartKind::Png));
    }
    out
}

fn handle_summary(args: SummaryArgs) -> Result<()> {
    let loaded = load_inputs(&args.common)?;
    let segments = loaded.segments();
    let to_stdout = args.output.as_os_str() == "-";

    if args.json {
        let reports: Vec<SegmentReport> = segments.iter().map(SegmentReport::from).collect();
        let text = serde_json::to_string_pretty(&reports)?;
        if to_stdout {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{}", text)?;
        } else {
            fs::write(&args.output, text)
                .with_context(|| format!("failed to write {}", args.output.display()))?;
            info!("Wrote summaries: {}", args.output.display());
        }
        return Ok(());
    }

    if to_stdout {
        let stdout = io::stdout();
        let handle = stdout.lock();
        let mut writer = csv::Writer::from_writer(handle);
        write_point_rows(&segments, &mut writer)?;
    } else {
        let file = File::create(&args.output)
            .with_context(|| format!("failed to create {}", args.output.display()))?;
        let mut writer = csv::Writer::from_writer(file);
        write_point_rows(&segments, &mut writer)?;
        info!("Wrote point table: {}", args.output.display());
    }
    Ok(())
}

#[derive(Serialize)]
struct SegmentReport {
    source: String,
    track: usize,
    segment: usize,
    title: String,
    summary: SegmentSummary,
    /// Seconds per heart-rate zone.
    time_in_zones: BTreeMap<u8, f64>,
}

impl From<&SegmentRef<'_>> for SegmentReport {
    fn from(seg: &SegmentRef<'_>) -> Self {
        SegmentReport {
            source: seg.source.display().to_string(),
            track: seg.track_id,
            segment: seg.segment_id,
            title: seg.title.clone(),
            summary: seg.segment.summary.clone(),
            time_in_zones: seg.segment.time_in_zones(),
        }
    }
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.*}", precision, v),
        _ => String::new(),
    }
}

fn fmt_int<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn write_point_rows<W: Write>(segments: &[SegmentRef<'_>], writer: &mut csv::Writer<W>) -> Result<()> {
    writer.write_record([
        "track",
        "segment",
        "index",
        "latitude",
        "longitude",
        "elevation_m",
        "time",
        "elapsed_s",
        "distance_m",
        "velocity_kmh",
        "pace_min_per_km",
        "velocity_level",
        "heart_rate",
        "hr_zone",
        "hr_zone_float",
        "hr_fraction",
        "cadence",
        "power",
        "elevation_gain_m",
        "elevation_drop_m",
    ])?;
    for seg in segments {
        let s = seg.segment;
        for (i, p) in s.points.iter().enumerate() {
            writer.write_record(&[
                seg.track_id.to_string(),
                seg.segment_id.to_string(),
                i.to_string(),
                format!("{:.7}", p.latitude),
                format!("{:.7}", p.longitude),
                fmt_opt(p.elevation, 2),
                p.time
                    .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
                    .unwrap_or_default(),
                fmt_opt(s.elapsed_time[i], 3),
                format!("{:.2}", s.distance[i]),
                fmt_opt(s.velocity[i], 3),
                fmt_opt(s.pace[i], 3),
                s.velocity_level[i].to_string(),
                fmt_int(p.heart_rate),
                fmt_int(s.hr_zone[i]),
                fmt_opt(s.hr_zone_float[i], 3),
                fmt_opt(s.hr_fraction[i], 3),
                fmt_int(p.cadence),
                fmt_int(p.power),
                format!("{:.2}", s.elevation_gain[i]),
                format!("{:.2}", s.elevation_drop[i]),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Categorical variables get one band per level or zone; everything else uses
/// the requested count.
fn band_count(color_by: Option<ColorVariable>, requested: usize, config: &MetricsConfig) -> usize {
    match color_by {
        Some(ColorVariable::VelocityLevel) => config.velocity_levels.max_level() as usize + 1,
        Some(ColorVariable::HrZone) => config.heart_rate_zones.zone_count(),
        _ => requested,
    }
}

fn handle_plot(args: PlotArgs) -> Result<()> {
    let loaded = load_inputs(&args.common)?;
    let segments = loaded.segments();
    let many = segments.len() > 1;
    let style = PlotStyle {
        width: args.width,
        height: args.height,
        palette: args.common.palette.into(),
        ..PlotStyle::default()
    };

    let y: ColorVariable = args.y.into();
    if args.zone_bands && y != ColorVariable::HeartRate {
        warn!("--zone-bands only applies to --y heart-rate; ignoring");
    }
    let color_by = args.color_by.map(ColorVariable::from);
    let bands = band_count(color_by, args.bands, &loaded.config);

    for seg in &segments {
        if seg.segment.is_empty() {
            warn!("Skipping empty segment t{} s{}", seg.track_id, seg.segment_id);
            continue;
        }
        let spec = ProfileSpec {
            title: seg.title.clone(),
            x: args.x.into(),
            y,
            color_by,
            bands,
            filled: args.filled,
            zones: loaded.config.heart_rate_zones.clone(),
            zone_bands: args.zone_bands,
            hr_regions: args.hr_regions,
        };
        for (base, kind) in chart_targets(args.png.as_ref(), args.svg.as_ref(), "profile.png") {
            let path = indexed_path(&base, seg.track_id, seg.segment_id, many);
            let render = || plot::render_profile(seg.segment, &spec, &style, &path, kind);
            match plot::render_chart_guard(render) {
                Ok(()) => info!("Wrote plot: {}", path.display()),
                Err(err) => warn!("Skipping plot render ({}): {}", path.display(), err),
            }
        }
    }
    Ok(())
}

fn handle_zones(args: ZonesArgs) -> Result<()> {
    let loaded = load_inputs(&args.common)?;
    let segments = loaded.segments();
    let many = segments.len() > 1;
    let zones = &loaded.config.heart_rate_zones;
    let style = PlotStyle {
        palette: args.common.palette.into(),
        ..PlotStyle::default()
    };

    for seg in &segments {
        if let Some(fractions) = plot::zone_fractions(seg.segment, zones.zone_count()) {
            let shares: Vec<String> = fractions
                .iter()
                .enumerate()
                .map(|(i, f)| format!("Z{} {:.0}%", i + 1, f * 100.0))
                .collect();
            info!("t{} s{} zones: {}", seg.track_id, seg.segment_id, shares.join(", "));
        }
        for (base, kind) in chart_targets(args.png.as_ref(), args.svg.as_ref(), "zones.png") {
            let path = indexed_path(&base, seg.track_id, seg.segment_id, many);
            let render = || plot::render_zones(seg.segment, zones, &seg.title, &style, &path, kind);
            match plot::render_chart_guard(render) {
                Ok(()) => info!("Wrote zones chart: {}", path.display()),
                Err(err) => warn!("Skipping zones render ({}): {}", path.display(), err),
            }
        }
    }
    Ok(())
}

fn handle_map(args: MapArgs) -> Result<()> {
    let loaded = load_inputs(&args.common)?;
    let segments = loaded.segments();
    let color_by = args.color_by.map(ColorVariable::from);
    let opts = OverlayOptions {
        color_by,
        num_bands: band_count(color_by, args.bands, &loaded.config),
        palette: args.common.palette.into(),
        line_weight: args.line_weight,
        ..OverlayOptions::default()
    };

    let mut overlays = Vec::new();
    for seg in &segments {
        if seg.segment.is_empty() {
            warn!("Skipping empty segment t{} s{}", seg.track_id, seg.segment_id);
            continue;
        }
        let overlay = MapOverlay::from_segment(seg.segment, &opts)?;
        debug!(
            "t{} s{}: {} lines, center ({:.5}, {:.5})",
            seg.track_id,
            seg.segment_id,
            overlay.lines.len(),
            overlay.center.0,
            overlay.center.1
        );
        overlays.push((seg.track_id, seg.segment_id, overlay));
    }
    if overlays.is_empty() {
        return Err(anyhow!("no non-empty segments to map"));
    }

    let to_stdout = args.output.as_os_str() == "-";
    if args.merged || to_stdout || overlays.len() == 1 {
        let all: Vec<MapOverlay> = overlays.into_iter().map(|(_, _, o)| o).collect();
        let geojson = if all.len() == 1 {
            all[0].to_geojson()
        } else {
            merge_geojson(&all)
        };
        write_json(&geojson, &args.output)?;
    } else {
        for (track_id, segment_id, overlay) in &overlays {
            let path = indexed_path(&args.output, *track_id, *segment_id, true);
            write_json(&overlay.to_geojson(), &path)?;
        }
    }
    Ok(())
}

fn write_json(value: &serde_json::Value, path: &Path) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    if path.as_os_str() == "-" {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{}", text)?;
    } else {
        fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
        info!("Wrote map overlay: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexed_path() {
        let base = Path::new("out/profile.png");
        assert_eq!(indexed_path(base, 0, 1, false), PathBuf::from("out/profile.png"));
        assert_eq!(
            indexed_path(base, 2, 1, true),
            PathBuf::from("out/profile_t2_s1.png")
        );
        assert_eq!(
            indexed_path(Path::new("track"), 0, 0, true),
            PathBuf::from("track_t0_s0")
        );
    }

    #[test]
    fn test_parse_plot_args() {
        let cli = Cli::try_parse_from([
            "gpxplot",
            "plot",
            "ride.gpx",
            "--y",
            "heart-rate",
            "--color-by",
            "hr-zone",
            "--bands",
            "5",
            "--palette",
            "rd-pu",
        ])
        .unwrap();
        let Command::Plot(args) = cli.command else {
            panic!("expected plot command");
        };
        assert_eq!(args.common.inputs, vec![PathBuf::from("ride.gpx")]);
        assert_eq!(ColorVariable::from(args.y), ColorVariable::HeartRate);
        assert_eq!(args.color_by.map(ColorVariable::from), Some(ColorVariable::HrZone));
        assert_eq!(Palette::from(args.common.palette), Palette::RdPu);
        assert_eq!(args.bands, 5);
    }

    #[test]
    fn test_band_count_for_categorical_variables() {
        let config = MetricsConfig::default();
        assert_eq!(band_count(Some(ColorVariable::VelocityLevel), 3, &config), 7);
        assert_eq!(band_count(Some(ColorVariable::HrZone), 3, &config), 5);
        assert_eq!(band_count(Some(ColorVariable::Elevation), 3, &config), 3);
        assert_eq!(band_count(None, 8, &config), 8);
    }

    #[test]
    fn test_parse_zone_shading_flags() {
        let cli = Cli::try_parse_from([
            "gpxplot",
            "plot",
            "ride.gpx",
            "--y",
            "heart-rate",
            "--zone-bands",
            "--hr-regions",
        ])
        .unwrap();
        let Command::Plot(args) = cli.command else {
            panic!("expected plot command");
        };
        assert!(args.zone_bands);
        assert!(args.hr_regions);
        assert!(!args.filled);
    }

    #[test]
    fn test_inputs_required() {
        assert!(Cli::try_parse_from(["gpxplot", "summary"]).is_err());
    }

    #[test]
    fn test_chart_targets_default() {
        let targets = chart_targets(None, None, "zones.png");
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].0, PathBuf::from("zones.png"));
        let svg = PathBuf::from("a.svg");
        let targets = chart_targets(None, Some(&svg), "zones.png");
        assert!(matches!(targets[..], [(_, ChartKind::Svg)]));
    }

    #[test]
    fn test_max_heart_rate_override() {
        let cli = Cli::try_parse_from(["gpxplot", "zones", "a.gpx", "--max-heart-rate", "200"])
            .unwrap();
        let Command::Zones(args) = cli.command else {
            panic!("expected zones command");
        };
        let config = load_config(&args.common).unwrap();
        assert_eq!(config.heart_rate_zones.max_heart_rate(), Some(200.0));
    }

    #[test]
    fn test_fmt_opt() {
        assert_eq!(fmt_opt(Some(1.23456), 2), "1.23");
        assert_eq!(fmt_opt(None, 2), "");
        assert_eq!(fmt_opt(Some(f64::NAN), 2), "");
        assert_eq!(fmt_int(Some(140u16)), "140");
    }
}
