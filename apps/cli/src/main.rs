use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};
use geocompute_integration::GeoComputeClient;
use ndvi_core::{
    boundary_from_file, boundary_from_str, compute_yearly_index, requested_range, AnalysisError,
    IndexDelta, YearResult,
};
use serde::Serialize;
use shared::{
    boundary::BoundaryGeometry,
    domain::{RunId, YearRange},
};
use tracing::info;

mod config;

use config::load_settings;

/// Yearly NDVI means and thumbnails for a boundary, computed remotely.
#[derive(Parser, Debug)]
struct Args {
    /// GeoJSON feature collection; the first feature's geometry is used.
    #[arg(long, conflicts_with = "sample")]
    boundary: Option<PathBuf>,
    /// Bundled sample region to analyse instead of a boundary file.
    #[arg(long, value_enum)]
    sample: Option<SampleRegion>,
    /// First year of the inclusive range.
    #[arg(long, default_value_t = 2013, value_parser = clap::value_parser!(i32).range(2013..=2021))]
    start_year: i32,
    /// Last year of the inclusive range.
    #[arg(long, default_value_t = 2021, value_parser = clap::value_parser!(i32).range(2013..=2021))]
    end_year: i32,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
    /// Optional TOML settings file (falls back to ./ndvi.toml).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SampleRegion {
    Penhalonga,
    Ngundu,
    Gokwe,
    Hwange,
}

impl SampleRegion {
    fn geojson(self) -> &'static str {
        match self {
            Self::Penhalonga => include_str!("../samples/penhalonga.geojson"),
            Self::Ngundu => include_str!("../samples/ngundu.geojson"),
            Self::Gokwe => include_str!("../samples/gokwe.geojson"),
            Self::Hwange => include_str!("../samples/hwange.geojson"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();
    let settings = load_settings(args.config.as_deref());

    let run_id = RunId::new();
    info!(
        run_id = %run_id,
        start_year = args.start_year,
        end_year = args.end_year,
        "cli: starting NDVI run"
    );

    let boundary = resolve_boundary(args.boundary.as_deref(), args.sample)?;
    info!(
        run_id = %run_id,
        geometry = boundary.geometry_type(),
        vertices = boundary.vertex_count(),
        "cli: boundary loaded"
    );

    let range = requested_range(args.start_year, args.end_year)?;
    let client = GeoComputeClient::new(&settings.gateway())?;
    let series =
        compute_yearly_index(&client, &boundary, range, &settings.analysis_options()).await?;
    let delta = series
        .delta()
        .ok_or_else(|| anyhow!("no results came back for the requested range"))?;

    info!(run_id = %run_id, years = series.len(), "cli: run complete");

    let results: Vec<&YearResult> = series.iter().collect();
    match args.format {
        OutputFormat::Table => print!("{}", render_table(series.range(), &results, delta)),
        OutputFormat::Json => println!("{}", render_json(series.range(), &results, delta)?),
    }

    Ok(())
}

fn resolve_boundary(
    boundary: Option<&Path>,
    sample: Option<SampleRegion>,
) -> Result<BoundaryGeometry, AnalysisError> {
    match (boundary, sample) {
        (Some(path), _) => boundary_from_file(path),
        (None, Some(sample)) => boundary_from_str(sample.geojson()),
        (None, None) => Err(AnalysisError::MissingBoundary),
    }
}

fn render_table(range: YearRange, results: &[&YearResult], delta: IndexDelta) -> String {
    let mut out = String::new();
    for result in results {
        out.push_str(&format!(
            "NDVI {}: {:.4}\n  {}\n",
            result.year.0, result.mean_index, result.thumbnail_url
        ));
    }
    for year in [range.start(), range.end()] {
        if let Some(result) = results.iter().find(|r| r.year == year) {
            out.push_str(&format!("NDVI in {}: {:.4}\n", year.0, result.mean_index));
        }
    }
    out.push_str(&format!(
        "Difference between {} and {}: {}{:.4}\n",
        range.start().0,
        range.end().0,
        delta.sign(),
        delta.magnitude()
    ));
    out
}

#[derive(Serialize)]
struct RunReport<'a> {
    start_year: i32,
    end_year: i32,
    results: &'a [&'a YearResult],
    delta: DeltaReport,
}

#[derive(Serialize)]
struct DeltaReport {
    value: f64,
    sign: char,
    magnitude: f64,
}

fn render_json(range: YearRange, results: &[&YearResult], delta: IndexDelta) -> Result<String> {
    let report = RunReport {
        start_year: range.start().0,
        end_year: range.end().0,
        results,
        delta: DeltaReport {
            value: delta.value,
            sign: delta.sign(),
            magnitude: delta.magnitude(),
        },
    };
    Ok(serde_json::to_string_pretty(&report)?)
}
