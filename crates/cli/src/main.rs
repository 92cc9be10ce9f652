//! CLI for park-tiles - clip park boundaries to a state and download NAIP
//! imagery tiles.
//!
//! This is a thin wrapper around the park-tiles-core library: it wires a
//! GeoJSON dataset source, the NAIP imagery client, and a disk store into
//! the core pipeline.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use park_tiles_core::{Crs, DatasetSource, Pipeline, PipelineConfig};

mod fetch;
mod source;
mod store;

use fetch::NaipClient;
use source::GeoJsonSource;
use store::DiskStore;

#[derive(Parser, Debug)]
#[command(
    name = "park-tiles",
    about = "Clip park boundaries to a state and download NAIP imagery tiles",
    version
)]
struct Args {
    /// Input park units GeoJSON file
    #[arg(value_name = "PARKS")]
    parks: String,

    /// State boundary GeoJSON file (one feature)
    #[arg(value_name = "BOUNDARY")]
    boundary: String,

    /// Output directory for downloaded imagery
    #[arg(long, default_value = "out")]
    out_dir: String,

    /// CRS of the input files
    #[arg(long, default_value = "EPSG:4326")]
    source_crs: String,

    /// Equal-area CRS used for clipping and area statistics
    #[arg(long, default_value = "EPSG:5070")]
    analysis_crs: String,

    /// Projected CRS used as the tiling frame
    #[arg(long, default_value = "EPSG:3857")]
    tiling_crs: String,

    /// Ground resolution in map units per pixel
    #[arg(long, default_value = "1.0")]
    resolution: f64,

    /// Tile width in pixels
    #[arg(long, default_value = "2500")]
    tile_width: u32,

    /// Tile height in pixels
    #[arg(long, default_value = "2500")]
    tile_height: u32,

    /// Feature attribute holding the park name
    #[arg(long, default_value = "name")]
    name_attribute: String,

    /// Report and tile without downloading imagery
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = PipelineConfig::default()
        .with_analysis_crs(&args.analysis_crs)
        .with_tiling_crs(&args.tiling_crs)
        .with_tile_size(args.tile_width, args.tile_height)
        .with_resolution(args.resolution)
        .with_name_attribute(&args.name_attribute);
    let pipeline = Pipeline::new(config);

    let source = GeoJsonSource::new(&args.source_crs);

    if args.dry_run {
        let subject = source
            .load(&args.parks)
            .map_err(|e| anyhow!(e))
            .context("Failed to load parks dataset")?;
        let boundary = source
            .load(&args.boundary)
            .map_err(|e| anyhow!(e))
            .context("Failed to load boundary dataset")?;

        let analysis = pipeline
            .analyze(&subject, &boundary)
            .context("Vector analysis failed")?;
        print_report(&analysis.report);

        let tiles = pipeline
            .tiles(analysis.clipped)
            .context("Tile generation failed")?;
        println!("✓ Dry run: {} tiles would be requested", tiles.len());
        return Ok(());
    }

    let tiling_crs =
        Crs::from_user_input(&args.tiling_crs).context("Failed to resolve tiling CRS")?;
    let srid = tiling_crs
        .epsg()
        .context("Tiling CRS has no EPSG code for imagery requests")?;

    let imagery = NaipClient::new(srid).context("Failed to build imagery client")?;
    let store = DiskStore::new(&args.out_dir);

    let summary = pipeline
        .run(&source, &args.parks, &args.boundary, &imagery, &store)
        .context("Pipeline run failed")?;

    print_report(&summary.report);
    println!(
        "✓ Downloaded {} tiles into {}",
        summary.stored.len(),
        args.out_dir
    );

    Ok(())
}

fn print_report(report: &park_tiles_core::ClipResult) {
    println!(
        "Retained {:.2} of {:.2} km2 ({}%), {} features dropped entirely",
        report.total_clipped_km2,
        report.total_original_km2,
        report.percent_retained,
        report.dropped_count
    );
    for record in report.boundary_crossing() {
        println!(
            "  feature {} crosses the boundary: {}% retained",
            record.fid, record.percent_retained
        );
    }
}
