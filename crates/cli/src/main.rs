//! geochange CLI - tiled change detection on GeoTIFF image pairs

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use geochange_algorithms::inference::{DifferenceModelParams, SpectralDifferenceModel};
use geochange_algorithms::pipeline::{predict_change, ChangeDetectionParams, GeoContext};
use geochange_core::io::{read_image_stack, write_geotiff, write_mask_geotiff};
use geochange_core::vector::write_geojson;
use geochange_core::{BBox, ImageStack, CRS};
use geochange_parallel::{ProcessingMode, TileGrid};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "geochange")]
#[command(author, version, about = "Tiled change detection for co-registered imagery", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about an image file
    Info {
        /// Input GeoTIFF
        input: PathBuf,
    },
    /// Print the tile grid for a raster size
    Tiles {
        /// Raster height in pixels
        rows: usize,
        /// Raster width in pixels
        cols: usize,
        /// Square tile size
        #[arg(short, long, default_value = "1024")]
        tile_size: usize,
        /// Tile height (overrides --tile-size)
        #[arg(long)]
        tile_rows: Option<usize>,
        /// Tile width (overrides --tile-size)
        #[arg(long)]
        tile_cols: Option<usize>,
    },
    /// Detect change between two co-registered images
    Detect(DetectArgs),
}

#[derive(clap::Args)]
struct DetectArgs {
    /// Image at the earlier date
    before: PathBuf,
    /// Image at the later date
    after: PathBuf,
    /// Output change mask (8-bit GeoTIFF, 0/255)
    #[arg(short, long)]
    output: PathBuf,
    /// Also write the averaged probability map (32-bit float GeoTIFF)
    #[arg(long)]
    probability: Option<PathBuf>,
    /// Vectorize the mask and write polygons as GeoJSON
    #[arg(long)]
    polygons: Option<PathBuf>,
    /// JSON file with pipeline parameters; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Square tile size
    #[arg(short, long)]
    tile_size: Option<usize>,
    /// Tile height
    #[arg(long)]
    tile_rows: Option<usize>,
    /// Tile width
    #[arg(long)]
    tile_cols: Option<usize>,
    /// Disable flip test-time augmentation
    #[arg(long)]
    no_tta: bool,
    /// Average raw tile probabilities instead of binarized tiles
    #[arg(long)]
    no_binarize: bool,
    /// Decision threshold on the averaged value
    #[arg(long)]
    threshold: Option<f32>,
    /// Bounding box "min_x,min_y,max_x,max_y" of the images
    #[arg(long, allow_hyphen_values = true)]
    bbox: Option<String>,
    /// Read --bbox as "min_lat,min_lon,max_lat,max_lon"
    #[arg(long)]
    lat_lon: bool,
    /// CRS of the bounding box or images, e.g. EPSG:25832
    #[arg(long)]
    crs: Option<String>,
    /// Reproject polygons into this CRS, e.g. EPSG:4326
    #[arg(long)]
    target_crs: Option<String>,
    /// Minimum polygon area in output units
    #[arg(long)]
    min_area: Option<f64>,
    /// Douglas-Peucker tolerance for polygon simplification
    #[arg(long)]
    simplify: Option<f64>,
    /// Worker threads for tile inference (1 = sequential)
    #[arg(short = 'j', long)]
    threads: Option<usize>,
    /// RMS band difference at which the baseline model reports 50% change
    #[arg(long, default_value = "0.15")]
    diff_threshold: f32,
    /// Logit slope of the baseline model
    #[arg(long, default_value = "40.0")]
    gain: f32,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_stack(path: &Path) -> Result<ImageStack> {
    let pb = spinner("Reading image...");
    let stack = read_image_stack(path)
        .with_context(|| format!("Failed to read image {}", path.display()))?;
    pb.finish_and_clear();
    info!(
        "Input: {} x {} x {} ({})",
        stack.cols(),
        stack.rows(),
        stack.bands(),
        path.display()
    );
    Ok(stack)
}

fn parse_crs(s: &str) -> Result<CRS> {
    s.parse::<CRS>()
        .with_context(|| format!("Invalid CRS: {s}"))
}

fn parse_bbox(s: &str, lat_lon: bool) -> Result<BBox> {
    let values: Vec<f64> = s
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("Invalid bounding box: {s}"))?;
    let Ok(coords) = <[f64; 4]>::try_from(values) else {
        bail!("Bounding box needs 4 comma-separated numbers, got: {s}");
    };

    let bbox = if lat_lon {
        BBox::from_lat_lon(coords)
    } else {
        BBox::new(coords[0], coords[1], coords[2], coords[3])
    };
    bbox.validate()?;
    Ok(bbox)
}

fn load_params(args: &DetectArgs) -> Result<ChangeDetectionParams> {
    let mut params = match &args.config {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config {}", path.display()))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => ChangeDetectionParams::default(),
    };

    if let Some(size) = args.tile_size {
        params = params.with_tile_size(size);
    }
    if let Some(rows) = args.tile_rows {
        params.tile_rows = rows;
    }
    if let Some(cols) = args.tile_cols {
        params.tile_cols = cols;
    }
    if args.no_tta {
        params.use_tta = false;
    }
    if args.no_binarize {
        params.binarize_tiles = false;
    }
    if let Some(t) = args.threshold {
        params.threshold = t;
    }
    if let Some(area) = args.min_area {
        params.min_area = area;
    }
    if let Some(tol) = args.simplify {
        params.simplify_tolerance = Some(tol);
    }
    if let Some(target) = &args.target_crs {
        params.target_crs = Some(parse_crs(target)?);
    }
    if let Some(threads) = args.threads {
        params.mode = ProcessingMode::from_threads(Some(threads));
    }
    params.want_polygons = args.polygons.is_some();
    Ok(params)
}

fn geo_context(args: &DetectArgs, before: &ImageStack) -> Result<Option<GeoContext>> {
    let crs = args.crs.as_deref().map(parse_crs).transpose()?;

    if let Some(bbox) = &args.bbox {
        let bbox = parse_bbox(bbox, args.lat_lon)?;
        return Ok(Some(match crs {
            Some(crs) => GeoContext::BoundingBox { bbox, crs },
            None => GeoContext::from_bbox(bbox),
        }));
    }

    Ok(match crs {
        Some(crs) => Some(GeoContext::Transform {
            transform: *before.transform(),
            crs: Some(crs),
        }),
        None => GeoContext::from_stack(before),
    })
}

fn done(name: &str, path: &Path) {
    println!("{} saved to: {}", name, path.display());
}

fn detect(args: DetectArgs) -> Result<()> {
    let params = load_params(&args)?;
    let before = read_stack(&args.before)?;
    let after = read_stack(&args.after)?;
    let geo = geo_context(&args, &before)?;

    let model = SpectralDifferenceModel::new(DifferenceModelParams {
        threshold: args.diff_threshold,
        gain: args.gain,
    });

    let pb = spinner("Detecting change...");
    let start = Instant::now();
    let result = predict_change(&model, &before, &after, &params, geo.as_ref())
        .context("Change detection failed")?;
    let elapsed = start.elapsed();
    pb.finish_and_clear();

    let pb = spinner("Writing output...");
    write_mask_geotiff(&result.mask, &args.output).context("Failed to write change mask")?;
    if let Some(path) = &args.probability {
        write_geotiff(&result.probability, path).context("Failed to write probability map")?;
    }
    if let Some(path) = &args.polygons {
        write_geojson(&result.feature_collection(), path).context("Failed to write polygons")?;
    }
    pb.finish_and_clear();

    done("Change mask", &args.output);
    if let Some(path) = &args.probability {
        done("Probability map", path);
    }
    if let Some(path) = &args.polygons {
        done("Polygons", path);
    }
    let total = result.mask.len().max(1);
    println!(
        "  Tiles: {}, changed pixels: {} ({:.2}%), polygons: {}",
        result.tiles,
        result.changed_pixels(),
        100.0 * result.changed_pixels() as f64 / total as f64,
        result.polygons.len()
    );
    println!("  Processing time: {:.2?}", elapsed);
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let stack = read_stack(&input)?;
            let (rows, cols) = stack.shape();
            let transform = stack.transform();
            let bounds = transform.bounds(cols, rows);

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} bands)", cols, rows, stack.bands());
            println!(
                "Pixel size: {} x {}",
                transform.pixel_width,
                transform.pixel_height.abs()
            );
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y
            );
            match stack.crs() {
                Some(crs) => println!("CRS: {}", crs),
                None => println!("CRS: unknown"),
            }

            println!("\nBands:");
            for (band, lane) in (0..stack.bands()).filter_map(|b| stack.band(b).map(|l| (b, l))) {
                let (min, max, sum) = lane.iter().fold(
                    (f32::INFINITY, f32::NEG_INFINITY, 0.0f64),
                    |(lo, hi, s), &v| (lo.min(v), hi.max(v), s + v as f64),
                );
                println!(
                    "  {}: min {:.4}, max {:.4}, mean {:.4}",
                    band + 1,
                    min,
                    max,
                    sum / lane.len().max(1) as f64
                );
            }
        }

        // ── Tiles ────────────────────────────────────────────────────
        Commands::Tiles {
            rows,
            cols,
            tile_size,
            tile_rows,
            tile_cols,
        } => {
            let grid = TileGrid::new(
                rows,
                cols,
                tile_rows.unwrap_or(tile_size),
                tile_cols.unwrap_or(tile_size),
            )
            .context("Invalid tile layout")?;
            let (grid_rows, grid_cols) = grid.dims();
            let (tile_h, tile_w) = grid.tile_shape();
            let (overlap_h, overlap_w) = grid.overlap();

            println!("Raster: {} x {}", cols, rows);
            println!("Tile: {} x {}", tile_w, tile_h);
            println!(
                "Grid: {} x {} ({} tiles), overlap {} x {}",
                grid_cols,
                grid_rows,
                grid.len(),
                overlap_w,
                overlap_h
            );
            for tile in grid.tiles() {
                println!(
                    "  [{}, {}] rows {}..{} cols {}..{}",
                    tile.row_index,
                    tile.col_index,
                    tile.start_row,
                    tile.end_row(),
                    tile.start_col,
                    tile.end_col()
                );
            }
        }

        // ── Detect ───────────────────────────────────────────────────
        Commands::Detect(args) => detect(args)?,
    }

    Ok(())
}
