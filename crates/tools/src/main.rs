use std::env;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use foundation::bounds::ProjectedExtent;
use serde_json::json;
use service::{
    DEFAULT_EXTENT_TOLERANCE_M, ReqwestClient, ServiceMetadata, ServiceProbe, summarize,
};
use session::{MapSession, SessionConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;
use viewport::{FitOptions, Padding, ViewState, ViewportController, ViewportSize};

/// Screen resolution the service's published scales assume.
const METERS_PER_INCH: f64 = 0.0254;
const SCREEN_DPI: f64 = 96.0;

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect and load a cached tile service overlay")]
struct Args {
    /// Service metadata JSON (default: built-in GF2 preset)
    #[arg(long)]
    metadata: Option<PathBuf>,

    /// Override the service base URL from the metadata
    #[arg(long)]
    service_url: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = 15)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe the service endpoints and report n/m succeeded
    Probe {
        /// Issue all probes at once instead of one after another
        #[arg(long)]
        parallel: bool,

        /// Print the results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the resolution pyramid
    Grid,

    /// List the tiles covering an extent at one level
    Tiles {
        #[arg(long)]
        zoom: u8,

        /// xmin,ymin,xmax,ymax in meters (default: the initial extent)
        #[arg(long)]
        extent: Option<String>,

        /// Max URLs to print
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Fit a viewport to an extent and print the resulting view
    Fit {
        /// xmin,ymin,xmax,ymax in meters (default: the initial extent)
        #[arg(long)]
        extent: Option<String>,

        #[arg(long, default_value_t = 1024)]
        width: u32,

        #[arg(long, default_value_t = 768)]
        height: u32,

        /// Padding in pixels on every side
        #[arg(long, default_value_t = 0.0)]
        padding: f64,

        #[arg(long)]
        max_zoom: Option<f64>,
    },

    /// Compare webMercatorExtent with the projected geoExtent
    CheckExtent {
        #[arg(long, default_value_t = DEFAULT_EXTENT_TOLERANCE_M)]
        tolerance: f64,
    },

    /// Open a session, load the overlay and fetch its visible tiles
    Load {
        /// Use the dynamic export endpoint instead of cached tiles
        #[arg(long)]
        arcgis: bool,

        /// Request the reference tile before loading
        #[arg(long)]
        spot_check: bool,

        /// Skip fetching visible tiles
        #[arg(long)]
        no_fetch: bool,

        #[arg(long, default_value = "osm")]
        basemap: String,
    },

    /// Print the service metadata as JSON
    Metadata,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let metadata = resolve_metadata(args.metadata, args.service_url)?;

    match args.command {
        Command::Probe { parallel, json } => {
            let client = ReqwestClient::with_timeout(Duration::from_secs(args.timeout_secs))?;
            probe(&client, &metadata, parallel, json).await?
        }
        Command::Grid => print_grid(&metadata)?,
        Command::Tiles {
            zoom,
            extent,
            limit,
        } => print_tiles(&metadata, zoom, extent.as_deref(), limit)?,
        Command::Fit {
            extent,
            width,
            height,
            padding,
            max_zoom,
        } => fit(&metadata, extent.as_deref(), width, height, padding, max_zoom)?,
        Command::CheckExtent { tolerance } => {
            let check = metadata.check_extent_consistency(tolerance)?;
            println!(
                "extents agree: max bound delta {:.6} m (tolerance {tolerance} m)",
                check.delta_m
            );
        }
        Command::Load {
            arcgis,
            spot_check,
            no_fetch,
            basemap,
        } => {
            let client = ReqwestClient::with_timeout(Duration::from_secs(args.timeout_secs))?;
            let config = SessionConfig::default()
                .with_metadata(metadata)
                .with_basemap(basemap);
            load(&client, config, arcgis, spot_check, !no_fetch).await?
        }
        Command::Metadata => println!("{}", metadata.to_json_pretty()?),
    }

    Ok(())
}

/// `--metadata` / `OVERLAY_METADATA`, then `--service-url` / `OVERLAY_SERVICE_URL`.
fn resolve_metadata(
    path: Option<PathBuf>,
    service_url: Option<String>,
) -> Result<ServiceMetadata, Box<dyn std::error::Error>> {
    let path = path.or_else(|| env::var("OVERLAY_METADATA").ok().map(PathBuf::from));
    let metadata = match path {
        Some(path) => ServiceMetadata::load(&path)?,
        None => ServiceMetadata::default(),
    };
    let service_url = service_url.or_else(|| env::var("OVERLAY_SERVICE_URL").ok());
    Ok(match service_url {
        Some(url) => metadata.with_service_url(url),
        None => metadata,
    })
}

fn parse_extent(raw: &str) -> Result<ProjectedExtent, Box<dyn std::error::Error>> {
    let parts = raw
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()?;
    let &[xmin, ymin, xmax, ymax] = parts.as_slice() else {
        return Err(format!("extent needs 4 comma-separated numbers, got {}", parts.len()).into());
    };
    Ok(ProjectedExtent::new(xmin, ymin, xmax, ymax)?)
}

fn extent_or_initial(
    metadata: &ServiceMetadata,
    raw: Option<&str>,
) -> Result<ProjectedExtent, Box<dyn std::error::Error>> {
    match raw {
        Some(raw) => parse_extent(raw),
        None => Ok(metadata.initial_extent),
    }
}

async fn probe(
    client: &ReqwestClient,
    metadata: &ServiceMetadata,
    parallel: bool,
    as_json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let targets = metadata.probe_targets();
    let probe = ServiceProbe::new(client);
    let results = if parallel {
        probe.probe_parallel(&targets).await
    } else {
        probe.probe(&targets).await
    };
    let summary = summarize(&results);

    if as_json {
        let report = json!({
            "results": results.iter().map(|r| json!({
                "url": r.url,
                "label": r.label,
                "status": r.status.to_string(),
                "latencyMs": r.latency_ms,
                "ok": r.ok,
            })).collect::<Vec<_>>(),
            "successCount": summary.success_count,
            "total": summary.total,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for r in &results {
            println!("{:<24} {:>5}  {:>5} ms", r.label, r.status.to_string(), r.latency_ms);
        }
        println!("{summary}");
    }
    if summary.all_failed() {
        return Err("service connection test failed".into());
    }
    Ok(())
}

fn print_grid(metadata: &ServiceMetadata) -> Result<(), Box<dyn std::error::Error>> {
    let grid = metadata.tile_grid()?;
    let lod = grid.lod_range();
    let origin = grid.origin();
    println!(
        "origin ({}, {})  tile {} px  LOD {}..={}",
        origin.x,
        origin.y,
        grid.tile_size(),
        lod.min,
        lod.max
    );
    for (z, resolution) in grid.resolutions().iter().enumerate() {
        let marker = if (lod.min..=lod.max).contains(&(z as u8)) { ' ' } else { '-' };
        let scale = resolution * SCREEN_DPI / METERS_PER_INCH;
        println!("{marker}{z:>3}  {resolution:>22.12}  1:{scale:.3}");
    }
    Ok(())
}

fn print_tiles(
    metadata: &ServiceMetadata,
    zoom: u8,
    extent: Option<&str>,
    limit: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let extent = extent_or_initial(metadata, extent)?;
    let source = metadata.tile_source()?;
    let range = source
        .grid
        .tiles_covering(&extent, zoom)
        .ok_or_else(|| format!("level {zoom} is not in the pyramid"))?;
    let (min_x, min_y) = range.min();
    let (max_x, max_y) = range.max();
    println!(
        "z={zoom} x {min_x}..={max_x} y {min_y}..={max_y} ({} tiles)",
        range.len()
    );
    for address in range.iter().take(limit) {
        if let Some(url) = source.tile_url(address) {
            println!("{address}  {url}");
        }
    }
    Ok(())
}

fn fit(
    metadata: &ServiceMetadata,
    extent: Option<&str>,
    width: u32,
    height: u32,
    padding: f64,
    max_zoom: Option<f64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let target = extent_or_initial(metadata, extent)?;
    let grid = metadata.tile_grid()?;
    let size = ViewportSize::new(width, height);
    let start = ViewState::new(target.center(), f64::from(grid.lod_range().min));
    let mut controller = ViewportController::new(grid, size, start)?;

    let mut options = FitOptions::immediate().with_padding(Padding::uniform(padding));
    options.max_zoom = max_zoom;
    let view = controller.fit(&target, &options, foundation::Time::ZERO)?;

    let visible = controller.visible_extent();
    println!("center ({:.3}, {:.3})  zoom {:.4}", view.center.x, view.center.y, view.zoom);
    println!(
        "resolution {:.6} m/px  tile level {}",
        controller.resolution(),
        controller.tile_level()
    );
    println!("visible {:?}", visible.as_array());
    println!("contains target: {}", visible.contains_extent(&target));
    Ok(())
}

async fn load(
    client: &ReqwestClient,
    config: SessionConfig,
    arcgis: bool,
    spot_check: bool,
    fetch: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = MapSession::open(config)?;

    if spot_check {
        let check = session.spot_check_tile(client).await;
        println!(
            "spot-check {} -> {} ({} bytes, {})",
            check.url,
            check.status,
            check.bytes,
            check.content_type.as_deref().unwrap_or("no content type")
        );
    }

    if arcgis {
        session.load_arcgis_overlay()?;
    } else {
        session.load_overlay()?;
    }
    while session.tick(16) {}

    let view = session.view();
    info!(zoom = view.zoom, "view settled");
    println!(
        "view center ({:.3}, {:.3}) zoom {:.4} backdrop {}",
        view.center.x,
        view.center.y,
        view.zoom,
        session.backdrop().css_color()
    );

    if fetch {
        let stats = session.fetch_tiles(client).await;
        println!("tiles: {stats}");
    }

    let summary = session.close();
    println!(
        "closed after {} frames with {} layer(s)",
        summary.frames, summary.layers
    );
    Ok(())
}
