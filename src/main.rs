use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use tile_reduce::config::{self, ReduceConfig};
use tile_reduce::landsat::{self, LandsatRequest};
use tile_reduce::pipeline::{self, ReduceRequest};
use tile_reduce::raster::GdalBackend;
use tile_reduce::types::{Imagery, ProgressEvent};
use tile_reduce::{geo, logging, naming, output};

/// Tiles for the visual and analytic pipelines.
#[derive(clap::Args, Clone)]
struct TileArgs {
    /// Input GeoTiff tiles; the first one names the outputs
    #[arg(required = true)]
    tiles: Vec<PathBuf>,
}

fn version_string() -> &'static str {
    let on_tag = env!("TILE_REDUCE_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("TILE_REDUCE_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "tile-reduce")]
#[command(about = "Reduce satellite imagery tiles to compressed RGB GeoTiffs")]
#[command(long_about = "\
Reduce satellite imagery tiles to compressed RGB GeoTiffs

Overlapping provider tiles are merged, cut down to three bands in R G B
order, rescaled to 8 bits and LZW-compressed with the GDAL command-line
tools (gdal_merge.py, gdal_translate, gdalbuildvrt, gdalinfo).

Pipelines:

  visual     merge → reband 1 2 3 → compress
             → <base>-visual.tif
  analytic   merge → reband 3 2 1 → rescale to 8 bit → compress
             → <base>-analytic.tif
             color-correct → compress (georeferenced from -8bit)
             → <base>-cc.tif
  landsat    stack <prefix>band<N>.tif files per scene → rescale → compress
             → <scene>.tif

<base> is the first 12 characters of the first tile's name. Intermediate
files (-merged, -rgb, -8bit, -cc-raw) are deleted once consumed unless
--keep-intermediates is given.

Settings are read from ./reduce.toml when present. Run
'tile-reduce gen-config' to print a documented one. Set RUST_LOG=debug to
see every GDAL command line.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (defaults to ./reduce.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for intermediate and final files
    #[arg(long, default_value = ".", global = true)]
    output_dir: PathBuf,

    /// GeoJSON area of interest; outputs are cropped to its bounding box
    #[arg(long, global = true)]
    geojson: Option<PathBuf>,

    /// Keep intermediate files instead of deleting them once consumed
    #[arg(long, global = true)]
    keep_intermediates: bool,

    /// Write a JSON report of the run to this path
    #[arg(long, global = true)]
    report: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reduce 8-bit visual (RGB) tiles
    Visual(TileArgs),
    /// Reduce 16-bit analytic (BGRN) tiles, with a color-corrected variant
    Analytic(TileArgs),
    /// Build an RGB GeoTiff for every Landsat scene in a directory
    Landsat {
        /// Band numbers in R G B order, e.g. 4 3 2 (Landsat 8) or 3 2 1 (Landsat 5)
        bands: Vec<u32>,
        /// Directory holding the band files
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        /// Input value mapped to white
        #[arg(long)]
        white_point: Option<u32>,
        /// Input value mapped to 1; output 0 stays the fill value
        #[arg(long)]
        black_point: Option<u32>,
        /// Text before the band number, e.g. "band" or "_B" for Collection 2
        #[arg(long)]
        band_sig: Option<String>,
    },
    /// Color-correct an existing 8-bit RGB image
    ColorCorrect {
        image: PathBuf,
        /// Output path (defaults to <prefix>-cc.<ext> next to the input)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Skip per-channel color balance, which cannot be undone by hand
        #[arg(long)]
        no_balance: bool,
    },
    /// Print a stock reduce.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let mut config = load_config(cli.config.as_deref())?;
    if cli.keep_intermediates {
        config.output.keep_intermediates = true;
    }
    init_thread_pool(&config.processing);
    let bounds = cli.geojson.as_deref().map(geo::load_bounds).transpose()?;

    match cli.command {
        Command::Visual(args) => {
            let report = cli.report.as_deref();
            reduce(Imagery::Visual, args, bounds, &cli.output_dir, &config, report)?;
        }
        Command::Analytic(args) => {
            let report = cli.report.as_deref();
            reduce(Imagery::Analytic, args, bounds, &cli.output_dir, &config, report)?;
        }
        Command::Landsat {
            bands,
            dir,
            white_point,
            black_point,
            band_sig,
        } => {
            let mut request = LandsatRequest::from_config(dir, cli.output_dir, &config);
            if !bands.is_empty() {
                request.bands = bands;
            }
            if let Some(white_point) = white_point {
                request.white_point = white_point;
            }
            if let Some(black_point) = black_point {
                request.black_point = black_point;
            }
            if let Some(band_sig) = band_sig {
                request.band_sig = band_sig;
            }
            request.bounds = bounds;
            let results =
                with_printer(|tx| landsat::reduce_scenes(&request, &config, Some(tx)))??;
            output::print_scenes(&results);
            if let Some(path) = &cli.report {
                std::fs::write(path, serde_json::to_string_pretty(&results)?)?;
            }
        }
        Command::ColorCorrect {
            image,
            output: out,
            no_balance,
        } => {
            let out = out.unwrap_or_else(|| naming::color_corrected_path(&image));
            let backend = GdalBackend::new(config.tools.clone());
            pipeline::color_correct_file(&backend, &image, &out, &config, !no_balance)?;
            output::print_corrected(&image, &out);
        }
        Command::GenConfig => {}
    }

    Ok(())
}

fn reduce(
    imagery: Imagery,
    args: TileArgs,
    bounds: Option<geo::Bounds>,
    output_dir: &Path,
    config: &ReduceConfig,
    report_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let request = ReduceRequest {
        imagery,
        inputs: args.tiles,
        output_dir: output_dir.to_path_buf(),
        bounds,
    };
    let report = with_printer(|tx| pipeline::reduce(&request, config, Some(tx)))??;
    output::print_report(&report);
    if let Some(path) = report_path {
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
    }
    Ok(())
}

/// Explicit `--config` file, else `reduce.toml` in the working directory.
fn load_config(path: Option<&Path>) -> Result<ReduceConfig, config::ConfigError> {
    match path {
        Some(path) => config::load_config_file(path),
        None => config::load_config(Path::new(".")),
    }
}

/// Run `f` while a printer thread writes its progress events to stdout.
fn with_printer<T>(
    f: impl FnOnce(&Sender<ProgressEvent>) -> T,
) -> Result<T, Box<dyn std::error::Error>> {
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_event(&event) {
                println!("{}", line);
            }
        }
    });
    let result = f(&tx);
    drop(tx);
    printer
        .join()
        .map_err(|_| "progress printer thread panicked")?;
    Ok(result)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Never exceeds the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
