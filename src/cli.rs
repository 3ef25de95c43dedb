use std::path::PathBuf;

use clap::{Args, Parser, ValueEnum};
use png2svg::{VectorizeMode, VectorizeOptions, default_options};

/// Command line interface definition.
#[derive(Parser, Debug)]
#[command(author, version, about = "Convert raster images to SVG", long_about = None)]
pub struct Cli {
    /// Input image path
    pub input: PathBuf,
    /// Output SVG path (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    #[command(flatten)]
    pub vectorize: VectorizeArgs,
    #[command(flatten)]
    pub global: GlobalOptions,
}

#[derive(Args, Debug)]
pub struct GlobalOptions {
    /// Worker thread count (defaults to one per core)
    #[arg(long, env = "PNG2SVG_THREADS")]
    pub threads: Option<usize>,
    /// Log pipeline progress to stderr
    #[arg(short, long)]
    pub verbose: bool,
    /// Print the resolved options to stderr before converting
    #[arg(long)]
    pub debug: bool,
}

#[derive(Args, Debug)]
pub struct VectorizeArgs {
    /// Maximum number of colors (2-64)
    #[arg(short, long, default_value_t = default_options().colors)]
    pub colors: u8,
    /// Detail level (0.0-1.0); higher keeps smaller shapes
    #[arg(short, long, default_value_t = default_options().detail)]
    pub detail: f32,
    /// Curve smoothness (0.0-1.0); zero emits straight segments
    #[arg(short, long, default_value_t = default_options().smoothness)]
    pub smoothness: f32,
    /// Simplification tolerance in pixels
    #[arg(short, long, default_value_t = default_options().tolerance)]
    pub tolerance: f32,
    /// Image style preset
    #[arg(long, value_enum, default_value_t = ModeArg::Logo)]
    pub mode: ModeArg,
    /// Decimal places in path coordinates (0-6)
    #[arg(long, default_value_t = default_options().path_precision)]
    pub precision: u8,
    /// Downsample images with more pixels than this
    #[arg(long = "max-pixels", default_value_t = default_options().max_pixels)]
    pub max_pixels: u64,
}

impl From<&VectorizeArgs> for VectorizeOptions {
    fn from(args: &VectorizeArgs) -> Self {
        default_options()
            .with_colors(args.colors)
            .with_detail(args.detail)
            .with_smoothness(args.smoothness)
            .with_tolerance(args.tolerance)
            .with_mode(args.mode.into())
            .with_path_precision(args.precision)
            .with_max_pixels(args.max_pixels)
    }
}

/// Image style presets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Flat artwork with anti-aliased edges
    Logo,
    /// Illustrations with many color areas
    Poster,
    /// Exact pixel outlines, no smoothing
    #[value(name = "pixel-art", alias = "pixel", alias = "pixelart")]
    PixelArt,
}

impl From<ModeArg> for VectorizeMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Logo => VectorizeMode::Logo,
            ModeArg::Poster => VectorizeMode::Poster,
            ModeArg::PixelArt => VectorizeMode::PixelArt,
        }
    }
}
