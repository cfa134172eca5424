//! pcc - command line tool for encoding, decoding and benchmarking LiDAR frames.
//!
//! Frames on disk are raw little-endian `f32` files (KITTI velodyne `.bin`
//! style), one layout stride per point.

mod bench;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pointcloud_codec::{
    compression_ratio, CodecConfig, CompressionEngine, CompressionOptions, EncodedBuffer, IdentityEngine,
    PointCloudCodec, QuantizedEngine, TransportBuffer,
};

#[derive(Parser, Debug)]
#[command(name = "pcc", author, version, about = "LiDAR point cloud codec toolkit", long_about = None)]
struct Cli {
    /// Show debug output (-vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only show warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compress a raw f32 frame
    #[command(visible_alias = "e")]
    Encode {
        input: PathBuf,
        output: PathBuf,
        #[command(flatten)]
        codec: CodecArgs,
    },
    /// Decompress an encoded frame back to raw f32
    #[command(visible_alias = "d")]
    Decode {
        input: PathBuf,
        output: PathBuf,
        #[command(flatten)]
        codec: CodecArgs,
    },
    /// Round-trip frames and report ratio, timings and reconstruction error
    #[command(visible_alias = "b")]
    Bench {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        codec: CodecArgs,
    },
    /// Show version and build information
    #[command(visible_alias = "i")]
    Info,
}

#[derive(Args, Debug, Clone)]
struct CodecArgs {
    /// JSON codec configuration (layout, level, bits)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Compression level, 0 (fastest) to 10 (smallest); overrides the config
    #[arg(short, long)]
    level: Option<u32>,

    /// Quantization bits, 1 to 31; overrides the config
    #[arg(short, long)]
    bits: Option<u32>,

    /// Compression engine
    #[arg(long, value_enum, default_value_t = EngineKind::Quantized)]
    engine: EngineKind,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum EngineKind {
    Quantized,
    Identity,
}

type DynCodec = PointCloudCodec<Box<dyn CompressionEngine>>;

/// Resolved settings for one run.
struct Settings {
    config: CodecConfig,
    options: CompressionOptions,
    codec: DynCodec,
}

impl CodecArgs {
    fn resolve(&self) -> Result<Settings> {
        let mut config = match &self.config {
            Some(path) => CodecConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
            None => CodecConfig::default(),
        };
        if let Some(level) = self.level {
            config.compression_level = level;
        }
        if let Some(bits) = self.bits {
            config.quantization_bits = bits;
        }
        let options = config.options()?;
        let engine: Box<dyn CompressionEngine> = match self.engine {
            EngineKind::Quantized => Box::new(QuantizedEngine::new()),
            EngineKind::Identity => Box::new(IdentityEngine::new()),
        };
        Ok(Settings {
            config,
            options,
            codec: PointCloudCodec::new(engine),
        })
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let filter = match (quiet, verbose) {
        (true, _) => EnvFilter::new("warn"),
        (false, 0) => EnvFilter::try_from_env("PCC_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        (false, 1) => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Encode { input, output, codec } => cmd_encode(&input, &output, &codec.resolve()?),
        Command::Decode { input, output, codec } => cmd_decode(&input, &output, &codec.resolve()?),
        Command::Bench { files, codec } => bench::run(&files, &codec.resolve()?),
        Command::Info => {
            cmd_info();
            Ok(())
        }
    }
}

fn cmd_encode(input: &Path, output: &Path, settings: &Settings) -> Result<()> {
    let layout = &settings.config.layout;
    let frame = TransportBuffer::read_from(input, layout.stride())
        .with_context(|| format!("reading {}", input.display()))?;
    let encoded = settings.codec.encode(frame.as_slice(), layout, &settings.options)?;
    encoded
        .write_to(output)
        .with_context(|| format!("writing {}", output.display()))?;

    info!(
        "{} -> {}: {} points, {} -> {} bytes (ratio {:.4})",
        input.display(),
        output.display(),
        frame.point_count(),
        frame.byte_len(),
        encoded.len(),
        compression_ratio(encoded.len(), frame.point_count(), layout.stride())
    );
    Ok(())
}

fn cmd_decode(input: &Path, output: &Path, settings: &Settings) -> Result<()> {
    let layout = &settings.config.layout;
    let encoded = EncodedBuffer::read_from(input).with_context(|| format!("reading {}", input.display()))?;
    let flat = settings.codec.decode(&encoded, layout)?;
    let frame = TransportBuffer::from_vec(flat, layout.stride())?;
    frame
        .write_to(output)
        .with_context(|| format!("writing {}", output.display()))?;

    info!(
        "{} -> {}: {} points, {} -> {} bytes",
        input.display(),
        output.display(),
        frame.point_count(),
        encoded.len(),
        frame.byte_len()
    );
    Ok(())
}

fn cmd_info() {
    println!("pcc {} - LiDAR point cloud codec", env!("CARGO_PKG_VERSION"));
    println!("Built {} {}", env!("PCC_BUILD_DATE"), env!("PCC_BUILD_TIME"));
    println!();
    println!("Engines:");
    println!("    quantized   uniform quantization, delta prediction, zlib (default)");
    println!("    identity    raw little-endian f32, lossless");
    println!();
    let defaults = CodecConfig::default();
    println!("Defaults:");
    println!("    compression level  {}", defaults.compression_level);
    println!("    quantization bits  {}", defaults.quantization_bits);
    println!("    layout stride      {}", defaults.layout.stride());
    for attr in defaults.layout.attributes() {
        println!(
            "    attribute          {} @ {} x{}",
            attr.name, attr.offset, attr.component_count
        );
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_build_stamp_split() {
        let date = env!("PCC_BUILD_DATE");
        let time = env!("PCC_BUILD_TIME");
        assert!(!date.is_empty() && !date.contains('|'), "date {:?}", date);
        assert!(!time.is_empty() && !time.contains('|'), "time {:?}", time);
        assert!(time == "unknown" || time.split(':').count() == 3, "time {:?}", time);
    }
}
