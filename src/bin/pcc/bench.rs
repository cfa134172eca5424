//! Round-trip benchmark over a set of frames.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{debug, info};

use pointcloud_codec::{compression_ratio, TransportBuffer};

use crate::Settings;

/// Measurements for one frame.
#[derive(Debug, Clone)]
struct FrameStats {
    path: PathBuf,
    points: usize,
    encoded_bytes: usize,
    ratio: f64,
    encode_ms: f64,
    decode_ms: f64,
    max_error: f32,
}

pub(crate) fn run(files: &[PathBuf], settings: &Settings) -> Result<()> {
    info!(
        "benchmarking {} frames: level {}, {} bits, engine {}",
        files.len(),
        settings.options.compression_level(),
        settings.options.quantization_bits(),
        settings.codec.engine().name()
    );

    let stats = files
        .par_iter()
        .map(|path| bench_frame(path, settings))
        .collect::<Result<Vec<_>>>()?;

    for s in &stats {
        println!(
            "{:<40} {:>8} pts {:>10} B  ratio {:.4}  enc {:>8.3} ms  dec {:>8.3} ms  err {:.6}",
            s.path.display(),
            s.points,
            s.encoded_bytes,
            s.ratio,
            s.encode_ms,
            s.decode_ms,
            s.max_error
        );
    }

    let ratios: Vec<f64> = stats.iter().map(|s| s.ratio).collect();
    let encode_ms: Vec<f64> = stats.iter().map(|s| s.encode_ms).collect();
    let decode_ms: Vec<f64> = stats.iter().map(|s| s.decode_ms).collect();
    println!();
    print_summary("compression ratio", &ratios);
    print_summary("encode time (ms)", &encode_ms);
    print_summary("decode time (ms)", &decode_ms);
    let worst = stats.iter().map(|s| s.max_error).fold(0.0f32, f32::max);
    println!("{:<20} {:.6}", "max error", worst);
    Ok(())
}

fn bench_frame(path: &Path, settings: &Settings) -> Result<FrameStats> {
    let layout = &settings.config.layout;
    let frame = TransportBuffer::read_from(path, layout.stride())
        .with_context(|| format!("reading {}", path.display()))?;

    let start = Instant::now();
    let encoded = settings.codec.encode(frame.as_slice(), layout, &settings.options)?;
    let encode_ms = start.elapsed().as_secs_f64() * 1000.0;

    let start = Instant::now();
    let decoded = settings.codec.decode(&encoded, layout)?;
    let decode_ms = start.elapsed().as_secs_f64() * 1000.0;

    let max_error = max_abs_error(frame.as_slice(), &decoded);
    debug!(path = %path.display(), encode_ms, decode_ms, max_error, "frame done");

    Ok(FrameStats {
        path: path.to_path_buf(),
        points: frame.point_count(),
        encoded_bytes: encoded.len(),
        ratio: compression_ratio(encoded.len(), frame.point_count(), layout.stride()),
        encode_ms,
        decode_ms,
        max_error,
    })
}

fn max_abs_error(original: &[f32], decoded: &[f32]) -> f32 {
    original
        .iter()
        .zip(decoded)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f32::max)
}

/// Mean and population standard deviation.
fn mean_stddev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

fn print_summary(label: &str, values: &[f64]) {
    let (mean, stddev) = mean_stddev(values);
    println!("{:<20} mean {:.4}  stddev {:.4}", label, mean, stddev);
}
