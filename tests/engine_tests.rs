//! Contract tests shared by the built-in compression engines.

use pointcloud_codec::{
    CompressionEngine, CompressionOptions, EngineStatus, IdentityEngine, PointAttribute, PointCloud,
    QuantizedEngine,
};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn engines() -> Vec<Box<dyn CompressionEngine>> {
    vec![Box::new(QuantizedEngine::new()), Box::new(IdentityEngine::new())]
}

fn random_cloud(seed: u64, points: usize) -> PointCloud {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut attr = |name: &str, width: usize, lo: f32, hi: f32| {
        let values = (0..points * width).map(|_| rng.gen_range(lo..hi)).collect();
        PointAttribute::new(name, width, values)
    };
    let position = attr("position", 3, -80.0, 80.0);
    let intensity = attr("intensity", 1, 0.0, 255.0);
    let normal = attr("normal", 3, -1.0, 1.0);
    let descriptor = attr("descriptor", 5, -10.0, 10.0);
    PointCloud::new(points)
        .with_attribute(position)
        .with_attribute(intensity)
        .with_attribute(normal)
        .with_attribute(descriptor)
}

#[test]
fn test_names() {
    let names: Vec<String> = engines().iter().map(|e| e.name().to_string()).collect();
    assert_eq!(names, ["quantized", "identity"]);
}

#[test]
fn test_structure_preserved() {
    let cloud = random_cloud(1, 300);
    let options = CompressionOptions::new(8, 16).expect("valid options");
    for engine in engines() {
        let encoded = engine.encode(&cloud, &options).expect("encode failed");
        let decoded = engine.decode(encoded.as_bytes()).expect("decode failed");

        assert_eq!(decoded.point_count(), cloud.point_count(), "{}", engine.name());
        assert_eq!(decoded.attributes().len(), cloud.attributes().len());
        for (a, b) in cloud.attributes().iter().zip(decoded.attributes()) {
            assert_eq!(a.name(), b.name());
            assert_eq!(a.component_count(), b.component_count());
            assert_eq!(a.len(), b.len());
        }
    }
}

#[test]
fn test_error_within_half_step() {
    let cloud = random_cloud(2, 500);
    let engine = QuantizedEngine::new();
    for bits in [4, 8, 12, 16] {
        let options = CompressionOptions::new(10, bits).expect("valid options");
        let decoded = engine
            .decode(engine.encode(&cloud, &options).expect("encode failed").as_bytes())
            .expect("decode failed");

        let steps = (1u64 << (bits - 1)) as f32;
        for (a, b) in cloud.attributes().iter().zip(decoded.attributes()) {
            let extent = (0..a.component_count())
                .map(|c| {
                    let column = a.tuples().map(|t| t[c]);
                    let lo = column.clone().fold(f32::INFINITY, f32::min);
                    let hi = column.fold(f32::NEG_INFINITY, f32::max);
                    hi - lo
                })
                .fold(0.0f32, f32::max);
            let bound = extent / steps / 2.0 + 1e-4;
            for (x, y) in a.values().iter().zip(b.values()) {
                assert!((x - y).abs() <= bound, "{} bits, {}: {} vs {}", bits, a.name(), x, y);
            }
        }
    }
}

#[test]
fn test_deterministic() {
    let cloud = random_cloud(3, 200);
    for level in [0, 5, 10] {
        let options = CompressionOptions::new(level, 12).expect("valid options");
        for engine in engines() {
            let first = engine.encode(&cloud, &options).expect("encode failed");
            let second = engine.encode(&cloud, &options).expect("encode failed");
            assert_eq!(first, second, "{} level {}", engine.name(), level);
        }
    }
}

#[test]
fn test_higher_level_not_larger() {
    // smooth scan line: prediction pays off
    let points = 4096;
    let values = (0..points)
        .flat_map(|i| {
            let a = i as f32 * 0.01;
            [20.0 * a.cos(), 20.0 * a.sin(), 0.002 * i as f32]
        })
        .collect();
    let cloud = PointCloud::new(points).with_attribute(PointAttribute::new("position", 3, values));

    let engine = QuantizedEngine::new();
    let fast = engine
        .encode(&cloud, &CompressionOptions::new(0, 14).expect("valid options"))
        .expect("encode failed");
    let best = engine
        .encode(&cloud, &CompressionOptions::new(10, 14).expect("valid options"))
        .expect("encode failed");
    assert!(best.len() <= fast.len(), "level 10: {} bytes, level 0: {}", best.len(), fast.len());
}

#[test]
fn test_every_truncation_fails() {
    let cloud = random_cloud(4, 16);
    let options = CompressionOptions::default();
    for engine in engines() {
        let encoded = engine.encode(&cloud, &options).expect("encode failed");
        let bytes = encoded.as_bytes();
        for cut in 0..bytes.len() {
            let err = engine.decode(&bytes[..cut]).unwrap_err();
            assert!(
                matches!(
                    err.status,
                    EngineStatus::IoError | EngineStatus::CorruptStream | EngineStatus::InvalidParameter
                ),
                "{} cut at {}: {}",
                engine.name(),
                cut,
                err
            );
        }
    }
}

#[test]
fn test_bit_flips_never_panic() {
    let cloud = random_cloud(5, 64);
    let options = CompressionOptions::new(6, 12).expect("valid options");
    let mut rng = StdRng::seed_from_u64(99);
    for engine in engines() {
        let pristine = engine.encode(&cloud, &options).expect("encode failed").into_bytes();
        for _ in 0..500 {
            let mut bytes = pristine.clone();
            let pos = rng.gen_range(0..bytes.len());
            bytes[pos] ^= 1 << rng.gen_range(0..8);
            if let Ok(decoded) = engine.decode(&bytes) {
                // a flip inside the values can still decode; structure must hold
                for attr in decoded.attributes() {
                    assert_eq!(attr.values().len(), decoded.point_count() * attr.component_count());
                }
            }
        }
    }
}

#[test]
fn test_one_bit_snaps_to_extremes() {
    let cloud = PointCloud::new(3).with_attribute(PointAttribute::new("intensity", 1, vec![0.0, 0.4, 1.0]));
    let engine = QuantizedEngine::new();
    let options = CompressionOptions::new(5, 1).expect("valid options");
    let decoded = engine
        .decode(engine.encode(&cloud, &options).expect("encode failed").as_bytes())
        .expect("decode failed");
    assert_eq!(decoded.attributes()[0].values(), &[0.0, 0.0, 1.0]);

    // two bits add the midpoint
    let options = CompressionOptions::new(5, 2).expect("valid options");
    let decoded = engine
        .decode(engine.encode(&cloud, &options).expect("encode failed").as_bytes())
        .expect("decode failed");
    assert_eq!(decoded.attributes()[0].values(), &[0.0, 0.5, 1.0]);
}

#[test]
fn test_thirty_one_bits() {
    let cloud = random_cloud(6, 50);
    let engine = QuantizedEngine::new();
    for level in [0, 10] {
        let options = CompressionOptions::new(level, 31).expect("valid options");
        let decoded = engine
            .decode(engine.encode(&cloud, &options).expect("encode failed").as_bytes())
            .expect("decode failed");
        for (a, b) in cloud.attributes().iter().zip(decoded.attributes()) {
            for (x, y) in a.values().iter().zip(b.values()) {
                assert!((x - y).abs() <= x.abs() * 1e-6 + 1e-5);
            }
        }
    }
}

#[test]
fn test_foreign_streams_rejected() {
    let quantized = QuantizedEngine::new();
    let identity = IdentityEngine::new();
    let cloud = random_cloud(7, 4);
    let options = CompressionOptions::default();

    let from_identity = identity.encode(&cloud, &options).expect("encode failed");
    let err = quantized.decode(from_identity.as_bytes()).unwrap_err();
    assert_eq!(err.status, EngineStatus::InvalidParameter);

    let from_quantized = quantized.encode(&cloud, &options).expect("encode failed");
    let err = identity.decode(from_quantized.as_bytes()).unwrap_err();
    assert_eq!(err.status, EngineStatus::InvalidParameter);
}

#[test]
fn test_shared_across_threads() {
    let engine = std::sync::Arc::new(QuantizedEngine::new());
    let handles: Vec<_> = (0..4)
        .map(|seed| {
            let engine = engine.clone();
            std::thread::spawn(move || {
                let cloud = random_cloud(seed, 256);
                let encoded = engine
                    .encode(&cloud, &CompressionOptions::default())
                    .expect("encode failed");
                engine.decode(encoded.as_bytes()).expect("decode failed").point_count()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().expect("worker panicked"), 256);
    }
}
