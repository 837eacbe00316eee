//! Criterion benchmarks for the parameter set codec.
//!
//! Measures encode and decode latency for single parameters and for a
//! realistically sized parameter set (the full payload pushed to a newly
//! connected peer).
//!
//! Run with:
//! ```bash
//! cargo bench --package params-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use params_core::{
    decode_set, encode_parameter, encode_set, Parameter, ParameterCategory, ParameterSet,
    PickerItem, Rgba,
};

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn make_bool() -> Parameter {
    Parameter::bool("Rendering", "Wireframe", false)
}

fn make_float() -> Parameter {
    Parameter::float("Rendering", "Exposure", 1.0, 0.0, 4.0, 0.25, 0.05)
}

fn make_color() -> Parameter {
    Parameter::color("Rendering", "Background", Rgba::new(0x10, 0x20, 0x30, 0xFF))
}

fn make_picker() -> Parameter {
    Parameter::picker(
        "Diagnostics",
        "Region",
        vec![
            PickerItem {
                display_name: "Europe".into(),
                value: Some("eu-1".into()),
            },
            PickerItem {
                display_name: "US".into(),
                value: Some("us-1".into()),
            },
            PickerItem {
                display_name: "Local".into(),
                value: None,
            },
        ],
        0,
    )
}

/// A set comparable to what a real application exposes: a handful of
/// categories with a mix of every variant.
fn make_realistic_set() -> ParameterSet {
    let mut set = ParameterSet::new("1.0", "bench-device");
    for c in 0..4 {
        let name = format!("Category{c}");
        let mut category = ParameterCategory::new(&name);
        for p in 0..5 {
            category.push(Parameter::bool(&name, &format!("Flag{p}"), p % 2 == 0));
            category.push(Parameter::int(&name, &format!("Count{p}"), p, 0, 100, 1));
            category.push(Parameter::float(
                &name,
                &format!("Gain{p}"),
                p as f64,
                0.0,
                10.0,
                0.5,
                0.1,
            ));
        }
        set.categories.push(category);
    }
    set
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_encode_single(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_parameter");
    for (label, parameter) in [
        ("bool", make_bool()),
        ("float", make_float()),
        ("color", make_color()),
        ("picker", make_picker()),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(label), &parameter, |b, p| {
            b.iter(|| encode_parameter(black_box(p)).unwrap());
        });
    }
    group.finish();
}

fn bench_encode_set(c: &mut Criterion) {
    let set = make_realistic_set();
    c.bench_function("encode_set_60_parameters", |b| {
        b.iter(|| encode_set(black_box(&set)).unwrap());
    });
}

fn bench_decode_set(c: &mut Criterion) {
    let bytes = encode_set(&make_realistic_set()).unwrap();
    c.bench_function("decode_set_60_parameters", |b| {
        b.iter(|| decode_set(black_box(&bytes)).unwrap());
    });
}

fn bench_roundtrip_set(c: &mut Criterion) {
    let set = make_realistic_set();
    c.bench_function("roundtrip_set_60_parameters", |b| {
        b.iter(|| {
            let bytes = encode_set(black_box(&set)).unwrap();
            decode_set(&bytes).unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_encode_single,
    bench_encode_set,
    bench_decode_set,
    bench_roundtrip_set
);
criterion_main!(benches);
