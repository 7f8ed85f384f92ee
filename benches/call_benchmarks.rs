//! Call-path benchmarks against the reference engine.
//!
//! - Frames: acquiring and filling argument frames
//! - Pointer calls: generated wrappers with and without arguments
//! - Dynamic calls: variant-based calls and host methods reached through them
//! - Variants: conversions through the engine's tables
//!
//! ## Profiling with Puffin
//!
//! ```bash
//! cargo bench --bench call_benchmarks --features profile-with-puffin
//! ```

use std::hint::black_box;
use std::sync::Once;

use criterion::{Criterion, criterion_group, criterion_main};
use gdx::frame::Frame;
use gdx::prelude::*;

#[cfg(feature = "profile-with-puffin")]
static FRAME_VIEW: std::sync::OnceLock<puffin::GlobalFrameView> = std::sync::OnceLock::new();

#[cfg(feature = "profile-with-puffin")]
fn setup_profiler() {
    puffin::set_scopes_on(true);
    FRAME_VIEW.get_or_init(puffin::GlobalFrameView::default);
}

#[cfg(not(feature = "profile-with-puffin"))]
fn setup_profiler() {}

#[cfg(feature = "profile-with-puffin")]
fn end_profiling_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}

#[cfg(not(feature = "profile-with-puffin"))]
fn end_profiling_frame() {}

#[derive(HostClass)]
#[class(base = RefCounted, init, register = Accumulator::register_methods)]
struct Accumulator {
    base: Base<RefCounted>,
    total: i64,
}

impl Accumulator {
    fn register_methods(builder: &mut ClassBuilder<Self>) {
        builder.method("add", |this: &mut Accumulator, value: i64| {
            this.total += value;
            this.total
        });
    }
}

struct Benchmarks;

impl ExtensionLibrary for Benchmarks {
    fn on_level_init(level: InitializationLevel) {
        if level == InitializationLevel::Scene {
            register_class::<Accumulator>().expect("register Accumulator");
        }
    }
}

gdx::entry_point!(gdx_benchmarks_init, Benchmarks);

fn boot() {
    static BOOT: Once = Once::new();
    BOOT.call_once(|| {
        setup_profiler();
        gdx_testengine::boot(gdx_benchmarks_init).expect("reference engine boots");
    });
}

fn frame_benchmarks(c: &mut Criterion) {
    boot();
    let mut group = c.benchmark_group("frame");

    group.bench_function("acquire_empty", |b| {
        b.iter(|| {
            let frame = Frame::acquire(black_box(0));
            black_box(frame.arg_count())
        });
    });

    group.bench_function("push_four_ints", |b| {
        b.iter(|| {
            let mut frame = Frame::acquire(4);
            for value in 0..4i64 {
                frame.push(&black_box(value));
            }
            black_box(frame.as_pointer_array());
        });
    });

    group.bench_function("nested_frames", |b| {
        b.iter(|| {
            let mut outer = Frame::acquire(2);
            outer.push(&1i64);
            let mut inner = Frame::acquire(2);
            inner.push(&Vector3::ONE);
            black_box((outer.pushed(), inner.pushed()))
        });
    });

    group.finish();
}

fn ptrcall_benchmarks(c: &mut Criterion) {
    boot();
    let mut group = c.benchmark_group("ptrcall");

    let mut animation = Animation::new_gd();
    animation.add_track(gdx::classes::animation::TrackType::TYPE_VALUE, -1);
    group.bench_function("no_args", |b| {
        b.iter(|| {
            let count = animation.get_track_count();
            end_profiling_frame();
            black_box(count)
        });
    });

    group.bench_function("scalar_args", |b| {
        b.iter(|| black_box(animation.track_get_key_count(black_box(0))));
    });

    let mut material = ParticleProcessMaterial::new_gd();
    group.bench_function("vector_round_trip", |b| {
        b.iter(|| {
            material.set_emission_box_extents(black_box(Vector3::new(1.0, 2.0, 3.0)));
            black_box(material.get_emission_box_extents())
        });
    });

    group.bench_function("utility", |b| {
        b.iter(|| black_box(gdx::utilities::lerpf(black_box(0.0), 10.0, 0.5)));
    });

    group.finish();
}

fn dynamic_call_benchmarks(c: &mut Criterion) {
    boot();
    let mut group = c.benchmark_group("dynamic");

    let accumulator =
        gdx::registrar::Instance::<Accumulator>::new().expect("Accumulator constructs");
    let mut object: Gd<Object> = accumulator.clone().upcast();
    let method = StringName::from("add");
    let argument = 1i64.to_variant();
    group.bench_function("host_method", |b| {
        b.iter(|| {
            let result = object.call(&method, std::slice::from_ref(&argument));
            end_profiling_frame();
            black_box(result)
        });
    });

    let is_class = GString::from("RefCounted");
    group.bench_function("engine_method", |b| {
        b.iter(|| black_box(object.is_class(&is_class)));
    });

    group.finish();
}

fn variant_benchmarks(c: &mut Criterion) {
    boot();
    let mut group = c.benchmark_group("variant");

    group.bench_function("int_round_trip", |b| {
        b.iter(|| {
            let variant = black_box(42i64).to_variant();
            black_box(variant.try_to::<i64>())
        });
    });

    let vector = Variant::from(Vector2::new(1.5, 2.5));
    group.bench_function("strict_convert", |b| {
        b.iter(|| black_box(vector.convert(VariantType::Vector2i)));
    });

    let text = Variant::from("benchmark");
    group.bench_function("stringify", |b| {
        b.iter(|| black_box(text.stringify()));
    });

    group.finish();
}

criterion_group!(
    benches,
    frame_benchmarks,
    ptrcall_benchmarks,
    dynamic_call_benchmarks,
    variant_benchmarks
);

criterion_main!(benches);
