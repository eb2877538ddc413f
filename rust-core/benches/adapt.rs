use criterion::{black_box, criterion_group, criterion_main, Criterion};
use jacked::audio::chunks::{adapt_channels, BlockRanges};
use ndarray::Array2;

fn bench_adapt(c: &mut Criterion) {
    // 3 s of 48 kHz audio
    let stereo = Array2::<f32>::from_shape_fn((2, 144_000), |(ch, i)| (ch + i) as f32 * 1e-5);
    let surround = Array2::<f32>::from_shape_fn((6, 144_000), |(ch, i)| (ch * i) as f32 * 1e-6);

    c.bench_function("adapt stereo -> 4 outputs", |b| {
        b.iter(|| adapt_channels(black_box(stereo.view()), 4, false))
    });

    c.bench_function("mix 5.1 -> stereo", |b| {
        b.iter(|| adapt_channels(black_box(surround.view()), 2, false))
    });

    c.bench_function("period ranges", |b| {
        b.iter(|| BlockRanges::new(black_box(144_000), 256).count())
    });
}

criterion_group!(benches, bench_adapt);
criterion_main!(benches);
