//! Hot-path benchmarks for the texture pipeline: resize, mip-chain
//! generation, contrast-adaptive sharpening and block compression, in
//! the style of the donor's `pipeline_adversarial` bench.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use texture_pipeline::color::Rgba32F;
use texture_pipeline::compression::{DxtCompression, PassthroughCompression, TextureCompression};
use texture_pipeline::format::{GammaSpace, SourceFlags, SourceFormat};
use texture_pipeline::mipgen::contrast_adaptive_sharpen_2d;
use texture_pipeline::resize::{resize_mip_2d, ResizeFilter, ResizeMip2DArgs};
use texture_pipeline::source::TextureSource;

fn checkerboard_rgba8(size: u32) -> TextureSource {
    let props = texture_pipeline::source::TextureSourceProperties::texture_2d_with_mip_chain(
        [size, size],
        SourceFormat::Rgba8,
        GammaSpace::Linear,
    );
    let mut src = TextureSource::construct(props, None);
    {
        let mut w = src.writer_scope();
        for (i, b) in w.bytes_mut().iter_mut().enumerate() {
            *b = if (i / 4) % 2 == 0 { 255 } else { 0 };
        }
    }
    src
}

fn bench_resize(c: &mut Criterion) {
    let mut group = c.benchmark_group("texture_pipeline/resize");

    for size in [64u32, 256, 512, 1024] {
        group.throughput(Throughput::Bytes((size * size * 4) as u64));
        group.bench_with_input(BenchmarkId::new("mitchell_half", size), &size, |bencher, &size| {
            let src = vec![128u8; (size * size * 4) as usize];
            let half = size / 2;
            let mut dst = vec![0u8; (half * half * 4) as usize];
            let args = ResizeMip2DArgs {
                dims_in: [size, size, 1],
                format_in: SourceFormat::Rgba8,
                flags_in: SourceFlags::empty(),
                gamma_in: GammaSpace::Linear,
                dims_out: [half, half, 1],
                format_out: SourceFormat::Rgba8,
                flags_out: SourceFlags::empty(),
                gamma_out: GammaSpace::Linear,
                filter: ResizeFilter::Mitchell,
            };
            bencher.iter(|| black_box(resize_mip_2d(&args, &src, &mut dst)));
        });
    }

    group.finish();
}

fn bench_mip_chain_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("texture_pipeline/mip_chain");

    for size in [64u32, 256, 1024] {
        group.bench_with_input(BenchmarkId::new("generate_mip_chain_2d", size), &size, |bencher, &size| {
            bencher.iter_batched(
                || checkerboard_rgba8(size),
                |src| black_box(src.generate_mip_chain_2d()),
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_contrast_adaptive_sharpen(c: &mut Criterion) {
    let mut group = c.benchmark_group("texture_pipeline/cas");

    for size in [64usize, 256, 512] {
        group.bench_with_input(BenchmarkId::new("sharpen_0.5", size), &size, |bencher, &size| {
            let mut samples = vec![Rgba32F::new(0.5, 0.5, 0.5, 1.0); size * size];
            bencher.iter(|| {
                contrast_adaptive_sharpen_2d(&mut samples, size, size, 0.5, GammaSpace::Linear, false, false, 0.5);
                black_box(samples[0])
            });
        });
    }

    group.finish();
}

fn bench_compression(c: &mut Criterion) {
    let mut group = c.benchmark_group("texture_pipeline/compression");

    for size in [64u32, 256, 512] {
        group.throughput(Throughput::Bytes((size * size * 4) as u64));

        group.bench_with_input(BenchmarkId::new("passthrough", size), &size, |bencher, &size| {
            let compressor = PassthroughCompression::new(
                texture_pipeline::format::PixelFormat::Rgba8Unorm,
                SourceFormat::Rgba8,
                GammaSpace::Linear,
            );
            bencher.iter_batched(
                || checkerboard_rgba8(size),
                |src| black_box(compressor.compress(&src).unwrap()),
                criterion::BatchSize::SmallInput,
            );
        });

        group.bench_with_input(BenchmarkId::new("bc1", size), &size, |bencher, &size| {
            let compressor = DxtCompression::bc1(SourceFormat::Rgba8, GammaSpace::Linear);
            bencher.iter_batched(
                || checkerboard_rgba8(size),
                |src| black_box(compressor.compress(&src).unwrap()),
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_resize, bench_mip_chain_generation, bench_contrast_adaptive_sharpen, bench_compression);
criterion_main!(benches);
