use std::io::Cursor;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{ImageOutputFormat, Rgb, RgbImage};
use pasture::indices::sample_pixels;
use pasture::segmentation::VegetationMask;
use pasture::*;

fn scene(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        if (x / 16 + y / 16) % 5 == 0 {
            Rgb([139, 69, 19])
        } else {
            Rgb([30 + (x % 40) as u8, 110 + (y % 60) as u8, 40 + ((x + y) % 30) as u8])
        }
    })
}

fn png(image: &RgbImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .unwrap();
    bytes
}

fn bench_full_analysis(c: &mut Criterion) {
    let bytes = png(&scene(512, 384));
    let serial = Analyzer::new(AnalysisConfig::default().with_parallel(false)).unwrap();
    let parallel = Analyzer::default();

    c.bench_function("analyze_512x384_serial", |b| {
        b.iter(|| black_box(serial.analyze(AnalysisRequest::new(black_box(&bytes), "image/png")).unwrap()))
    });
    c.bench_function("analyze_512x384_parallel", |b| {
        b.iter(|| black_box(parallel.analyze(AnalysisRequest::new(black_box(&bytes), "image/png")).unwrap()))
    });
}

fn bench_sampling(c: &mut Criterion) {
    let image = scene(512, 512);

    c.bench_function("sample_pixels_512", |b| {
        b.iter(|| black_box(sample_pixels(black_box(&image), false)))
    });
}

fn bench_segmentation(c: &mut Criterion) {
    let image = scene(512, 512);
    let samples = sample_pixels(&image, false);

    c.bench_function("segment_512", |b| {
        b.iter(|| black_box(VegetationMask::segment(512, 512, black_box(&samples), false)))
    });
}

criterion_group!(benches, bench_full_analysis, bench_sampling, bench_segmentation);
criterion_main!(benches);
