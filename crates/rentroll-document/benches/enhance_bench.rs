// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for raster enhancement at each default OCR resolution,
// on a synthetic faded page.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, GrayImage, Luma};

use rentroll_document::ImageEnhancer;

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Gray "text rows" on off-white paper, sized like a quarter page at `dpi`.
fn synthetic_page(dpi: u32) -> DynamicImage {
    let width = dpi * 17 / 4;
    let height = dpi * 11 / 2;
    let img = GrayImage::from_fn(width, height, |x, y| {
        let in_row = (y / (dpi / 10).max(1)) % 3 == 0;
        let in_glyph = (x / (dpi / 30).max(1)) % 2 == 0;
        if in_row && in_glyph { Luma([95u8]) } else { Luma([185u8]) }
    });
    DynamicImage::ImageLuma8(img)
}

fn bench_enhance(c: &mut Criterion) {
    let mut group = c.benchmark_group("enhance");
    group.sample_size(10);
    for dpi in [150u32, 200, 300] {
        let page = synthetic_page(dpi);
        group.bench_function(format!("{dpi} dpi"), |b| {
            b.iter(|| black_box(ImageEnhancer::enhance(black_box(&page), dpi)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_enhance);
criterion_main!(benches);
