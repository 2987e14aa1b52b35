use criterion::{criterion_group, criterion_main, Criterion};
use rgview::virtual_list::VirtualList;
use std::hint::black_box;

fn linear_visible(heights: &[f32], scroll_top: f32, viewport_height: f32) -> (usize, usize) {
    let bottom = scroll_top + viewport_height;
    let mut start = usize::MAX;
    let mut end = 0;
    let mut y = 0.0;
    for (i, &h) in heights.iter().enumerate() {
        if y + h > scroll_top && y < bottom {
            if start == usize::MAX {
                start = i;
            }
            end = i + 1;
        }
        y += h;
    }
    (start, end)
}

fn bench_visible_range(c: &mut Criterion) {
    let heights: Vec<f32> = (0..50_000).map(|i| 20.0 + ((i * 37) % 180) as f32).collect();
    let list = VirtualList::from_heights(heights.iter().copied());
    let total = list.total_height();

    let mut group = c.benchmark_group("visible_range");

    group.bench_function("binary_search", |b| {
        let mut y = 0.0f32;
        b.iter(|| {
            y = (y + 7919.0) % total;
            black_box(list.visible_bounds(black_box(y), 900.0))
        })
    });

    group.bench_function("linear_reference", |b| {
        let mut y = 0.0f32;
        b.iter(|| {
            y = (y + 7919.0) % total;
            black_box(linear_visible(&heights, black_box(y), 900.0))
        })
    });

    group.finish();
}

criterion_group!(benches, bench_visible_range);
criterion_main!(benches);
