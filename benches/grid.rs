//! Criterion benchmarks for the move fold and frame rendering.
//!
//! Run with:
//!   cargo bench
//!
//! Results are saved to target/criterion/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use reachgrid::prelude::*;

fn make_world(grid_number: u32) -> GridWorld {
    let n = grid_number as i32;
    let mut world = GridWorld::new(grid_number);
    world.reset_from_map(&GameMap {
        start: Cell::new(0, 0),
        goals: vec![Cell::new(n - 1, n - 1), Cell::new(0, n - 1), Cell::new(n - 1, 0)],
        blocks: (1..n - 1).map(|i| Cell::new(i, n / 2)).collect(),
    });
    world
}

/// One key press: fold, then a full redraw.
fn bench_fold_and_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("fold_render");

    for size in [10u32, 20, 40].iter() {
        group.throughput(Throughput::Elements((*size * *size) as u64));

        group.bench_with_input(BenchmarkId::new("draw_list", size), size, |b, &size| {
            let mut world = make_world(size);
            let mut moves = MovePipeline::new();
            let mut surface = DrawList::new(500.0, 500.0);
            let mut i = 0usize;

            b.iter(|| {
                let dir = Direction::ALL[i % 4];
                i += 1;
                let step = moves.fold(&mut world, dir);
                render(&world, &mut surface);
                black_box(world.is_goal_reached(step.to))
            });
        });
    }

    group.finish();
}

fn bench_beliefs(c: &mut Criterion) {
    let mut group = c.benchmark_group("beliefs");

    group.bench_function("update_beliefs", |b| {
        let mut world = make_world(10);
        let weights = [0.2, 0.5, 0.3];

        b.iter(|| black_box(world.update_beliefs(black_box(&weights))));
    });

    group.finish();
}

criterion_group!(benches, bench_fold_and_render, bench_beliefs);

criterion_main!(benches);
