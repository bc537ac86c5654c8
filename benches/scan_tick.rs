use axishud::engine::ScanEngine;
use axishud::models::{Configuration, Extent};
use axishud::overlay::paint::render;
use axishud::overlay::{Color, Palette};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn engine() -> ScanEngine {
    let mut conf = Configuration::new();
    conf.set_horizontal_speed(7);
    conf.set_vertical_speed(11);
    ScanEngine::new(&conf, None, Extent::new(1080, 1920))
}

fn bench_tick(c: &mut Criterion) {
    let mut engine = engine();
    c.bench_function("tick_1k", |b| {
        b.iter(|| {
            for _ in 0..1_000 {
                black_box(engine.tick());
            }
        })
    });
}

fn bench_frame(c: &mut Criterion) {
    let palette = Palette::new(Color::HOLO_BLUE);
    let mut engine = engine();
    engine.activate();
    c.bench_function("tick_and_render_second_sweep", |b| {
        b.iter(|| {
            engine.tick();
            black_box(render(&engine, &palette))
        })
    });
}

criterion_group!(benches, bench_tick, bench_frame);
criterion_main!(benches);
