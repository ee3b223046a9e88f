use criterion::{criterion_group, criterion_main, Criterion};
use fisheye_unwrap::{
    remap_serial, Canvas, DiscGeometry, Engine, IndexTable, Placement, Region, Remapper,
    SourceDisc, TileGrid, ViewAngles, ViewParameters,
};
use image::{Rgb, RgbImage};

fn frame() -> RgbImage {
    RgbImage::from_fn(1024, 1024, |x, y| Rgb([x as u8, y as u8, (x ^ y) as u8]))
}

fn view() -> ViewParameters {
    ViewParameters::from_angles(ViewAngles::new(30.0, 45.0, 95.0)).unwrap()
}

fn build_table(c: &mut Criterion) {
    let disc = DiscGeometry::new(1024, 1024).unwrap();
    let view = view();
    c.bench_function("build_table_640x480", |b| {
        b.iter(|| IndexTable::build(&view, &disc, 640, 480))
    });
}

fn remap(c: &mut Criterion) {
    let frame = frame();
    let source = SourceDisc::from_image(&frame).unwrap();
    let disc = DiscGeometry::new(1024, 1024).unwrap();
    let table = IndexTable::build(&view(), &disc, 640, 480);
    let mut canvas = Canvas::new(640, 480, 3);
    c.bench_function("remap_serial_640x480", |b| {
        b.iter(|| remap_serial(&source, &[Placement::new(&table, [0, 0])], &mut canvas))
    });
    let remapper = Remapper::new(TileGrid::quadrants()).unwrap();
    c.bench_function("remap_quadrants_640x480", |b| {
        b.iter(|| remapper.apply(&source, &table, &mut canvas))
    });
}

fn engine_frame(c: &mut Criterion) {
    let frame = frame();
    let mut engine = Engine::new(&Default::default()).unwrap();
    c.bench_function("engine_three_views", |b| {
        b.iter(|| engine.remap_image(&frame, Region::whole(1024, 1024)))
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = build_table, remap, engine_frame
);
criterion_main!(benches);
