use criterion::{black_box, criterion_group, criterion_main, Criterion};
use payment_relay::domain::HealthSnapshot;
use payment_relay::routing::route;

fn bench_route(c: &mut Criterion) {
    c.bench_function("route_healthy_pair", |b| {
        let default = HealthSnapshot::new(false, 120);
        let fallback = HealthSnapshot::new(false, 40);
        b.iter(|| black_box(route(black_box(&default), black_box(&fallback))))
    });

    c.bench_function("route_failing_default", |b| {
        let default = HealthSnapshot::new(true, 0);
        let fallback = HealthSnapshot::new(false, 40);
        b.iter(|| black_box(route(black_box(&default), black_box(&fallback))))
    });

    c.bench_function("route_latency_boundary", |b| {
        let default = HealthSnapshot::new(false, 90);
        let fallback = HealthSnapshot::new(false, 40);
        b.iter(|| black_box(route(black_box(&default), black_box(&fallback))))
    });
}

criterion_group!(benches, bench_route);
criterion_main!(benches);
