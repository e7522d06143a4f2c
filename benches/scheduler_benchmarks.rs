use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use padseq::clock::ManualClock;
use padseq::sequencer::{
    GridSpec, Pattern, RenderOptions, Scheduler, SchedulerConfig, TransportConfig, TransportEngine,
    render_offline,
};
use std::rc::Rc;

/// Benchmark a flush over queues of growing size (half of the items due)
fn bench_scheduler_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler_flush");

    for size in [16usize, 256, 4096] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let clock = Rc::new(ManualClock::new());
            let scheduler = Scheduler::new(clock, SchedulerConfig::default());
            b.iter(|| {
                for i in 0..size {
                    // Spread over 0..0.2s so the 0.1s horizon splits the queue
                    scheduler.schedule(i as f64 * 0.2 / size as f64, |at| {
                        black_box(at);
                    });
                }
                black_box(scheduler.flush());
                scheduler.clear();
            });
        });
    }
    group.finish();
}

/// Benchmark one transport poll cycle (tick + flush) on a fast grid
fn bench_transport_cycle(c: &mut Criterion) {
    c.bench_function("transport_tick_flush_1_64_at_300bpm", |b| {
        let clock = Rc::new(ManualClock::new());
        let scheduler = Scheduler::new(clock.clone(), SchedulerConfig::default());
        let config = TransportConfig::new(300.0, GridSpec::new(8, 64));
        let mut engine = TransportEngine::new(clock.clone(), scheduler, config, |step, at| {
            black_box((step, at));
        });
        engine.start();

        b.iter(|| {
            clock.advance(0.025);
            engine.tick();
            black_box(engine.scheduler().flush());
        });
    });
}

/// Benchmark offline rendering of one 4-bar loop of 16ths
fn bench_offline_render(c: &mut Criterion) {
    let config = TransportConfig::new(128.0, GridSpec::new(4, 16)).with_swing(0.2);
    let mut pattern = Pattern::new(1, "Bench".to_string(), config.grid_spec, 4);
    for bar in 0..4 {
        for step in 0..16 {
            pattern.set(bar, step, step % 4, 0.8);
        }
    }
    let options = RenderOptions {
        duration_sec: 7.5,
        ..Default::default()
    };

    c.bench_function("render_offline_4_bars", |b| {
        b.iter(|| black_box(render_offline(config, pattern.clone(), options)));
    });
}

criterion_group!(
    benches,
    bench_scheduler_flush,
    bench_transport_cycle,
    bench_offline_render
);
criterion_main!(benches);
