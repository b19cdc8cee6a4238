//! NOP round-trip cost through the reactor.
//!
//! Each iteration spawns one task that awaits `NOPS` no-op operations and
//! drives the loop until nothing is outstanding, so the figure covers
//! arming, push, submit, wait, token resolution and one frame poll per
//! completion.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use ringside::{Reactor, ScriptedRing, SetupFlags, Task};

const NOPS: usize = 64;

fn spawn_nop_chain(reactor: &Reactor) {
    let io = reactor.handle();
    let spawned = reactor.spawn(Task::new(async move {
        for _ in 0..NOPS {
            io.nop().await?;
        }
        Ok(())
    }));
    assert!(spawned.is_ok());
}

fn bench_scripted(c: &mut Criterion) {
    let mut group = c.benchmark_group("nop_round_trip");
    group.throughput(Throughput::Elements(NOPS as u64 + 1));

    group.bench_function("scripted", |b| {
        b.iter_batched(
            || {
                let reactor = Reactor::with_ring(Box::new(ScriptedRing::new(8)));
                spawn_nop_chain(&reactor);
                reactor
            },
            |reactor| black_box(reactor.run()),
            BatchSize::SmallInput,
        )
    });

    // Kernel ring is set up once; skipped where io_uring is unavailable.
    if let Ok(reactor) = Reactor::new(8, SetupFlags::NONE) {
        group.bench_function("io_uring", |b| {
            b.iter(|| {
                spawn_nop_chain(&reactor);
                black_box(reactor.run())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_scripted);
criterion_main!(benches);
