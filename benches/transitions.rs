//! Benchmarks for the buffer transition policy

use brr::gpu::{Capability, UsageState};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_transition_table(c: &mut Criterion) {
    let capabilities = [Capability::HostRead, Capability::HostWrite, Capability::Storage];

    c.bench_function("transition_table", |b| {
        b.iter(|| {
            let mut legal = 0;
            for state in UsageState::ALL {
                for cap in capabilities {
                    if black_box(state).transition(black_box(cap)).is_ok() {
                        legal += 1;
                    }
                }
            }
            legal
        });
    });
}

fn bench_write_storage_read_cycle(c: &mut Criterion) {
    c.bench_function("write_storage_read_cycle", |b| {
        b.iter(|| {
            let mut state = UsageState::MapRead;
            for cap in [Capability::HostWrite, Capability::Storage, Capability::HostRead] {
                match state.transition(black_box(cap)) {
                    Ok(t) => state = t.target,
                    Err(_) => break,
                }
            }
            state
        });
    });
}

criterion_group!(benches, bench_transition_table, bench_write_storage_read_cycle);
criterion_main!(benches);
