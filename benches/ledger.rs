use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use point_ledger::{Operation, PointService, Points, UserId};
use tokio::runtime::Runtime;

/// Generates operation sequences that never fail when applied in order.
///
/// Pattern per user (repeating):
/// 1. Charge 2000
/// 2. Charge 1000
/// 3. Use 1500
///
/// Each cycle adds 1500, so a user stays far below the maximum balance
/// for the sizes benchmarked here.
pub struct OpGenerator {
    num_users: UserId,
    ops_per_user: u32,
    current_user: UserId,
    current_step: u32,
}

impl OpGenerator {
    pub fn new(num_users: UserId, ops_per_user: u32) -> Self {
        Self {
            num_users,
            ops_per_user,
            current_user: 1,
            current_step: 0,
        }
    }
}

impl Iterator for OpGenerator {
    type Item = Operation;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_user > self.num_users {
            return None;
        }

        let user = self.current_user;
        let op = match self.current_step % 3 {
            0 => Operation::Charge {
                user,
                amount: Points::new(2_000),
                timestamp: 0,
            },
            1 => Operation::Charge {
                user,
                amount: Points::new(1_000),
                timestamp: 0,
            },
            _ => Operation::Use {
                user,
                amount: Points::new(1_500),
                timestamp: 0,
            },
        };

        self.current_step += 1;
        if self.current_step >= self.ops_per_user {
            self.current_step = 0;
            self.current_user += 1;
        }

        Some(op)
    }
}

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build runtime")
}

fn bench_sequential(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("sequential");

    for count in [1_000u32, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                rt.block_on(async {
                    let service: PointService = PointService::default();
                    for op in OpGenerator::new(1, count) {
                        let _ = black_box(service.apply(op).await);
                    }
                    service
                })
            });
        });
    }

    group.finish();
}

fn bench_run(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("run");

    // Same total, spread over more users means less contention per lock
    for (users, ops_per) in [(1, 10_000), (10, 1_000), (1_000, 10)] {
        let label = format!("{users}u_{ops_per}op");
        group.bench_with_input(
            BenchmarkId::from_parameter(&label),
            &(users, ops_per),
            |b, &(users, ops_per)| {
                b.iter(|| {
                    rt.block_on(async {
                        let service: Arc<PointService> = Arc::new(PointService::default());
                        let ops = OpGenerator::new(users, ops_per);
                        black_box(service.run(tokio_stream::iter(ops)).await)
                    })
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_sequential, bench_run);
criterion_main!(benches);
