use std::sync::Arc;
use std::time::Instant;

use criterion::{criterion_group, BenchmarkId, Criterion};
use funnel::{Ack, Consumer, OverflowPolicy, Reply, StreamFault, TokioExecutor};
use tokio::sync::Semaphore;

/// Discards items as fast as they come and opens the semaphore on the
/// terminal signal, so the bench can await full drainage.
struct Sink {
    done: Arc<Semaphore>,
}

impl Consumer<u64> for Sink {
    fn on_item(&mut self, _item: u64) -> Reply {
        Reply::Now(Ack::Continue)
    }

    fn on_error(&mut self, _fault: Arc<StreamFault>) {
        self.done.add_permits(1);
    }

    fn on_complete(&mut self) {
        self.done.add_permits(1);
    }
}

fn push_and_drain(c: &mut Criterion) {
    let _ = env_logger::builder().parse_default_env().try_init();
    let mut group = c.benchmark_group("push_and_drain");

    for (name, policy) in [
        ("unbounded", OverflowPolicy::Unbounded),
        ("drop_new", OverflowPolicy::DropNew { capacity: 1024 }),
        ("back_pressure", OverflowPolicy::BackPressure { capacity: 1024 }),
    ] {
        group.bench_function(BenchmarkId::new("policy", name), |bencher| {
            let mut bencher = bencher.to_async(
                tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(4)
                    .enable_all()
                    .build()
                    .expect("can make a tokio runtime"),
            );
            bencher.iter_custom(|iterations| async move {
                let done = Arc::new(Semaphore::new(0));
                let subscriber = funnel::buffer(
                    Sink { done: done.clone() },
                    policy,
                    Arc::new(TokioExecutor::current()),
                )
                .expect("bench policies are valid");

                let start = Instant::now();
                for item in 0..iterations {
                    let _ack = subscriber.on_next(Some(item)).await;
                }
                subscriber.on_complete();
                let _permit = done
                    .acquire()
                    .await
                    .expect("the sink signals completion");
                start.elapsed()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, push_and_drain);
