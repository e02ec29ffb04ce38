use criterion::{black_box, criterion_group, criterion_main, Criterion};

use embra_kernel::{Completion, DispatchQueue, EventQueue, QueueConfig, SingleThreading};

fn dispatch_throughput(c: &mut Criterion) {
    let queue = DispatchQueue::<SingleThreading>::with_config(QueueConfig::builder().capacity(1024).build());

    c.bench_function("enqueue_process_1000", |b| {
        b.iter(|| {
            for i in 0..1000u32 {
                queue
                    .enqueue(move || {
                        black_box(i);
                        Completion::Done
                    })
                    .expect("queue has room");
            }
            while queue.process().is_some() {}
        })
    });
}

fn event_signal_throughput(c: &mut Criterion) {
    let queue: EventQueue<String, u32, SingleThreading> =
        EventQueue::with_config(QueueConfig::builder().capacity(1024).build());
    queue.on("bench", |time, value: &u32| {
        black_box((time, *value));
    });

    c.bench_function("signal_process_1000", |b| {
        b.iter(|| {
            for i in 0..1000u32 {
                queue.signal("bench", i).expect("queue has room");
            }
            while queue.process().is_some() {}
        })
    });
}

criterion_group!(benches, dispatch_throughput, event_signal_throughput);
criterion_main!(benches);
