#![allow(missing_docs)]

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tasklist_core::{Task, TaskId, reconcile};

fn build_snapshots(len: usize) -> (Vec<Task>, Vec<Task>) {
    let old: Vec<Task> = (0..len)
        .map(|idx| Task {
            id: TaskId(i64::try_from(idx).unwrap_or(i64::MAX)),
            title: format!("task {idx}"),
            details: String::new(),
            due: None,
        })
        .collect();

    // Rotate a tenth of the list, drop every seventh item and rename every fifth.
    let mut new: Vec<Task> = old
        .iter()
        .enumerate()
        .filter(|(idx, _)| idx % 7 != 3)
        .map(|(idx, task)| {
            let mut task = task.clone();
            if idx % 5 == 0 {
                task.title.push_str(" (edited)");
            }
            task
        })
        .collect();
    let shift = new.len() / 10;
    new.rotate_left(shift);
    (old, new)
}

fn reconcile_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");
    for &len in &[16usize, 128, 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            b.iter_batched(
                || build_snapshots(len),
                |(old, new)| {
                    black_box(reconcile(&old, &new));
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, reconcile_benchmark);
criterion_main!(benches);
