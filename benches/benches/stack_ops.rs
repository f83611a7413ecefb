// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use understory_stack::{Key, Stack};

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }
}

/// Parent choices for `n` pushes: `None` for a root, otherwise an index into earlier pushes.
fn gen_parents(n: usize, root_every: usize) -> Vec<Option<usize>> {
    let mut rng = Rng::new(0xCAFE_F00D_DEAD_BEEF);
    (0..n)
        .map(|i| {
            if i == 0 || rng.below(root_every) == 0 {
                None
            } else {
                Some(rng.below(i))
            }
        })
        .collect()
}

fn build(parents: &[Option<usize>]) -> (Stack<u32>, Vec<Key>) {
    let mut stack = Stack::with_capacity(parents.len());
    let mut keys = Vec::with_capacity(parents.len());
    for (i, p) in parents.iter().enumerate() {
        let key = stack.push(p.map(|p| keys[p]), i as u32).unwrap();
        keys.push(key);
    }
    (stack, keys)
}

fn bench_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("push");
    for &n in &[64usize, 512, 4096] {
        group.throughput(Throughput::Elements(n as u64));
        let flat = vec![None; n];
        group.bench_function(format!("flat_n{n}"), |b| {
            b.iter(|| black_box(build(&flat)));
        });
        let tree = gen_parents(n, 8);
        group.bench_function(format!("tree_n{n}"), |b| {
            b.iter(|| black_box(build(&tree)));
        });
    }
    group.finish();
}

fn bench_teardown(c: &mut Criterion) {
    let mut group = c.benchmark_group("teardown");
    for &n in &[64usize, 512, 4096] {
        let tree = gen_parents(n, 8);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("top_down_n{n}"), |b| {
            b.iter_batched(
                || build(&tree).0,
                |mut stack| {
                    while let Some(top) = stack.try_peek() {
                        black_box(stack.remove(top).unwrap());
                    }
                },
                BatchSize::SmallInput,
            );
        });
        group.bench_function(format!("subtree_walk_n{n}"), |b| {
            let (stack, keys) = build(&tree);
            b.iter(|| {
                let total: usize = keys.iter().map(|&k| stack.subtree(k).len()).sum();
                black_box(total)
            });
        });
    }
    group.finish();
}

fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("churn");
    let n = 1024;
    let tree = gen_parents(n, 4);
    group.throughput(Throughput::Elements(n as u64));
    group.bench_function("pop_push_leaves", |b| {
        b.iter_batched(
            || build(&tree),
            |(mut stack, keys)| {
                let mut rng = Rng::new(0xBADC_F00D_1234_5678);
                for _ in 0..n {
                    let k = keys[rng.below(keys.len())];
                    if stack.contains(k) && !stack.has_descendants(k) {
                        let v = stack.remove(k).unwrap();
                        let parent = stack.try_peek();
                        black_box(stack.push(parent, v).unwrap());
                    }
                }
            },
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_push, bench_teardown, bench_churn);
criterion_main!(benches);
