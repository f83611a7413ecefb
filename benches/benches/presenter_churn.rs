// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use understory_presenter::{
    Args, CallbackError, Controller, ControllerFactory, Created, NodeId, PresentContext,
    PresentFlags, Presenter, UnitKind, no_args,
};

struct Idle;
impl Controller for Idle {}

struct Idles;
impl ControllerFactory for Idles {
    fn create(
        &mut self,
        _kind: &UnitKind,
        _context: PresentContext,
        _args: Args,
    ) -> Result<Created, CallbackError> {
        Ok(Created::new(Idle))
    }
}

fn chain(presenter: &Presenter, depth: usize) -> NodeId {
    let root = presenter
        .present(None, "root", no_args(), PresentFlags::empty())
        .unwrap();
    let mut parent = root;
    for _ in 1..depth {
        parent = presenter
            .present(Some(parent), "child", no_args(), PresentFlags::empty())
            .unwrap();
    }
    root
}

fn bench_present(c: &mut Criterion) {
    let mut group = c.benchmark_group("present");
    for &n in &[16usize, 128] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("siblings_n{n}"), |b| {
            b.iter(|| {
                let presenter = Presenter::new(Idles);
                for _ in 0..n {
                    black_box(
                        presenter
                            .present(None, "screen", no_args(), PresentFlags::empty())
                            .unwrap(),
                    );
                }
                presenter
            });
        });
        group.bench_function(format!("chain_n{n}"), |b| {
            b.iter(|| {
                let presenter = Presenter::new(Idles);
                black_box(chain(&presenter, n));
                presenter
            });
        });
    }
    group.finish();
}

fn bench_dismiss(c: &mut Criterion) {
    let mut group = c.benchmark_group("dismiss");
    for &n in &[16usize, 128] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("cascade_chain_n{n}"), |b| {
            b.iter_batched(
                || {
                    let presenter = Presenter::new(Idles);
                    let root = chain(&presenter, n);
                    (presenter, root)
                },
                |(presenter, root)| {
                    presenter.dismiss(root).unwrap();
                    presenter
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_commands(c: &mut Criterion) {
    let presenter = Presenter::new(Idles);
    chain(&presenter, 64);
    c.bench_function("command_unhandled_depth64", |b| {
        b.iter(|| black_box(presenter.invoke_command("noop", &())));
    });
}

criterion_group!(benches, bench_present, bench_dismiss, bench_commands);
criterion_main!(benches);
