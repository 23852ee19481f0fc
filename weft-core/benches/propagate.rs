//! Propagation benchmarks.
//!
//! Measures a full settle of a deep chain and of a wide fan-in after a
//! single input mutation.

use criterion::{criterion_group, criterion_main, Criterion};

use weft_core::{Runtime, Value};

fn int(v: &Value) -> i64 {
    v.as_int().unwrap_or(0)
}

fn chain(depth: usize) -> (Runtime, weft_core::Cell) {
    let rt = Runtime::new();
    let root = rt.input(0i64);
    let mut prev = root;
    for _ in 0..depth {
        prev = rt
            .formula(&[prev], |v| Ok(Value::Int(int(&v[0]) + 1)))
            .unwrap();
    }
    (rt, root)
}

fn fan_in(width: usize) -> (Runtime, weft_core::Cell) {
    let rt = Runtime::new();
    let root = rt.input(0i64);
    let branches: Vec<_> = (0..width)
        .map(|i| {
            let offset = i as i64;
            rt.formula(&[root], move |v| Ok(Value::Int(int(&v[0]) + offset)))
                .unwrap()
        })
        .collect();
    rt.formula(&branches, |vals| {
        Ok(Value::Int(vals.iter().map(int).sum()))
    })
    .unwrap();
    (rt, root)
}

fn bench_propagation(c: &mut Criterion) {
    let (rt, root) = chain(100);
    let mut value = 0i64;
    c.bench_function("settle chain depth 100", |b| {
        b.iter(|| {
            value += 1;
            rt.set(root, value).unwrap();
        })
    });

    let (rt, root) = fan_in(100);
    let mut value = 0i64;
    c.bench_function("settle fan-in width 100", |b| {
        b.iter(|| {
            value += 1;
            rt.set(root, value).unwrap();
        })
    });
}

criterion_group!(benches, bench_propagation);
criterion_main!(benches);
