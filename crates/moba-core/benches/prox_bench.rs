// ─────────────────────────────────────────────────────────────────────
// MoBa Core — Proximal Operator Benchmark
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────

use criterion::{criterion_group, criterion_main, Criterion};
use moba_core::linop::Fourier;
use moba_core::prox::{
    nonneg_stack, prox_niht_thresh_create, prox_thresh_create, prox_unithresh_create,
    ProximalOperator,
};
use moba_math::multind::CArray;
use moba_math::rand::gaussian_rand;
use moba_types::dims::{AxisSet, Dims, COEFF_DIM, FFT_AXES};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::hint::black_box;

fn maps() -> Dims {
    Dims::from([64, 64, 1, 1, 1, 1, 3])
}

fn bench_nonneg_stack(c: &mut Criterion) {
    let dims = maps();
    let op = nonneg_stack(dims.clone(), COEFF_DIM, &[0, 2], 0.0).unwrap();
    let x = gaussian_rand(&dims, &mut StdRng::seed_from_u64(0));
    let mut y = CArray::zeros(dims.ix());

    c.bench_function("nonneg_stack_64x64x3", |b| {
        b.iter(|| op.apply(1.0, &mut y, black_box(&x)))
    });
}

fn bench_thresholds(c: &mut Criterion) {
    let dims = maps();
    let x = gaussian_rand(&dims, &mut StdRng::seed_from_u64(1));
    let mut y = CArray::zeros(dims.ix());

    let mut group = c.benchmark_group("threshold_64x64x3");
    let soft = prox_thresh_create(dims.clone(), 0.5, AxisSet::single(COEFF_DIM)).unwrap();
    group.bench_function("joint_soft", |b| {
        b.iter(|| soft.apply(1.0, &mut y, black_box(&x)))
    });

    let niht = prox_niht_thresh_create(dims.clone(), 512, AxisSet::single(COEFF_DIM)).unwrap();
    group.bench_function("niht_top512", |b| {
        b.iter(|| niht.apply(1.0, &mut y, black_box(&x)))
    });

    let uni = prox_unithresh_create(
        Box::new(Fourier::new(dims.clone(), FFT_AXES)),
        0.5,
        AxisSet::EMPTY,
    )
    .unwrap();
    group.bench_function("fourier_soft", |b| {
        b.iter(|| uni.apply(1.0, &mut y, black_box(&x)))
    });
    group.finish();
}

criterion_group!(benches, bench_nonneg_stack, bench_thresholds);
criterion_main!(benches);
