use criterion::{criterion_group, criterion_main, Criterion};
use ledger_core::{mine, pow, Block, PreviousHash, Transaction};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::atomic::AtomicBool;

fn sample_block() -> Block {
    let mut rng = StdRng::seed_from_u64(42);
    let transactions = (0..10)
        .map(|i| Transaction::new(format!("alice-{i}"), "bob", rng.gen_range(1u64..10)))
        .collect();
    Block {
        index: 2,
        previous_hash: PreviousHash::Digest("00".repeat(32)),
        proof: 0,
        timestamp: 1_700_000_000.0,
        transactions,
    }
}

fn bench_pow(c: &mut Criterion) {
    let fingerprint = sample_block().fingerprint().expect("fingerprint");
    let stop = AtomicBool::new(false);

    c.bench_function("proof_digest", |b| {
        b.iter(|| pow::proof_digest(&fingerprint, 123_456))
    });
    c.bench_function("search_proof_difficulty_3", |b| {
        b.iter(|| mine::search_proof(&fingerprint, 3, &stop))
    });
    c.bench_function("search_proof_parallel_difficulty_3", |b| {
        b.iter(|| mine::search_proof_parallel(&fingerprint, 3, &stop))
    });
}

criterion_group!(benches, bench_pow);
criterion_main!(benches);
