use crate::constants::SEARCH_BATCH;
use crate::pow::{leading_zero_hex_digits, seeded_digest};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Brute-force the smallest proof for `fingerprint`, counting up from zero.
///
/// `stop` is polled once per [`SEARCH_BATCH`] candidates; returns `None` if
/// it was raised before a proof turned up.
pub fn search_proof(fingerprint: &[u8], difficulty: u32, stop: &AtomicBool) -> Option<u64> {
    let seeded = Sha256::new_with_prefix(fingerprint);
    let started = Instant::now();
    let mut proof = 0u64;
    loop {
        if proof % SEARCH_BATCH == 0 && stop.load(Ordering::Relaxed) {
            debug!(tried = proof, "proof search cancelled");
            return None;
        }
        if leading_zero_hex_digits(&seeded_digest(&seeded, proof)) >= difficulty {
            info!(proof, elapsed = ?started.elapsed(), "proof found");
            return Some(proof);
        }
        proof = proof.checked_add(1)?;
    }
}

/// Parallel variant of [`search_proof`].
///
/// Candidates are scanned window by window with `find_first`, so the
/// result is the same smallest proof the serial search would return.
pub fn search_proof_parallel(
    fingerprint: &[u8],
    difficulty: u32,
    stop: &AtomicBool,
) -> Option<u64> {
    let seeded = Sha256::new_with_prefix(fingerprint);
    let started = Instant::now();
    let window = SEARCH_BATCH.saturating_mul(rayon::current_num_threads() as u64);
    let mut start = 0u64;
    loop {
        if stop.load(Ordering::Relaxed) {
            debug!(tried = start, "proof search cancelled");
            return None;
        }
        let end = start.saturating_add(window);
        let found = (start..end)
            .into_par_iter()
            .find_first(|p| leading_zero_hex_digits(&seeded_digest(&seeded, *p)) >= difficulty);
        if let Some(proof) = found {
            info!(proof, elapsed = ?started.elapsed(), "proof found");
            return Some(proof);
        }
        if end == u64::MAX {
            return None;
        }
        start = end;
    }
}
