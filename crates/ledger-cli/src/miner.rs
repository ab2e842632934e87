//! The miner's fetch, search and submit loop.

use anyhow::{Context, Result};
use ledger_core::mine::{search_proof, search_proof_parallel};
use ledger_core::wire::MineResponse;
use ledger_core::Block;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// What the authority said about a submitted proof.
#[derive(Debug)]
pub enum SubmitOutcome {
    Accepted(MineResponse),
    Rejected(String),
}

/// The two authority calls a miner needs.
pub trait Authority {
    async fn last_block(&self) -> Result<Block>;
    async fn submit_proof(&self, miner_id: &str, proof: u64) -> Result<SubmitOutcome>;
}

#[derive(Clone, Debug)]
pub struct MinerConfig {
    pub miner_id: String,
    pub difficulty: u32,
    /// Spread the search over the rayon pool.
    pub parallel: bool,
    /// First pause after a failed round; doubles up to `max_retry_delay`.
    pub retry_delay: Duration,
    pub max_retry_delay: Duration,
    /// Stop after this many completed rounds (won or rejected).
    pub max_rounds: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MinerReport {
    pub rounds: u64,
    pub coins: u64,
    pub rejections: u64,
    pub failures: u64,
}

enum RoundOutcome {
    Won(MineResponse),
    Rejected(String),
    Cancelled,
}

pub struct MinerAgent<A> {
    authority: A,
    config: MinerConfig,
    stop: Arc<AtomicBool>,
}

impl<A: Authority> MinerAgent<A> {
    pub fn new(authority: A, config: MinerConfig) -> Self {
        Self {
            authority,
            config,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that ends the loop; raising it also abandons an in-flight search.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Mine until stopped or `max_rounds` is reached. Network and decode
    /// errors are logged and retried, never returned.
    pub async fn run(&self) -> MinerReport {
        let mut report = MinerReport::default();
        let mut backoff = self.config.retry_delay;
        info!(miner_id = %self.config.miner_id, "miner started");

        while !self.stop.load(Ordering::Relaxed) {
            if self.config.max_rounds.is_some_and(|max| report.rounds >= max) {
                break;
            }
            match self.round().await {
                Ok(RoundOutcome::Won(forged)) => {
                    report.rounds += 1;
                    report.coins += 1;
                    backoff = self.config.retry_delay;
                    info!(index = forged.index, "* {} *", forged.message);
                    info!("=> You have {} coin[s]", report.coins);
                }
                Ok(RoundOutcome::Rejected(message)) => {
                    report.rounds += 1;
                    report.rejections += 1;
                    backoff = self.config.retry_delay;
                    warn!("* {message} *");
                }
                Ok(RoundOutcome::Cancelled) => break,
                Err(err) => {
                    report.failures += 1;
                    warn!("round failed: {err:#}; retrying in {backoff:?}");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.config.max_retry_delay);
                }
            }
        }

        info!(?report, "miner stopped");
        report
    }

    async fn round(&self) -> Result<RoundOutcome> {
        let head = self
            .authority
            .last_block()
            .await
            .context("fetching last block")?;
        let fingerprint = head.fingerprint()?;
        info!(index = head.index, "started mining");

        let stop = Arc::clone(&self.stop);
        let difficulty = self.config.difficulty;
        let parallel = self.config.parallel;
        let found = tokio::task::spawn_blocking(move || {
            if parallel {
                search_proof_parallel(&fingerprint, difficulty, &stop)
            } else {
                search_proof(&fingerprint, difficulty, &stop)
            }
        })
        .await?;
        let Some(proof) = found else {
            return Ok(RoundOutcome::Cancelled);
        };

        // Another miner may have advanced the head meanwhile; the authority
        // re-checks against its own head and rejects a stale proof.
        let outcome = self
            .authority
            .submit_proof(&self.config.miner_id, proof)
            .await
            .context("submitting proof")?;
        Ok(match outcome {
            SubmitOutcome::Accepted(forged) => RoundOutcome::Won(forged),
            SubmitOutcome::Rejected(message) => RoundOutcome::Rejected(message),
        })
    }
}
