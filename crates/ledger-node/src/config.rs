use anyhow::Result;
use clap::Parser;
use ledger_core::constants::{POW_DIFFICULTY, REWARD_AMOUNT, REWARD_SENDER};
use ledger_core::{AuthorityConfig, ChainStore, MemoryStore, RewardPolicy};
use ledger_storage::SledStore;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};

#[derive(Parser, Debug, Clone)]
#[command(name = "ledger-node")]
#[command(about = "Mining authority for the minimal ledger")]
pub struct NodeConfig {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, env = "LEDGER_LISTEN", default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// Data directory for sled
    #[arg(long, env = "LEDGER_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Keep the chain in memory only
    #[arg(long, env = "LEDGER_IN_MEMORY")]
    pub in_memory: bool,

    /// Leading hex zeros a proof must produce
    #[arg(long, env = "LEDGER_DIFFICULTY", default_value_t = POW_DIFFICULTY)]
    pub difficulty: u32,

    /// Forge blocks without paying the miner
    #[arg(long, env = "LEDGER_NO_REWARD")]
    pub no_reward: bool,

    /// Amount paid to the miner of each block
    #[arg(long, env = "LEDGER_REWARD_AMOUNT", default_value_t = REWARD_AMOUNT)]
    pub reward_amount: u64,
}

impl NodeConfig {
    pub fn authority_config(&self) -> AuthorityConfig {
        AuthorityConfig {
            difficulty: self.difficulty,
            reward: (!self.no_reward).then(|| RewardPolicy {
                sender: REWARD_SENDER.to_string(),
                amount: self.reward_amount,
            }),
        }
    }

    pub fn open_store(&self) -> Result<Arc<dyn ChainStore>> {
        if self.in_memory {
            return Ok(Arc::new(MemoryStore::new()));
        }
        Ok(Arc::new(SledStore::open(&self.data_dir)?))
    }
}
