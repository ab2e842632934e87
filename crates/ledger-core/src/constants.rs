pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
/// Leading hex zeros a proof digest must carry.
pub const POW_DIFFICULTY: u32 = 6;
/// Candidates tried between two checks of the stop flag.
pub const SEARCH_BATCH: u64 = 1 << 16;
pub const GENESIS_PREVIOUS_HASH: u64 = 1;
pub const GENESIS_PROOF: u64 = 100;
pub const REWARD_SENDER: &str = "0";
pub const REWARD_AMOUNT: u64 = 1;
