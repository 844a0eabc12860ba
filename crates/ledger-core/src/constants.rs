pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;

/// Target time between blocks, in milliseconds.
pub const MINE_RATE: u64 = 1000;
pub const MIN_DIFFICULTY: u32 = 1;

pub const GENESIS_TIMESTAMP: u64 = 1;
pub const GENESIS_LAST_HASH: &str = "-----";
pub const GENESIS_HASH: &str = "hash-one";
pub const GENESIS_DIFFICULTY: u32 = 3;
