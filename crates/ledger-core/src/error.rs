use thiserror::Error;

/// Why a candidate sequence is not a self-consistent chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("chain is empty")]
    Empty,
    #[error("chain does not start with the genesis block")]
    BadGenesis,
    #[error("block {height}: lastHash does not match the previous block's hash")]
    BrokenLink { height: u64 },
    #[error("block {height}: stored hash does not match its fields")]
    HashMismatch { height: u64 },
    #[error("block {height}: difficulty jumped from {from} to {to}")]
    DifficultyJump { height: u64, from: u32, to: u32 },
    #[error("block {height}: difficulty must be at least 1")]
    ZeroDifficulty { height: u64 },
    #[error("block {height}: hash lacks {difficulty} leading zeros")]
    InsufficientWork { height: u64, difficulty: u32 },
    #[error("malformed chain: {0}")]
    Malformed(String),
}

/// Why `replace_chain` kept the current chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplaceError {
    #[error("incoming chain of length {candidate} is not longer than current length {current}")]
    TooShort { candidate: usize, current: usize },
    #[error("incoming chain is invalid: {0}")]
    Invalid(#[from] ValidationError),
}
