pub mod block;
pub mod blockchain;
pub mod chain;
pub mod constants;
pub mod crypto_hash;
pub mod error;

pub use block::Block;
pub use blockchain::{parse_candidate, Blockchain};
pub use crypto_hash::{crypto_hash, HashInput};
pub use error::{ReplaceError, ValidationError};

/// Opaque application payload carried in a block's `data` field.
pub type Payload = serde_json::Value;

pub mod pow {
    /// Count leading `'0'` characters in a hex digest.
    pub fn leading_hex_zeros(hash: &str) -> u32 {
        hash.bytes().take_while(|b| *b == b'0').count() as u32
    }
}
