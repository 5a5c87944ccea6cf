mod constants_local;

pub mod cipher;
pub mod hash;
pub mod keymgr;
pub mod merkle;
pub mod pow;

pub use cipher::{combine_keys, decrypt, derive_key, encrypt};
pub use hash::{block_hash, sha256_bytes, sha256_hex, transaction_hash, CanonicalBlockBody};
pub use keymgr::KeyManager;
pub use merkle::MerkleTree;
pub use pow::{meets_difficulty, mine};
