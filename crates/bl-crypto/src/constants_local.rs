pub const KEY_SIZE: usize = 32; // 256 bits
pub const AES_BLOCK_SIZE: usize = 16;
pub const HMAC_TAG_SIZE: usize = 32; // SHA-256 output
