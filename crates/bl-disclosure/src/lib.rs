pub mod audit;
pub mod court_order;
pub mod encryption;

pub use court_order::{execute_order, issue_order, DisclosedTransaction};
pub use encryption::{
    build_block_payload, decrypt_block_payload, decrypt_transaction, encrypt_block_payload,
    encrypt_transaction, index_account, reconstruct_master_key, BlockPayload, TransactionMetadata,
    TransactionPayload,
};
