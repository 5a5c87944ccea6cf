pub mod idx;
pub mod session;

pub use idx::{derive, validate, verify};
pub use session::{is_valid, issue, new_session_id, rotate_expired};
