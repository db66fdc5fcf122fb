pub mod hash;
pub mod selector;

pub use hash::keccak256;
pub use selector::{compute_function_selector, validate_signature};
