//! questlink-verify
//!
//! Decides whether a wallet performed a quest's on-chain action inside the
//! verification window, and turns a positive answer into exactly one
//! completion and reward.

pub mod engine;
pub mod service;

pub use engine::{FunctionCheck, VerificationEngine, VerificationOutcome};
pub use service::{import_definitions, QuestVerifier, VerifyReport};
