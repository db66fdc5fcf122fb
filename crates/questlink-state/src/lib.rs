pub mod db;
pub mod records;

pub use db::LedgerDb;
pub use records::{CompletionProof, CompletionRecord, CompletionResult, XpBalance, XpTransaction};
