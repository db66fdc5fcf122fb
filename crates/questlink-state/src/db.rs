use std::path::Path;

use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError, Transactional,
};
use tracing::{debug, warn};

use questlink_core::error::QuestError;
use questlink_core::quest::QuestDefinition;
use questlink_core::types::{EvmAddress, SubjectKey, Timestamp, Xp};

use crate::records::{CompletionProof, CompletionRecord, CompletionResult, XpBalance, XpTransaction};

const SCHEMA_VERSION_KEY: &str = "schema_version";
const SCHEMA_VERSION: u32 = 1;

/// Completion and reward ledger backed by sled.
///
/// Named trees:
///   completions        - subject key ++ 0x00 ++ wallet → bincode(CompletionRecord)
///   wallet_completions - wallet ++ subject key         → completion key
///   balances           - wallet bytes                  → bincode(XpBalance)
///   xp_transactions    - wallet ++ id (BE u64)         → bincode(XpTransaction)
///   quests             - subject key                   → bincode(QuestDefinition)
///   meta               - utf8 key bytes                → raw bytes
pub struct LedgerDb {
    db: sled::Db,
    completions: sled::Tree,
    wallet_completions: sled::Tree,
    balances: sled::Tree,
    xp_transactions: sled::Tree,
    quests: sled::Tree,
    meta: sled::Tree,
}

fn storage(e: impl std::fmt::Display) -> QuestError {
    QuestError::Storage(e.to_string())
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, QuestError> {
    bincode::serialize(value).map_err(|e| QuestError::Serialization(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, QuestError> {
    bincode::deserialize(bytes).map_err(|e| QuestError::Serialization(e.to_string()))
}

fn completion_key(subject: &SubjectKey, wallet: &EvmAddress) -> Vec<u8> {
    let mut key = subject.storage_key();
    key.push(0);
    key.extend_from_slice(wallet.as_bytes());
    key
}

fn wallet_completion_key(wallet: &EvmAddress, subject: &SubjectKey) -> Vec<u8> {
    let mut key = wallet.as_bytes().to_vec();
    key.extend_from_slice(&subject.storage_key());
    key
}

fn xp_transaction_key(wallet: &EvmAddress, id: u64) -> Vec<u8> {
    let mut key = wallet.as_bytes().to_vec();
    key.extend_from_slice(&id.to_be_bytes());
    key
}

impl LedgerDb {
    /// Open or create the ledger at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, QuestError> {
        let db = sled::open(path).map_err(storage)?;
        Self::from_db(db)
    }

    /// A throwaway ledger removed on drop.
    pub fn open_temporary() -> Result<Self, QuestError> {
        let db = sled::Config::new().temporary(true).open().map_err(storage)?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, QuestError> {
        let completions        = db.open_tree("completions").map_err(storage)?;
        let wallet_completions = db.open_tree("wallet_completions").map_err(storage)?;
        let balances           = db.open_tree("balances").map_err(storage)?;
        let xp_transactions    = db.open_tree("xp_transactions").map_err(storage)?;
        let quests             = db.open_tree("quests").map_err(storage)?;
        let meta               = db.open_tree("meta").map_err(storage)?;
        let ledger = Self { db, completions, wallet_completions, balances, xp_transactions, quests, meta };
        ledger.check_schema()?;
        Ok(ledger)
    }

    fn check_schema(&self) -> Result<(), QuestError> {
        match self.get_meta(SCHEMA_VERSION_KEY)? {
            None => self.put_meta(SCHEMA_VERSION_KEY, &SCHEMA_VERSION.to_be_bytes()),
            Some(bytes) if bytes[..] == SCHEMA_VERSION.to_be_bytes()[..] => Ok(()),
            Some(bytes) => Err(QuestError::Storage(format!(
                "ledger schema {} is not supported (expected {SCHEMA_VERSION})",
                hex::encode(bytes)
            ))),
        }
    }

    // ── Completions ──────────────────────────────────────────────────────────

    pub fn get_completion(
        &self,
        subject: &SubjectKey,
        wallet: &EvmAddress,
    ) -> Result<Option<CompletionRecord>, QuestError> {
        match self.completions.get(completion_key(subject, wallet)).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn is_completed(&self, subject: &SubjectKey, wallet: &EvmAddress) -> Result<bool, QuestError> {
        self.completions.contains_key(completion_key(subject, wallet)).map_err(storage)
    }

    /// Record a completion unless one already exists for `(subject, wallet)`.
    ///
    /// The completion insert, the balance credit and the log entry commit in
    /// one transaction over four trees. Concurrent callers for the same key
    /// serialize on it: exactly one sees `Recorded`. A recorded award is on
    /// disk before this returns.
    pub fn record_completion_if_absent(
        &self,
        subject: &SubjectKey,
        wallet: &EvmAddress,
        proof: &CompletionProof,
        reward: Xp,
        now: Timestamp,
    ) -> Result<CompletionResult, QuestError> {
        let key = completion_key(subject, wallet);
        let by_wallet_key = wallet_completion_key(wallet, subject);
        let record = CompletionRecord::new(subject.clone(), *wallet, proof, reward, now);
        let record_bytes = encode(&record)?;

        let id = self.db.generate_id().map_err(storage)?;
        let entry = XpTransaction {
            id,
            wallet: *wallet,
            amount: reward,
            source: subject.clone(),
            verified_at: proof.verified_at,
            created_at: now,
        };
        let entry_bytes = encode(&entry)?;
        let entry_key = xp_transaction_key(wallet, id);

        let result = (&self.completions, &self.wallet_completions, &self.balances, &self.xp_transactions)
            .transaction(|(completions, by_wallet, balances, log)| -> ConflictableTransactionResult<CompletionResult, QuestError> {
                if let Some(existing) = completions.get(&key)? {
                    let existing: CompletionRecord =
                        decode(&existing).map_err(ConflictableTransactionError::Abort)?;
                    return Ok(CompletionResult::AlreadyCompleted(existing));
                }

                let balance = match balances.get(wallet.as_bytes())? {
                    Some(bytes) => {
                        let mut b: XpBalance = decode(&bytes).map_err(ConflictableTransactionError::Abort)?;
                        b.total_xp = b.total_xp.checked_add(reward).ok_or_else(|| {
                            ConflictableTransactionError::Abort(QuestError::BalanceOverflow(wallet.to_hex()))
                        })?;
                        b.updated_at = now;
                        b
                    }
                    None => XpBalance { wallet: *wallet, total_xp: reward, created_at: now, updated_at: now },
                };
                let balance_bytes = encode(&balance).map_err(ConflictableTransactionError::Abort)?;

                completions.insert(key.as_slice(), record_bytes.as_slice())?;
                by_wallet.insert(by_wallet_key.as_slice(), key.as_slice())?;
                balances.insert(wallet.as_bytes().as_slice(), balance_bytes)?;
                log.insert(entry_key.as_slice(), entry_bytes.as_slice())?;
                Ok(CompletionResult::Recorded(record.clone()))
            })
            .map_err(|e| match e {
                TransactionError::Abort(e) => e,
                TransactionError::Storage(e) => storage(e),
            })?;

        match &result {
            CompletionResult::Recorded(r) => {
                self.db.flush().map_err(storage)?;
                debug!(subject = %subject, wallet = %wallet, xp = r.xp_awarded, "completion recorded")
            }
            CompletionResult::AlreadyCompleted(_) => {
                debug!(subject = %subject, wallet = %wallet, "completion already present")
            }
        }
        Ok(result)
    }

    /// Every completion of `wallet`, in subject-key order.
    pub fn list_completions_for_wallet(&self, wallet: &EvmAddress) -> Result<Vec<CompletionRecord>, QuestError> {
        let mut records = Vec::new();
        for item in self.wallet_completions.scan_prefix(wallet.as_bytes()) {
            let (_, completion_key) = item.map_err(storage)?;
            match self.completions.get(&completion_key).map_err(storage)? {
                Some(bytes) => records.push(decode(&bytes)?),
                None => warn!(wallet = %wallet, "dangling wallet completion index entry"),
            }
        }
        Ok(records)
    }

    // ── Balances / XP log ────────────────────────────────────────────────────

    /// Zero balance when the wallet was never credited.
    pub fn get_balance(&self, wallet: &EvmAddress) -> Result<XpBalance, QuestError> {
        match self.balances.get(wallet.as_bytes()).map_err(storage)? {
            Some(bytes) => decode(&bytes),
            None => Ok(XpBalance::zero(*wallet)),
        }
    }

    /// Newest first, at most `limit` entries.
    pub fn list_transactions(&self, wallet: &EvmAddress, limit: usize) -> Result<Vec<XpTransaction>, QuestError> {
        let mut out = Vec::with_capacity(limit.min(64));
        for item in self.xp_transactions.scan_prefix(wallet.as_bytes()).rev().take(limit) {
            let (_, bytes) = item.map_err(storage)?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    // ── Quest definitions ────────────────────────────────────────────────────

    pub fn put_quest(&self, def: &QuestDefinition) -> Result<(), QuestError> {
        let bytes = encode(def)?;
        self.quests.insert(def.subject.storage_key(), bytes).map_err(storage)?;
        Ok(())
    }

    pub fn get_quest(&self, subject: &SubjectKey) -> Result<Option<QuestDefinition>, QuestError> {
        match self.quests.get(subject.storage_key()).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn list_quests(&self) -> Result<Vec<QuestDefinition>, QuestError> {
        let mut defs = Vec::new();
        for item in self.quests.iter() {
            let (_, bytes) = item.map_err(storage)?;
            defs.push(decode(&bytes)?);
        }
        Ok(defs)
    }

    // ── Meta ─────────────────────────────────────────────────────────────────

    pub fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), QuestError> {
        self.meta.insert(key.as_bytes(), value).map_err(storage)?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, QuestError> {
        self.meta
            .get(key.as_bytes())
            .map(|v| v.map(|iv| iv.to_vec()))
            .map_err(storage)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), QuestError> {
        self.db.flush().map_err(storage)?;
        Ok(())
    }
}
