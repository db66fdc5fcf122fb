use serde::{Deserialize, Serialize};

use questlink_chain::ChainDescriptor;
use questlink_core::quest::{QuestDefinition, VerificationLogic, VerificationPlan};
use questlink_core::types::Timestamp;
use questlink_state::{CompletionRecord, XpBalance, XpTransaction};
use questlink_verify::{VerificationOutcome, VerifyReport};

/// Result of `quest_verifyQuest` / `quest_verifyTask`.
///
/// A negative verification is still a successful call: `verified` is false
/// and `observedTimestamp` / `windowSeconds` explain a near miss.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub verified: bool,
    pub already_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// First hash of the proof.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    /// Set only when this call credited XP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xp_awarded: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_timestamp: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_seconds: Option<u64>,
    /// Reason code when `verified` is false: `NO_ACTIVITY` or
    /// `DURATION_EXCEEDED`. Faults are JSON-RPC errors, never this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<VerifyReport> for VerifyResponse {
    fn from(report: VerifyReport) -> Self {
        match report {
            VerifyReport::AlreadyCompleted(record) => VerifyResponse {
                verified: true,
                already_completed: true,
                message: Some("already completed".into()),
                tx_hash: record.primary_tx_hash().map(str::to_string),
                ..Default::default()
            },
            VerifyReport::Awarded(record) => VerifyResponse {
                verified: true,
                message: Some(format!("verified, {} XP awarded", record.xp_awarded)),
                tx_hash: record.primary_tx_hash().map(str::to_string),
                xp_awarded: Some(record.xp_awarded),
                ..Default::default()
            },
            VerifyReport::NotVerified(VerificationOutcome::DurationExceeded { observed, window_secs }) => {
                VerifyResponse {
                    message: Some(format!(
                        "qualifying transaction at {observed} is older than the {window_secs} s window"
                    )),
                    observed_timestamp: Some(observed),
                    window_seconds: Some(window_secs),
                    error: Some("DURATION_EXCEEDED".into()),
                    ..Default::default()
                }
            }
            VerifyReport::NotVerified(_) => VerifyResponse {
                message: Some("no qualifying transaction found".into()),
                error: Some("NO_ACTIVITY".into()),
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcCompletion {
    pub kind: String,
    pub id: String,
    pub wallet_address: String,
    /// Comma-joined when several functions were required.
    pub tx_hashes: String,
    pub xp_awarded: u64,
    pub completed_at: Timestamp,
    pub verified_at: Timestamp,
}

impl From<CompletionRecord> for RpcCompletion {
    fn from(r: CompletionRecord) -> Self {
        Self {
            kind: r.subject.kind.as_str().to_string(),
            id: r.subject.id,
            wallet_address: r.wallet.to_hex(),
            tx_hashes: r.tx_hashes,
            xp_awarded: r.xp_awarded,
            completed_at: r.completed_at,
            verified_at: r.verified_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcXpBalance {
    pub wallet_address: String,
    pub total_xp: u64,
    /// Zero when the wallet was never credited.
    pub updated_at: Timestamp,
}

impl From<XpBalance> for RpcXpBalance {
    fn from(b: XpBalance) -> Self {
        Self { wallet_address: b.wallet.to_hex(), total_xp: b.total_xp, updated_at: b.updated_at }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcXpTransaction {
    pub id: u64,
    pub wallet_address: String,
    pub amount: u64,
    /// `quest:<id>` or `task:<id>`.
    pub source: String,
    pub verified_at: Timestamp,
    pub created_at: Timestamp,
}

impl From<XpTransaction> for RpcXpTransaction {
    fn from(t: XpTransaction) -> Self {
        Self {
            id: t.id,
            wallet_address: t.wallet.to_hex(),
            amount: t.amount,
            source: t.source.to_string(),
            verified_at: t.verified_at,
            created_at: t.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcVerificationFunction {
    pub contract_address: String,
    pub function_signature: String,
    pub chain_id: u64,
}

/// Imported definition as served by `quest_getQuest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcQuest {
    pub kind: String,
    pub id: String,
    pub reward_xp: u64,
    /// As authored.
    pub duration_seconds: u64,
    /// What verification actually uses after the window guard.
    pub effective_window_seconds: u64,
    /// `SINGLE`, `AND` or `OR`.
    pub verification_logic: String,
    pub verification_functions: Vec<RpcVerificationFunction>,
}

impl From<QuestDefinition> for RpcQuest {
    fn from(def: QuestDefinition) -> Self {
        let verification_logic = match &def.plan {
            VerificationPlan::Single(_) => "SINGLE",
            VerificationPlan::Multi { logic: VerificationLogic::And, .. } => "AND",
            VerificationPlan::Multi { logic: VerificationLogic::Or, .. } => "OR",
        };
        Self {
            kind: def.subject.kind.as_str().to_string(),
            id: def.subject.id.clone(),
            reward_xp: def.reward_xp,
            duration_seconds: def.duration_secs,
            effective_window_seconds: questlink_core::clamp(def.duration_secs),
            verification_logic: verification_logic.to_string(),
            verification_functions: def
                .plan
                .functions()
                .iter()
                .map(|f| RpcVerificationFunction {
                    contract_address: f.contract_address.to_hex(),
                    function_signature: f.function_signature.clone(),
                    chain_id: f.chain_id,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcChain {
    pub chain_id: u64,
    pub name: String,
    pub rpc_urls: Vec<String>,
    pub block_time_ms: Option<u64>,
}

impl From<ChainDescriptor> for RpcChain {
    fn from(c: ChainDescriptor) -> Self {
        Self { chain_id: c.chain_id, name: c.name, rpc_urls: c.rpc_urls, block_time_ms: c.block_time_ms }
    }
}

/// Constants shared with presentation layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLimits {
    pub max_verification_duration_seconds: u64,
    pub max_history_page: u32,
    pub verify_timeout_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use questlink_core::types::{EvmAddress, SubjectKey};

    fn record() -> CompletionRecord {
        CompletionRecord {
            subject: SubjectKey::quest("q"),
            wallet: EvmAddress::from_bytes([1; 20]),
            tx_hashes: "0xaa,0xbb".into(),
            xp_awarded: 30,
            completed_at: 10,
            verified_at: 5,
        }
    }

    #[test]
    fn awarded_response_shape() {
        let resp = VerifyResponse::from(VerifyReport::Awarded(record()));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["verified"], true);
        assert_eq!(json["alreadyCompleted"], false);
        assert_eq!(json["txHash"], "0xaa");
        assert_eq!(json["xpAwarded"], 30);
        assert!(json.get("error").is_none());
        assert!(json.get("windowSeconds").is_none());
    }

    #[test]
    fn repeat_response_awards_nothing() {
        let resp = VerifyResponse::from(VerifyReport::AlreadyCompleted(record()));
        assert!(resp.verified && resp.already_completed);
        assert_eq!(resp.xp_awarded, None);
    }

    #[test]
    fn near_miss_carries_observed_and_bound() {
        let resp = VerifyResponse::from(VerifyReport::NotVerified(VerificationOutcome::DurationExceeded {
            observed: 1_000,
            window_secs: 600,
        }));
        assert!(!resp.verified);
        assert_eq!(resp.observed_timestamp, Some(1_000));
        assert_eq!(resp.window_seconds, Some(600));

        let none = VerifyResponse::from(VerifyReport::NotVerified(VerificationOutcome::NoActivityFound));
        assert_eq!(none.observed_timestamp, None);
        assert_eq!(none.error.as_deref(), Some("NO_ACTIVITY"));
    }
}
