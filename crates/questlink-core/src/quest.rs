use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_VERIFICATION_DURATION_SECONDS;
use crate::error::QuestError;
use crate::types::{ChainId, EvmAddress, SubjectKey, SubjectKind, Xp};

// ── Verification config ──────────────────────────────────────────────────────

/// How several verification functions combine into one result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerificationLogic {
    /// Every function must have a qualifying transaction.
    #[default]
    And,
    /// Any one function is enough.
    Or,
}

/// One tracked contract function. Authored by an administrator and never
/// mutated by the verification path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationFunction {
    pub contract_address: EvmAddress,
    /// Canonical signature, e.g. `claim(address,uint256)`.
    pub function_signature: String,
    pub chain_id: ChainId,
}

/// The active verification shape of a quest, resolved once at load time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationPlan {
    /// Legacy form: one signature, one contract, one chain.
    Single(VerificationFunction),
    /// Ordered function list combined with `logic`.
    Multi {
        functions: Vec<VerificationFunction>,
        logic: VerificationLogic,
    },
}

impl VerificationPlan {
    pub fn functions(&self) -> &[VerificationFunction] {
        match self {
            VerificationPlan::Single(f) => std::slice::from_ref(f),
            VerificationPlan::Multi { functions, .. } => functions,
        }
    }
}

/// A quest or task ready for verification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestDefinition {
    pub subject: SubjectKey,
    pub reward_xp: Xp,
    /// As authored. The window guard clamps it at verification time.
    pub duration_secs: u64,
    pub plan: VerificationPlan,
}

// ── Authored documents ───────────────────────────────────────────────────────

/// One entry of the modern `verificationFunctions` list, as authored.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationFunctionDocument {
    pub contract_address: String,
    pub function_signature: String,
    pub chain_id: ChainId,
}

/// Quest/task verification config as written by the campaign-authoring layer.
///
/// Both the legacy single-function fields and the modern function list may be
/// present; [`QuestConfigDocument::resolve`] picks the active one.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestConfigDocument {
    pub id: String,
    #[serde(default)]
    pub kind: SubjectKind,
    #[serde(default, alias = "xpReward")]
    pub reward_xp: Xp,
    #[serde(default)]
    pub duration_seconds: Option<u64>,

    // Legacy form.
    #[serde(default)]
    pub function_signature: Option<String>,
    #[serde(default)]
    pub verification_contract: Option<String>,
    #[serde(default)]
    pub chain_id: Option<ChainId>,

    // Modern form.
    #[serde(default)]
    pub verification_functions: Vec<VerificationFunctionDocument>,
    #[serde(default)]
    pub verification_logic: Option<VerificationLogic>,
}

impl QuestConfigDocument {
    pub fn subject(&self) -> SubjectKey {
        SubjectKey { kind: self.kind, id: self.id.trim().to_string() }
    }

    /// Resolve the authored document into a typed definition.
    ///
    /// The modern list wins when non-empty. Addresses are parsed (and thereby
    /// case-normalized) here. Signatures are validated later by whoever
    /// computes selectors.
    pub fn resolve(self) -> Result<QuestDefinition, QuestError> {
        let subject = self.subject();
        subject.validate()?;
        let invalid = |reason: &str| QuestError::InvalidConfig {
            subject: subject.to_string(),
            reason: reason.to_string(),
        };

        let plan = if !self.verification_functions.is_empty() {
            let mut functions = Vec::with_capacity(self.verification_functions.len());
            for doc in &self.verification_functions {
                functions.push(function_from_parts(
                    &doc.contract_address,
                    &doc.function_signature,
                    doc.chain_id,
                )
                .map_err(|e| invalid(&e.to_string()))?);
            }
            VerificationPlan::Multi {
                functions,
                logic: self.verification_logic.unwrap_or_default(),
            }
        } else {
            match (&self.function_signature, &self.verification_contract, self.chain_id) {
                (Some(sig), Some(contract), Some(chain_id)) => VerificationPlan::Single(
                    function_from_parts(contract, sig, chain_id)
                        .map_err(|e| invalid(&e.to_string()))?,
                ),
                (None, None, None) => {
                    return Err(invalid("no verification function configured"));
                }
                _ => {
                    return Err(invalid(
                        "legacy form needs functionSignature, verificationContract and chainId",
                    ));
                }
            }
        };

        Ok(QuestDefinition {
            subject,
            reward_xp: self.reward_xp,
            duration_secs: self.duration_seconds.unwrap_or(DEFAULT_VERIFICATION_DURATION_SECONDS),
            plan,
        })
    }
}

fn function_from_parts(
    contract: &str,
    signature: &str,
    chain_id: ChainId,
) -> Result<VerificationFunction, QuestError> {
    if chain_id == 0 {
        return Err(QuestError::ChainNotSupported(0));
    }
    let signature = signature.trim();
    if signature.is_empty() {
        return Err(QuestError::MissingField("functionSignature"));
    }
    Ok(VerificationFunction {
        contract_address: EvmAddress::parse(contract)?,
        function_signature: signature.to_string(),
        chain_id,
    })
}
