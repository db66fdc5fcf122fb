use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObject;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use questlink_core::constants::{MAX_HISTORY_PAGE, MAX_VERIFICATION_DURATION_SECONDS};
use questlink_core::error::{ErrorClass, QuestError};
use questlink_core::types::{EvmAddress, SubjectKey, SubjectKind};
use questlink_crypto::compute_function_selector;
use questlink_verify::QuestVerifier;

use crate::api::QuestApiServer;
use crate::types::{RpcChain, RpcCompletion, RpcLimits, RpcQuest, RpcXpBalance, RpcXpTransaction, VerifyResponse};

const INVALID_PARAMS: i32 = -32602;
const TRANSPORT_ERROR: i32 = -32010;
const LEDGER_ERROR: i32 = -32020;

fn rpc_err(code: i32, msg: impl Into<String>) -> ErrorObject<'static> {
    ErrorObject::owned(code, msg.into(), None::<()>)
}

fn retryable_err(code: i32, msg: impl Into<String>) -> ErrorObject<'static> {
    ErrorObject::owned(code, msg.into(), Some(serde_json::json!({ "retryable": true })))
}

/// Input faults are invalid params. Transport and ledger faults carry a
/// retry hint so clients can tell them from a negative verification.
fn quest_err(e: QuestError) -> ErrorObject<'static> {
    match e.class() {
        ErrorClass::Input => rpc_err(INVALID_PARAMS, e.to_string()),
        ErrorClass::Transport => retryable_err(TRANSPORT_ERROR, format!("could not verify, try again: {e}")),
        ErrorClass::Ledger => retryable_err(LEDGER_ERROR, e.to_string()),
    }
}

fn parse_wallet(wallet_address: &str) -> RpcResult<EvmAddress> {
    if wallet_address.trim().is_empty() {
        return Err(quest_err(QuestError::MissingField("walletAddress")));
    }
    EvmAddress::parse(wallet_address).map_err(quest_err)
}

fn parse_subject(kind: &str, id: String) -> RpcResult<SubjectKey> {
    let kind: SubjectKind = kind.parse().map_err(quest_err)?;
    let subject = SubjectKey { kind, id: id.trim().to_string() };
    subject.validate().map_err(quest_err)?;
    Ok(subject)
}

/// Shared state passed to the RPC server.
pub struct RpcServerState {
    pub verifier: Arc<QuestVerifier>,
    /// Reported by `quest_getLimits`; the verifier enforces it.
    pub verify_timeout_ms: u64,
}

/// The RPC server implementation.
pub struct RpcServer {
    state: Arc<RpcServerState>,
}

impl RpcServer {
    pub fn new(state: Arc<RpcServerState>) -> Self {
        Self { state }
    }

    /// Start the JSON-RPC server on `addr`. Returns a handle to stop it.
    pub async fn start(self, addr: SocketAddr) -> anyhow::Result<ServerHandle> {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
        let middleware = tower::ServiceBuilder::new().layer(cors);

        let server = Server::builder().set_http_middleware(middleware).build(addr).await?;
        let module = self.into_rpc();
        let handle = server.start(module);
        info!(%addr, "RPC server started");
        Ok(handle)
    }

    async fn verify(&self, subject: SubjectKey, wallet_address: String) -> RpcResult<VerifyResponse> {
        let now = chrono::Utc::now().timestamp();
        match self.state.verifier.verify(&subject, &wallet_address, now).await {
            Ok(report) => Ok(report.into()),
            Err(e) => {
                if e.class() != ErrorClass::Input {
                    warn!(subject = %subject, error = %e, "verification failed");
                }
                Err(quest_err(e))
            }
        }
    }
}

#[async_trait]
impl QuestApiServer for RpcServer {
    async fn verify_quest(&self, quest_id: String, wallet_address: String) -> RpcResult<VerifyResponse> {
        self.verify(SubjectKey::quest(quest_id.trim()), wallet_address).await
    }

    async fn verify_task(&self, task_id: String, wallet_address: String) -> RpcResult<VerifyResponse> {
        self.verify(SubjectKey::task(task_id.trim()), wallet_address).await
    }

    async fn get_completion(
        &self,
        kind: String,
        id: String,
        wallet_address: String,
    ) -> RpcResult<Option<RpcCompletion>> {
        let subject = parse_subject(&kind, id)?;
        let wallet = parse_wallet(&wallet_address)?;
        let record = self
            .state
            .verifier
            .ledger()
            .get_completion(&subject, &wallet)
            .map_err(quest_err)?;
        Ok(record.map(RpcCompletion::from))
    }

    async fn get_xp_balance(&self, wallet_address: String) -> RpcResult<RpcXpBalance> {
        let wallet = parse_wallet(&wallet_address)?;
        let balance = self.state.verifier.ledger().get_balance(&wallet).map_err(quest_err)?;
        Ok(balance.into())
    }

    async fn get_xp_transactions(
        &self,
        wallet_address: String,
        limit: Option<u32>,
    ) -> RpcResult<Vec<RpcXpTransaction>> {
        let wallet = parse_wallet(&wallet_address)?;
        let limit = limit.unwrap_or(MAX_HISTORY_PAGE).min(MAX_HISTORY_PAGE) as usize;
        let entries = self
            .state
            .verifier
            .ledger()
            .list_transactions(&wallet, limit)
            .map_err(quest_err)?;
        Ok(entries.into_iter().map(RpcXpTransaction::from).collect())
    }

    async fn get_quest(&self, kind: String, id: String) -> RpcResult<Option<RpcQuest>> {
        let subject = parse_subject(&kind, id)?;
        let def = self.state.verifier.ledger().get_quest(&subject).map_err(quest_err)?;
        Ok(def.map(RpcQuest::from))
    }

    async fn compute_selector(&self, signature: String) -> RpcResult<String> {
        let selector = compute_function_selector(&signature).map_err(quest_err)?;
        Ok(selector.to_hex())
    }

    async fn get_chain(&self, chain_id: u64) -> RpcResult<RpcChain> {
        let chain = self
            .state
            .verifier
            .engine()
            .catalog()
            .resolve(chain_id)
            .map_err(quest_err)?;
        Ok(chain.into())
    }

    async fn get_limits(&self) -> RpcResult<RpcLimits> {
        Ok(RpcLimits {
            max_verification_duration_seconds: MAX_VERIFICATION_DURATION_SECONDS,
            max_history_page: MAX_HISTORY_PAGE,
            verify_timeout_ms: self.state.verify_timeout_ms,
        })
    }
}
