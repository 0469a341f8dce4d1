//! JSON-RPC transport to a ledger node over HTTP.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crudapp_types::{Address, TxSignature};

use crate::error::{ConstraintKind, RpcError, RpcResult};
use crate::transaction::{Blockhash, Transaction};
use crate::transport::{AccountData, LedgerTransport};

/// How settled ledger state must be before a read or confirmation counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Processed => "processed",
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
        })
    }
}

#[derive(Clone, Debug)]
pub struct RpcConfig {
    pub url: String,
    pub commitment: Commitment,
    /// Delay between signature status polls.
    pub confirm_poll_interval: Duration,
    /// Polls before giving up with [`RpcError::ConfirmationTimeout`].
    pub confirm_max_attempts: u32,
    pub request_timeout: Duration,
}

impl RpcConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            commitment: Commitment::default(),
            confirm_poll_interval: Duration::from_millis(500),
            confirm_max_attempts: 60,
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_commitment(mut self, commitment: Commitment) -> Self {
        self.commitment = commitment;
        self
    }
}

/// [`LedgerTransport`] speaking the node's JSON-RPC 2.0 API.
pub struct JsonRpcTransport {
    config: RpcConfig,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcTransport {
    pub fn new(config: RpcConfig) -> RpcResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RpcError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            config,
            client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> RpcResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, url = %self.config.url, "rpc request");

        let resp = self
            .client
            .post(&self.config.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_reqwest_error(&self.config.url, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(RpcError::Transport(format!(
                "{} returned HTTP {status}",
                self.config.url
            )));
        }
        let envelope: RpcResponse<T> = resp
            .json()
            .await
            .map_err(|e| RpcError::Decode(format!("malformed {method} response: {e}")))?;
        envelope.into_result(method)
    }
}

impl fmt::Debug for JsonRpcTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonRpcTransport")
            .field("url", &self.config.url)
            .field("commitment", &self.config.commitment)
            .finish()
    }
}

fn map_reqwest_error(url: &str, e: reqwest::Error) -> RpcError {
    if e.is_timeout() {
        RpcError::Transport(format!("request to {url} timed out"))
    } else if e.is_connect() {
        RpcError::Transport(format!("cannot connect to {url}: {e}"))
    } else {
        RpcError::Transport(format!("request to {url} failed: {e}"))
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

impl<T> RpcResponse<T> {
    fn into_result(self, method: &str) -> RpcResult<T> {
        if let Some(error) = self.error {
            return Err(error.classify());
        }
        self.result
            .ok_or_else(|| RpcError::Decode(format!("{method} response has neither result nor error")))
    }
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl RpcErrorObject {
    /// Preflight failures carry the transaction error under `data.err`.
    fn classify(self) -> RpcError {
        match self.data.as_ref().and_then(|d| d.get("err")).filter(|e| !e.is_null()) {
            Some(err) => classify_transaction_error(err, &self.message),
            None => RpcError::Rpc {
                code: self.code,
                message: self.message,
            },
        }
    }
}

/// Map a ledger transaction error to the constraint a caller can act on.
///
/// Program errors arrive as `{"InstructionError": [index, {"Custom": code}]}`.
/// Code 0 is the system program's "account already in use"; 3012 is an
/// uninitialized account; 2001, 2006 and 3007 are ownership and seed
/// constraint failures.
pub fn classify_transaction_error(err: &Value, context: &str) -> RpcError {
    let custom = err
        .get("InstructionError")
        .and_then(|ie| ie.get(1))
        .and_then(|detail| detail.get("Custom"))
        .and_then(Value::as_u64);
    let kind = match custom {
        Some(0) => ConstraintKind::DuplicateEntry,
        Some(3012) => ConstraintKind::NotFound,
        Some(2001 | 2006 | 3007) => ConstraintKind::Unauthorized,
        _ => ConstraintKind::Rejected,
    };
    RpcError::constraint(kind, format!("{context}: {err}"))
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct BlockhashValue {
    blockhash: String,
}

#[derive(Debug, Deserialize)]
struct UiAccount {
    lamports: u64,
    owner: String,
    /// `[payload, encoding]`
    data: (String, String),
    executable: bool,
}

impl UiAccount {
    fn into_account(self) -> RpcResult<AccountData> {
        let (payload, encoding) = self.data;
        if encoding != "base64" {
            return Err(RpcError::Decode(format!("unexpected account encoding {encoding}")));
        }
        let data = BASE64
            .decode(payload)
            .map_err(|e| RpcError::Decode(format!("account data is not base64: {e}")))?;
        let owner = Address::from_base58(&self.owner)
            .map_err(|e| RpcError::Decode(format!("account owner: {e}")))?;
        Ok(AccountData {
            owner,
            lamports: self.lamports,
            data,
            executable: self.executable,
        })
    }
}

#[derive(Debug, Deserialize)]
struct KeyedAccount {
    pubkey: String,
    account: UiAccount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatus {
    #[serde(default)]
    err: Option<Value>,
    #[serde(default)]
    confirmation_status: Option<Commitment>,
}

#[async_trait]
impl LedgerTransport for JsonRpcTransport {
    async fn latest_blockhash(&self) -> RpcResult<Blockhash> {
        let resp: WithContext<BlockhashValue> = self
            .call(
                "getLatestBlockhash",
                json!([{ "commitment": self.config.commitment }]),
            )
            .await?;
        Blockhash::from_base58(&resp.value.blockhash)
    }

    async fn get_account(&self, address: &Address) -> RpcResult<Option<AccountData>> {
        let resp: WithContext<Option<UiAccount>> = self
            .call(
                "getAccountInfo",
                json!([
                    address.to_base58(),
                    { "encoding": "base64", "commitment": self.config.commitment },
                ]),
            )
            .await?;
        resp.value.map(UiAccount::into_account).transpose()
    }

    async fn get_program_accounts(
        &self,
        program: &Address,
        discriminator: &[u8; 8],
    ) -> RpcResult<Vec<(Address, AccountData)>> {
        let accounts: Vec<KeyedAccount> = self
            .call(
                "getProgramAccounts",
                json!([
                    program.to_base58(),
                    {
                        "encoding": "base64",
                        "commitment": self.config.commitment,
                        "filters": [
                            { "memcmp": { "offset": 0, "bytes": bs58::encode(discriminator).into_string() } }
                        ],
                    },
                ]),
            )
            .await?;
        accounts
            .into_iter()
            .map(|keyed| {
                let address = Address::from_base58(&keyed.pubkey)
                    .map_err(|e| RpcError::Decode(format!("account key: {e}")))?;
                Ok((address, keyed.account.into_account()?))
            })
            .collect()
    }

    async fn send_transaction(&self, transaction: &Transaction) -> RpcResult<TxSignature> {
        let encoded = BASE64.encode(transaction.serialize());
        let sig: String = self
            .call(
                "sendTransaction",
                json!([
                    encoded,
                    { "encoding": "base64", "preflightCommitment": self.config.commitment },
                ]),
            )
            .await?;
        let signature = TxSignature::from_base58(&sig)
            .map_err(|e| RpcError::Decode(format!("returned signature: {e}")))?;
        if transaction.signature() != Some(&signature) {
            warn!(returned = %signature, "node returned a different signature than submitted");
        }
        Ok(signature)
    }

    async fn confirm_transaction(&self, signature: &TxSignature) -> RpcResult<()> {
        let params = json!([[signature.to_base58()], { "searchTransactionHistory": true }]);
        for attempt in 1..=self.config.confirm_max_attempts {
            let resp: WithContext<Vec<Option<SignatureStatus>>> =
                self.call("getSignatureStatuses", params.clone()).await?;
            if let Some(Some(status)) = resp.value.into_iter().next() {
                if let Some(err) = status.err.filter(|e| !e.is_null()) {
                    return Err(classify_transaction_error(&err, "transaction failed"));
                }
                if status
                    .confirmation_status
                    .is_some_and(|reached| reached >= self.config.commitment)
                {
                    debug!(%signature, attempt, "transaction confirmed");
                    return Ok(());
                }
            }
            tokio::time::sleep(self.config.confirm_poll_interval).await;
        }
        Err(RpcError::ConfirmationTimeout(*signature))
    }
}
