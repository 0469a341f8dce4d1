use async_trait::async_trait;

use crudapp_types::{Address, TxSignature};

use crate::error::RpcResult;
use crate::transaction::{Blockhash, Transaction};

/// Raw account state as stored on the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountData {
    /// Program that owns (and may write) the account.
    pub owner: Address,
    pub lamports: u64,
    pub data: Vec<u8>,
    pub executable: bool,
}

/// Transport interface to a ledger node.
///
/// Implementations own their own retry and timeout behaviour; callers see
/// only the final outcome of each call.
#[async_trait]
pub trait LedgerTransport: Send + Sync {
    async fn latest_blockhash(&self) -> RpcResult<Blockhash>;

    async fn get_account(&self, address: &Address) -> RpcResult<Option<AccountData>>;

    /// All accounts owned by `program` whose data starts with `discriminator`.
    async fn get_program_accounts(
        &self,
        program: &Address,
        discriminator: &[u8; 8],
    ) -> RpcResult<Vec<(Address, AccountData)>>;

    /// Submit a signed transaction. Returns once the node accepted it.
    async fn send_transaction(&self, transaction: &Transaction) -> RpcResult<TxSignature>;

    /// Wait until `signature` is confirmed, or report why it failed.
    async fn confirm_transaction(&self, signature: &TxSignature) -> RpcResult<()>;
}
