use std::sync::Arc;

use crudapp_program::Instruction;
use crudapp_types::Address;

use crate::error::{RpcError, RpcResult};
use crate::signer::TransactionSigner;
use crate::transaction::{Message, Transaction};
use crate::transport::LedgerTransport;

/// Signer context: a transport paired with the identity that pays for and
/// authorizes transactions. Cloning shares both halves.
#[derive(Clone)]
pub struct Provider {
    transport: Arc<dyn LedgerTransport>,
    signer: Arc<dyn TransactionSigner>,
}

impl Provider {
    pub fn new(transport: Arc<dyn LedgerTransport>, signer: Arc<dyn TransactionSigner>) -> Self {
        Self { transport, signer }
    }

    pub fn transport(&self) -> &Arc<dyn LedgerTransport> {
        &self.transport
    }

    pub fn signer(&self) -> &Arc<dyn TransactionSigner> {
        &self.signer
    }

    pub fn pubkey(&self) -> Address {
        self.signer.pubkey()
    }

    /// Anchor `instructions` to a fresh blockhash and sign them.
    pub async fn sign_transaction(&self, instructions: &[Instruction]) -> RpcResult<Transaction> {
        let blockhash = self.transport.latest_blockhash().await?;
        let payer = self.pubkey();
        let message = Message::new(instructions, &payer, blockhash)?;
        if message.signer_keys() != [payer] {
            return Err(RpcError::Signing(
                "transaction requires signers other than the provider".into(),
            ));
        }
        let signature = self.signer.sign_message(&message.serialize()).await?;
        Ok(Transaction { signatures: vec![signature], message })
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Provider({})", self.pubkey().short_id())
    }
}
