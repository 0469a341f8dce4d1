use std::sync::Arc;

use tracing::{debug, warn};

use crudapp_program::{
    account_discriminator, decode_entry, entry_address, Instruction, JournalInstruction,
    ProgramDescriptor, ENTRY_ACCOUNT_NAME,
};
use crudapp_rpc::{AccountData, ConstraintKind, Provider};
use crudapp_types::{Address, JournalEntry, ProgramAccount, TxSignature};

use crate::error::{SdkError, SdkResult};

/// A program identity paired with a signer context.
///
/// Cheap to clone. Rebuild it through
/// [`ProgramResolver::bind`](crate::ProgramResolver::bind) whenever the
/// cluster or signer changes.
#[derive(Clone, Debug)]
pub struct BoundClient {
    program: Address,
    provider: Provider,
    descriptor: Arc<ProgramDescriptor>,
}

impl BoundClient {
    pub fn new(program: Address, provider: Provider, descriptor: Arc<ProgramDescriptor>) -> Self {
        Self { program, provider, descriptor }
    }

    pub fn program_id(&self) -> Address {
        self.program
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    /// Identity that signs and owns entries created through this client.
    pub fn signer(&self) -> Address {
        self.provider.pubkey()
    }

    /// Account address of the entry `owner` stores under `title`.
    pub fn entry_address(&self, title: &str, owner: &Address) -> SdkResult<Address> {
        let (address, _bump) = entry_address(title, owner, &self.program)?;
        Ok(address)
    }

    /// Every journal entry account held by the program, ordered by address.
    pub async fn list_entries(&self) -> SdkResult<Vec<ProgramAccount<JournalEntry>>> {
        let discriminator = account_discriminator(ENTRY_ACCOUNT_NAME);
        let accounts = self
            .provider
            .transport()
            .get_program_accounts(&self.program, &discriminator)
            .await?;
        let mut entries = accounts
            .into_iter()
            .map(|(address, account)| {
                let entry = decode_entry(&account.data).map_err(|e| {
                    warn!(account = %address, error = %e, "undecodable entry account");
                    SdkError::Decode(format!("account {address}: {e}"))
                })?;
                Ok(ProgramAccount::new(address, entry))
            })
            .collect::<SdkResult<Vec<_>>>()?;
        entries.sort_by_key(|e| e.address);
        debug!(program = %self.program, count = entries.len(), "listed entries");
        Ok(entries)
    }

    /// Decoded state of the entry at `address`.
    pub async fn fetch_entry(&self, address: &Address) -> SdkResult<JournalEntry> {
        let account = self
            .provider
            .transport()
            .get_account(address)
            .await?
            .ok_or_else(|| SdkError::LedgerConstraint {
                kind: ConstraintKind::NotFound,
                message: format!("account {address} does not exist"),
            })?;
        if account.owner != self.program {
            return Err(SdkError::Decode(format!(
                "account {address} is owned by {}, not the journal program",
                account.owner
            )));
        }
        decode_entry(&account.data).map_err(|e| SdkError::Decode(format!("account {address}: {e}")))
    }

    /// The deployed program account, if any.
    pub async fn fetch_program_account(&self) -> SdkResult<Option<AccountData>> {
        Ok(self.provider.transport().get_account(&self.program).await?)
    }

    pub fn build_instruction(&self, op: &JournalInstruction) -> SdkResult<Instruction> {
        Ok(op.build(&self.descriptor, &self.program, &self.signer())?)
    }

    /// Sign and submit `instruction`. Returns once the node accepted it.
    pub async fn submit(&self, instruction: &Instruction) -> SdkResult<TxSignature> {
        let tx = self
            .provider
            .sign_transaction(std::slice::from_ref(instruction))
            .await?;
        Ok(self.provider.transport().send_transaction(&tx).await?)
    }

    pub async fn confirm(&self, signature: &TxSignature) -> SdkResult<()> {
        Ok(self.provider.transport().confirm_transaction(signature).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::resolver::ProgramResolver;
    use crudapp_program::encode_entry;
    use crudapp_rpc::{InMemoryLedger, KeypairSigner, LedgerTransport};

    fn client() -> (Arc<InMemoryLedger>, BoundClient) {
        let resolver = ProgramResolver::from_embedded().unwrap();
        let ledger = Arc::new(InMemoryLedger::new(resolver.descriptor_identity().unwrap()));
        let provider = Provider::new(ledger.clone(), Arc::new(KeypairSigner::generate()));
        (ledger, resolver.bind(provider, None).unwrap())
    }

    #[tokio::test]
    async fn submit_confirm_fetch() {
        let (_ledger, client) = client();
        let ix = client.build_instruction(&JournalInstruction::create("t", "m")).unwrap();
        let sig = client.submit(&ix).await.unwrap();
        client.confirm(&sig).await.unwrap();
        let address = client.entry_address("t", &client.signer()).unwrap();
        let entry = client.fetch_entry(&address).await.unwrap();
        assert_eq!(entry, JournalEntry::new(client.signer(), "t", "m"));
        let listed = client.list_entries().await.unwrap();
        assert_eq!(listed, vec![ProgramAccount::new(address, entry)]);
    }

    #[tokio::test]
    async fn missing_entry_is_not_found() {
        let (_ledger, client) = client();
        let err = client.fetch_entry(&Address::new([8; 32])).await.unwrap_err();
        assert!(err.is_constraint(ConstraintKind::NotFound));
    }

    #[tokio::test]
    async fn foreign_account_is_decode_error() {
        let (ledger, client) = client();
        let entry = JournalEntry::new(Address::new([1; 32]), "x", "y");
        ledger
            .set_account(
                Address::new([8; 32]),
                AccountData {
                    owner: Address::new([9; 32]),
                    lamports: 1,
                    data: encode_entry(&entry),
                    executable: false,
                },
            )
            .unwrap();
        let err = client.fetch_entry(&Address::new([8; 32])).await.unwrap_err();
        assert!(matches!(err, SdkError::Decode(_)));
    }

    #[tokio::test]
    async fn corrupt_entry_fails_listing() {
        let (ledger, client) = client();
        let mut data = account_discriminator(ENTRY_ACCOUNT_NAME).to_vec();
        data.extend_from_slice(&[0; 10]);
        ledger
            .set_account(
                Address::new([8; 32]),
                AccountData { owner: client.program_id(), lamports: 1, data, executable: false },
            )
            .unwrap();
        assert!(matches!(client.list_entries().await.unwrap_err(), SdkError::Decode(_)));
    }

    #[tokio::test]
    async fn program_account_is_executable() {
        let (ledger, client) = client();
        let acct = client.fetch_program_account().await.unwrap().unwrap();
        assert!(acct.executable);
        assert_eq!(ledger.get_account(&client.program_id()).await.unwrap(), Some(acct));
    }

    #[test]
    fn long_title_is_invalid_argument() {
        let (_ledger, client) = client();
        let err = client.entry_address(&"t".repeat(33), &client.signer()).unwrap_err();
        assert!(matches!(err, SdkError::InvalidArgument(_)));
    }
}
