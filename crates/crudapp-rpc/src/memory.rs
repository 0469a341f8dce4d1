//! In-process ledger for tests, local demos, and embedding.
//!
//! [`InMemoryLedger`] executes the journal program's three instructions with
//! the same outcomes the deployed program produces: a transaction either
//! applies in full or leaves state untouched.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;

use crudapp_program::{
    decode_entry, encode_entry, entry_address, Instruction, JournalInstruction, MAX_MESSAGE_LEN,
};
use crudapp_types::{Address, JournalEntry, TxSignature};

use crate::error::{ConstraintKind, RpcError, RpcResult};
use crate::transaction::{Blockhash, Transaction};
use crate::transport::{AccountData, LedgerTransport};

/// Owner of deployed program accounts.
const UPGRADEABLE_LOADER: Address = Address::new([
    2, 168, 246, 145, 78, 136, 161, 176, 226, 16, 21, 62, 247, 99, 174, 43, 0, 194, 185, 61, 22,
    193, 36, 210, 192, 83, 122, 16, 4, 128, 0, 0,
]);

/// Blockhashes older than this many slots are no longer accepted.
const BLOCKHASH_WINDOW: usize = 150;

/// Lamports required to keep an account of `len` bytes rent-exempt.
pub fn rent_exempt_minimum(len: usize) -> u64 {
    (128 + len as u64) * 3480 * 2
}

pub struct InMemoryLedger {
    program: Address,
    inner: RwLock<LedgerState>,
    unavailable: AtomicBool,
    reads: AtomicUsize,
}

#[derive(Default)]
struct LedgerState {
    slot: u64,
    accounts: HashMap<Address, AccountData>,
    recent_blockhashes: Vec<Blockhash>,
    /// Applied signatures and the blockhash each was anchored to.
    processed: HashMap<TxSignature, Blockhash>,
}

impl InMemoryLedger {
    /// A ledger with the journal program deployed at `program`.
    pub fn new(program: Address) -> Self {
        let mut state = LedgerState::default();
        state.accounts.insert(
            program,
            AccountData {
                owner: UPGRADEABLE_LOADER,
                lamports: rent_exempt_minimum(36),
                data: vec![0; 36],
                executable: true,
            },
        );
        state.advance();
        Self {
            program,
            inner: RwLock::new(state),
            unavailable: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn program(&self) -> Address {
        self.program
    }

    /// Simulate the node being unreachable: every call fails with a transport error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of account reads served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Current slot; advances once per applied transaction.
    pub fn slot(&self) -> RpcResult<u64> {
        Ok(self.state()?.slot)
    }

    /// Write raw account state directly, bypassing the program.
    pub fn set_account(&self, address: Address, account: AccountData) -> RpcResult<()> {
        self.state_mut()?.accounts.insert(address, account);
        Ok(())
    }

    /// Decoded entries currently stored, for assertions.
    pub fn entries(&self) -> RpcResult<Vec<JournalEntry>> {
        let state = self.state()?;
        Ok(state
            .accounts
            .values()
            .filter(|acct| acct.owner == self.program)
            .filter_map(|acct| decode_entry(&acct.data).ok())
            .collect())
    }

    fn check_available(&self) -> RpcResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RpcError::Transport("node unavailable".into()));
        }
        Ok(())
    }

    fn state(&self) -> RpcResult<std::sync::RwLockReadGuard<'_, LedgerState>> {
        self.inner
            .read()
            .map_err(|e| RpcError::Transport(format!("ledger lock poisoned: {e}")))
    }

    fn state_mut(&self) -> RpcResult<std::sync::RwLockWriteGuard<'_, LedgerState>> {
        self.inner
            .write()
            .map_err(|e| RpcError::Transport(format!("ledger lock poisoned: {e}")))
    }

    /// Run one journal instruction against a working copy of the accounts.
    fn execute(
        &self,
        accounts: &mut HashMap<Address, AccountData>,
        ix: &Instruction,
    ) -> RpcResult<()> {
        if ix.program_id != self.program {
            return Err(RpcError::constraint(
                ConstraintKind::Rejected,
                format!("program {} is not deployed", ix.program_id),
            ));
        }
        let op = JournalInstruction::decode(&ix.data).map_err(|e| {
            RpcError::constraint(ConstraintKind::Rejected, format!("invalid instruction data: {e}"))
        })?;
        let [entry_meta, owner_meta, ..] = ix.accounts.as_slice() else {
            return Err(RpcError::constraint(
                ConstraintKind::Rejected,
                "not enough account keys given to the instruction",
            ));
        };
        if !owner_meta.is_signer || !owner_meta.is_writable || !entry_meta.is_writable {
            return Err(RpcError::constraint(
                ConstraintKind::Unauthorized,
                "owner must sign and both accounts must be writable",
            ));
        }
        let owner = owner_meta.address;
        let title = op.title();

        // The entry account must be the one derived from (title, signer).
        let expected = entry_address(title, &owner, &self.program)
            .map(|(addr, _)| addr)
            .map_err(|e| RpcError::constraint(ConstraintKind::Rejected, e.to_string()))?;
        if entry_meta.address != expected {
            return Err(RpcError::constraint(
                ConstraintKind::Unauthorized,
                format!("seeds constraint violated for {}", entry_meta.address.short_id()),
            ));
        }
        if let Some(message) = op.message() {
            if message.len() > MAX_MESSAGE_LEN {
                return Err(RpcError::constraint(
                    ConstraintKind::Rejected,
                    format!("message is {} bytes; at most {MAX_MESSAGE_LEN} allowed", message.len()),
                ));
            }
        }

        match op {
            JournalInstruction::Create { title, message } => {
                if accounts.contains_key(&expected) {
                    return Err(RpcError::constraint(
                        ConstraintKind::DuplicateEntry,
                        format!("account {} already in use", expected.short_id()),
                    ));
                }
                let data = encode_entry(&JournalEntry { owner, title, message });
                accounts.insert(
                    expected,
                    AccountData {
                        owner: self.program,
                        lamports: rent_exempt_minimum(data.len()),
                        data,
                        executable: false,
                    },
                );
            }
            JournalInstruction::Update { message, .. } => {
                let account = accounts.get_mut(&expected).ok_or_else(|| not_initialized(&expected))?;
                let mut entry = owned_entry(account, &owner, &self.program)?;
                entry.message = message;
                account.data = encode_entry(&entry);
            }
            JournalInstruction::Delete { .. } => {
                let account = accounts.get(&expected).ok_or_else(|| not_initialized(&expected))?;
                owned_entry(account, &owner, &self.program)?;
                accounts.remove(&expected);
            }
        }
        Ok(())
    }
}

fn not_initialized(address: &Address) -> RpcError {
    RpcError::constraint(
        ConstraintKind::NotFound,
        format!("account {} not initialized", address.short_id()),
    )
}

fn owned_entry(account: &AccountData, signer: &Address, program: &Address) -> RpcResult<JournalEntry> {
    if account.owner != *program {
        return Err(RpcError::constraint(
            ConstraintKind::Unauthorized,
            "account not owned by the journal program",
        ));
    }
    let entry = decode_entry(&account.data)
        .map_err(|e| RpcError::constraint(ConstraintKind::Rejected, e.to_string()))?;
    if entry.owner != *signer {
        return Err(RpcError::constraint(
            ConstraintKind::Unauthorized,
            format!("{} does not own this entry", signer.short_id()),
        ));
    }
    Ok(entry)
}

impl LedgerState {
    fn advance(&mut self) {
        self.slot += 1;
        let digest = Sha256::new()
            .chain_update(b"crudapp-memory-ledger:")
            .chain_update(self.slot.to_le_bytes())
            .finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        self.recent_blockhashes.push(Blockhash::new(bytes));
        if self.recent_blockhashes.len() > BLOCKHASH_WINDOW {
            let expired = self.recent_blockhashes.remove(0);
            // An expired blockhash is rejected outright, so replays of these
            // signatures cannot get through anymore.
            self.processed.retain(|_, anchor| *anchor != expired);
        }
    }
}

impl std::fmt::Debug for InMemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InMemoryLedger({})", self.program.short_id())
    }
}

#[async_trait]
impl LedgerTransport for InMemoryLedger {
    async fn latest_blockhash(&self) -> RpcResult<Blockhash> {
        self.check_available()?;
        let state = self.state()?;
        state
            .recent_blockhashes
            .last()
            .copied()
            .ok_or_else(|| RpcError::Transport("no blockhash produced yet".into()))
    }

    async fn get_account(&self, address: &Address) -> RpcResult<Option<AccountData>> {
        self.check_available()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.state()?.accounts.get(address).cloned())
    }

    async fn get_program_accounts(
        &self,
        program: &Address,
        discriminator: &[u8; 8],
    ) -> RpcResult<Vec<(Address, AccountData)>> {
        self.check_available()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        let state = self.state()?;
        let mut found: Vec<(Address, AccountData)> = state
            .accounts
            .iter()
            .filter(|(_, acct)| acct.owner == *program && acct.data.starts_with(discriminator))
            .map(|(addr, acct)| (*addr, acct.clone()))
            .collect();
        found.sort_by_key(|(addr, _)| *addr);
        Ok(found)
    }

    async fn send_transaction(&self, transaction: &Transaction) -> RpcResult<TxSignature> {
        self.check_available()?;
        let signature = *transaction
            .signature()
            .ok_or_else(|| RpcError::InvalidTransaction("transaction is unsigned".into()))?;
        transaction.verify()?;

        let mut state = self.state_mut()?;
        if state.processed.contains_key(&signature) {
            return Err(RpcError::constraint(
                ConstraintKind::Rejected,
                "transaction already processed",
            ));
        }
        if !state.recent_blockhashes.contains(&transaction.message.recent_blockhash) {
            return Err(RpcError::constraint(ConstraintKind::Rejected, "blockhash not found"));
        }

        let instructions = transaction.message.decompile()?;
        let mut working = state.accounts.clone();
        for ix in &instructions {
            self.execute(&mut working, ix)?;
        }

        state.accounts = working;
        state.processed.insert(signature, transaction.message.recent_blockhash);
        state.advance();
        debug!(
            signature = %signature,
            instructions = instructions.len(),
            slot = state.slot,
            "transaction applied"
        );
        Ok(signature)
    }

    async fn confirm_transaction(&self, signature: &TxSignature) -> RpcResult<()> {
        self.check_available()?;
        if self.state()?.processed.contains_key(signature) {
            Ok(())
        } else {
            Err(RpcError::ConfirmationTimeout(*signature))
        }
    }
}
