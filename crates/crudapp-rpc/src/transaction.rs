//! Legacy transaction message layout.
//!
//! Wire format:
//! `[header: 3 bytes][compact-u16 n][n * 32 account keys][32 blockhash]`
//! `[compact-u16 m][m * compiled instruction]`, where a compiled instruction
//! is `[u8 program index][compact-u16 k][k * u8 account index][compact-u16 len][data]`.
//! A transaction prefixes the message with `[compact-u16 s][s * 64 signatures]`.

use std::fmt;

use crudapp_program::{AccountMeta, Instruction};
use crudapp_types::{Address, TxSignature};

use crate::error::{RpcError, RpcResult};
use crate::signer::verify_signature;

/// Most account keys a message can index with a `u8`.
pub const MAX_ACCOUNT_KEYS: usize = 256;

/// Recent ledger state hash a transaction is anchored to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Blockhash([u8; 32]);

impl Blockhash {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_base58(s: &str) -> RpcResult<Self> {
        Ok(Self(Address::from_base58(s)?.to_bytes()))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Blockhash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blockhash({})", Address::new(self.0).short_id())
    }
}

impl fmt::Display for Blockhash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Address::new(self.0))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed: u8,
    pub num_readonly_unsigned: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<Address>,
    pub recent_blockhash: Blockhash,
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// Compile `instructions` into a message paid for by `payer`.
    ///
    /// Keys are ordered signed-writable, signed-readonly, unsigned-writable,
    /// unsigned-readonly, with the payer always first.
    pub fn new(instructions: &[Instruction], payer: &Address, recent_blockhash: Blockhash) -> RpcResult<Self> {
        let mut keys: Vec<AccountMeta> = vec![AccountMeta::writable(*payer, true)];
        let mut upsert = |meta: &AccountMeta| {
            if let Some(existing) = keys.iter_mut().find(|k| k.address == meta.address) {
                existing.is_signer |= meta.is_signer;
                existing.is_writable |= meta.is_writable;
            } else {
                keys.push(meta.clone());
            }
        };
        for ix in instructions {
            for meta in &ix.accounts {
                upsert(meta);
            }
            upsert(&AccountMeta::readonly(ix.program_id, false));
        }

        keys.sort_by_key(|k| match (k.is_signer, k.is_writable) {
            (true, true) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        });
        if keys.len() > MAX_ACCOUNT_KEYS {
            return Err(RpcError::InvalidTransaction(format!(
                "{} account keys exceed the limit of {MAX_ACCOUNT_KEYS}",
                keys.len()
            )));
        }

        let header = MessageHeader {
            num_required_signatures: keys.iter().filter(|k| k.is_signer).count() as u8,
            num_readonly_signed: keys.iter().filter(|k| k.is_signer && !k.is_writable).count() as u8,
            num_readonly_unsigned: keys.iter().filter(|k| !k.is_signer && !k.is_writable).count() as u8,
        };
        let account_keys: Vec<Address> = keys.into_iter().map(|k| k.address).collect();
        let index_of = |address: &Address| -> u8 {
            // every referenced key was inserted above
            account_keys.iter().position(|k| k == address).unwrap_or_default() as u8
        };

        let compiled = instructions
            .iter()
            .map(|ix| CompiledInstruction {
                program_id_index: index_of(&ix.program_id),
                accounts: ix.accounts.iter().map(|m| index_of(&m.address)).collect(),
                data: ix.data.clone(),
            })
            .collect();

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions: compiled,
        })
    }

    /// Check the header against the key list before anything indexes by it.
    pub fn sanitize(&self) -> RpcResult<()> {
        let header = &self.header;
        let keys = self.account_keys.len();
        let signed = header.num_required_signatures as usize;
        if signed == 0 || signed > keys {
            return Err(RpcError::InvalidTransaction(format!(
                "{signed} required signatures for {keys} account keys"
            )));
        }
        if header.num_readonly_signed >= header.num_required_signatures {
            return Err(RpcError::InvalidTransaction(
                "fee payer must be a writable signer".into(),
            ));
        }
        if header.num_readonly_unsigned as usize > keys - signed {
            return Err(RpcError::InvalidTransaction(format!(
                "{} readonly unsigned keys but only {} unsigned keys",
                header.num_readonly_unsigned,
                keys - signed
            )));
        }
        for ix in &self.instructions {
            let out_of_range = std::iter::once(&ix.program_id_index)
                .chain(&ix.accounts)
                .find(|&&i| i as usize >= keys);
            if let Some(i) = out_of_range {
                return Err(RpcError::InvalidTransaction(format!(
                    "account index {i} out of range"
                )));
            }
        }
        Ok(())
    }

    pub fn is_signer(&self, index: usize) -> bool {
        index < self.header.num_required_signatures as usize
    }

    pub fn is_writable(&self, index: usize) -> bool {
        let signed = self.header.num_required_signatures as usize;
        if index < signed {
            index < signed.saturating_sub(self.header.num_readonly_signed as usize)
        } else {
            index < self.account_keys.len().saturating_sub(self.header.num_readonly_unsigned as usize)
        }
    }

    /// Keys whose signatures the transaction must carry, in order.
    pub fn signer_keys(&self) -> &[Address] {
        let signed = (self.header.num_required_signatures as usize).min(self.account_keys.len());
        &self.account_keys[..signed]
    }

    /// Expand compiled instructions back into address-bearing form.
    pub fn decompile(&self) -> RpcResult<Vec<Instruction>> {
        let key = |index: u8| -> RpcResult<Address> {
            self.account_keys.get(index as usize).copied().ok_or_else(|| {
                RpcError::InvalidTransaction(format!("account index {index} out of range"))
            })
        };
        self.instructions
            .iter()
            .map(|ix| {
                let accounts = ix
                    .accounts
                    .iter()
                    .map(|&i| {
                        Ok(AccountMeta {
                            address: key(i)?,
                            is_signer: self.is_signer(i as usize),
                            is_writable: self.is_writable(i as usize),
                        })
                    })
                    .collect::<RpcResult<Vec<_>>>()?;
                Ok(Instruction {
                    program_id: key(ix.program_id_index)?,
                    accounts,
                    data: ix.data.clone(),
                })
            })
            .collect()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64 + self.account_keys.len() * 32);
        buf.push(self.header.num_required_signatures);
        buf.push(self.header.num_readonly_signed);
        buf.push(self.header.num_readonly_unsigned);
        encode_compact_u16(self.account_keys.len(), &mut buf);
        for key in &self.account_keys {
            buf.extend_from_slice(key.as_bytes());
        }
        buf.extend_from_slice(self.recent_blockhash.as_bytes());
        encode_compact_u16(self.instructions.len(), &mut buf);
        for ix in &self.instructions {
            buf.push(ix.program_id_index);
            encode_compact_u16(ix.accounts.len(), &mut buf);
            buf.extend_from_slice(&ix.accounts);
            encode_compact_u16(ix.data.len(), &mut buf);
            buf.extend_from_slice(&ix.data);
        }
        buf
    }
}

/// A message plus the signatures authorizing it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub signatures: Vec<TxSignature>,
    pub message: Message,
}

impl Transaction {
    /// The transaction's identifying signature (the fee payer's).
    pub fn signature(&self) -> Option<&TxSignature> {
        self.signatures.first()
    }

    /// Check the message is well formed and every required signer signed it.
    pub fn verify(&self) -> RpcResult<()> {
        self.message.sanitize()?;
        let signers = self.message.signer_keys();
        if self.signatures.len() != signers.len() {
            return Err(RpcError::InvalidTransaction(format!(
                "expected {} signatures, found {}",
                signers.len(),
                self.signatures.len()
            )));
        }
        let bytes = self.message.serialize();
        for (key, sig) in signers.iter().zip(&self.signatures) {
            if !verify_signature(key, &bytes, sig) {
                return Err(RpcError::InvalidTransaction(format!(
                    "signature verification failed for {}",
                    key.short_id()
                )));
            }
        }
        Ok(())
    }

    pub fn serialize(&self) -> Vec<u8> {
        let message = self.message.serialize();
        let mut buf = Vec::with_capacity(3 + self.signatures.len() * 64 + message.len());
        encode_compact_u16(self.signatures.len(), &mut buf);
        for sig in &self.signatures {
            buf.extend_from_slice(sig.as_bytes());
        }
        buf.extend_from_slice(&message);
        buf
    }
}

/// Variable-length length prefix: 7 bits per byte, high bit set on all but the last.
fn encode_compact_u16(value: usize, buf: &mut Vec<u8>) {
    let mut rem = value as u16;
    loop {
        let mut byte = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            buf.push(byte);
            return;
        }
        byte |= 0x80;
        buf.push(byte);
    }
}
