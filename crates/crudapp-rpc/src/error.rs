use std::fmt;

use thiserror::Error;

use crudapp_program::ProgramError;
use crudapp_types::{TxSignature, TypeError};

/// Ledger-side rejection classes a caller can act on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    /// An entry with the same `(owner, title)` already exists.
    DuplicateEntry,
    /// No entry with that title exists for the signer.
    NotFound,
    /// The signer does not own the entry.
    Unauthorized,
    /// Any other rejection reported by the ledger or program.
    Rejected,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DuplicateEntry => "duplicate entry",
            Self::NotFound => "entry not found",
            Self::Unauthorized => "unauthorized",
            Self::Rejected => "transaction rejected",
        };
        f.write_str(name)
    }
}

/// Errors produced by transports, signers, and transaction assembly.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("confirmation timed out for {0}")]
    ConfirmationTimeout(TxSignature),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("{kind}: {message}")]
    LedgerConstraint { kind: ConstraintKind, message: String },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error(transparent)]
    Program(#[from] ProgramError),

    #[error(transparent)]
    Type(#[from] TypeError),
}

impl RpcError {
    pub fn constraint(kind: ConstraintKind, message: impl Into<String>) -> Self {
        Self::LedgerConstraint { kind, message: message.into() }
    }

    pub fn constraint_kind(&self) -> Option<ConstraintKind> {
        match self {
            Self::LedgerConstraint { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

pub type RpcResult<T> = Result<T, RpcError>;
