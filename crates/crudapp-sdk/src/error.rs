use thiserror::Error;

use crudapp_program::ProgramError;
use crudapp_rpc::{ConstraintKind, RpcError};

/// Failures surfaced by queries and mutations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SdkError {
    #[error("resolution error: {0}")]
    Resolution(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("{kind}: {message}")]
    LedgerConstraint { kind: ConstraintKind, message: String },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl SdkError {
    pub fn constraint_kind(&self) -> Option<ConstraintKind> {
        match self {
            Self::LedgerConstraint { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_constraint(&self, kind: ConstraintKind) -> bool {
        self.constraint_kind() == Some(kind)
    }
}

impl From<ProgramError> for SdkError {
    fn from(e: ProgramError) -> Self {
        if e.is_resolution() || matches!(e, ProgramError::UnknownInstruction(_)) {
            Self::Resolution(e.to_string())
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::InvalidArgument(e.to_string())
        }
    }
}

impl From<RpcError> for SdkError {
    fn from(e: RpcError) -> Self {
        match e {
            RpcError::Transport(_) | RpcError::Rpc { .. } | RpcError::ConfirmationTimeout(_) => {
                Self::Transport(e.to_string())
            }
            // Nodes refuse transactions whose signatures do not verify.
            RpcError::Signing(msg) | RpcError::InvalidTransaction(msg) => Self::Signing(msg),
            RpcError::LedgerConstraint { kind, message } => Self::LedgerConstraint { kind, message },
            RpcError::Decode(msg) => Self::Decode(msg),
            RpcError::Program(e) => e.into(),
            RpcError::Type(e) => Self::InvalidArgument(e.to_string()),
        }
    }
}

pub type SdkResult<T> = Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crudapp_types::TxSignature;

    #[test]
    fn rpc_errors_map_to_taxonomy() {
        let t: SdkError = RpcError::Transport("down".into()).into();
        assert!(matches!(t, SdkError::Transport(_)));
        let t: SdkError = RpcError::ConfirmationTimeout(TxSignature::new([0; 64])).into();
        assert!(matches!(t, SdkError::Transport(_)));
        let c: SdkError = RpcError::constraint(ConstraintKind::DuplicateEntry, "in use").into();
        assert!(c.is_constraint(ConstraintKind::DuplicateEntry));
        assert_eq!(c.to_string(), "duplicate entry: in use");
        let s: SdkError = RpcError::InvalidTransaction("bad sig".into()).into();
        assert_eq!(s, SdkError::Signing("bad sig".into()));
    }

    #[test]
    fn program_errors_map_to_taxonomy() {
        assert!(matches!(
            SdkError::from(ProgramError::UnconfiguredDescriptor),
            SdkError::Resolution(_)
        ));
        assert!(matches!(
            SdkError::from(ProgramError::InvalidUtf8(3)),
            SdkError::Decode(_)
        ));
        assert!(matches!(
            SdkError::from(ProgramError::SeedTooLong { len: 40, max: 32 }),
            SdkError::InvalidArgument(_)
        ));
        let nested: SdkError = RpcError::Program(ProgramError::UnexpectedEof { offset: 0, needed: 8 }).into();
        assert!(matches!(nested, SdkError::Decode(_)));
    }
}
