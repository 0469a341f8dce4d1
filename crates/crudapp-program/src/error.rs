use thiserror::Error;

/// Errors produced while resolving the program or encoding/decoding its data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProgramError {
    #[error("program descriptor has no address configured")]
    UnconfiguredDescriptor,

    #[error("invalid program descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("invalid address {value}: {reason}")]
    InvalidAddress { value: String, reason: String },

    #[error("instruction not declared by the program descriptor: {0}")]
    UnknownInstruction(String),

    #[error("account discriminator mismatch: expected {expected}, found {found}")]
    DiscriminatorMismatch { expected: String, found: String },

    #[error("unexpected end of data at offset {offset}: needed {needed} more bytes")]
    UnexpectedEof { offset: usize, needed: usize },

    #[error("string field is not valid UTF-8 at offset {0}")]
    InvalidUtf8(usize),

    #[error("seed is {len} bytes; at most {max} allowed")]
    SeedTooLong { len: usize, max: usize },

    #[error("too many seeds: {0}")]
    TooManySeeds(usize),

    #[error("address derived from seeds lies on the ed25519 curve")]
    OnCurve,

    #[error("no bump seed yields an off-curve address")]
    NoViableBump,

    #[error("message is {len} bytes; at most {max} allowed")]
    MessageTooLong { len: usize, max: usize },
}

impl ProgramError {
    /// True for failures decoding bytes fetched from the ledger.
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            Self::DiscriminatorMismatch { .. } | Self::UnexpectedEof { .. } | Self::InvalidUtf8(_)
        )
    }

    /// True for failures resolving the program identity.
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            Self::UnconfiguredDescriptor | Self::InvalidDescriptor(_) | Self::InvalidAddress { .. }
        )
    }
}

pub type ProgramResult<T> = Result<T, ProgramError>;
