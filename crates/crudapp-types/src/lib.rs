//! Foundation types for the crudapp journal client.
//!
//! Every other crudapp crate depends on `crudapp-types`.
//!
//! # Key Types
//!
//! - [`Address`]: 32-byte ledger identity (programs, owners, accounts), base58 on the wire
//! - [`Cluster`]: the network a client is pointed at
//! - [`TxSignature`]: 64-byte transaction signature returned by a confirmed write
//! - [`JournalEntry`]: decoded journal account state
//! - [`ProgramAccount`]: an account's address paired with its decoded state

pub mod address;
pub mod cluster;
pub mod entry;
pub mod error;
pub mod signature;

pub use address::Address;
pub use cluster::Cluster;
pub use entry::{JournalEntry, ProgramAccount};
pub use error::TypeError;
pub use signature::TxSignature;
