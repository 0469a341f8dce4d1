//! Ledger access for the crudapp journal client.
//!
//! - [`LedgerTransport`]: the async seam between the client and a ledger node
//! - [`JsonRpcTransport`]: JSON-RPC over HTTP to a real cluster
//! - [`InMemoryLedger`]: an in-process ledger that runs the journal program
//! - [`Provider`]: a transport paired with the signing identity
//! - Legacy transaction assembly and ed25519 signing

pub mod error;
pub mod http;
pub mod memory;
pub mod provider;
pub mod signer;
pub mod transaction;
pub mod transport;

pub use error::{ConstraintKind, RpcError, RpcResult};
pub use http::{classify_transaction_error, Commitment, JsonRpcTransport, RpcConfig};
pub use memory::{rent_exempt_minimum, InMemoryLedger};
pub use provider::Provider;
pub use signer::{verify_signature, KeypairSigner, TransactionSigner};
pub use transaction::{Blockhash, Message, Transaction};
pub use transport::{AccountData, LedgerTransport};
