//! Journal data-access layer.
//!
//! - [`ProgramResolver`] maps a cluster to the deployed program and binds
//!   a [`BoundClient`] to a signer context
//! - [`MutationPipeline`] turns create/update/delete intents into confirmed
//!   transactions and reports a [`MutationOutcome`]
//! - [`JournalService`] caches reads per cluster and reconciles the cache and
//!   the [`NotificationSink`] after each write

pub mod client;
pub mod error;
pub mod journal;
pub mod mutation;
pub mod notify;
pub mod resolver;

pub use client::BoundClient;
pub use error::{SdkError, SdkResult};
pub use journal::{CreateEntryArgs, JournalCache, JournalService, QueryKey, UpdateEntryArgs};
pub use mutation::{Mutation, MutationKind, MutationOutcome, MutationPipeline, MutationState};
pub use notify::{Notification, NotificationKind, NotificationSink, NoopSink, RecordingSink, TracingSink};
pub use resolver::{ProgramResolver, DEVNET_PROGRAM_ID};

// Re-export key types
pub use crudapp_rpc::{ConstraintKind, InMemoryLedger, KeypairSigner, Provider};
pub use crudapp_types::{Address, Cluster, JournalEntry, ProgramAccount, TxSignature};
