//! Read-through query cache for ledger reads.
//!
//! [`QueryCache`] is generic over key and value; callers pick a key type
//! that names a query (for example a cluster plus an optional account) and
//! invalidate it explicitly after writes.

pub mod query;

pub use query::{CacheStats, QueryCache};
