//! Cached reads and reconciled writes for one cluster.

use std::sync::Arc;

use tracing::debug;

use crudapp_cache::QueryCache;
use crudapp_program::JournalInstruction;
use crudapp_rpc::{AccountData, Provider};
use crudapp_types::{Address, Cluster, JournalEntry, ProgramAccount, TxSignature};

use crate::client::BoundClient;
use crate::error::{SdkError, SdkResult};
use crate::mutation::{MutationKind, MutationOutcome, MutationPipeline};
use crate::notify::{Notification, NotificationSink};
use crate::resolver::ProgramResolver;

/// Names one cached query: the entry listing of a cluster when `account` is
/// `None`, otherwise a single account on that cluster.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub cluster: Cluster,
    pub account: Option<Address>,
}

impl QueryKey {
    pub fn list(cluster: Cluster) -> Self {
        Self { cluster, account: None }
    }

    pub fn entry(cluster: Cluster, account: Address) -> Self {
        Self { cluster, account: Some(account) }
    }
}

/// Query caches shared by every service built over them.
#[derive(Debug, Default)]
pub struct JournalCache {
    pub lists: QueryCache<QueryKey, Vec<ProgramAccount<JournalEntry>>>,
    pub entries: QueryCache<QueryKey, JournalEntry>,
    pub programs: QueryCache<QueryKey, Option<AccountData>>,
}

impl JournalCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark every query for `cluster` stale.
    pub fn invalidate_cluster(&self, cluster: &Cluster) {
        let same = |k: &QueryKey| k.cluster == *cluster;
        self.lists.invalidate_where(same);
        self.entries.invalidate_where(same);
        self.programs.invalidate_where(same);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateEntryArgs {
    pub title: String,
    pub message: String,
    pub owner: Address,
}

/// `owner` is accepted for symmetry with create and ignored: the ledger
/// identifies the entry by the signer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateEntryArgs {
    pub title: String,
    pub message: String,
    pub owner: Option<Address>,
}

/// Journal façade for one cluster and signer context.
///
/// Reads go through the shared [`JournalCache`]. Writes go through the
/// [`MutationPipeline`]; a confirmed write invalidates the listing (and the
/// touched entry for update and delete) and reports the signature to the
/// sink, while a failed write only reports the error.
pub struct JournalService {
    cluster: Cluster,
    client: BoundClient,
    pipeline: MutationPipeline,
    cache: Arc<JournalCache>,
    sink: Arc<dyn NotificationSink>,
}

impl JournalService {
    pub fn new(cluster: Cluster, client: BoundClient, sink: Arc<dyn NotificationSink>) -> Self {
        Self::with_cache(cluster, client, sink, Arc::new(JournalCache::new()))
    }

    pub fn with_cache(
        cluster: Cluster,
        client: BoundClient,
        sink: Arc<dyn NotificationSink>,
        cache: Arc<JournalCache>,
    ) -> Self {
        Self {
            cluster,
            pipeline: MutationPipeline::new(client.clone()),
            client,
            cache,
            sink,
        }
    }

    /// Resolve the program for `cluster` and bind `provider` to it.
    pub fn connect(
        resolver: &ProgramResolver,
        cluster: Cluster,
        provider: Provider,
        sink: Arc<dyn NotificationSink>,
    ) -> SdkResult<Self> {
        let client = resolver.bind_for_cluster(provider, &cluster)?;
        Ok(Self::new(cluster, client, sink))
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub fn client(&self) -> &BoundClient {
        &self.client
    }

    pub fn cache(&self) -> &Arc<JournalCache> {
        &self.cache
    }

    pub fn list_key(&self) -> QueryKey {
        QueryKey::list(self.cluster.clone())
    }

    pub fn entry_key(&self, account: Address) -> QueryKey {
        QueryKey::entry(self.cluster.clone(), account)
    }

    pub fn entry_address(&self, title: &str, owner: &Address) -> SdkResult<Address> {
        self.client.entry_address(title, owner)
    }

    pub async fn list_entries(&self) -> SdkResult<Vec<ProgramAccount<JournalEntry>>> {
        self.cache
            .lists
            .get_or_fetch(&self.list_key(), || self.client.list_entries())
            .await
    }

    pub async fn get_entry(&self, account: &Address) -> SdkResult<JournalEntry> {
        self.cache
            .entries
            .get_or_fetch(&self.entry_key(*account), || self.client.fetch_entry(account))
            .await
    }

    /// The deployed program account; `None` if nothing is deployed at the
    /// resolved identity.
    pub async fn program_account_info(&self) -> SdkResult<Option<AccountData>> {
        let key = self.entry_key(self.client.program_id());
        self.cache
            .programs
            .get_or_fetch(&key, || self.client.fetch_program_account())
            .await
    }

    /// Drop every cached query for this cluster.
    pub fn refresh(&self) {
        self.cache.invalidate_cluster(&self.cluster);
    }

    pub async fn create_entry(&self, args: CreateEntryArgs) -> SdkResult<TxSignature> {
        let signer = self.client.signer();
        let outcome = if args.owner != signer {
            MutationOutcome::Failed {
                error: SdkError::InvalidArgument(format!(
                    "owner {} is not the signing identity {}",
                    args.owner, signer
                )),
            }
        } else {
            self.pipeline.run(JournalInstruction::create(args.title, args.message)).await
        };
        self.reconcile(MutationKind::Create, outcome, None).await
    }

    pub async fn update_entry(&self, args: UpdateEntryArgs) -> SdkResult<TxSignature> {
        let touched = self.touched_entry(&args.title);
        let outcome = self.pipeline.run(JournalInstruction::update(args.title, args.message)).await;
        self.reconcile(MutationKind::Update, outcome, touched).await
    }

    pub async fn delete_entry(&self, title: &str) -> SdkResult<TxSignature> {
        let touched = self.touched_entry(title);
        let outcome = self.pipeline.run(JournalInstruction::delete(title)).await;
        self.reconcile(MutationKind::Delete, outcome, touched).await
    }

    fn touched_entry(&self, title: &str) -> Option<Address> {
        self.client.entry_address(title, &self.client.signer()).ok()
    }

    async fn reconcile(
        &self,
        kind: MutationKind,
        outcome: MutationOutcome,
        touched: Option<Address>,
    ) -> SdkResult<TxSignature> {
        match outcome {
            MutationOutcome::Confirmed { signature } => {
                self.cache.lists.invalidate(&self.list_key());
                if let Some(account) = touched {
                    self.cache.entries.invalidate(&self.entry_key(account));
                }
                debug!(%kind, %signature, cluster = %self.cluster, "cache reconciled");
                self.sink.notify(Notification::success(&signature)).await;
                Ok(signature)
            }
            MutationOutcome::Failed { error } => {
                self.sink
                    .notify(Notification::error(format!("{}: {error}", kind.failure_prefix())))
                    .await;
                Err(error)
            }
        }
    }
}

impl std::fmt::Debug for JournalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalService")
            .field("cluster", &self.cluster)
            .field("program", &self.client.program_id())
            .finish()
    }
}
