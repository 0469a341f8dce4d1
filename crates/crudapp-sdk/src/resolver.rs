use std::sync::Arc;

use tracing::debug;

use crudapp_program::ProgramDescriptor;
use crudapp_rpc::Provider;
use crudapp_types::{Address, Cluster};

use crate::client::BoundClient;
use crate::error::{SdkError, SdkResult};

/// Program identity deployed on devnet and testnet.
pub const DEVNET_PROGRAM_ID: &str = "kp4YQtM7eQuan71UQETzfASEN95Sd3qj65EQhu99kSG";

/// Maps a cluster to the program identity deployed there and binds clients
/// to it.
///
/// Resolution is a pure function of the cluster and the descriptor: devnet
/// and testnet share a fixed identity, every other cluster falls back to the
/// descriptor's own address.
#[derive(Clone, Debug)]
pub struct ProgramResolver {
    descriptor: Arc<ProgramDescriptor>,
}

impl ProgramResolver {
    pub fn new(descriptor: ProgramDescriptor) -> Self {
        Self { descriptor: Arc::new(descriptor) }
    }

    /// Resolver over the descriptor compiled into this crate.
    pub fn from_embedded() -> SdkResult<Self> {
        Ok(Self::new(ProgramDescriptor::embedded()?))
    }

    pub fn descriptor(&self) -> &ProgramDescriptor {
        &self.descriptor
    }

    /// The identity embedded in the descriptor.
    pub fn descriptor_identity(&self) -> SdkResult<Address> {
        self.descriptor
            .address()
            .map_err(|e| SdkError::Resolution(e.to_string()))
    }

    pub fn resolve_identity(&self, cluster: &Cluster) -> SdkResult<Address> {
        let identity = match cluster {
            Cluster::Devnet | Cluster::Testnet => DEVNET_PROGRAM_ID
                .parse()
                .map_err(|e| SdkError::Resolution(format!("fixed devnet identity: {e}")))?,
            _ => self.descriptor_identity()?,
        };
        debug!(%cluster, program = %identity, "resolved program identity");
        Ok(identity)
    }

    /// Bind `provider` to `identity`, or to the descriptor's identity when omitted.
    pub fn bind(&self, provider: Provider, identity: Option<Address>) -> SdkResult<BoundClient> {
        let program = match identity {
            Some(program) => program,
            None => self.descriptor_identity()?,
        };
        Ok(BoundClient::new(program, provider, self.descriptor.clone()))
    }

    /// Resolve the identity for `cluster` and bind `provider` to it.
    pub fn bind_for_cluster(&self, provider: Provider, cluster: &Cluster) -> SdkResult<BoundClient> {
        let program = self.resolve_identity(cluster)?;
        self.bind(provider, Some(program))
    }
}
