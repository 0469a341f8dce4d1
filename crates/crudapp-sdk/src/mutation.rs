//! Write path: intent → instruction → signed transaction → confirmation.
//!
//! The pipeline only reports outcomes. Cache reconciliation and user
//! feedback belong to the caller (see [`JournalService`](crate::JournalService)).

use std::fmt;

use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crudapp_program::JournalInstruction;
use crudapp_types::TxSignature;

use crate::client::BoundClient;
use crate::error::{SdkError, SdkResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl MutationKind {
    pub fn of(op: &JournalInstruction) -> Self {
        match op {
            JournalInstruction::Create { .. } => Self::Create,
            JournalInstruction::Update { .. } => Self::Update,
            JournalInstruction::Delete { .. } => Self::Delete,
        }
    }

    /// Prefix for user-facing failure messages.
    pub fn failure_prefix(&self) -> &'static str {
        match self {
            Self::Create => "Error creating entry",
            Self::Update => "Error updating entry",
            Self::Delete => "Error deleting entry",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MutationState {
    Idle,
    /// Submitted; waiting for the ledger to confirm.
    Pending,
    Confirmed { signature: TxSignature },
    Failed { error: SdkError },
}

impl MutationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed { .. } | Self::Failed { .. })
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Confirmed { .. } => "confirmed",
            Self::Failed { .. } => "failed",
        }
    }

    fn can_move_to(&self, next: &MutationState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Pending)
                | (Self::Idle, Self::Failed { .. })
                | (Self::Pending, Self::Confirmed { .. })
                | (Self::Pending, Self::Failed { .. })
        )
    }
}

/// Final result of one mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MutationOutcome {
    Confirmed { signature: TxSignature },
    Failed { error: SdkError },
}

impl MutationOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }

    pub fn signature(&self) -> Option<&TxSignature> {
        match self {
            Self::Confirmed { signature } => Some(signature),
            Self::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&SdkError> {
        match self {
            Self::Confirmed { .. } => None,
            Self::Failed { error } => Some(error),
        }
    }

    pub fn into_result(self) -> SdkResult<TxSignature> {
        match self {
            Self::Confirmed { signature } => Ok(signature),
            Self::Failed { error } => Err(error),
        }
    }
}

impl From<SdkResult<TxSignature>> for MutationOutcome {
    fn from(result: SdkResult<TxSignature>) -> Self {
        match result {
            Ok(signature) => Self::Confirmed { signature },
            Err(error) => Self::Failed { error },
        }
    }
}

/// One tracked invocation of a journal operation.
#[derive(Clone, Debug)]
pub struct Mutation {
    id: Uuid,
    op: JournalInstruction,
    state: MutationState,
}

impl Mutation {
    pub fn new(op: JournalInstruction) -> Self {
        Self { id: Uuid::now_v7(), op, state: MutationState::Idle }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> MutationKind {
        MutationKind::of(&self.op)
    }

    pub fn op(&self) -> &JournalInstruction {
        &self.op
    }

    pub fn state(&self) -> &MutationState {
        &self.state
    }

    /// The outcome, once the mutation has finished.
    pub fn outcome(&self) -> Option<MutationOutcome> {
        match &self.state {
            MutationState::Confirmed { signature } => {
                Some(MutationOutcome::Confirmed { signature: *signature })
            }
            MutationState::Failed { error } => Some(MutationOutcome::Failed { error: error.clone() }),
            MutationState::Idle | MutationState::Pending => None,
        }
    }

    pub fn transition(&mut self, next: MutationState) -> SdkResult<()> {
        if !self.state.can_move_to(&next) {
            return Err(SdkError::InvalidState(format!(
                "mutation {} cannot move from {} to {}",
                self.id,
                self.state.name(),
                next.name()
            )));
        }
        debug!(mutation = %self.id, from = self.state.name(), to = next.name(), "mutation state");
        self.state = next;
        Ok(())
    }
}

/// Turns journal intents into confirmed transactions.
///
/// No retries: a failed mutation stays failed and the caller decides
/// whether to run it again.
#[derive(Clone, Debug)]
pub struct MutationPipeline {
    client: BoundClient,
}

impl MutationPipeline {
    pub fn new(client: BoundClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &BoundClient {
        &self.client
    }

    pub async fn run(&self, op: JournalInstruction) -> MutationOutcome {
        let mut mutation = Mutation::new(op);
        self.drive(&mut mutation).await
    }

    pub async fn create(&self, title: impl Into<String>, message: impl Into<String>) -> MutationOutcome {
        self.run(JournalInstruction::create(title, message)).await
    }

    pub async fn update(&self, title: impl Into<String>, message: impl Into<String>) -> MutationOutcome {
        self.run(JournalInstruction::update(title, message)).await
    }

    pub async fn delete(&self, title: impl Into<String>) -> MutationOutcome {
        self.run(JournalInstruction::delete(title)).await
    }

    /// Run an idle `mutation` to completion, recording each state on it.
    pub async fn drive(&self, mutation: &mut Mutation) -> MutationOutcome {
        if mutation.state != MutationState::Idle {
            return MutationOutcome::Failed {
                error: SdkError::InvalidState(format!(
                    "mutation {} was already started",
                    mutation.id
                )),
            };
        }
        let span = info_span!(
            "mutation",
            id = %mutation.id,
            kind = %mutation.kind(),
            title = mutation.op.title(),
        );
        async {
            let result = self.submit_and_confirm(mutation).await;
            let next = match result {
                Ok(signature) => {
                    info!(%signature, "mutation confirmed");
                    MutationState::Confirmed { signature }
                }
                Err(error) => {
                    warn!(%error, "mutation failed");
                    MutationState::Failed { error }
                }
            };
            // Both terminal states are reachable from Idle-or-Pending.
            if let Err(e) = mutation.transition(next) {
                return MutationOutcome::Failed { error: e };
            }
            mutation
                .outcome()
                .unwrap_or_else(|| MutationOutcome::Failed {
                    error: SdkError::InvalidState("mutation did not finish".into()),
                })
        }
        .instrument(span)
        .await
    }

    async fn submit_and_confirm(&self, mutation: &mut Mutation) -> SdkResult<TxSignature> {
        let instruction = self.client.build_instruction(&mutation.op)?;
        mutation.transition(MutationState::Pending)?;
        let signature = self.client.submit(&instruction).await?;
        debug!(%signature, "transaction submitted");
        self.client.confirm(&signature).await?;
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::resolver::ProgramResolver;
    use crudapp_rpc::{ConstraintKind, InMemoryLedger, KeypairSigner, Provider};

    fn pipeline() -> (Arc<InMemoryLedger>, MutationPipeline) {
        let resolver = ProgramResolver::from_embedded().unwrap();
        let ledger = Arc::new(InMemoryLedger::new(resolver.descriptor_identity().unwrap()));
        let provider = Provider::new(ledger.clone(), Arc::new(KeypairSigner::generate()));
        (ledger, MutationPipeline::new(resolver.bind(provider, None).unwrap()))
    }

    #[test]
    fn legal_transitions() {
        let mut m = Mutation::new(JournalInstruction::delete("x"));
        assert_eq!(m.state(), &MutationState::Idle);
        m.transition(MutationState::Pending).unwrap();
        m.transition(MutationState::Confirmed { signature: TxSignature::new([1; 64]) }).unwrap();
        assert!(m.state().is_terminal());
        assert!(m.outcome().unwrap().is_confirmed());
    }

    #[test]
    fn illegal_transitions_rejected() {
        let mut m = Mutation::new(JournalInstruction::delete("x"));
        let err = m
            .transition(MutationState::Confirmed { signature: TxSignature::new([1; 64]) })
            .unwrap_err();
        assert!(matches!(err, SdkError::InvalidState(_)));
        m.transition(MutationState::Failed { error: SdkError::Transport("x".into()) }).unwrap();
        assert!(m.transition(MutationState::Pending).is_err());
        assert!(m.outcome().is_some());
    }

    #[test]
    fn mutation_ids_are_unique() {
        let a = Mutation::new(JournalInstruction::delete("x"));
        let b = Mutation::new(JournalInstruction::delete("x"));
        assert_ne!(a.id(), b.id());
        assert_eq!(a.kind(), MutationKind::Delete);
    }

    #[tokio::test]
    async fn create_confirms() {
        let (ledger, pipeline) = pipeline();
        let mut m = Mutation::new(JournalInstruction::create("t", "m"));
        let outcome = pipeline.drive(&mut m).await;
        assert!(outcome.is_confirmed());
        assert_eq!(m.outcome(), Some(outcome));
        assert_eq!(ledger.entries().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ledger_rejection_fails() {
        let (_ledger, pipeline) = pipeline();
        let outcome = pipeline.update("missing", "m").await;
        assert!(outcome.error().unwrap().is_constraint(ConstraintKind::NotFound));
    }

    #[tokio::test]
    async fn invalid_input_fails_before_submission() {
        let (ledger, pipeline) = pipeline();
        let mut m = Mutation::new(JournalInstruction::create("t".repeat(33), "m"));
        let outcome = pipeline.drive(&mut m).await;
        assert!(matches!(outcome.error(), Some(SdkError::InvalidArgument(_))));
        assert!(matches!(m.state(), MutationState::Failed { .. }));
        assert_eq!(ledger.slot().unwrap(), 1);
    }

    #[tokio::test]
    async fn unavailable_node_fails_with_transport() {
        let (ledger, pipeline) = pipeline();
        ledger.set_unavailable(true);
        let outcome = pipeline.delete("t").await;
        assert!(matches!(outcome.error(), Some(SdkError::Transport(_))));
    }

    #[tokio::test]
    async fn finished_mutation_cannot_rerun() {
        let (_ledger, pipeline) = pipeline();
        let mut m = Mutation::new(JournalInstruction::create("t", "m"));
        assert!(pipeline.drive(&mut m).await.is_confirmed());
        let again = pipeline.drive(&mut m).await;
        assert!(matches!(again.error(), Some(SdkError::InvalidState(_))));
    }

    #[test]
    fn failure_prefixes() {
        assert_eq!(MutationKind::Create.failure_prefix(), "Error creating entry");
        assert_eq!(MutationKind::Update.failure_prefix(), "Error updating entry");
        assert_eq!(MutationKind::Delete.failure_prefix(), "Error deleting entry");
    }
}
