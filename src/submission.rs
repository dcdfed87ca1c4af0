//! The single in-flight submission slot of a wallet session.

use solana_program::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::{
    error::{Result, ValidationError},
    instruction::MultiSigInstruction,
    ledger::{AccountRoles, LedgerGateway},
    poller::{self, PollSettings, PollerEvent, PollerHandle},
    state::{PendingSubmission, SubmissionAction},
};

pub struct Submitter {
    gateway: Arc<dyn LedgerGateway>,
    settings: PollSettings,
    events: UnboundedSender<PollerEvent>,
    pending: Option<PendingSubmission>,
    watch: Option<Pubkey>,
    poller: Option<PollerHandle>,
}

impl Submitter {
    pub fn new(
        gateway: Arc<dyn LedgerGateway>,
        settings: PollSettings,
        events: UnboundedSender<PollerEvent>,
    ) -> Self {
        Self {
            gateway,
            settings,
            events,
            pending: None,
            watch: None,
            poller: None,
        }
    }

    pub fn gateway(&self) -> &dyn LedgerGateway {
        self.gateway.as_ref()
    }

    pub fn pending(&self) -> Option<&PendingSubmission> {
        self.pending.as_ref()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(|p| !p.is_finished())
    }

    pub fn ensure_idle(&self) -> Result<(), ValidationError> {
        match &self.pending {
            Some(_) => Err(ValidationError::Busy),
            None => Ok(()),
        }
    }

    /// Encode and send `instruction`, then track it until finality.
    /// Nothing is recorded unless the ledger accepts the submission.
    pub async fn submit(
        &mut self,
        action: SubmissionAction,
        program_id: &Pubkey,
        instruction: &MultiSigInstruction,
        roles: &AccountRoles,
        signers: &[&Keypair],
        watch: Option<Pubkey>,
    ) -> Result<Signature> {
        self.ensure_idle()?;
        let data = instruction.pack()?;
        let signature = self
            .gateway
            .submit(program_id, data, roles, signers)
            .await
            .inspect_err(|e| warn!(instruction = instruction.name(), error = %e, "submission failed"))?;
        info!(%signature, instruction = instruction.name(), signer = %roles.signer, "submission accepted");
        self.track(signature, action, watch);
        Ok(signature)
    }

    pub async fn request_faucet(
        &mut self,
        address: &Pubkey,
        lamports: u64,
        watch: Option<Pubkey>,
    ) -> Result<Signature> {
        self.ensure_idle()?;
        let signature = self
            .gateway
            .request_faucet_funds(address, lamports)
            .await
            .inspect_err(|e| warn!(%address, error = %e, "faucet request failed"))?;
        info!(%signature, %address, lamports, "faucet request accepted");
        self.track(signature, SubmissionAction::Faucet, watch);
        Ok(signature)
    }

    fn track(&mut self, signature: Signature, action: SubmissionAction, watch: Option<Pubkey>) {
        self.pending = Some(PendingSubmission::new(signature, action));
        self.watch = watch;
        self.spawn_poller(signature);
    }

    fn spawn_poller(&mut self, signature: Signature) {
        self.poller = Some(poller::spawn(
            self.gateway.clone(),
            signature,
            self.watch,
            self.settings,
            self.events.clone(),
        ));
    }

    /// Clear the slot if `signature` is the one in flight.
    pub fn settle(&mut self, signature: &Signature) -> Option<PendingSubmission> {
        if self.pending.as_ref()?.signature != *signature {
            return None;
        }
        self.poller = None;
        self.watch = None;
        self.pending.take()
    }

    pub fn mark_stale(&mut self, signature: &Signature) -> bool {
        match self.pending.as_mut() {
            Some(pending) if pending.signature == *signature => {
                pending.stale = true;
                self.poller = None;
                true
            }
            _ => false,
        }
    }

    /// Resume polling a stale submission.
    pub fn restart_poller(&mut self) -> bool {
        let Some(pending) = self.pending.as_mut() else {
            return false;
        };
        if self.poller.as_ref().is_some_and(|p| !p.is_finished()) {
            return false;
        }
        pending.stale = false;
        let signature = pending.signature;
        self.spawn_poller(signature);
        true
    }

    pub fn watched_address(&self) -> Option<Pubkey> {
        self.watch
    }

    /// Forget the in-flight submission without waiting for finality.
    pub fn abandon(&mut self) -> Option<PendingSubmission> {
        self.poller = None;
        self.watch = None;
        self.pending.take()
    }
}
