//! Lifecycle of the single outstanding proposal:
//! `None -> ProposalOpen -> {Executed | Cancelled} -> None`.
//!
//! Every transition submits first and mutates local state only once the
//! ledger has accepted the instruction. Quorum is never checked here; the
//! program decides whether an execute goes through.

use solana_program::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use tracing::info;

use crate::{
    error::{Result, ValidationError},
    instruction::MultiSigInstruction,
    ledger::AccountRoles,
    state::{MultiSigWallet, Proposal, ProposalPayload, ProposalState, SubmissionAction},
    submission::Submitter,
};

#[derive(Debug, Default)]
pub struct ProposalMachine {
    proposal: Option<Proposal>,
}

impl ProposalMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ProposalState {
        match self.proposal {
            Some(_) => ProposalState::ProposalOpen,
            None => ProposalState::None,
        }
    }

    pub fn proposal(&self) -> Option<&Proposal> {
        self.proposal.as_ref()
    }

    fn require_open(&self) -> Result<&Proposal, ValidationError> {
        self.proposal.as_ref().ok_or(ValidationError::NoOpenProposal)
    }

    pub async fn propose(
        &mut self,
        submitter: &mut Submitter,
        wallet: &MultiSigWallet,
        payload: ProposalPayload,
        to_address: Pubkey,
        proposer: &Keypair,
    ) -> Result<Signature> {
        submitter.ensure_idle()?;
        if self.proposal.is_some() {
            return Err(ValidationError::Busy.into());
        }

        let roles = AccountRoles::for_proposal(
            proposer.pubkey(),
            wallet.base_pubkey(),
            wallet.derived_address,
            Some(to_address),
        );
        let signature = submitter
            .submit(
                SubmissionAction::Propose,
                &wallet.program_id,
                &payload.to_instruction(),
                &roles,
                &[proposer],
                Some(wallet.derived_address),
            )
            .await?;

        let proposal = Proposal::new(payload, to_address, proposer.pubkey());
        info!(%signature, kind = ?proposal.kind(), proposer = %proposal.proposer, to = %to_address, "proposal opened");
        self.proposal = Some(proposal);
        Ok(signature)
    }

    /// Sent even if `owner` already confirmed; the program decides whether a
    /// repeat is an error.
    pub async fn confirm(
        &mut self,
        submitter: &mut Submitter,
        wallet: &MultiSigWallet,
        owner: &Keypair,
    ) -> Result<Signature> {
        let signature = self
            .vote(submitter, wallet, owner, MultiSigInstruction::ConfirmTransaction)
            .await?;
        if let Some(proposal) = self.proposal.as_mut() {
            proposal.record_confirmation(owner.pubkey());
            info!(%signature, owner = %owner.pubkey(), signers = proposal.signers().len(), "proposal confirmed");
        }
        Ok(signature)
    }

    pub async fn reject(
        &mut self,
        submitter: &mut Submitter,
        wallet: &MultiSigWallet,
        owner: &Keypair,
    ) -> Result<Signature> {
        let signature = self
            .vote(submitter, wallet, owner, MultiSigInstruction::RejectTransaction)
            .await?;
        if let Some(proposal) = self.proposal.as_mut() {
            proposal.record_rejection(owner.pubkey());
            info!(%signature, owner = %owner.pubkey(), opponents = proposal.opponents().len(), "proposal rejected");
        }
        Ok(signature)
    }

    async fn vote(
        &self,
        submitter: &mut Submitter,
        wallet: &MultiSigWallet,
        owner: &Keypair,
        instruction: MultiSigInstruction,
    ) -> Result<Signature> {
        submitter.ensure_idle()?;
        self.require_open()?;
        let action = match instruction {
            MultiSigInstruction::RejectTransaction => SubmissionAction::Reject,
            _ => SubmissionAction::Confirm,
        };
        let roles = AccountRoles::for_proposal(
            owner.pubkey(),
            wallet.base_pubkey(),
            wallet.derived_address,
            None,
        );
        submitter
            .submit(
                action,
                &wallet.program_id,
                &instruction,
                &roles,
                &[owner],
                Some(wallet.derived_address),
            )
            .await
    }

    /// Returns the proposal that was executed so the caller can apply
    /// governance changes locally.
    pub async fn execute(
        &mut self,
        submitter: &mut Submitter,
        wallet: &MultiSigWallet,
        owner: &Keypair,
    ) -> Result<(Signature, Proposal)> {
        submitter.ensure_idle()?;
        let to_address = self.require_open()?.to_address;
        let roles = AccountRoles::for_proposal(
            owner.pubkey(),
            wallet.base_pubkey(),
            wallet.derived_address,
            Some(to_address),
        );
        let signature = submitter
            .submit(
                SubmissionAction::Execute,
                &wallet.program_id,
                &MultiSigInstruction::ExecuteTransaction,
                &roles,
                &[owner],
                Some(wallet.derived_address),
            )
            .await?;

        let proposal = self.close();
        info!(%signature, kind = ?proposal.as_ref().map(Proposal::kind), "proposal executed");
        Ok((signature, proposal.ok_or(ValidationError::NoOpenProposal)?))
    }

    pub async fn cancel(
        &mut self,
        submitter: &mut Submitter,
        wallet: &MultiSigWallet,
        owner: &Keypair,
    ) -> Result<Signature> {
        submitter.ensure_idle()?;
        self.require_open()?;
        let roles = AccountRoles::for_proposal(
            owner.pubkey(),
            wallet.base_pubkey(),
            wallet.derived_address,
            None,
        );
        let signature = submitter
            .submit(
                SubmissionAction::Cancel,
                &wallet.program_id,
                &MultiSigInstruction::CancelTransaction,
                &roles,
                &[owner],
                Some(wallet.derived_address),
            )
            .await?;

        self.close();
        info!(%signature, owner = %owner.pubkey(), "proposal cancelled");
        Ok(signature)
    }

    fn close(&mut self) -> Option<Proposal> {
        self.proposal.take()
    }
}
