//! One governance session: the wallet, its open proposal and its in-flight
//! submission, plus the operations a front end calls.

use solana_program::pubkey::Pubkey;
use solana_sdk::{
    signature::{Keypair, Signature, Signer},
    signer::keypair::keypair_from_seed,
};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info, warn};

use crate::{
    config::{ClientConfig, ConfigError},
    error::{MultiSigError, Result, ValidationError},
    instruction::MultiSigInstruction,
    ledger::{AccountRoles, LedgerGateway},
    poller::{PollSettings, PollerEvent},
    proposal::ProposalMachine,
    state::{
        MultiSigWallet, PendingSnapshot, ProposalPayload, ProposalSnapshot, SessionSnapshot,
        SubmissionAction, WalletState,
    },
    submission::Submitter,
};

pub struct WalletSession {
    config: ClientConfig,
    program_id: Pubkey,
    wallet: Option<MultiSigWallet>,
    proposals: ProposalMachine,
    submitter: Submitter,
    events: UnboundedReceiver<PollerEvent>,
}

impl WalletSession {
    /// Must be called from within a tokio runtime; submissions spawn pollers.
    pub fn new(config: ClientConfig, gateway: Arc<dyn LedgerGateway>) -> Result<Self, ConfigError> {
        config.validate()?;
        let program_id = config.program_id()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let settings = PollSettings {
            interval: config.poll_interval(),
            timeout: config.finality_timeout(),
        };
        Ok(Self {
            config,
            program_id,
            wallet: None,
            proposals: ProposalMachine::new(),
            submitter: Submitter::new(gateway, settings, tx),
            events: rx,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn wallet_state(&self) -> WalletState {
        match self.wallet {
            Some(_) => WalletState::Created,
            None => WalletState::Uninitialized,
        }
    }

    pub fn wallet(&self) -> Option<&MultiSigWallet> {
        self.wallet.as_ref()
    }

    fn created_wallet(&self) -> Result<&MultiSigWallet, ValidationError> {
        self.wallet.as_ref().ok_or(ValidationError::WalletNotCreated)
    }

    /// Applies any finality reports already received before taking the view.
    pub fn current_state(&mut self) -> SessionSnapshot {
        self.process_events();
        SessionSnapshot {
            wallet_state: self.wallet_state(),
            wallet: self.wallet.as_ref().map(Into::into),
            proposal_state: self.proposals.state(),
            proposal: self.proposals.proposal().map(ProposalSnapshot::from),
            pending: self.submitter.pending().map(|p| PendingSnapshot {
                signature: p.signature.to_string(),
                action: p.action,
                stale: p.stale,
            }),
        }
    }

    fn check_owners(&self, owners: &[Pubkey]) -> Result<(), ValidationError> {
        if owners.len() < self.config.min_owners {
            return Err(ValidationError::InsufficientOwners {
                min: self.config.min_owners,
                got: owners.len(),
            });
        }
        if owners.len() > self.config.max_owners {
            return Err(ValidationError::TooManyOwners {
                max: self.config.max_owners,
                got: owners.len(),
            });
        }
        Ok(())
    }

    fn check_threshold(&self, threshold: u64, owner_count: usize) -> Result<(), ValidationError> {
        let max = self.config.max_threshold.min(owner_count as u64);
        if threshold < self.config.min_threshold || threshold > max {
            return Err(ValidationError::ThresholdOutOfRange {
                threshold,
                min: self.config.min_threshold,
                max,
            });
        }
        Ok(())
    }

    /// Derive the base key from `base_seed`, submit CreateWallet signed by
    /// `initiator` and the base key, and return the wallet's derived address.
    pub async fn create_wallet(
        &mut self,
        initiator: &Keypair,
        base_seed: &[u8],
        owners: Vec<Pubkey>,
        threshold: u64,
    ) -> Result<Pubkey> {
        self.process_events();
        if self.wallet.is_some() {
            return Err(ValidationError::WalletAlreadyCreated.into());
        }
        self.submitter.ensure_idle()?;
        self.check_owners(&owners)?;
        self.check_threshold(threshold, owners.len())?;
        let base_key = base_key_from_seed(base_seed)?;

        match self.submitter.gateway().get_balance(&initiator.pubkey()).await {
            Ok(0) => return Err(ValidationError::InsufficientFeeBalance.into()),
            Ok(_) => {}
            Err(e) => {
                warn!(initiator = %initiator.pubkey(), error = %e, "could not check fee balance, submitting anyway")
            }
        }

        let wallet = MultiSigWallet::new(self.program_id, base_key, owners, threshold);
        let roles = AccountRoles::for_create(
            initiator.pubkey(),
            wallet.base_pubkey(),
            wallet.derived_address,
        );
        let instruction = MultiSigInstruction::CreateWallet {
            owners: wallet.owners.clone(),
            threshold,
        };
        self.submitter
            .submit(
                SubmissionAction::CreateWallet,
                &self.program_id,
                &instruction,
                &roles,
                &[initiator, wallet.base_key()],
                Some(wallet.derived_address),
            )
            .await?;

        let address = wallet.derived_address;
        info!(wallet = %address, owners = wallet.owners.len(), threshold, "wallet created");
        self.wallet = Some(wallet);
        Ok(address)
    }

    /// Attach to a wallet that already exists on-chain without submitting
    /// anything.
    pub fn restore_wallet(
        &mut self,
        base_seed: &[u8],
        owners: Vec<Pubkey>,
        threshold: u64,
    ) -> Result<Pubkey> {
        if self.wallet.is_some() {
            return Err(ValidationError::WalletAlreadyCreated.into());
        }
        let base_key = base_key_from_seed(base_seed)?;
        let wallet = MultiSigWallet::new(self.program_id, base_key, owners, threshold);
        let address = wallet.derived_address;
        info!(wallet = %address, "wallet restored");
        self.wallet = Some(wallet);
        Ok(address)
    }

    pub async fn set_owners(&mut self, proposer: &Keypair, owners: Vec<Pubkey>) -> Result<Signature> {
        self.process_events();
        let wallet = self.created_wallet()?;
        self.check_owners(&owners)?;
        if (owners.len() as u64) < wallet.threshold {
            return Err(ValidationError::InsufficientOwners {
                min: wallet.threshold as usize,
                got: owners.len(),
            }
            .into());
        }
        let to = wallet.derived_address;
        self.propose(ProposalPayload::SetOwners(owners), to, proposer).await
    }

    pub async fn set_threshold(&mut self, proposer: &Keypair, threshold: u64) -> Result<Signature> {
        self.process_events();
        let wallet = self.created_wallet()?;
        self.check_threshold(threshold, wallet.owners.len())?;
        let to = wallet.derived_address;
        self.propose(ProposalPayload::SetThreshold(threshold), to, proposer).await
    }

    pub async fn transfer(&mut self, proposer: &Keypair, to: Pubkey, amount: u64) -> Result<Signature> {
        self.process_events();
        let wallet = self.created_wallet()?;
        if amount == 0 {
            return Err(ValidationError::ZeroAmount.into());
        }
        if to == wallet.derived_address {
            return Err(ValidationError::TransferToSelf.into());
        }
        self.propose(ProposalPayload::Transfer { to, amount }, to, proposer).await
    }

    async fn propose(
        &mut self,
        payload: ProposalPayload,
        to: Pubkey,
        proposer: &Keypair,
    ) -> Result<Signature> {
        let wallet = self.wallet.as_ref().ok_or(ValidationError::WalletNotCreated)?;
        self.proposals
            .propose(&mut self.submitter, wallet, payload, to, proposer)
            .await
    }

    pub async fn confirm(&mut self, owner: &Keypair) -> Result<Signature> {
        self.process_events();
        let wallet = self.wallet.as_ref().ok_or(ValidationError::WalletNotCreated)?;
        self.proposals.confirm(&mut self.submitter, wallet, owner).await
    }

    pub async fn reject(&mut self, owner: &Keypair) -> Result<Signature> {
        self.process_events();
        let wallet = self.wallet.as_ref().ok_or(ValidationError::WalletNotCreated)?;
        self.proposals.reject(&mut self.submitter, wallet, owner).await
    }

    /// Quorum is enforced by the program; an unmet threshold comes back as
    /// [`MultiSigError::SubmissionRejected`].
    pub async fn execute(&mut self, owner: &Keypair) -> Result<Signature> {
        self.process_events();
        let wallet = self.wallet.as_ref().ok_or(ValidationError::WalletNotCreated)?;
        let (signature, executed) = self
            .proposals
            .execute(&mut self.submitter, wallet, owner)
            .await?;

        if let Some(wallet) = self.wallet.as_mut() {
            match executed.payload {
                ProposalPayload::SetOwners(owners) => {
                    info!(wallet = %wallet.derived_address, owners = owners.len(), "owner set replaced");
                    wallet.owners = owners;
                }
                ProposalPayload::SetThreshold(threshold) => {
                    info!(wallet = %wallet.derived_address, threshold, "threshold changed");
                    wallet.threshold = threshold;
                }
                ProposalPayload::Transfer { .. } => {}
            }
        }
        Ok(signature)
    }

    pub async fn cancel(&mut self, owner: &Keypair) -> Result<Signature> {
        self.process_events();
        let wallet = self.wallet.as_ref().ok_or(ValidationError::WalletNotCreated)?;
        self.proposals.cancel(&mut self.submitter, wallet, owner).await
    }

    /// Re-read the wallet balance. Failures keep the cached value.
    pub async fn refresh_balance(&mut self) -> Result<u64> {
        self.process_events();
        let address = self.created_wallet()?.derived_address;
        let fetched = self.submitter.gateway().get_balance(&address).await;
        let wallet = self.wallet.as_mut().ok_or(ValidationError::WalletNotCreated)?;
        match fetched {
            Ok(lamports) => wallet.balance = lamports,
            Err(e) => warn!(wallet = %address, error = %e, "balance refresh failed, keeping cached value"),
        }
        Ok(wallet.balance)
    }

    /// Ask the test-network faucet to fund `address`; tracked like any other
    /// submission.
    pub async fn request_faucet_funds(&mut self, address: &Pubkey) -> Result<Signature> {
        self.process_events();
        let watch = self.wallet.as_ref().map(|w| w.derived_address);
        self.submitter
            .request_faucet(address, self.config.faucet_lamports, watch)
            .await
    }

    /// Apply every poller report received so far. Returns how many were applied.
    pub fn process_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events.try_recv() {
            self.apply_event(event);
            applied += 1;
        }
        applied
    }

    fn apply_event(&mut self, event: PollerEvent) {
        match event {
            PollerEvent::Finalized {
                signature,
                slot,
                err,
                balance,
            } => {
                let Some(pending) = self.submitter.settle(&signature) else {
                    debug!(%signature, "ignoring finality report for a submission no longer tracked");
                    return;
                };
                if let Some(err) = err {
                    warn!(%signature, action = ?pending.action, error = %err, "submission finalized with an on-chain error");
                }
                if let (Some(lamports), Some(wallet)) = (balance, self.wallet.as_mut()) {
                    wallet.balance = lamports;
                }
                info!(%signature, slot, action = ?pending.action, "pending submission cleared");
            }
            PollerEvent::TimedOut { signature, waited } => {
                if self.submitter.mark_stale(&signature) {
                    warn!(%signature, ?waited, "pending submission is stale; refresh or abandon it");
                }
            }
        }
    }

    /// Wait until the in-flight submission settles. Fails with
    /// [`MultiSigError::Timeout`] once the poller gives up.
    pub async fn wait_for_settlement(&mut self) -> Result<()> {
        self.process_events();
        loop {
            match self.submitter.pending() {
                None => return Ok(()),
                Some(pending) if pending.stale => {
                    return Err(MultiSigError::Timeout(
                        self.config.finality_timeout().unwrap_or_default(),
                    ))
                }
                Some(_) => {}
            }
            match self.events.recv().await {
                Some(event) => self.apply_event(event),
                None => return Err(MultiSigError::Transport("poller channel closed".to_string())),
            }
        }
    }

    /// Manual recovery for a stuck submission: reconcile now if the ledger
    /// reports finality, otherwise resume polling. Returns whether the
    /// submission was cleared.
    pub async fn refresh_pending(&mut self) -> Result<bool> {
        self.process_events();
        let Some(signature) = self.submitter.pending().map(|p| p.signature) else {
            return Ok(false);
        };
        match self.submitter.gateway().get_transaction_status(&signature).await? {
            Some(status) => {
                let balance = match self.submitter.watched_address() {
                    Some(address) => match self.submitter.gateway().get_balance(&address).await {
                        Ok(lamports) => Some(lamports),
                        Err(e) => {
                            warn!(%address, error = %e, "balance refresh failed, keeping cached value");
                            None
                        }
                    },
                    None => None,
                };
                self.apply_event(PollerEvent::Finalized {
                    signature,
                    slot: status.slot,
                    err: status.err,
                    balance,
                });
                Ok(true)
            }
            None => {
                if self.submitter.restart_poller() {
                    info!(%signature, "resumed polling stale submission");
                }
                Ok(false)
            }
        }
    }

    /// Drop the in-flight marker without observing finality. The submission
    /// may still land; refresh the balance afterwards.
    pub fn abandon_pending(&mut self) -> Option<Signature> {
        let abandoned = self.submitter.abandon()?;
        warn!(signature = %abandoned.signature, action = ?abandoned.action, "pending submission abandoned");
        Some(abandoned.signature)
    }
}

fn base_key_from_seed(seed: &[u8]) -> Result<Keypair, ValidationError> {
    if seed.len() < 32 {
        return Err(ValidationError::InvalidSeed);
    }
    keypair_from_seed(seed).map_err(|_| ValidationError::InvalidSeed)
}
