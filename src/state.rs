use serde::{Deserialize, Serialize};
use solana_program::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use std::{collections::BTreeSet, fmt, time::Instant};

use crate::instruction::{MultiSigInstruction, TransactionVariant};

/// Seed prefix of the wallet's program-derived address.
pub const MULTISIG_SEED: &[u8] = b"MultiSigWallet";

/// Derive the wallet address from the base key and program id.
pub fn derive_wallet_address(base_key: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[MULTISIG_SEED, base_key.as_ref()], program_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletState {
    Uninitialized,
    Created,
}

/// The governed wallet as seen by this client. `balance` is a cache.
#[derive(Debug)]
pub struct MultiSigWallet {
    pub program_id: Pubkey,
    pub derived_address: Pubkey,
    pub bump: u8,
    base_key: Keypair,
    pub owners: Vec<Pubkey>,
    pub threshold: u64,
    pub balance: u64,
}

impl MultiSigWallet {
    pub fn new(program_id: Pubkey, base_key: Keypair, owners: Vec<Pubkey>, threshold: u64) -> Self {
        let (derived_address, bump) = derive_wallet_address(&base_key.pubkey(), &program_id);
        Self {
            program_id,
            derived_address,
            bump,
            base_key,
            owners,
            threshold,
            balance: 0,
        }
    }

    pub fn base_key(&self) -> &Keypair {
        &self.base_key
    }

    pub fn base_pubkey(&self) -> Pubkey {
        self.base_key.pubkey()
    }
}

/// What an open proposal will do once executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposalPayload {
    SetOwners(Vec<Pubkey>),
    SetThreshold(u64),
    Transfer { to: Pubkey, amount: u64 },
}

impl ProposalPayload {
    pub fn kind(&self) -> TransactionVariant {
        match self {
            ProposalPayload::SetOwners(_) => TransactionVariant::SetOwners,
            ProposalPayload::SetThreshold(_) => TransactionVariant::SetThreshold,
            ProposalPayload::Transfer { .. } => TransactionVariant::Transfer,
        }
    }

    pub fn to_instruction(&self) -> MultiSigInstruction {
        let (amount, owners, threshold) = match self {
            ProposalPayload::SetOwners(owners) => (0, owners.clone(), 0),
            ProposalPayload::SetThreshold(threshold) => (0, vec![], *threshold),
            ProposalPayload::Transfer { amount, .. } => (*amount, vec![], 0),
        };
        MultiSigInstruction::CreateTransaction {
            variant: self.kind(),
            amount,
            owners,
            threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub payload: ProposalPayload,
    /// Governance proposals target the wallet's own derived address.
    pub to_address: Pubkey,
    pub proposer: Pubkey,
    signers: BTreeSet<Pubkey>,
    opponents: BTreeSet<Pubkey>,
}

impl Proposal {
    pub fn new(payload: ProposalPayload, to_address: Pubkey, proposer: Pubkey) -> Self {
        Self {
            payload,
            to_address,
            proposer,
            signers: BTreeSet::from([proposer]),
            opponents: BTreeSet::new(),
        }
    }

    pub fn kind(&self) -> TransactionVariant {
        self.payload.kind()
    }

    pub fn signers(&self) -> &BTreeSet<Pubkey> {
        &self.signers
    }

    pub fn opponents(&self) -> &BTreeSet<Pubkey> {
        &self.opponents
    }

    pub fn record_confirmation(&mut self, owner: Pubkey) {
        self.opponents.remove(&owner);
        self.signers.insert(owner);
    }

    pub fn record_rejection(&mut self, owner: Pubkey) {
        self.signers.remove(&owner);
        self.opponents.insert(owner);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalState {
    None,
    ProposalOpen,
}

/// Which action produced an in-flight submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionAction {
    CreateWallet,
    Propose,
    Confirm,
    Reject,
    Execute,
    Cancel,
    Faucet,
}

/// The single in-flight ledger write a wallet may have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSubmission {
    pub signature: Signature,
    pub action: SubmissionAction,
    pub submitted_at: Instant,
    /// Set when the poller gave up waiting for finality.
    pub stale: bool,
}

impl PendingSubmission {
    pub fn new(signature: Signature, action: SubmissionAction) -> Self {
        Self {
            signature,
            action,
            submitted_at: Instant::now(),
            stale: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSnapshot {
    pub program_id: String,
    pub derived_address: String,
    pub base_key: String,
    pub owners: Vec<String>,
    pub threshold: u64,
    pub balance: u64,
}

impl From<&MultiSigWallet> for WalletSnapshot {
    fn from(wallet: &MultiSigWallet) -> Self {
        Self {
            program_id: wallet.program_id.to_string(),
            derived_address: wallet.derived_address.to_string(),
            base_key: wallet.base_pubkey().to_string(),
            owners: wallet.owners.iter().map(ToString::to_string).collect(),
            threshold: wallet.threshold,
            balance: wallet.balance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalSnapshot {
    pub kind: String,
    pub to_address: String,
    pub proposer: String,
    pub amount: u64,
    pub owners: Vec<String>,
    pub threshold: u64,
    pub signers: Vec<String>,
    pub opponents: Vec<String>,
}

impl From<&Proposal> for ProposalSnapshot {
    fn from(proposal: &Proposal) -> Self {
        let (amount, owners, threshold) = match &proposal.payload {
            ProposalPayload::SetOwners(owners) => {
                (0, owners.iter().map(ToString::to_string).collect(), 0)
            }
            ProposalPayload::SetThreshold(threshold) => (0, vec![], *threshold),
            ProposalPayload::Transfer { amount, .. } => (*amount, vec![], 0),
        };
        Self {
            kind: format!("{:?}", proposal.kind()),
            to_address: proposal.to_address.to_string(),
            proposer: proposal.proposer.to_string(),
            amount,
            owners,
            threshold,
            signers: proposal.signers.iter().map(ToString::to_string).collect(),
            opponents: proposal.opponents.iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSnapshot {
    pub signature: String,
    pub action: SubmissionAction,
    pub stale: bool,
}

/// Read-only view of a session handed to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub wallet_state: WalletState,
    pub wallet: Option<WalletSnapshot>,
    pub proposal_state: ProposalState,
    pub proposal: Option<ProposalSnapshot>,
    pub pending: Option<PendingSnapshot>,
}

impl fmt::Display for SessionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "MultiSig Wallet ({:?})", self.wallet_state)?;
        if let Some(wallet) = &self.wallet {
            writeln!(f, "  Address:    {}", wallet.derived_address)?;
            writeln!(f, "  Program:    {}", wallet.program_id)?;
            writeln!(f, "  Balance:    {} lamports", wallet.balance)?;
            writeln!(f, "  Threshold:  {}/{}", wallet.threshold, wallet.owners.len())?;
            for owner in &wallet.owners {
                writeln!(f, "  Owner:      {owner}")?;
            }
        }
        match &self.proposal {
            Some(proposal) => {
                writeln!(f, "Proposal ({})", proposal.kind)?;
                writeln!(f, "  To:         {}", proposal.to_address)?;
                writeln!(f, "  Signers:    {}", proposal.signers.join(", "))?;
                writeln!(f, "  Opponents:  {}", proposal.opponents.join(", "))?;
            }
            None => writeln!(f, "No open proposal")?,
        }
        if let Some(pending) = &self.pending {
            let stale = if pending.stale { " (stale)" } else { "" };
            writeln!(f, "Pending {:?}: {}{stale}", pending.action, pending.signature)?;
        }
        Ok(())
    }
}
