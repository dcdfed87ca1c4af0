//! Scripted in-memory ledger for tests and offline demos.

use async_trait::async_trait;
use solana_program::pubkey::Pubkey;
use solana_sdk::{
    signature::{Keypair, Signature, Signer},
    transaction::TransactionError,
};
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use crate::{
    error::LedgerError,
    instruction::MultiSigInstruction,
    ledger::{AccountRoles, FinalityStatus, LedgerGateway},
};

/// Everything the mock saw for one accepted submission.
#[derive(Debug, Clone)]
pub struct SubmittedInstruction {
    pub signature: Signature,
    pub program_id: Pubkey,
    pub data: Vec<u8>,
    pub instruction: Option<MultiSigInstruction>,
    pub roles: AccountRoles,
    pub signers: Vec<Pubkey>,
}

#[derive(Default)]
struct MockState {
    balances: HashMap<Pubkey, u64>,
    submissions: Vec<SubmittedInstruction>,
    faucet_requests: Vec<(Pubkey, u64)>,
    /// Remaining status polls that report "pending", per signature.
    pending_polls: HashMap<Signature, usize>,
    onchain_errors: HashMap<Signature, TransactionError>,
    polls_before_finality: usize,
    next_rejection: Option<LedgerError>,
    failing_status_polls: usize,
    balance_unavailable: bool,
    next_signature: u64,
    slot: u64,
    status_calls: usize,
    balance_calls: usize,
}

#[derive(Default)]
pub struct MockLedger {
    state: Mutex<MockState>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every new signature reports pending for `polls` status queries
    /// before reporting finality.
    pub fn with_finality_after(polls: usize) -> Self {
        let ledger = Self::default();
        ledger.lock().polls_before_finality = polls;
        ledger
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_balance(&self, address: Pubkey, lamports: u64) {
        self.lock().balances.insert(address, lamports);
    }

    pub fn balance_of(&self, address: &Pubkey) -> u64 {
        self.lock().balances.get(address).copied().unwrap_or(0)
    }

    /// Make the next submission fail with `err` instead of being accepted.
    pub fn reject_next(&self, err: LedgerError) {
        self.lock().next_rejection = Some(err);
    }

    /// Make the next `count` status queries fail with a transport error.
    pub fn fail_status_polls(&self, count: usize) {
        self.lock().failing_status_polls = count;
    }

    pub fn set_balance_unavailable(&self, unavailable: bool) {
        self.lock().balance_unavailable = unavailable;
    }

    /// Force a signature to report finality on its next status query.
    pub fn finalize(&self, signature: &Signature) {
        self.lock().pending_polls.insert(*signature, 0);
    }

    /// Finalize `signature` on its next status query with an execution error.
    pub fn fail_on_chain(&self, signature: &Signature, err: TransactionError) {
        let mut state = self.lock();
        state.pending_polls.insert(*signature, 0);
        state.onchain_errors.insert(*signature, err);
    }

    pub fn submissions(&self) -> Vec<SubmittedInstruction> {
        self.lock().submissions.clone()
    }

    pub fn submission_count(&self) -> usize {
        self.lock().submissions.len()
    }

    pub fn last_submission(&self) -> Option<SubmittedInstruction> {
        self.lock().submissions.last().cloned()
    }

    pub fn faucet_requests(&self) -> Vec<(Pubkey, u64)> {
        self.lock().faucet_requests.clone()
    }

    pub fn status_calls(&self) -> usize {
        self.lock().status_calls
    }

    pub fn balance_calls(&self) -> usize {
        self.lock().balance_calls
    }

    fn issue_signature(state: &mut MockState) -> Signature {
        state.next_signature += 1;
        let mut bytes = [0u8; 64];
        bytes[..8].copy_from_slice(&state.next_signature.to_le_bytes());
        let signature = Signature::from(bytes);
        state
            .pending_polls
            .insert(signature, state.polls_before_finality);
        signature
    }
}

#[async_trait]
impl LedgerGateway for MockLedger {
    async fn submit(
        &self,
        program_id: &Pubkey,
        data: Vec<u8>,
        roles: &AccountRoles,
        signers: &[&Keypair],
    ) -> Result<Signature, LedgerError> {
        let mut state = self.lock();
        if let Some(err) = state.next_rejection.take() {
            return Err(err);
        }
        let signature = Self::issue_signature(&mut state);
        state.submissions.push(SubmittedInstruction {
            signature,
            program_id: *program_id,
            instruction: MultiSigInstruction::unpack(&data).ok(),
            data,
            roles: roles.clone(),
            signers: signers.iter().map(|k| k.pubkey()).collect(),
        });
        Ok(signature)
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, LedgerError> {
        let mut state = self.lock();
        state.balance_calls += 1;
        if state.balance_unavailable {
            return Err(LedgerError::Transport("balance unavailable".to_string()));
        }
        Ok(state.balances.get(address).copied().unwrap_or(0))
    }

    async fn get_transaction_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<FinalityStatus>, LedgerError> {
        let mut state = self.lock();
        state.status_calls += 1;
        if state.failing_status_polls > 0 {
            state.failing_status_polls -= 1;
            return Err(LedgerError::Transport("status unavailable".to_string()));
        }
        let finalized = match state.pending_polls.get_mut(signature) {
            Some(0) => true,
            Some(remaining) => {
                *remaining -= 1;
                false
            }
            None => false,
        };
        if !finalized {
            return Ok(None);
        }
        state.slot += 1;
        Ok(Some(FinalityStatus {
            slot: state.slot,
            err: state.onchain_errors.get(signature).cloned(),
        }))
    }

    async fn request_faucet_funds(
        &self,
        address: &Pubkey,
        lamports: u64,
    ) -> Result<Signature, LedgerError> {
        let mut state = self.lock();
        if let Some(err) = state.next_rejection.take() {
            return Err(err);
        }
        state.faucet_requests.push((*address, lamports));
        *state.balances.entry(*address).or_insert(0) += lamports;
        Ok(Self::issue_signature(&mut state))
    }
}
