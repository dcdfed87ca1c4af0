use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use solana_sdk::{instruction::InstructionError, transaction::TransactionError};
use std::time::Duration;
use thiserror::Error;

/// Local precondition failures. These are reported before any network call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Another operation is in progress; wait for it to settle")]
    Busy,

    #[error("Wallet has not been created yet")]
    WalletNotCreated,

    #[error("Wallet has already been created")]
    WalletAlreadyCreated,

    #[error("At least {min} owners required, got {got}")]
    InsufficientOwners { min: usize, got: usize },

    #[error("At most {max} owners allowed, got {got}")]
    TooManyOwners { max: usize, got: usize },

    #[error("Threshold {threshold} outside allowed range {min}..={max}")]
    ThresholdOutOfRange { threshold: u64, min: u64, max: u64 },

    #[error("No proposal is open")]
    NoOpenProposal,

    #[error("Transfer amount must be greater than zero")]
    ZeroAmount,

    #[error("Cannot transfer to the wallet's own address")]
    TransferToSelf,

    #[error("Initiating owner has no balance to cover network fees")]
    InsufficientFeeBalance,

    #[error("Base key seed must be at least 32 bytes")]
    InvalidSeed,
}

/// Structural failures of the instruction codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Encoded instruction needs {needed} bytes, buffer holds {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },

    #[error("Instruction data is empty")]
    EmptyData,

    #[error("Unknown instruction tag {0}")]
    UnknownInstruction(u8),

    #[error("Unknown transaction variant {0}")]
    UnknownVariant(u8),

    #[error("Malformed instruction payload: {0}")]
    Malformed(String),
}

/// Failures at the ledger gateway boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Instruction rejected: {reason}")]
    Rejected {
        reason: String,
        code: Option<ProgramErrorCode>,
    },

    #[error("Ledger call timed out after {0:?}")]
    Timeout(Duration),
}

impl LedgerError {
    /// Classify a transaction error returned by the ledger, decoding the
    /// program's custom error codes where possible.
    pub fn from_transaction_error(err: &TransactionError) -> Self {
        let code = match err {
            TransactionError::InstructionError(_, InstructionError::Custom(code)) => {
                ProgramErrorCode::from_u32(*code)
            }
            _ => None,
        };
        let reason = match code {
            Some(code) => format!("{err} ({code})"),
            None => err.to_string(),
        };
        LedgerError::Rejected { reason, code }
    }
}

/// Custom error codes emitted by the on-chain multisig program.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq, FromPrimitive)]
pub enum ProgramErrorCode {
    #[error("MultiSigWallet not initialized yet")]
    UninitializedAccount = 0,

    #[error("PDA does not equal PDA passed in")]
    InvalidPda,

    #[error("Threshold out of the program's accepted range")]
    InvalidThreshold,

    #[error("Owner list length out of the program's accepted range")]
    InvalidOwnersLength,

    #[error("Signer is not an owner of the wallet")]
    InvalidOwner,

    #[error("Unexpected transaction")]
    UnexpectedTransaction,
}

/// Errors surfaced by the consumer-facing API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MultiSigError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Codec failed: {0}")]
    Codec(#[from] CodecError),

    #[error("Transport failed: {0}")]
    Transport(String),

    #[error("Submission rejected: {reason}")]
    SubmissionRejected {
        reason: String,
        code: Option<ProgramErrorCode>,
    },

    #[error("No finality observed within {0:?}")]
    Timeout(Duration),
}

impl From<LedgerError> for MultiSigError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Transport(msg) => MultiSigError::Transport(msg),
            LedgerError::Rejected { reason, code } => {
                MultiSigError::SubmissionRejected { reason, code }
            }
            LedgerError::Timeout(after) => {
                MultiSigError::Transport(format!("ledger call timed out after {after:?}"))
            }
        }
    }
}

impl MultiSigError {
    pub fn is_busy(&self) -> bool {
        matches!(self, MultiSigError::Validation(ValidationError::Busy))
    }
}

pub type Result<T, E = MultiSigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_code_is_decoded() {
        let err = TransactionError::InstructionError(0, InstructionError::Custom(4));
        match LedgerError::from_transaction_error(&err) {
            LedgerError::Rejected { code, reason } => {
                assert_eq!(code, Some(ProgramErrorCode::InvalidOwner));
                assert!(reason.contains("not an owner"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_custom_code_keeps_raw_reason() {
        let err = TransactionError::InstructionError(0, InstructionError::Custom(42));
        match LedgerError::from_transaction_error(&err) {
            LedgerError::Rejected { code, .. } => assert_eq!(code, None),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ledger_errors_map_onto_api_kinds() {
        let e: MultiSigError = LedgerError::Transport("connection reset".into()).into();
        assert_eq!(e, MultiSigError::Transport("connection reset".into()));

        let e: MultiSigError = LedgerError::Timeout(Duration::from_secs(30)).into();
        assert_eq!(
            e,
            MultiSigError::Transport("ledger call timed out after 30s".into())
        );
        assert!(!matches!(e, MultiSigError::Timeout(_)));

        let e: MultiSigError = ValidationError::Busy.into();
        assert!(e.is_busy());
    }
}
