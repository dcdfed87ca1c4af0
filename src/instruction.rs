//! Wire encoding of the instructions understood by the multisig program.
//!
//! Every instruction shares one fixed-shape layout:
//!
//! ```text
//! u8        instruction tag
//! u8        transaction variant (0 when not applicable)
//! u64 LE    amount (0 when not applicable)
//! u32 LE    owner count, followed by count * 32-byte public keys
//! u64 LE    threshold (0 when not applicable)
//! ```
//!
//! Everything after the tag is a borsh struct, which is what the program
//! deserializes after splitting off the first byte.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::pubkey::Pubkey;

use crate::error::CodecError;

/// Size of the scratch buffer the encoded instruction must fit in.
pub const MAX_INSTRUCTION_LEN: usize = 1000;

/// Encoded size of an instruction carrying no owners.
pub const FIXED_INSTRUCTION_LEN: usize = 1 + 1 + 8 + 4 + 8;

/// Largest owner list that still fits in [`MAX_INSTRUCTION_LEN`].
pub const MAX_OWNERS_PER_INSTRUCTION: usize = (MAX_INSTRUCTION_LEN - FIXED_INSTRUCTION_LEN) / 32;

/// What a proposal does once executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TransactionVariant {
    SetOwners = 0,
    SetThreshold = 1,
    Transfer = 2,
}

impl TryFrom<u8> for TransactionVariant {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TransactionVariant::SetOwners),
            1 => Ok(TransactionVariant::SetThreshold),
            2 => Ok(TransactionVariant::Transfer),
            other => Err(CodecError::UnknownVariant(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultiSigInstruction {
    /// Initialize the wallet account at the derived address.
    /// Accounts:
    /// 0. [signer] initiating owner
    /// 1. [signer] base key
    /// 2. [writable] derived address
    /// 3. [] reserved placeholder
    /// 4. [] system_program
    CreateWallet {
        owners: Vec<Pubkey>,
        threshold: u64,
    },

    /// Open a proposal; the proposer counts as its first signer.
    /// Accounts:
    /// 0. [signer] proposer
    /// 1. [writable] base key
    /// 2. [writable] derived address
    /// 3. [writable] destination
    /// 4. [] system_program
    CreateTransaction {
        variant: TransactionVariant,
        amount: u64,
        owners: Vec<Pubkey>,
        threshold: u64,
    },

    /// Accounts as for `CreateTransaction`, destination unused.
    ConfirmTransaction,

    /// Accounts as for `CreateTransaction`, destination unused.
    RejectTransaction,

    /// Apply the open proposal. The program checks the quorum.
    /// Destination must match the one recorded at proposal time.
    ExecuteTransaction,

    /// Drop the open proposal regardless of its tally.
    CancelTransaction,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Default, Clone, PartialEq, Eq)]
struct InstructionPayload {
    variant: u8,
    amount: u64,
    owners: Vec<Pubkey>,
    threshold: u64,
}

impl MultiSigInstruction {
    pub fn tag(&self) -> u8 {
        match self {
            Self::CreateWallet { .. } => 0,
            Self::CreateTransaction { .. } => 1,
            Self::ConfirmTransaction => 2,
            Self::RejectTransaction => 3,
            Self::ExecuteTransaction => 4,
            Self::CancelTransaction => 5,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateWallet { .. } => "CreateWallet",
            Self::CreateTransaction { .. } => "CreateTransaction",
            Self::ConfirmTransaction => "ConfirmTransaction",
            Self::RejectTransaction => "RejectTransaction",
            Self::ExecuteTransaction => "ExecuteTransaction",
            Self::CancelTransaction => "CancelTransaction",
        }
    }

    fn payload(&self) -> InstructionPayload {
        match self {
            Self::CreateWallet { owners, threshold } => InstructionPayload {
                owners: owners.clone(),
                threshold: *threshold,
                ..Default::default()
            },
            Self::CreateTransaction {
                variant,
                amount,
                owners,
                threshold,
            } => InstructionPayload {
                variant: *variant as u8,
                amount: *amount,
                owners: owners.clone(),
                threshold: *threshold,
            },
            _ => InstructionPayload::default(),
        }
    }

    /// Number of bytes [`pack`](Self::pack) produces for this instruction.
    pub fn packed_len(&self) -> usize {
        let owners = match self {
            Self::CreateWallet { owners, .. } | Self::CreateTransaction { owners, .. } => {
                owners.len()
            }
            _ => 0,
        };
        FIXED_INSTRUCTION_LEN + owners * 32
    }

    pub fn pack(&self) -> Result<Vec<u8>, CodecError> {
        let needed = self.packed_len();
        if needed > MAX_INSTRUCTION_LEN {
            return Err(CodecError::BufferTooSmall {
                needed,
                capacity: MAX_INSTRUCTION_LEN,
            });
        }

        let mut data = Vec::with_capacity(needed);
        data.push(self.tag());
        self.payload()
            .serialize(&mut data)
            .map_err(|e| CodecError::Malformed(e.to_string()))?;
        Ok(data)
    }

    /// Decode instruction bytes the way the program does. Fields a given
    /// instruction does not carry are ignored.
    pub fn unpack(data: &[u8]) -> Result<Self, CodecError> {
        let (&tag, rest) = data.split_first().ok_or(CodecError::EmptyData)?;
        let payload = InstructionPayload::try_from_slice(rest)
            .map_err(|e| CodecError::Malformed(e.to_string()))?;

        Ok(match tag {
            0 => Self::CreateWallet {
                owners: payload.owners,
                threshold: payload.threshold,
            },
            1 => Self::CreateTransaction {
                variant: TransactionVariant::try_from(payload.variant)?,
                amount: payload.amount,
                owners: payload.owners,
                threshold: payload.threshold,
            },
            2 => Self::ConfirmTransaction,
            3 => Self::RejectTransaction,
            4 => Self::ExecuteTransaction,
            5 => Self::CancelTransaction,
            other => return Err(CodecError::UnknownInstruction(other)),
        })
    }
}
