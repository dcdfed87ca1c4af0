//! The only surface through which the client touches the network.

use async_trait::async_trait;
use solana_program::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program,
};
use solana_sdk::{
    signature::{Keypair, Signature},
    transaction::TransactionError,
};

use crate::error::LedgerError;

/// Destination used when an instruction has no real target account.
pub const RESERVED_ADDRESS: Pubkey = Pubkey::new_from_array([0; 32]);

/// The fixed five-slot account list every multisig instruction references:
/// `[signer, base key, derived address, destination or placeholder, system program]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRoles {
    pub signer: Pubkey,
    pub base_key: Pubkey,
    /// Only wallet creation needs the base key's signature.
    pub base_signs: bool,
    pub derived_address: Pubkey,
    pub destination: Option<Pubkey>,
}

impl AccountRoles {
    pub fn for_create(signer: Pubkey, base_key: Pubkey, derived_address: Pubkey) -> Self {
        Self {
            signer,
            base_key,
            base_signs: true,
            derived_address,
            destination: None,
        }
    }

    pub fn for_proposal(
        signer: Pubkey,
        base_key: Pubkey,
        derived_address: Pubkey,
        destination: Option<Pubkey>,
    ) -> Self {
        Self {
            signer,
            base_key,
            base_signs: false,
            derived_address,
            destination,
        }
    }

    pub fn destination(&self) -> Pubkey {
        self.destination.unwrap_or(RESERVED_ADDRESS)
    }

    pub fn account_metas(&self) -> Vec<AccountMeta> {
        let base = if self.base_signs {
            AccountMeta::new_readonly(self.base_key, true)
        } else {
            AccountMeta::new(self.base_key, false)
        };
        let destination = match self.destination {
            Some(to) => AccountMeta::new(to, false),
            None => AccountMeta::new_readonly(RESERVED_ADDRESS, false),
        };
        vec![
            AccountMeta::new_readonly(self.signer, true),
            base,
            AccountMeta::new(self.derived_address, false),
            destination,
            AccountMeta::new_readonly(system_program::id(), false),
        ]
    }

    pub fn instruction(&self, program_id: &Pubkey, data: Vec<u8>) -> Instruction {
        Instruction {
            program_id: *program_id,
            accounts: self.account_metas(),
            data,
        }
    }
}

/// Outcome of a transaction the ledger reports as settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalityStatus {
    pub slot: u64,
    /// Settled transactions can still have failed on-chain.
    pub err: Option<TransactionError>,
}

#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Build, sign and send one instruction. Returns once the ledger has
    /// accepted the transaction, not once it is final.
    async fn submit(
        &self,
        program_id: &Pubkey,
        data: Vec<u8>,
        roles: &AccountRoles,
        signers: &[&Keypair],
    ) -> Result<Signature, LedgerError>;

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, LedgerError>;

    /// `None` while the transaction is still in flight.
    async fn get_transaction_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<FinalityStatus>, LedgerError>;

    /// Test networks only.
    async fn request_faucet_funds(
        &self,
        address: &Pubkey,
        lamports: u64,
    ) -> Result<Signature, LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_roles_have_two_signers_and_readonly_placeholder() {
        let (signer, base, pda) = (
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            Pubkey::new_unique(),
        );
        let metas = AccountRoles::for_create(signer, base, pda).account_metas();

        assert_eq!(metas.len(), 5);
        assert_eq!(metas[0], AccountMeta::new_readonly(signer, true));
        assert_eq!(metas[1], AccountMeta::new_readonly(base, true));
        assert_eq!(metas[2], AccountMeta::new(pda, false));
        assert_eq!(metas[3], AccountMeta::new_readonly(RESERVED_ADDRESS, false));
        assert_eq!(metas[4], AccountMeta::new_readonly(system_program::id(), false));
    }

    #[test]
    fn proposal_roles_mark_destination_writable() {
        let (signer, base, pda, to) = (
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            Pubkey::new_unique(),
        );
        let roles = AccountRoles::for_proposal(signer, base, pda, Some(to));
        let metas = roles.account_metas();

        assert_eq!(metas[1], AccountMeta::new(base, false));
        assert_eq!(metas[3], AccountMeta::new(to, false));
        assert_eq!(roles.destination(), to);

        let ix = roles.instruction(&system_program::id(), vec![4]);
        assert_eq!(ix.accounts, metas);
        assert_eq!(ix.data, vec![4]);
    }

    #[test]
    fn missing_destination_falls_back_to_placeholder() {
        let roles = AccountRoles::for_proposal(
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            None,
        );
        assert_eq!(roles.destination(), RESERVED_ADDRESS);
        assert_eq!(RESERVED_ADDRESS.to_string(), "11111111111111111111111111111111");
    }
}
