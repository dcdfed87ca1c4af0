//! [`LedgerGateway`] backed by a JSON-RPC node.

use async_trait::async_trait;
use solana_client::{client_error::ClientError, nonblocking::rpc_client::RpcClient};
use solana_program::pubkey::Pubkey;
use solana_sdk::{
    commitment_config::CommitmentConfig,
    signature::{Keypair, Signature},
    transaction::Transaction,
};
use std::{future::Future, str::FromStr, time::Duration};
use tracing::{debug, warn};

use crate::{
    config::{ClientConfig, ConfigError},
    error::LedgerError,
    ledger::{AccountRoles, FinalityStatus, LedgerGateway},
};

pub struct RpcGateway {
    client: RpcClient,
    timeout: Duration,
}

impl RpcGateway {
    pub fn new(rpc_url: String, timeout: Duration, commitment: CommitmentConfig) -> Self {
        Self {
            client: RpcClient::new_with_timeout_and_commitment(rpc_url, timeout, commitment),
            timeout,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        let commitment =
            CommitmentConfig::from_str(&config.commitment).map_err(|_| ConfigError::InvalidValue {
                key: "commitment".to_string(),
                value: config.commitment.clone(),
            })?;
        Ok(Self::new(
            config.rpc_url.clone(),
            config.request_timeout(),
            commitment,
        ))
    }

    /// Run one RPC call under the gateway timeout.
    async fn bounded<T, F>(&self, call: &'static str, fut: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, ClientError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                debug!(call, error = %err, "rpc call failed");
                Err(classify(err))
            }
            Err(_) => {
                warn!(call, timeout = ?self.timeout, "rpc call timed out");
                Err(LedgerError::Timeout(self.timeout))
            }
        }
    }
}

/// Program-side refusals carry a transaction error; everything else is transport.
fn classify(err: ClientError) -> LedgerError {
    match err.get_transaction_error() {
        Some(tx_err) => LedgerError::from_transaction_error(&tx_err),
        None => LedgerError::Transport(err.to_string()),
    }
}

#[async_trait]
impl LedgerGateway for RpcGateway {
    async fn submit(
        &self,
        program_id: &Pubkey,
        data: Vec<u8>,
        roles: &AccountRoles,
        signers: &[&Keypair],
    ) -> Result<Signature, LedgerError> {
        let instruction = roles.instruction(program_id, data);
        let blockhash = self
            .bounded("get_latest_blockhash", self.client.get_latest_blockhash())
            .await?;

        let mut transaction = Transaction::new_with_payer(&[instruction], Some(&roles.signer));
        transaction
            .try_sign(signers, blockhash)
            .map_err(|e| LedgerError::Rejected {
                reason: format!("signing failed: {e}"),
                code: None,
            })?;

        let signature = self
            .bounded("send_transaction", self.client.send_transaction(&transaction))
            .await?;
        debug!(%signature, %program_id, "transaction sent");
        Ok(signature)
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, LedgerError> {
        self.bounded("get_balance", self.client.get_balance(address))
            .await
    }

    async fn get_transaction_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<FinalityStatus>, LedgerError> {
        let response = self
            .bounded(
                "get_signature_statuses",
                self.client.get_signature_statuses(&[*signature]),
            )
            .await?;
        let commitment = self.client.commitment();
        Ok(response
            .value
            .into_iter()
            .next()
            .flatten()
            .filter(|status| status.satisfies_commitment(commitment))
            .map(|status| FinalityStatus {
                slot: status.slot,
                err: status.err,
            }))
    }

    async fn request_faucet_funds(
        &self,
        address: &Pubkey,
        lamports: u64,
    ) -> Result<Signature, LedgerError> {
        self.bounded("request_airdrop", self.client.request_airdrop(address, lamports))
            .await
    }
}
