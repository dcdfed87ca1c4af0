//! Background finality tracking for the wallet's in-flight submission.
//!
//! The poller never touches session state. It reports the outcome over a
//! channel and the session applies it.

use solana_program::pubkey::Pubkey;
use solana_sdk::{signature::Signature, transaction::TransactionError};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::mpsc::UnboundedSender,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::ledger::LedgerGateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// Stop waiting after this long. `None` polls until finality.
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerEvent {
    Finalized {
        signature: Signature,
        slot: u64,
        err: Option<TransactionError>,
        /// Fresh balance of the watched address; `None` if the fetch failed
        /// or nothing was watched.
        balance: Option<u64>,
    },
    TimedOut {
        signature: Signature,
        waited: Duration,
    },
}

impl PollerEvent {
    pub fn signature(&self) -> &Signature {
        match self {
            PollerEvent::Finalized { signature, .. } | PollerEvent::TimedOut { signature, .. } => {
                signature
            }
        }
    }
}

/// Owns the polling task. Dropping the handle stops the task.
#[derive(Debug)]
pub struct PollerHandle {
    signature: Signature,
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn spawn(
    gateway: Arc<dyn LedgerGateway>,
    signature: Signature,
    watch: Option<Pubkey>,
    settings: PollSettings,
    events: UnboundedSender<PollerEvent>,
) -> PollerHandle {
    let task = tokio::spawn(run(gateway, signature, watch, settings, events));
    PollerHandle { signature, task }
}

async fn run(
    gateway: Arc<dyn LedgerGateway>,
    signature: Signature,
    watch: Option<Pubkey>,
    settings: PollSettings,
    events: UnboundedSender<PollerEvent>,
) {
    let started = Instant::now();
    let mut interval = time::interval_at(started + settings.interval, settings.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut polls = 0u64;

    loop {
        interval.tick().await;
        polls += 1;

        match gateway.get_transaction_status(&signature).await {
            Ok(Some(status)) => {
                let balance = match watch {
                    Some(address) => match gateway.get_balance(&address).await {
                        Ok(lamports) => Some(lamports),
                        Err(e) => {
                            warn!(%address, error = %e, "balance refresh failed, keeping cached value");
                            None
                        }
                    },
                    None => None,
                };
                info!(%signature, slot = status.slot, polls, failed = status.err.is_some(), "submission finalized");
                // The receiver only disappears when the session is gone.
                let _ = events.send(PollerEvent::Finalized {
                    signature,
                    slot: status.slot,
                    err: status.err,
                    balance,
                });
                return;
            }
            Ok(None) => debug!(%signature, polls, "submission still pending"),
            Err(e) => warn!(%signature, polls, error = %e, "status query failed, retrying"),
        }

        if let Some(limit) = settings.timeout {
            let waited = started.elapsed();
            if waited >= limit {
                warn!(%signature, ?waited, "no finality observed, giving up");
                let _ = events.send(PollerEvent::TimedOut { signature, waited });
                return;
            }
        }
    }
}
