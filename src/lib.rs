//! Client for a quorum-governed multisig wallet program.
//!
//! [`session::WalletSession`] is the entry point: it creates or restores a
//! wallet, drives the proposal lifecycle and reconciles in-flight submissions
//! against the ledger.

pub mod config;
pub mod error;
pub mod instruction;
pub mod ledger;
pub mod logging;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod poller;
pub mod proposal;
pub mod rpc;
pub mod session;
pub mod state;
pub mod submission;

pub use config::ClientConfig;
pub use error::{MultiSigError, Result, ValidationError};
pub use ledger::LedgerGateway;
pub use rpc::RpcGateway;
pub use session::WalletSession;
pub use state::SessionSnapshot;
