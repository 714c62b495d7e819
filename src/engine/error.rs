//! Error types for swap pool operations.

use thiserror::Error;

use crate::access::AccessError;
use crate::ledger::LedgerError;
use crate::model::SequenceId;
use crate::{Address, Amount};

/// Top-level error returned by the mutating [`SwapPool`](super::SwapPool) operations.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("access denied: {0}")]
    Access(#[from] AccessError),

    #[error("swap creation failed: {0}")]
    Create(#[from] CreateError),

    #[error("{0}")]
    Swap(#[from] SwapError),

    #[error("registry update failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("withdrawal failed: {0}")]
    Withdraw(#[from] WithdrawError),

    #[error("custody transfer failed: {0}")]
    Custody(#[from] LedgerError),

    #[error("custody is escrowed: {0}")]
    Escrow(#[from] EscrowError),
}

/// Error during swap creation, before any asset moves.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CreateError {
    #[error("token {0} is not supported")]
    TokenNotSupported(Address),

    #[error("signer {recovered} does not match sender {expected}")]
    UnverifiedSender {
        expected: Address,
        recovered: Address,
    },

    #[error("escrowed total of {0} would overflow")]
    EscrowOverflow(Address),
}

/// The swap operation being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOperation {
    Get,
    Finalize,
    Decline,
}

/// Swap lookups and state transitions on an existing swap.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SwapError {
    #[error("{0:?}: swap {1} does not exist")]
    SwapNotExist(SwapOperation, SequenceId),

    #[error("{0:?}: swap {1} is already finalized")]
    SwapAlreadyFinalized(SwapOperation, SequenceId),

    #[error("{0:?}: swap {1} is already declined")]
    SwapAlreadyDeclined(SwapOperation, SequenceId),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("zero address is not a token")]
    ZeroAsset,

    #[error("token {asset} is already configured as {supported}")]
    TokenAlreadyConfigured { asset: Address, supported: bool },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WithdrawError {
    #[error("zero address cannot receive a withdrawal")]
    ZeroReceiver,
}

/// A push out of custody that would spend inbound amounts held for pending swaps.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EscrowError {
    #[error("{requested} of {asset} requested, {available} not escrowed")]
    EscrowedFunds {
        asset: Address,
        available: Amount,
        requested: Amount,
    },
}
