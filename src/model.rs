//! Core domain types for the swap pool.

use serde::{Deserialize, Serialize};

use crate::{Address, Amount};

/// Position of a swap in the ledger. Also its external identifier.
pub type SequenceId = u64;

/// Lifecycle state of a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapStatus {
    /// Inbound asset is in custody, awaiting an operator decision.
    #[default]
    Pending,
    /// Outbound asset was released to the receiver.
    Finalized,
    /// Inbound asset was returned to the sender.
    Declined,
}

impl SwapStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SwapStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SwapStatus::Pending => "pending",
            SwapStatus::Finalized => "finalized",
            SwapStatus::Declined => "declined",
        }
    }
}

/// The parameters a sender agrees to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapParams {
    pub in_asset: Address,
    pub out_asset: Address,
    pub amount_in: Amount,
    pub amount_out: Amount,
    pub sender: Address,
    pub receiver: Address,
}

/// Swap parameters plus the sender's signature over them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    pub params: SwapParams,
    /// `r || s || v`, expected to be 65 bytes.
    pub signature: Vec<u8>,
}

/// A swap record as stored in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Swap {
    pub sequence_id: SequenceId,
    pub in_asset: Address,
    pub out_asset: Address,
    pub amount_in: Amount,
    pub amount_out: Amount,
    pub sender: Address,
    pub receiver: Address,
    pub status: SwapStatus,
}

impl Swap {
    /// Create a new swap record in the `Pending` state.
    pub fn pending(sequence_id: SequenceId, params: &SwapParams) -> Self {
        Self {
            sequence_id,
            in_asset: params.in_asset,
            out_asset: params.out_asset,
            amount_in: params.amount_in,
            amount_out: params.amount_out,
            sender: params.sender,
            receiver: params.receiver,
            status: SwapStatus::Pending,
        }
    }

    pub fn params(&self) -> SwapParams {
        SwapParams {
            in_asset: self.in_asset,
            out_asset: self.out_asset,
            amount_in: self.amount_in,
            amount_out: self.amount_out,
            sender: self.sender,
            receiver: self.receiver,
        }
    }
}

/// A mutating request submitted to the pool.
#[derive(Debug, Clone)]
pub enum Action {
    /// Record a pending swap and pull the inbound asset into custody.
    CreateSwap(SwapRequest),
    /// Create and immediately finalize a swap.
    CreateAndFinalizeSwap(SwapRequest),
    /// Release the outbound asset of a pending swap to its receiver.
    FinalizeSwap(SequenceId),
    /// Return the inbound asset of a pending swap to its sender.
    DeclineSwap(SequenceId),
    SetInboundToken { asset: Address, supported: bool },
    SetOutboundToken { asset: Address, supported: bool },
    /// Move assets out of custody to an arbitrary receiver.
    Withdraw {
        asset: Address,
        receiver: Address,
        amount: Amount,
    },
}

/// An action together with the account submitting it.
#[derive(Debug, Clone)]
pub struct Call {
    pub caller: Address,
    pub action: Action,
}

impl Call {
    pub fn new(caller: Address, action: Action) -> Self {
        Self { caller, action }
    }
}

/// Observable notification, one per state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    SwapCreated(SequenceId),
    SwapFinalized(SequenceId),
    SwapDeclined(SequenceId),
    InboundTokenSet { asset: Address, supported: bool },
    OutboundTokenSet { asset: Address, supported: bool },
    Withdrawn {
        receiver: Address,
        asset: Address,
        amount: Amount,
    },
}
