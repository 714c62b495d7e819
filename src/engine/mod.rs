//! Swap pool engine.
//!
//! The pool records signature-authorized swaps, takes custody of the inbound asset
//! at creation, and later either finalizes a swap (outbound asset to the receiver)
//! or declines it (inbound asset back to the sender). Every operation either
//! completes or leaves the pool exactly as it was.
//!
//! Replay protection comes from binding each signature to the sequence id the swap
//! receives. Ids are assigned once and never reused, so a signature authorizes at
//! most one swap.

use std::fmt;

use tokio_stream::{Stream, StreamExt};
use tracing::{error, info, warn};

use crate::access::{Guard, Operation, Unrestricted};
use crate::auth::{authorization_digest, recover_signer};
use crate::ledger::AssetLedger;
use crate::model::{
    Action, Call, PoolEvent, SequenceId, Swap, SwapParams, SwapRequest, SwapStatus,
};
use crate::snapshot::{Snapshot, SnapshotError};
use crate::{Address, Amount};

mod state;
pub use state::{EscrowBook, SwapLedger, TokenRegistry};

mod error;
pub use error::{
    CreateError, EscrowError, PoolError, RegistryError, SwapError, SwapOperation, WithdrawError,
};

/// The swap pool.
///
/// Owns the swap ledger, the token registry and the escrow book. Asset movements go
/// through `L`, capability checks through `G`.
pub struct SwapPool<L, G = Unrestricted> {
    assets: L,
    guard: G,
    swaps: SwapLedger,
    registry: TokenRegistry,
    escrow: EscrowBook,
    /// Notifications not yet drained by the host
    events: Vec<PoolEvent>,
}

impl<L: AssetLedger> SwapPool<L> {
    /// A pool that lets every caller through.
    pub fn new(assets: L) -> Self {
        Self::with_guard(assets, Unrestricted)
    }
}

/// Public API
impl<L: AssetLedger, G: Guard> SwapPool<L, G> {
    pub fn with_guard(assets: L, guard: G) -> Self {
        Self {
            assets,
            guard,
            swaps: SwapLedger::default(),
            registry: TokenRegistry::default(),
            escrow: EscrowBook::default(),
            events: Vec::new(),
        }
    }

    /// Rebuild a pool from persisted state. Escrowed totals are recomputed from the
    /// pending swaps.
    pub fn restore(snapshot: Snapshot, assets: L, guard: G) -> Result<Self, SnapshotError> {
        let swaps = SwapLedger::from_records(snapshot.swaps)
            .map_err(|(index, found)| SnapshotError::SequenceGap { index, found })?;

        let mut escrow = EscrowBook::default();
        for swap in swaps.iter().filter(|s| s.status == SwapStatus::Pending) {
            escrow.hold(swap.in_asset, swap.amount_in);
        }

        Ok(Self {
            assets,
            guard,
            swaps,
            registry: TokenRegistry::from_lists(snapshot.inbound, snapshot.outbound),
            escrow,
            events: Vec::new(),
        })
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(
            self.swaps.iter().cloned().collect(),
            self.registry.inbound(),
            self.registry.outbound(),
        )
    }

    /// Run the pool over a stream of calls, in order
    pub async fn run(&mut self, mut stream: impl Stream<Item = Call> + Unpin) {
        while let Some(call) = stream.next().await {
            // a rejected call must not stop the pool, it is already logged
            let _ = self.apply(call);
        }
    }

    /// Apply a single call on top of the current pool state
    pub fn apply(&mut self, call: Call) -> Result<(), PoolError> {
        let Call { caller, action } = call;
        match &action {
            Action::CreateSwap(request) => {
                let result = self.create_swap(&caller, request);
                Self::log_result("create", &caller, Subject::Request(&request.params), &result);
                result?;
            }
            Action::CreateAndFinalizeSwap(request) => {
                let result = self.create_and_finalize_swap(&caller, request);
                Self::log_result(
                    "create-and-finalize",
                    &caller,
                    Subject::Request(&request.params),
                    &result,
                );
                result?;
            }
            Action::FinalizeSwap(id) => {
                let result = self.finalize_swap(&caller, *id);
                Self::log_result("finalize", &caller, Subject::Swap(*id), &result);
                result?;
            }
            Action::DeclineSwap(id) => {
                let result = self.decline_swap(&caller, *id);
                Self::log_result("decline", &caller, Subject::Swap(*id), &result);
                result?;
            }
            Action::SetInboundToken { asset, supported } => {
                let result = self.set_inbound_token(&caller, *asset, *supported);
                Self::log_result(
                    "inbound token",
                    &caller,
                    Subject::Token(*asset, *supported),
                    &result,
                );
                result?;
            }
            Action::SetOutboundToken { asset, supported } => {
                let result = self.set_outbound_token(&caller, *asset, *supported);
                Self::log_result(
                    "outbound token",
                    &caller,
                    Subject::Token(*asset, *supported),
                    &result,
                );
                result?;
            }
            Action::Withdraw {
                asset,
                receiver,
                amount,
            } => {
                let result = self.withdraw(&caller, *asset, *receiver, *amount);
                Self::log_result(
                    "withdraw",
                    &caller,
                    Subject::Withdrawal(*asset, *receiver, *amount),
                    &result,
                );
                result?;
            }
        }
        Ok(())
    }

    /// Record a pending swap and pull its inbound asset into custody.
    ///
    /// The signature must recover to `sender` over the swap parameters bound to the
    /// id this swap is about to receive.
    pub fn create_swap(
        &mut self,
        caller: &Address,
        request: &SwapRequest,
    ) -> Result<SequenceId, PoolError> {
        let id = self.authorize_creation(caller, request)?;
        let params = &request.params;

        self.assets
            .transfer_into(params.in_asset, params.sender, params.amount_in)?;

        self.record_created(id, params);
        Ok(id)
    }

    /// Create a swap and finalize it in the same operation.
    ///
    /// Both halves are validated before any asset moves. If the outbound push fails
    /// after the inbound pull succeeded, the pull is reverted and nothing is
    /// recorded.
    pub fn create_and_finalize_swap(
        &mut self,
        caller: &Address,
        request: &SwapRequest,
    ) -> Result<SequenceId, PoolError> {
        self.guard.authorize(caller, Operation::FinalizeSwap)?;
        let id = self.authorize_creation(caller, request)?;
        let params = &request.params;

        let incoming = if params.in_asset == params.out_asset {
            params.amount_in
        } else {
            Amount::ZERO
        };
        self.ensure_unescrowed(params.out_asset, params.amount_out, incoming, Amount::ZERO)?;

        self.assets
            .transfer_into(params.in_asset, params.sender, params.amount_in)?;

        if let Err(e) = self
            .assets
            .transfer_out(params.out_asset, params.receiver, params.amount_out)
        {
            if let Err(refund) =
                self.assets
                    .revert_into(params.in_asset, params.sender, params.amount_in)
            {
                error!(
                    sender = %params.sender,
                    asset = %params.in_asset,
                    amount = %params.amount_in,
                    reason = %refund,
                    "revert of inbound pull failed"
                );
            }
            return Err(e.into());
        }

        self.record_created(id, params);
        self.record_finalized(id, params.in_asset, params.amount_in);
        Ok(id)
    }

    /// Release the outbound asset of a pending swap to its receiver.
    pub fn finalize_swap(&mut self, caller: &Address, id: SequenceId) -> Result<(), PoolError> {
        self.guard.authorize(caller, Operation::FinalizeSwap)?;
        let swap = self.swaps.pending(id, SwapOperation::Finalize)?.clone();

        let released = if swap.in_asset == swap.out_asset {
            swap.amount_in
        } else {
            Amount::ZERO
        };
        self.ensure_unescrowed(swap.out_asset, swap.amount_out, Amount::ZERO, released)?;

        self.assets
            .transfer_out(swap.out_asset, swap.receiver, swap.amount_out)?;

        self.record_finalized(id, swap.in_asset, swap.amount_in);
        Ok(())
    }

    /// Return the inbound asset of a pending swap to its sender.
    pub fn decline_swap(&mut self, caller: &Address, id: SequenceId) -> Result<(), PoolError> {
        self.guard.authorize(caller, Operation::DeclineSwap)?;
        let swap = self.swaps.pending(id, SwapOperation::Decline)?.clone();

        self.assets
            .transfer_out(swap.in_asset, swap.sender, swap.amount_in)?;

        self.swaps.settle(id, SwapStatus::Declined);
        self.escrow.release(swap.in_asset, swap.amount_in);
        self.events.push(PoolEvent::SwapDeclined(id));
        Ok(())
    }

    pub fn set_inbound_token(
        &mut self,
        caller: &Address,
        asset: Address,
        supported: bool,
    ) -> Result<(), PoolError> {
        self.guard.authorize(caller, Operation::ConfigureRegistry)?;
        self.registry.set_inbound(asset, supported)?;
        self.events
            .push(PoolEvent::InboundTokenSet { asset, supported });
        Ok(())
    }

    pub fn set_outbound_token(
        &mut self,
        caller: &Address,
        asset: Address,
        supported: bool,
    ) -> Result<(), PoolError> {
        self.guard.authorize(caller, Operation::ConfigureRegistry)?;
        self.registry.set_outbound(asset, supported)?;
        self.events
            .push(PoolEvent::OutboundTokenSet { asset, supported });
        Ok(())
    }

    /// Move `amount` of `asset` out of custody to `receiver`.
    pub fn withdraw(
        &mut self,
        caller: &Address,
        asset: Address,
        receiver: Address,
        amount: Amount,
    ) -> Result<(), PoolError> {
        self.guard.authorize(caller, Operation::Withdraw)?;
        if receiver.is_zero() {
            return Err(WithdrawError::ZeroReceiver.into());
        }
        self.ensure_unescrowed(asset, amount, Amount::ZERO, Amount::ZERO)?;

        self.assets.transfer_out(asset, receiver, amount)?;

        self.events.push(PoolEvent::Withdrawn {
            receiver,
            asset,
            amount,
        });
        Ok(())
    }

    pub fn get_swap(&self, id: SequenceId) -> Result<&Swap, SwapError> {
        self.swaps
            .get(id)
            .ok_or(SwapError::SwapNotExist(SwapOperation::Get, id))
    }

    /// At most `limit` swaps starting at `start`, in ascending order. Empty when
    /// `start` is past the end or `limit` is zero.
    pub fn get_swaps(&self, start: SequenceId, limit: usize) -> &[Swap] {
        self.swaps.page(start, limit)
    }

    pub fn swaps_count(&self) -> u64 {
        self.swaps.len()
    }

    pub fn swaps(&self) -> impl Iterator<Item = &Swap> + '_ {
        self.swaps.iter()
    }

    pub fn is_inbound_supported(&self, asset: &Address) -> bool {
        self.registry.is_inbound(asset)
    }

    pub fn is_outbound_supported(&self, asset: &Address) -> bool {
        self.registry.is_outbound(asset)
    }

    /// Inbound quantity of `asset` held in custody against pending swaps.
    pub fn escrowed(&self, asset: &Address) -> Amount {
        self.escrow.escrowed(asset)
    }

    pub fn events(&self) -> &[PoolEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<PoolEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn assets(&self) -> &L {
        &self.assets
    }

    pub fn assets_mut(&mut self) -> &mut L {
        &mut self.assets
    }

    pub fn guard(&self) -> &G {
        &self.guard
    }

    pub fn guard_mut(&mut self) -> &mut G {
        &mut self.guard
    }
}

/// What a logged call was about
enum Subject<'a> {
    Request(&'a SwapParams),
    Swap(SequenceId),
    Token(Address, bool),
    Withdrawal(Address, Address, Amount),
}

impl fmt::Display for Subject<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Request(p) => write!(
                f,
                "{} {} -> {} {} from {} to {}",
                p.amount_in, p.in_asset, p.amount_out, p.out_asset, p.sender, p.receiver
            ),
            Subject::Swap(id) => write!(f, "swap {id}"),
            Subject::Token(asset, supported) => write!(f, "{asset} supported={supported}"),
            Subject::Withdrawal(asset, receiver, amount) => {
                write!(f, "{amount} {asset} to {receiver}")
            }
        }
    }
}

/// Private API
impl<L: AssetLedger, G: Guard> SwapPool<L, G> {
    /// Small helper to log `apply` results
    fn log_result<T: fmt::Debug, E: fmt::Display>(
        op: &str,
        caller: &Address,
        subject: Subject<'_>,
        result: &Result<T, E>,
    ) {
        match result {
            Ok(outcome) => {
                info!(
                    caller = %caller,
                    subject = %subject,
                    outcome = ?outcome,
                    "{op} applied"
                );
            }
            Err(e) => {
                warn!(
                    caller = %caller,
                    subject = %subject,
                    reason = %e,
                    "{op} rejected"
                );
            }
        }
    }

    /// Every check creation needs before any asset moves:
    /// - Caller may create swaps, sender and receiver pass screening
    /// - Inbound and outbound assets are registered
    /// - The escrow book can track the inbound amount
    /// - The signature recovers to the sender for the next sequence id
    ///
    /// Returns the id the swap will receive.
    fn authorize_creation(
        &self,
        caller: &Address,
        request: &SwapRequest,
    ) -> Result<SequenceId, PoolError> {
        let params = &request.params;

        self.guard.authorize(caller, Operation::CreateSwap)?;
        self.guard.screen(&params.sender)?;
        self.guard.screen(&params.receiver)?;

        if !self.registry.is_inbound(&params.in_asset) {
            return Err(CreateError::TokenNotSupported(params.in_asset).into());
        }
        if !self.registry.is_outbound(&params.out_asset) {
            return Err(CreateError::TokenNotSupported(params.out_asset).into());
        }
        if !self.escrow.can_hold(&params.in_asset, params.amount_in) {
            return Err(CreateError::EscrowOverflow(params.in_asset).into());
        }

        let id = self.swaps.next_id();
        let recovered = recover_signer(&request.signature, &authorization_digest(params, id));
        // a null recovery never authorizes, not even a null sender
        if recovered.is_zero() || recovered != params.sender {
            return Err(CreateError::UnverifiedSender {
                expected: params.sender,
                recovered,
            }
            .into());
        }

        Ok(id)
    }

    /// Refuse a push of `amount` that would leave custody of `asset` below what
    /// pending swaps hold. `incoming` is about to arrive and `released` is about to
    /// stop being escrowed. Plain shortfalls are left for the asset ledger to report.
    fn ensure_unescrowed(
        &self,
        asset: Address,
        amount: Amount,
        incoming: Amount,
        released: Amount,
    ) -> Result<(), EscrowError> {
        let held = self.assets.custody_balance(asset).saturating_add(incoming);
        let reserved = self.escrow.escrowed(&asset).saturating_sub(released);
        let available = held.saturating_sub(reserved);

        if amount <= held && amount > available {
            return Err(EscrowError::EscrowedFunds {
                asset,
                available,
                requested: amount,
            });
        }
        Ok(())
    }

    fn record_created(&mut self, id: SequenceId, params: &SwapParams) {
        self.swaps.push(Swap::pending(id, params));
        self.escrow.hold(params.in_asset, params.amount_in);
        self.events.push(PoolEvent::SwapCreated(id));
    }

    /// The inbound amount stops being escrowed: it now belongs to the pool.
    fn record_finalized(&mut self, id: SequenceId, in_asset: Address, amount_in: Amount) {
        self.swaps.settle(id, SwapStatus::Finalized);
        self.escrow.release(in_asset, amount_in);
        self.events.push(PoolEvent::SwapFinalized(id));
    }
}
