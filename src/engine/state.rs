use std::collections::{HashMap, HashSet};

use crate::engine::error::{RegistryError, SwapError, SwapOperation};
use crate::model::{SequenceId, Swap, SwapStatus};
use crate::{Address, Amount};

/// Append-only sequence of swaps, indexed by sequence id.
#[derive(Debug, Default)]
pub struct SwapLedger {
    swaps: Vec<Swap>,
}

impl SwapLedger {
    /// Rebuild a ledger from stored records. Fails with the first index whose
    /// record does not carry that index as its sequence id.
    pub fn from_records(swaps: Vec<Swap>) -> Result<Self, (usize, SequenceId)> {
        if let Some((index, swap)) = swaps
            .iter()
            .enumerate()
            .find(|(index, swap)| swap.sequence_id != *index as SequenceId)
        {
            return Err((index, swap.sequence_id));
        }
        Ok(Self { swaps })
    }

    pub fn len(&self) -> u64 {
        self.swaps.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.swaps.is_empty()
    }

    /// Id the next appended swap will receive.
    pub fn next_id(&self) -> SequenceId {
        self.len()
    }

    pub fn get(&self, id: SequenceId) -> Option<&Swap> {
        usize::try_from(id).ok().and_then(|idx| self.swaps.get(idx))
    }

    /// Look up a swap that must still be `Pending` for `operation` to proceed.
    pub fn pending(&self, id: SequenceId, operation: SwapOperation) -> Result<&Swap, SwapError> {
        let swap = self
            .get(id)
            .ok_or(SwapError::SwapNotExist(operation, id))?;
        match swap.status {
            SwapStatus::Pending => Ok(swap),
            SwapStatus::Finalized => Err(SwapError::SwapAlreadyFinalized(operation, id)),
            SwapStatus::Declined => Err(SwapError::SwapAlreadyDeclined(operation, id)),
        }
    }

    pub(crate) fn push(&mut self, swap: Swap) {
        debug_assert_eq!(swap.sequence_id, self.next_id());
        self.swaps.push(swap);
    }

    /// Move a pending swap to a terminal status. Callers check `pending` first.
    pub(crate) fn settle(&mut self, id: SequenceId, status: SwapStatus) {
        debug_assert!(status.is_terminal());
        if let Some(swap) = usize::try_from(id).ok().and_then(|idx| self.swaps.get_mut(idx)) {
            debug_assert_eq!(swap.status, SwapStatus::Pending);
            swap.status = status;
        }
    }

    /// Contiguous window of at most `limit` swaps starting at `start`.
    pub fn page(&self, start: SequenceId, limit: usize) -> &[Swap] {
        let len = self.swaps.len();
        let start = usize::try_from(start).unwrap_or(usize::MAX).min(len);
        let end = start.saturating_add(limit).min(len);
        &self.swaps[start..end]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Swap> + '_ {
        self.swaps.iter()
    }
}

/// Inbound and outbound allow-lists.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    inbound: HashSet<Address>,
    outbound: HashSet<Address>,
}

impl TokenRegistry {
    pub fn from_lists(
        inbound: impl IntoIterator<Item = Address>,
        outbound: impl IntoIterator<Item = Address>,
    ) -> Self {
        Self {
            inbound: inbound.into_iter().filter(|a| !a.is_zero()).collect(),
            outbound: outbound.into_iter().filter(|a| !a.is_zero()).collect(),
        }
    }

    pub fn is_inbound(&self, asset: &Address) -> bool {
        self.inbound.contains(asset)
    }

    pub fn is_outbound(&self, asset: &Address) -> bool {
        self.outbound.contains(asset)
    }

    pub fn set_inbound(&mut self, asset: Address, supported: bool) -> Result<(), RegistryError> {
        Self::set(&mut self.inbound, asset, supported)
    }

    pub fn set_outbound(&mut self, asset: Address, supported: bool) -> Result<(), RegistryError> {
        Self::set(&mut self.outbound, asset, supported)
    }

    /// Sorted so that exports are deterministic.
    pub fn inbound(&self) -> Vec<Address> {
        let mut assets: Vec<_> = self.inbound.iter().copied().collect();
        assets.sort();
        assets
    }

    pub fn outbound(&self) -> Vec<Address> {
        let mut assets: Vec<_> = self.outbound.iter().copied().collect();
        assets.sort();
        assets
    }

    fn set(
        list: &mut HashSet<Address>,
        asset: Address,
        supported: bool,
    ) -> Result<(), RegistryError> {
        if asset.is_zero() {
            return Err(RegistryError::ZeroAsset);
        }
        if list.contains(&asset) == supported {
            return Err(RegistryError::TokenAlreadyConfigured { asset, supported });
        }
        if supported {
            list.insert(asset);
        } else {
            list.remove(&asset);
        }
        Ok(())
    }
}

/// Inbound quantities held in custody against pending swaps, per asset.
#[derive(Debug, Default)]
pub struct EscrowBook {
    held: HashMap<Address, Amount>,
}

impl EscrowBook {
    pub fn escrowed(&self, asset: &Address) -> Amount {
        self.held.get(asset).copied().unwrap_or_default()
    }

    /// Whether `amount` more of `asset` can be tracked without overflowing.
    pub fn can_hold(&self, asset: &Address, amount: Amount) -> bool {
        self.escrowed(asset).checked_add(amount).is_some()
    }

    pub fn hold(&mut self, asset: Address, amount: Amount) {
        let entry = self.held.entry(asset).or_default();
        *entry = entry.saturating_add(amount);
    }

    pub fn release(&mut self, asset: Address, amount: Amount) {
        if let Some(entry) = self.held.get_mut(&asset) {
            *entry = entry.saturating_sub(amount);
            if entry.is_zero() {
                self.held.remove(&asset);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SwapParams;

    fn swap(id: SequenceId) -> Swap {
        Swap::pending(
            id,
            &SwapParams {
                in_asset: Address::repeat_byte(1),
                out_asset: Address::repeat_byte(2),
                amount_in: Amount::new(10),
                amount_out: Amount::new(5),
                sender: Address::repeat_byte(3),
                receiver: Address::repeat_byte(4),
            },
        )
    }

    fn ledger(n: u64) -> SwapLedger {
        let mut ledger = SwapLedger::default();
        for id in 0..n {
            ledger.push(swap(id));
        }
        ledger
    }

    #[test]
    fn next_id_tracks_length() {
        let ledger = ledger(3);
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.next_id(), 3);
        assert!(SwapLedger::default().is_empty());
    }

    #[test]
    fn pending_reports_state_conflicts() {
        let mut ledger = ledger(2);
        ledger.settle(0, SwapStatus::Finalized);
        ledger.settle(1, SwapStatus::Declined);

        assert_eq!(
            ledger.pending(0, SwapOperation::Decline),
            Err(SwapError::SwapAlreadyFinalized(SwapOperation::Decline, 0))
        );
        assert_eq!(
            ledger.pending(1, SwapOperation::Finalize),
            Err(SwapError::SwapAlreadyDeclined(SwapOperation::Finalize, 1))
        );
        assert_eq!(
            ledger.pending(2, SwapOperation::Finalize),
            Err(SwapError::SwapNotExist(SwapOperation::Finalize, 2))
        );
    }

    #[test]
    fn page_is_bounded() {
        let ledger = ledger(5);
        let ids = |page: &[Swap]| page.iter().map(|s| s.sequence_id).collect::<Vec<_>>();

        assert_eq!(ids(ledger.page(0, 2)), vec![0, 1]);
        assert_eq!(ids(ledger.page(3, 10)), vec![3, 4]);
        assert!(ledger.page(5, 10).is_empty());
        assert!(ledger.page(0, 0).is_empty());
        assert!(ledger.page(u64::MAX, usize::MAX).is_empty());
        assert_eq!(ids(ledger.page(4, usize::MAX)), vec![4]);
    }

    #[test]
    fn from_records_rejects_gaps() {
        assert!(SwapLedger::from_records(vec![swap(0), swap(1)]).is_ok());
        assert_eq!(
            SwapLedger::from_records(vec![swap(0), swap(2)]).unwrap_err(),
            (1, 2)
        );
    }

    #[test]
    fn registry_rejects_zero_and_noop() {
        let mut registry = TokenRegistry::default();
        let token = Address::repeat_byte(9);

        assert_eq!(
            registry.set_inbound(Address::ZERO, true),
            Err(RegistryError::ZeroAsset)
        );
        assert_eq!(
            registry.set_inbound(token, false),
            Err(RegistryError::TokenAlreadyConfigured {
                asset: token,
                supported: false
            })
        );
        registry.set_inbound(token, true).unwrap();
        assert!(registry.is_inbound(&token));
        assert!(!registry.is_outbound(&token));
        assert!(matches!(
            registry.set_inbound(token, true),
            Err(RegistryError::TokenAlreadyConfigured { .. })
        ));
        registry.set_inbound(token, false).unwrap();
        assert!(!registry.is_inbound(&token));
    }

    #[test]
    fn escrow_book_holds_and_releases() {
        let mut book = EscrowBook::default();
        let token = Address::repeat_byte(9);
        book.hold(token, Amount::new(200));
        book.hold(token, Amount::new(50));
        assert_eq!(book.escrowed(&token), Amount::new(250));
        assert!(!book.can_hold(&token, Amount::new(u128::MAX)));

        book.release(token, Amount::new(200));
        assert_eq!(book.escrowed(&token), Amount::new(50));
        book.release(token, Amount::new(50));
        assert_eq!(book.escrowed(&token), Amount::ZERO);
    }
}
