//! Asset ledger gateway.
//!
//! The pool never touches balances directly. It asks an [`AssetLedger`] to pull
//! assets into custody or push them out, and treats any error as fatal to the
//! enclosing operation. Implementations must apply a transfer fully or not at all.

use std::collections::HashMap;

use thiserror::Error;

use crate::{Address, Amount};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("insufficient balance of {asset} for {account}: available {available}, requested {requested}")]
    InsufficientBalance {
        asset: Address,
        account: Address,
        available: Amount,
        requested: Amount,
    },

    #[error("insufficient allowance of {asset} from {owner}: approved {approved}, requested {requested}")]
    InsufficientAllowance {
        asset: Address,
        owner: Address,
        approved: Amount,
        requested: Amount,
    },

    #[error("insufficient custody of {asset}: held {held}, requested {requested}")]
    InsufficientCustody {
        asset: Address,
        held: Amount,
        requested: Amount,
    },

    #[error("balance overflow of {asset} for {account}")]
    Overflow { asset: Address, account: Address },
}

/// Moves asset balances between the pool's custody and external accounts.
pub trait AssetLedger {
    /// Pull `amount` of `asset` from `from` into custody.
    fn transfer_into(
        &mut self,
        asset: Address,
        from: Address,
        amount: Amount,
    ) -> Result<(), LedgerError>;

    /// Push `amount` of `asset` from custody to `to`.
    fn transfer_out(&mut self, asset: Address, to: Address, amount: Amount)
    -> Result<(), LedgerError>;

    /// Undo a [`transfer_into`](AssetLedger::transfer_into) of the same arguments,
    /// handing back the balance and whatever the pull consumed from `from`.
    fn revert_into(&mut self, asset: Address, from: Address, amount: Amount)
    -> Result<(), LedgerError>;

    /// Quantity of `asset` currently in custody.
    fn custody_balance(&self, asset: Address) -> Amount;
}

/// Balance book kept in memory, with pull transfers gated by allowances granted to
/// the custody account.
#[derive(Debug, Clone)]
pub struct InMemoryLedger {
    custody: Address,
    balances: HashMap<(Address, Address), Amount>,
    allowances: HashMap<(Address, Address), Amount>,
}

impl InMemoryLedger {
    pub fn new(custody: Address) -> Self {
        Self {
            custody,
            balances: HashMap::new(),
            allowances: HashMap::new(),
        }
    }

    /// The account holding assets on behalf of the pool.
    pub fn custody(&self) -> Address {
        self.custody
    }

    pub fn balance_of(&self, asset: Address, account: Address) -> Amount {
        self.balances
            .get(&(asset, account))
            .copied()
            .unwrap_or_default()
    }

    /// How much of `asset` custody may still pull from `owner`.
    pub fn allowance(&self, asset: Address, owner: Address) -> Amount {
        self.allowances
            .get(&(asset, owner))
            .copied()
            .unwrap_or_default()
    }

    /// Credit `amount` of `asset` to `account` out of thin air.
    pub fn mint(
        &mut self,
        asset: Address,
        account: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let balance = self.balance_of(asset, account);
        let updated = balance
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { asset, account })?;
        self.balances.insert((asset, account), updated);
        Ok(())
    }

    /// Set the amount of `asset` custody may pull from `owner`.
    pub fn approve(&mut self, asset: Address, owner: Address, amount: Amount) {
        self.allowances.insert((asset, owner), amount);
    }

    /// Move between two accounts after every check has passed.
    fn move_balance(
        &mut self,
        asset: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let from_balance = self.balance_of(asset, from);
        let debited = from_balance
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientBalance {
                asset,
                account: from,
                available: from_balance,
                requested: amount,
            })?;
        if from == to {
            return Ok(());
        }
        let credited = self
            .balance_of(asset, to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { asset, account: to })?;

        self.balances.insert((asset, from), debited);
        self.balances.insert((asset, to), credited);
        Ok(())
    }
}

impl AssetLedger for InMemoryLedger {
    fn transfer_into(
        &mut self,
        asset: Address,
        from: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let approved = self.allowance(asset, from);
        let remaining = approved
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientAllowance {
                asset,
                owner: from,
                approved,
                requested: amount,
            })?;

        self.move_balance(asset, from, self.custody, amount)?;
        self.allowances.insert((asset, from), remaining);
        Ok(())
    }

    fn transfer_out(
        &mut self,
        asset: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let held = self.balance_of(asset, self.custody);
        if held < amount {
            return Err(LedgerError::InsufficientCustody {
                asset,
                held,
                requested: amount,
            });
        }
        self.move_balance(asset, self.custody, to, amount)
    }

    fn revert_into(
        &mut self,
        asset: Address,
        from: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let restored = self
            .allowance(asset, from)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow {
                asset,
                account: from,
            })?;

        self.transfer_out(asset, from, amount)?;
        self.allowances.insert((asset, from), restored);
        Ok(())
    }

    fn custody_balance(&self, asset: Address) -> Amount {
        self.balance_of(asset, self.custody)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POOL: Address = Address::repeat_byte(0xee);
    const TOKEN: Address = Address::repeat_byte(0x01);
    const ALICE: Address = Address::repeat_byte(0xa1);
    const BOB: Address = Address::repeat_byte(0xb0);

    fn funded() -> InMemoryLedger {
        let mut ledger = InMemoryLedger::new(POOL);
        ledger.mint(TOKEN, ALICE, Amount::new(500)).unwrap();
        ledger.approve(TOKEN, ALICE, Amount::new(300));
        ledger
    }

    #[test]
    fn transfer_into_moves_to_custody_and_spends_allowance() {
        let mut ledger = funded();
        ledger.transfer_into(TOKEN, ALICE, Amount::new(200)).unwrap();

        assert_eq!(ledger.balance_of(TOKEN, ALICE), Amount::new(300));
        assert_eq!(ledger.balance_of(TOKEN, POOL), Amount::new(200));
        assert_eq!(ledger.allowance(TOKEN, ALICE), Amount::new(100));
    }

    #[test]
    fn transfer_into_without_allowance_fails_untouched() {
        let mut ledger = funded();
        let result = ledger.transfer_into(TOKEN, ALICE, Amount::new(301));
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientAllowance { .. })
        ));
        assert_eq!(ledger.balance_of(TOKEN, ALICE), Amount::new(500));
        assert_eq!(ledger.allowance(TOKEN, ALICE), Amount::new(300));
    }

    #[test]
    fn transfer_into_without_balance_keeps_allowance() {
        let mut ledger = InMemoryLedger::new(POOL);
        ledger.mint(TOKEN, ALICE, Amount::new(50)).unwrap();
        ledger.approve(TOKEN, ALICE, Amount::new(300));

        let result = ledger.transfer_into(TOKEN, ALICE, Amount::new(100));
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientBalance { account, .. }) if account == ALICE
        ));
        assert_eq!(ledger.allowance(TOKEN, ALICE), Amount::new(300));
        assert_eq!(ledger.balance_of(TOKEN, POOL), Amount::ZERO);
    }

    #[test]
    fn transfer_out_requires_custody() {
        let mut ledger = funded();
        let result = ledger.transfer_out(TOKEN, BOB, Amount::new(1));
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientCustody { .. })
        ));

        ledger.transfer_into(TOKEN, ALICE, Amount::new(100)).unwrap();
        ledger.transfer_out(TOKEN, BOB, Amount::new(60)).unwrap();
        assert_eq!(ledger.balance_of(TOKEN, BOB), Amount::new(60));
        assert_eq!(ledger.balance_of(TOKEN, POOL), Amount::new(40));
    }

    #[test]
    fn revert_into_restores_balance_and_allowance() {
        let mut ledger = funded();
        ledger.transfer_into(TOKEN, ALICE, Amount::new(200)).unwrap();
        ledger.revert_into(TOKEN, ALICE, Amount::new(200)).unwrap();

        assert_eq!(ledger.balance_of(TOKEN, ALICE), Amount::new(500));
        assert_eq!(ledger.allowance(TOKEN, ALICE), Amount::new(300));
        assert_eq!(ledger.custody_balance(TOKEN), Amount::ZERO);
    }

    #[test]
    fn revert_into_beyond_custody_fails_untouched() {
        let mut ledger = funded();
        ledger.transfer_into(TOKEN, ALICE, Amount::new(100)).unwrap();

        assert!(matches!(
            ledger.revert_into(TOKEN, ALICE, Amount::new(101)),
            Err(LedgerError::InsufficientCustody { .. })
        ));
        assert_eq!(ledger.allowance(TOKEN, ALICE), Amount::new(200));
        assert_eq!(ledger.custody_balance(TOKEN), Amount::new(100));
    }

    #[test]
    fn mint_overflow_is_rejected() {
        let mut ledger = InMemoryLedger::new(POOL);
        ledger
            .mint(TOKEN, ALICE, Amount::new(u128::MAX))
            .unwrap();
        assert!(matches!(
            ledger.mint(TOKEN, ALICE, Amount::new(1)),
            Err(LedgerError::Overflow { .. })
        ));
    }
}
