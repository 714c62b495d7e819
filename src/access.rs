//! Capability checks consulted before every mutating pool operation.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

use crate::Address;

/// Mutating operations a [`Guard`] is asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateSwap,
    FinalizeSwap,
    DeclineSwap,
    ConfigureRegistry,
    Withdraw,
}

impl Operation {
    fn is_swap_operation(self) -> bool {
        matches!(
            self,
            Operation::CreateSwap | Operation::FinalizeSwap | Operation::DeclineSwap
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Owner,
    Admin,
    Manager,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Manager => "manager",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("{0} is missing role {1}")]
    MissingRole(Address, Role),
    #[error("pool is paused")]
    Paused,
    #[error("account {0} is blacklisted")]
    Blacklisted(Address),
}

/// Decides whether an account may perform an operation.
pub trait Guard {
    fn authorize(&self, caller: &Address, operation: Operation) -> Result<(), AccessError>;

    /// Check an account taking part in a swap without being the caller.
    fn screen(&self, _account: &Address) -> Result<(), AccessError> {
        Ok(())
    }
}

/// Lets every caller through.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unrestricted;

impl Guard for Unrestricted {
    fn authorize(&self, _caller: &Address, _operation: Operation) -> Result<(), AccessError> {
        Ok(())
    }
}

/// Owner, role sets, pause switch and blacklist.
///
/// Swap operations need [`Role::Manager`] and an unpaused pool, registry changes
/// need [`Role::Admin`], withdrawals need the owner. The owner holds every role.
#[derive(Debug, Clone)]
pub struct AccessControl {
    owner: Address,
    admins: HashSet<Address>,
    managers: HashSet<Address>,
    blacklist: HashSet<Address>,
    paused: bool,
}

impl AccessControl {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            admins: HashSet::new(),
            managers: HashSet::new(),
            blacklist: HashSet::new(),
            paused: false,
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn has_role(&self, account: &Address, role: Role) -> bool {
        if *account == self.owner {
            return true;
        }
        match role {
            Role::Owner => false,
            Role::Admin => self.admins.contains(account),
            Role::Manager => self.managers.contains(account),
        }
    }

    /// Returns `false` if the account already had the role.
    pub fn grant(&mut self, role: Role, account: Address) -> bool {
        match role {
            Role::Owner => {
                let changed = self.owner != account;
                self.owner = account;
                changed
            }
            Role::Admin => self.admins.insert(account),
            Role::Manager => self.managers.insert(account),
        }
    }

    pub fn revoke(&mut self, role: Role, account: &Address) -> bool {
        match role {
            Role::Owner => false,
            Role::Admin => self.admins.remove(account),
            Role::Manager => self.managers.remove(account),
        }
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn unpause(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn blacklist(&mut self, account: Address) -> bool {
        self.blacklist.insert(account)
    }

    pub fn unblacklist(&mut self, account: &Address) -> bool {
        self.blacklist.remove(account)
    }

    pub fn is_blacklisted(&self, account: &Address) -> bool {
        self.blacklist.contains(account)
    }
}

impl Guard for AccessControl {
    fn authorize(&self, caller: &Address, operation: Operation) -> Result<(), AccessError> {
        let role = match operation {
            Operation::CreateSwap | Operation::FinalizeSwap | Operation::DeclineSwap => {
                Role::Manager
            }
            Operation::ConfigureRegistry => Role::Admin,
            Operation::Withdraw => Role::Owner,
        };
        if !self.has_role(caller, role) {
            return Err(AccessError::MissingRole(*caller, role));
        }
        if operation.is_swap_operation() {
            if self.paused {
                return Err(AccessError::Paused);
            }
            self.screen(caller)?;
        }
        Ok(())
    }

    fn screen(&self, account: &Address) -> Result<(), AccessError> {
        if self.is_blacklisted(account) {
            return Err(AccessError::Blacklisted(*account));
        }
        Ok(())
    }
}
