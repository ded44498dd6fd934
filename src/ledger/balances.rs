use ahash::{AHashMap, AHashSet};
use thiserror::Error;

use crate::domain::{Address, SuretyError, Wei};

/// Errors raised by the value ledger.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("insufficient balance in {account}: needed {needed}, available {available}")]
    InsufficientBalance {
        account: Address,
        needed: Wei,
        available: Wei,
    },

    #[error("recipient {0} rejected the transfer")]
    Rejected(Address),

    #[error("balance overflow for {0}")]
    Overflow(Address),
}

impl From<TransferError> for SuretyError {
    fn from(err: TransferError) -> Self {
        SuretyError::Transfer(err.to_string())
    }
}

/// Moves native value between accounts.
///
/// This is the only capability the core needs from the substrate's
/// account model: a transfer either fully happens or returns an error
/// with both balances untouched.
pub trait ValueTransfer {
    fn transfer(&mut self, from: &Address, to: &Address, amount: Wei) -> Result<(), TransferError>;
}

/// Native account balances.
#[derive(Debug, Clone, Default)]
pub struct Balances {
    accounts: AHashMap<Address, Wei>,
    /// Accounts that refuse incoming value (contracts without a receive hook)
    refusing: AHashSet<Address>,
}

impl Balances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, account: &Address) -> Wei {
        self.accounts.get(account).copied().unwrap_or(0)
    }

    /// Mint value into an account (genesis allocation, faucets, tests).
    pub fn mint(&mut self, account: &Address, amount: Wei) -> Result<(), TransferError> {
        let balance = self.accounts.entry(account.clone()).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| TransferError::Overflow(account.clone()))?;
        Ok(())
    }

    /// Remove value from an account without crediting anyone (call fees).
    pub fn burn(&mut self, account: &Address, amount: Wei) -> Result<(), TransferError> {
        let available = self.balance_of(account);
        if available < amount {
            return Err(TransferError::InsufficientBalance {
                account: account.clone(),
                needed: amount,
                available,
            });
        }
        self.accounts.insert(account.clone(), available - amount);
        Ok(())
    }

    /// Make an account reject every incoming transfer.
    pub fn refuse_deposits(&mut self, account: &Address) {
        self.refusing.insert(account.clone());
    }

    /// Let an account receive value again.
    pub fn accept_deposits(&mut self, account: &Address) {
        self.refusing.remove(account);
    }

    /// Sum of all balances.
    pub fn total_supply(&self) -> Wei {
        self.accounts.values().copied().sum()
    }
}

impl ValueTransfer for Balances {
    fn transfer(&mut self, from: &Address, to: &Address, amount: Wei) -> Result<(), TransferError> {
        if self.refusing.contains(to) {
            return Err(TransferError::Rejected(to.clone()));
        }

        let available = self.balance_of(from);
        if available < amount {
            return Err(TransferError::InsufficientBalance {
                account: from.clone(),
                needed: amount,
                available,
            });
        }

        if from == to {
            return Ok(());
        }

        let credited = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or_else(|| TransferError::Overflow(to.clone()))?;

        self.accounts.insert(from.clone(), available - amount);
        self.accounts.insert(to.clone(), credited);
        Ok(())
    }
}
