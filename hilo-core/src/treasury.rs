use crate::error::{HiloError, Result};
use crate::types::{Identity, Receipt};
use bitcoin::Amount;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Value rail the game house settles through.
///
/// `collect` moves funds from an account into escrow, `transfer` pays out of
/// escrow. Both either succeed completely or fail without moving anything.
pub trait Treasury: Send + Sync {
    fn collect(&self, from: &Identity, amount: Amount) -> Result<Receipt>;
    fn transfer(&self, to: &Identity, amount: Amount) -> Result<Receipt>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreasuryState {
    pub accounts: Vec<(Identity, Amount)>,
    pub escrow: Amount,
}

#[derive(Debug, Default)]
struct Book {
    accounts: HashMap<Identity, Amount>,
    escrow: Amount,
}

fn overflow(what: &str, amount: Amount) -> HiloError {
    HiloError::transfer(format!(
        "crediting {} sats would overflow {}",
        amount.to_sat(),
        what
    ))
}

/// In-memory account book
#[derive(Default)]
pub struct MemoryTreasury {
    book: RwLock<Book>,
}

impl MemoryTreasury {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an account from outside the system
    pub fn fund(&self, identity: &Identity, amount: Amount) -> Result<Amount> {
        let mut book = self.book.write();
        let balance = book.accounts.entry(identity.clone()).or_insert(Amount::ZERO);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| overflow("the account balance", amount))?;
        let balance = *balance;

        tracing::info!("Funded {} with {} sats", identity, amount.to_sat());
        Ok(balance)
    }

    pub fn balance_of(&self, identity: &Identity) -> Amount {
        self.book
            .read()
            .accounts
            .get(identity)
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    pub fn escrow(&self) -> Amount {
        self.book.read().escrow
    }

    pub fn accounts(&self) -> Vec<(Identity, Amount)> {
        let mut accounts: Vec<_> = self
            .book
            .read()
            .accounts
            .iter()
            .map(|(id, amount)| (id.clone(), *amount))
            .collect();
        accounts.sort();
        accounts
    }

    pub fn export_state(&self) -> TreasuryState {
        let book = self.book.read();
        let mut accounts: Vec<_> = book
            .accounts
            .iter()
            .map(|(id, amount)| (id.clone(), *amount))
            .collect();
        accounts.sort();
        TreasuryState {
            accounts,
            escrow: book.escrow,
        }
    }

    pub fn import_state(&self, state: TreasuryState) {
        *self.book.write() = Book {
            accounts: state.accounts.into_iter().collect(),
            escrow: state.escrow,
        };
    }
}

impl Treasury for MemoryTreasury {
    fn collect(&self, from: &Identity, amount: Amount) -> Result<Receipt> {
        let mut book = self.book.write();
        let available = book.accounts.get(from).copied().unwrap_or(Amount::ZERO);

        let remaining = available
            .checked_sub(amount)
            .ok_or(HiloError::InsufficientFunds {
                need: amount.to_sat(),
                available: available.to_sat(),
            })?;
        let escrow = book
            .escrow
            .checked_add(amount)
            .ok_or_else(|| overflow("escrow", amount))?;

        book.accounts.insert(from.clone(), remaining);
        book.escrow = escrow;

        Ok(receipt(from, amount))
    }

    fn transfer(&self, to: &Identity, amount: Amount) -> Result<Receipt> {
        let mut book = self.book.write();
        let escrow = book.escrow.checked_sub(amount).ok_or_else(|| {
            HiloError::transfer(format!(
                "escrow holds {} sats, cannot pay {} sats",
                book.escrow.to_sat(),
                amount.to_sat()
            ))
        })?;
        let current = book.accounts.get(to).copied().unwrap_or(Amount::ZERO);
        let balance = current
            .checked_add(amount)
            .ok_or_else(|| overflow("the recipient balance", amount))?;

        book.accounts.insert(to.clone(), balance);
        book.escrow = escrow;

        Ok(receipt(to, amount))
    }
}

fn receipt(counterparty: &Identity, amount: Amount) -> Receipt {
    Receipt {
        id: Uuid::new_v4().to_string(),
        counterparty: counterparty.clone(),
        amount,
        timestamp: Utc::now(),
    }
}
