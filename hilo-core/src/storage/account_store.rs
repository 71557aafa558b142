use crate::error::Result;
use crate::storage::Storage;
use crate::treasury::TreasuryState;
use crate::types::Identity;
use bitcoin::Amount;
use rusqlite::{params, OptionalExtension};

pub struct AccountStore<'a> {
    storage: &'a Storage,
}

impl<'a> AccountStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Replace persisted balances with `state`
    pub async fn save_state(&self, state: &TreasuryState) -> Result<()> {
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM accounts", [])?;
        for (identity, balance) in &state.accounts {
            tx.execute(
                "INSERT INTO accounts (identity, balance) VALUES (?1, ?2)",
                params![identity.as_str(), balance.to_sat() as i64],
            )?;
        }
        tx.execute(
            "INSERT OR REPLACE INTO escrow (id, balance) VALUES (0, ?1)",
            params![state.escrow.to_sat() as i64],
        )?;

        tx.commit()?;
        Ok(())
    }

    pub async fn load_state(&self) -> Result<TreasuryState> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare("SELECT identity, balance FROM accounts ORDER BY identity")?;
        let rows = stmt.query_map([], |row| {
            let identity: String = row.get(0)?;
            let balance: i64 = row.get(1)?;
            Ok((Identity::new(identity), Amount::from_sat(balance as u64)))
        })?;

        let mut accounts = Vec::new();
        for row in rows {
            accounts.push(row?);
        }

        let escrow: Option<i64> = conn
            .query_row("SELECT balance FROM escrow WHERE id = 0", [], |row| row.get(0))
            .optional()?;

        Ok(TreasuryState {
            accounts,
            escrow: Amount::from_sat(escrow.unwrap_or(0) as u64),
        })
    }
}
