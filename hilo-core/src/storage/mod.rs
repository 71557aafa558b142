pub mod account_store;
pub mod vault_store;

pub use account_store::AccountStore;
pub use vault_store::VaultStore;

use crate::error::{HiloError, Result};
use rusqlite::Connection;
use std::path::Path;
use tokio::sync::Mutex;

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| HiloError::internal(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        // Account balances
        conn.execute(
            "CREATE TABLE IF NOT EXISTS accounts (
                identity TEXT PRIMARY KEY,
                balance INTEGER NOT NULL
            )",
            [],
        )?;

        // Single-row escrow balance
        conn.execute(
            "CREATE TABLE IF NOT EXISTS escrow (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                balance INTEGER NOT NULL
            )",
            [],
        )?;

        // Oracle vault
        conn.execute(
            "CREATE TABLE IF NOT EXISTS sealed_values (
                handle TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                nonce BLOB NOT NULL,
                sealed BLOB NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        // Oracle queue
        conn.execute(
            "CREATE TABLE IF NOT EXISTS decryption_queue (
                request_id INTEGER PRIMARY KEY,
                handles TEXT NOT NULL,
                requested_at INTEGER NOT NULL
            )",
            [],
        )?;

        // Games
        conn.execute(
            "CREATE TABLE IF NOT EXISTS games (
                id INTEGER PRIMARY KEY,
                creator TEXT NOT NULL,
                settled INTEGER NOT NULL,
                record TEXT NOT NULL
            )",
            [],
        )?;

        // Outstanding decryption requests per game
        conn.execute(
            "CREATE TABLE IF NOT EXISTS pending_requests (
                request_id INTEGER PRIMARY KEY,
                game_id INTEGER NOT NULL,
                purpose TEXT NOT NULL,
                FOREIGN KEY (game_id) REFERENCES games(id)
            )",
            [],
        )?;

        // Counters
        conn.execute(
            "CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}
