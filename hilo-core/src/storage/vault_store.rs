use crate::error::{HiloError, Result};
use crate::oracle::local::{OracleState, QueuedRequest, SealedValue};
use crate::storage::Storage;
use crate::types::{CiphertextHandle, Identity, RequestId};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

const NEXT_REQUEST_KEY: &str = "oracle_next_request_id";

/// Persists the local oracle's sealed values and request queue
pub struct VaultStore<'a> {
    storage: &'a Storage,
}

impl<'a> VaultStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn save_state(&self, state: &OracleState) -> Result<()> {
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        for value in &state.values {
            tx.execute(
                "INSERT OR IGNORE INTO sealed_values (handle, owner, nonce, sealed, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    value.handle.to_hex(),
                    value.owner.as_str(),
                    value.nonce,
                    value.sealed,
                    value.created_at.timestamp(),
                ],
            )?;
        }

        tx.execute("DELETE FROM decryption_queue", [])?;
        for request in &state.queue {
            let handles: Vec<String> = request.handles.iter().map(|h| h.to_hex()).collect();
            tx.execute(
                "INSERT INTO decryption_queue (request_id, handles, requested_at)
                 VALUES (?1, ?2, ?3)",
                params![
                    request.id.0 as i64,
                    serde_json::to_string(&handles)?,
                    request.requested_at.timestamp(),
                ],
            )?;
        }

        tx.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![NEXT_REQUEST_KEY, state.next_request_id as i64],
        )?;

        tx.commit()?;
        Ok(())
    }

    pub async fn load_state(&self) -> Result<OracleState> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT handle, owner, nonce, sealed, created_at FROM sealed_values",
        )?;
        let rows = stmt.query_map([], |row| {
            let handle: String = row.get(0)?;
            let owner: String = row.get(1)?;
            Ok((
                handle,
                owner,
                row.get::<_, Vec<u8>>(2)?,
                row.get::<_, Vec<u8>>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        let mut values = Vec::new();
        for row in rows {
            let (handle, owner, nonce, sealed, created_at) = row?;
            values.push(SealedValue {
                handle: parse_handle(&handle)?,
                owner: Identity::new(owner),
                nonce,
                sealed,
                created_at: chrono::DateTime::from_timestamp(created_at, 0)
                    .unwrap_or_else(|| Utc::now()),
            });
        }

        let mut stmt = conn.prepare(
            "SELECT request_id, handles, requested_at FROM decryption_queue ORDER BY request_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut queue = Vec::new();
        for row in rows {
            let (id, handles, requested_at) = row?;
            let handles: Vec<String> = serde_json::from_str(&handles)?;
            queue.push(QueuedRequest {
                id: RequestId(id as u64),
                handles: handles
                    .iter()
                    .map(|h| parse_handle(h))
                    .collect::<Result<Vec<_>>>()?,
                requested_at: chrono::DateTime::from_timestamp(requested_at, 0)
                    .unwrap_or_else(|| Utc::now()),
            });
        }

        let next_request_id: Option<i64> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![NEXT_REQUEST_KEY],
                |row| row.get(0),
            )
            .optional()?;

        Ok(OracleState {
            values,
            queue,
            next_request_id: next_request_id.unwrap_or(0) as u64,
        })
    }
}

fn parse_handle(s: &str) -> Result<CiphertextHandle> {
    CiphertextHandle::from_hex(s)
        .ok_or_else(|| HiloError::internal(format!("Corrupt handle in vault: {}", s)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{LocalOracle, Oracle, Plaintext};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_vault_round_trip_keeps_queue() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(&temp_dir.path().join("hilo.db")).await.unwrap();
        let store = VaultStore::new(&storage);

        let oracle = LocalOracle::from_seed([3u8; 32]);
        let owner = Identity::new("creator");
        let (handle, _) = oracle.encrypt(Plaintext::U8(9), &owner).unwrap();
        let id = oracle.request_decryption(&[handle]).unwrap();
        store.save_state(&oracle.export_state()).await.unwrap();

        let reloaded = LocalOracle::from_seed([3u8; 32]);
        reloaded.import_state(store.load_state().await.unwrap());

        assert_eq!(reloaded.pending_requests(), vec![id]);
        let responses = reloaded.process_pending();
        assert_eq!(responses[0].cleartexts, vec![9]);
    }
}
