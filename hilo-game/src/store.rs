use crate::config::HouseConfig;
use crate::error::Result;
use crate::game::{DecryptionPurpose, Game};
use crate::ledger::GameLedger;
use hilo_core::storage::Storage;
use hilo_core::{GameId, RequestId};
use rusqlite::{params, OptionalExtension};

const NEXT_GAME_ID_KEY: &str = "next_game_id";

fn purpose_str(purpose: DecryptionPurpose) -> &'static str {
    match purpose {
        DecryptionPurpose::Settlement => "settlement",
        DecryptionPurpose::GuessDisclosure => "guess_disclosure",
    }
}

/// Persists game records and the outstanding request table
pub struct LedgerStore<'a> {
    storage: &'a Storage,
}

impl<'a> LedgerStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn save_ledger(&self, ledger: &GameLedger) -> Result<()> {
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM pending_requests", [])?;

        for game in ledger.games() {
            let record = serde_json::to_string(game)?;
            tx.execute(
                "INSERT OR REPLACE INTO games (id, creator, settled, record) VALUES (?1, ?2, ?3, ?4)",
                params![
                    game.id as i64,
                    game.creator.as_str(),
                    game.is_settled(),
                    record
                ],
            )?;

            if let Some(pending) = game.pending {
                tx.execute(
                    "INSERT INTO pending_requests (request_id, game_id, purpose) VALUES (?1, ?2, ?3)",
                    params![
                        pending.request_id.0 as i64,
                        game.id as i64,
                        purpose_str(pending.purpose)
                    ],
                )?;
            }
        }

        tx.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![NEXT_GAME_ID_KEY, ledger.total_games() as i64],
        )?;

        tx.commit()?;
        tracing::debug!("Saved {} games", ledger.total_games());
        Ok(())
    }

    pub async fn load_ledger(&self, config: HouseConfig) -> Result<GameLedger> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare("SELECT record FROM games ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut games = Vec::new();
        for row in rows {
            let game: Game = serde_json::from_str(&row?)?;
            games.push(game);
        }

        let mut stmt = conn.prepare("SELECT request_id, game_id FROM pending_requests")?;
        let rows = stmt.query_map([], |row| {
            let request_id: i64 = row.get(0)?;
            let game_id: i64 = row.get(1)?;
            Ok((RequestId(request_id as u64), game_id as GameId))
        })?;

        let mut pending = Vec::new();
        for row in rows {
            pending.push(row?);
        }

        let next_game_id: Option<i64> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![NEXT_GAME_ID_KEY],
                |row| row.get(0),
            )
            .optional()?;

        let ledger = GameLedger::restore(
            config,
            games,
            pending,
            next_game_id.unwrap_or(0) as GameId,
        )?;
        tracing::debug!("Loaded {} games", ledger.total_games());
        Ok(ledger)
    }

    /// Ids of games not yet settled
    pub async fn open_game_ids(&self) -> Result<Vec<GameId>> {
        let conn = self.storage.get_connection().await;
        let mut stmt = conn.prepare("SELECT id FROM games WHERE settled = 0 ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row? as GameId);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_ledger_round_trips_through_sqlite() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(&temp_dir.path().join("hilo.db")).await.unwrap();
        let store = LedgerStore::new(&storage);

        let empty = store.load_ledger(Fixture::new().config).await.unwrap();
        assert_eq!(empty.total_games(), 0);

        let mut fx = Fixture::new();
        let mut ledger = fx.ledger();
        let (settled, _) = fx.create_game(&mut ledger, "creator", 8, 100, false);
        let (open, _) = fx.create_game(&mut ledger, "creator", 2, 100, false);
        fx.join(&mut ledger, settled, "alice", true, 10).unwrap();
        fx.join(&mut ledger, open, "bob", false, 10).unwrap();
        fx.advance_past_end();

        ledger
            .settlement()
            .debug_reveal(&fx.ctx("tester"), settled, 8, &[true])
            .unwrap();
        let request = ledger
            .settlement()
            .request_reveal(&fx.ctx("anyone"), open)
            .unwrap();

        store.save_ledger(&ledger).await.unwrap();
        assert_eq!(store.open_game_ids().await.unwrap(), vec![open]);

        let loaded = store.load_ledger(fx.config.clone()).await.unwrap();
        assert_eq!(loaded.total_games(), 2);
        assert_eq!(loaded.pending_requests(), vec![(request, open)]);

        let game = loaded.game(settled).unwrap();
        assert_eq!(game.settlement, ledger.game(settled).unwrap().settlement);
        assert_eq!(game.participant_list, vec![hilo_core::Identity::new("alice")]);
        assert_eq!(loaded.game(open).unwrap().total_pot.to_sat(), 110);
    }
}
