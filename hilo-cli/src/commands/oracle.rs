use crate::session::Session;
use anyhow::Result;
use clap::Subcommand;
use hilo_core::DecryptionResponse;
use hilo_game::CallbackOutcome;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum OracleCommands {
    /// Fulfil queued decryption requests and deliver the callbacks
    Process,
    /// Show queued and undelivered decryption requests
    Pending,
}

fn response_path(dir: &Path, response: &DecryptionResponse) -> PathBuf {
    dir.join(format!("{}.json", response.request_id))
}

async fn load_undelivered(dir: &Path) -> Result<Vec<DecryptionResponse>> {
    let mut responses = Vec::new();
    if !dir.exists() {
        return Ok(responses);
    }

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let contents = tokio::fs::read_to_string(&path).await?;
        match serde_json::from_str(&contents) {
            Ok(response) => responses.push(response),
            Err(e) => tracing::warn!("Skipping unreadable response {}: {}", path.display(), e),
        }
    }

    responses.sort_by_key(|r: &DecryptionResponse| r.request_id);
    Ok(responses)
}

async fn keep_for_retry(dir: &Path, response: &DecryptionResponse) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let json = serde_json::to_string_pretty(response)?;
    tokio::fs::write(response_path(dir, response), json).await?;
    Ok(())
}

async fn forget(dir: &Path, response: &DecryptionResponse) -> Result<()> {
    let path = response_path(dir, response);
    if path.exists() {
        tokio::fs::remove_file(path).await?;
    }
    Ok(())
}

pub async fn handle_oracle_command(cmd: OracleCommands, session: &Session) -> Result<()> {
    let dir = session.undelivered_dir.as_path();

    match cmd {
        OracleCommands::Process => {
            let mut responses = load_undelivered(dir).await?;
            responses.extend(session.oracle.process_pending());
            if responses.is_empty() {
                println!("No pending decryption requests.");
                return Ok(());
            }

            for response in responses {
                match session.house.on_decryption_callback(&response) {
                    Ok(CallbackOutcome::Settled {
                        game_id,
                        settlement,
                        creator_payout,
                    }) => {
                        println!(
                            "Game {} settled: number {}, {} winner(s)",
                            game_id, settlement.revealed_number, settlement.winners_count
                        );
                        if let Some(receipt) = creator_payout {
                            println!("  Creator paid {} sats", receipt.amount.to_sat());
                        }
                        forget(dir, &response).await?;
                    }
                    Ok(CallbackOutcome::GuessesDisclosed { game_id, count }) => {
                        println!("Game {}: {} guesses disclosed", game_id, count);
                        forget(dir, &response).await?;
                    }
                    Err(e) if e.is_retryable() => {
                        tracing::warn!("Callback for {} deferred: {}", response.request_id, e);
                        eprintln!("Request {} kept for retry: {}", response.request_id, e);
                        keep_for_retry(dir, &response).await?;
                    }
                    Err(e) => {
                        tracing::warn!("Callback for {} rejected: {}", response.request_id, e);
                        eprintln!("Request {} not applied: {}", response.request_id, e);
                        forget(dir, &response).await?;
                    }
                }
            }

            session.save().await?;
        }

        OracleCommands::Pending => {
            let queued = session.oracle.pending_requests();
            let undelivered = load_undelivered(dir).await?;
            if queued.is_empty() && undelivered.is_empty() {
                println!("No pending decryption requests.");
                return Ok(());
            }

            for request in queued {
                println!("{} (queued)", request);
            }
            for response in undelivered {
                println!("{} (awaiting redelivery)", response.request_id);
            }
        }
    }

    Ok(())
}
