use crate::session::Session;
use anyhow::{anyhow, bail, Result};
use bitcoin::Amount;
use chrono::{DateTime, Duration, Utc};
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use hilo_core::{GameId, Plaintext};
use hilo_game::{
    generate_salt, parse_salt, CreateGame, Game, JoinGame, SecretCommitment, Settlement,
};

#[derive(Subcommand)]
pub enum GameCommands {
    /// Open a new round with a sealed secret number
    Create {
        /// Creator identity
        #[arg(long = "as")]
        creator: String,
        /// Secret number (1-10)
        #[arg(short, long)]
        secret: u8,
        /// Reward pool in satoshis
        #[arg(short, long)]
        reward: u64,
        /// Minimum stake in satoshis
        #[arg(short, long)]
        min_stake: u64,
        /// Round length in seconds
        #[arg(long, default_value = "3600")]
        duration: i64,
        /// Pay the creator share as soon as the oracle settles
        #[arg(long)]
        auto_settle: bool,
    },
    /// Join a round with a sealed guess
    Join {
        /// Participant identity
        #[arg(long = "as")]
        player: String,
        /// Game ID
        game_id: GameId,
        /// Guess: big (6-10) or small (1-5)
        guess: String,
        /// Stake in satoshis
        #[arg(short, long)]
        stake: u64,
    },
    /// List all games
    List,
    /// Show a game and its participants
    Show {
        /// Game ID
        game_id: GameId,
        /// Print the full record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Ask the oracle to reveal the secret and all guesses
    Reveal {
        /// Requesting identity
        #[arg(long = "as", default_value = "anyone")]
        caller: String,
        /// Game ID
        game_id: GameId,
    },
    /// Ask the oracle to disclose the guesses ahead of a fair reveal
    Disclose {
        /// Creator identity
        #[arg(long = "as")]
        creator: String,
        /// Game ID
        game_id: GameId,
    },
    /// Settle by opening the creator's commitment
    FairReveal {
        /// Creator identity
        #[arg(long = "as")]
        creator: String,
        /// Game ID
        game_id: GameId,
        /// Secret number
        #[arg(short, long)]
        secret: u8,
        /// Commitment salt (hex, printed at creation)
        #[arg(long)]
        salt: String,
    },
    /// Settle with supplied values (regtest only)
    DebugReveal {
        /// Game ID
        game_id: GameId,
        /// Revealed number
        #[arg(short, long)]
        number: u8,
        /// Comma separated guesses in join order, e.g. big,small
        #[arg(short, long, default_value = "")]
        guesses: String,
    },
    /// Claim winnings as a participant
    Claim {
        /// Participant identity
        #[arg(long = "as")]
        player: String,
        /// Game ID
        game_id: GameId,
    },
    /// Claim the creator share
    ClaimCreator {
        /// Creator identity
        #[arg(long = "as")]
        creator: String,
        /// Game ID
        game_id: GameId,
    },
}

fn parse_guess(s: &str) -> Result<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "big" | "b" | "high" | "hi" => Ok(true),
        "small" | "s" | "low" | "lo" => Ok(false),
        other => Err(anyhow!("Invalid guess '{}', use big or small", other)),
    }
}

fn parse_guesses(s: &str) -> Result<Vec<bool>> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    s.split(',').map(parse_guess).collect()
}

fn end_time_after(now: DateTime<Utc>, seconds: i64) -> Result<DateTime<Utc>> {
    Duration::try_seconds(seconds)
        .and_then(|d| now.checked_add_signed(d))
        .ok_or_else(|| anyhow!("Duration of {} seconds is out of range", seconds))
}

fn big_or_small(big: bool) -> &'static str {
    if big {
        "big"
    } else {
        "small"
    }
}

fn print_settlement(settlement: &Settlement) {
    println!(
        "  Revealed number: {} ({})",
        settlement.revealed_number,
        big_or_small(settlement.number_is_big)
    );
    println!("  Winners: {}", settlement.winners_count);
    println!(
        "  Payout per winner: {} sats",
        settlement.payout_per_winner.to_sat()
    );
    println!(
        "  Creator payout: {} sats ({} share + {} remainder)",
        settlement.creator_payout().to_sat(),
        settlement.creator_share.to_sat(),
        settlement.creator_bonus_remainder.to_sat()
    );
    println!("  Settled via: {:?}", settlement.settled_via);
}

fn print_game(game: &Game, session: &Session) -> Result<()> {
    println!("Game {}:", game.id);
    println!("  Creator: {}", game.creator);
    println!("  Status: {:?}", session.house.status(game.id)?);
    println!("  Ends: {}", game.end_time);
    println!("  Minimum stake: {} sats", game.min_stake.to_sat());
    println!("  Reward pool: {} sats", game.reward_pool.to_sat());
    println!("  Total pot: {} sats", game.total_pot.to_sat());
    println!("  Commitment: {}", game.secret_commitment);
    println!("  Auto settle: {}", game.auto_settle_enabled);
    if let Some(pending) = game.pending {
        println!("  Pending: {} ({:?})", pending.request_id, pending.purpose);
    }
    if let Some(settlement) = &game.settlement {
        print_settlement(settlement);
        println!("  Creator claimed: {}", game.creator_claimed);
    }

    if game.participant_list.is_empty() {
        println!("  No participants yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Participant", "Stake (sats)", "Guess", "Won", "Claimed"]);
    for p in game.ordered_participants() {
        let guess = if p.choice_revealed {
            big_or_small(p.guessed_big).to_string()
        } else {
            "sealed".to_string()
        };
        table.add_row(vec![
            p.identity.to_string(),
            p.stake.to_sat().to_string(),
            guess,
            p.won.to_string(),
            p.claimed.to_string(),
        ]);
    }
    println!("{}", table);
    Ok(())
}

pub async fn handle_game_command(cmd: GameCommands, session: &Session) -> Result<()> {
    let house = &session.house;

    match cmd {
        GameCommands::Create {
            creator,
            secret,
            reward,
            min_stake,
            duration,
            auto_settle,
        } => {
            if !(1..=10).contains(&secret) {
                bail!("Secret must be between 1 and 10");
            }
            let creator = Session::identity(&creator);
            let end_time = end_time_after(house.now(), duration)?;

            let salt = generate_salt();
            let (encrypted_secret, input_proof) =
                session.oracle.encrypt(Plaintext::U8(secret), &creator)?;
            let params = CreateGame {
                encrypted_secret,
                input_proof,
                commitment: SecretCommitment::commit(secret, &salt),
                min_stake: Amount::from_sat(min_stake),
                end_time,
                reward_pool: Amount::from_sat(reward),
                auto_settle,
            };

            let game_id = house.create_game(&creator, params, Amount::from_sat(reward))?;
            session.save().await?;

            println!("Game {} created!", game_id);
            println!();
            println!("IMPORTANT: Keep this salt to fair-reveal later!");
            println!("Salt: {}", hex::encode(salt));
        }

        GameCommands::Join {
            player,
            game_id,
            guess,
            stake,
        } => {
            let player = Session::identity(&player);
            let big = parse_guess(&guess)?;

            let (encrypted_choice, input_proof) =
                session.oracle.encrypt(Plaintext::Bool(big), &player)?;
            house.join_game(
                &player,
                game_id,
                JoinGame {
                    encrypted_choice,
                    input_proof,
                },
                Amount::from_sat(stake),
            )?;
            session.save().await?;

            println!("'{}' joined game {} with {} sats", player, game_id, stake);
        }

        GameCommands::List => {
            let games = house.games()?;
            if games.is_empty() {
                println!("No games found.");
                println!("Create one with: hilo game create --as <identity> ...");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["ID", "Creator", "Status", "Players", "Pot (sats)", "Ends"]);
            for game in games {
                table.add_row(vec![
                    game.id.to_string(),
                    game.creator.to_string(),
                    format!("{:?}", game.status(house.now())),
                    game.participant_count().to_string(),
                    game.total_pot.to_sat().to_string(),
                    game.end_time.format("%Y-%m-%d %H:%M:%S").to_string(),
                ]);
            }
            println!("{}", table);
        }

        GameCommands::Show { game_id, json } => {
            let game = house.game(game_id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&game)?);
            } else {
                print_game(&game, session)?;
            }
        }

        GameCommands::Reveal { caller, game_id } => {
            let request = house.request_reveal(&Session::identity(&caller), game_id)?;
            session.save().await?;

            println!("Reveal requested for game {} ({})", game_id, request);
            println!("Run 'hilo oracle process' to deliver the result");
        }

        GameCommands::Disclose { creator, game_id } => {
            let request =
                house.request_guess_disclosure(&Session::identity(&creator), game_id)?;
            session.save().await?;

            println!("Guess disclosure requested for game {} ({})", game_id, request);
            println!("Run 'hilo oracle process', then 'hilo game fair-reveal'");
        }

        GameCommands::FairReveal {
            creator,
            game_id,
            secret,
            salt,
        } => {
            let salt = parse_salt(&salt).ok_or_else(|| anyhow!("Salt must be 32 bytes of hex"))?;
            let settlement = house.fair_reveal(&Session::identity(&creator), game_id, secret, &salt)?;
            session.save().await?;

            println!("Game {} settled!", game_id);
            print_settlement(&settlement);
        }

        GameCommands::DebugReveal {
            game_id,
            number,
            guesses,
        } => {
            let guesses = parse_guesses(&guesses)?;
            let settlement =
                house.debug_reveal(&Session::identity("debug"), game_id, number, &guesses)?;
            session.save().await?;

            println!("Game {} settled (debug)!", game_id);
            print_settlement(&settlement);
        }

        GameCommands::Claim { player, game_id } => {
            let receipt = house.claim_winnings(&Session::identity(&player), game_id)?;
            session.save().await?;

            println!(
                "Paid {} sats to '{}' (receipt {})",
                receipt.amount.to_sat(),
                receipt.counterparty,
                receipt.id
            );
        }

        GameCommands::ClaimCreator { creator, game_id } => {
            let receipt = house.claim_creator_share(&Session::identity(&creator), game_id)?;
            session.save().await?;

            println!(
                "Paid {} sats to '{}' (receipt {})",
                receipt.amount.to_sat(),
                receipt.counterparty,
                receipt.id
            );
        }
    }

    Ok(())
}
