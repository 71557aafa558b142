use crate::session::Session;
use anyhow::Result;
use bitcoin::Amount;
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Credit an account (development funding)
    Fund {
        /// Account identity
        identity: String,
        /// Amount in satoshis
        amount: u64,
    },
    /// Show an account balance
    Balance {
        /// Account identity
        identity: String,
    },
    /// List all accounts and the escrow balance
    List,
}

pub async fn handle_account_command(cmd: AccountCommands, session: &Session) -> Result<()> {
    match cmd {
        AccountCommands::Fund { identity, amount } => {
            let identity = Session::identity(&identity);
            let balance = session.treasury.fund(&identity, Amount::from_sat(amount))?;
            session.save().await?;

            println!(
                "Funded '{}' with {} sats (balance {} sats)",
                identity,
                amount,
                balance.to_sat()
            );
        }

        AccountCommands::Balance { identity } => {
            let identity = Session::identity(&identity);
            let balance = session.treasury.balance_of(&identity);
            println!(
                "Balance for '{}': {} sats ({:.8} BTC)",
                identity,
                balance.to_sat(),
                balance.to_btc()
            );

            for game in session.house.games()? {
                let claimable = session.house.claimable(game.id, &identity)?;
                if claimable > Amount::ZERO {
                    println!(
                        "  Claimable from game {}: {} sats",
                        game.id,
                        claimable.to_sat()
                    );
                }
            }
        }

        AccountCommands::List => {
            let accounts = session.treasury.accounts();
            if accounts.is_empty() {
                println!("No accounts found.");
                println!("Fund one with: hilo account fund <identity> <sats>");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Identity", "Balance (sats)"]);
            for (identity, balance) in accounts {
                table.add_row(vec![identity.to_string(), balance.to_sat().to_string()]);
            }

            println!("{}", table);
            println!("Escrow: {} sats", session.treasury.escrow().to_sat());
        }
    }

    Ok(())
}
