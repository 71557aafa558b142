pub mod account;
pub mod game;
pub mod oracle;

pub use account::{handle_account_command, AccountCommands};
pub use game::{handle_game_command, GameCommands};
pub use oracle::{handle_oracle_command, OracleCommands};
