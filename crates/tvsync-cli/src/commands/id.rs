use tvsync_core::{Identity, UserId};

use crate::cli::IdCommands;
use crate::error::CliError;

pub fn run_id(identity: &Identity, command: Option<IdCommands>) -> Result<UserId, CliError> {
    let id = match command.unwrap_or(IdCommands::Show) {
        IdCommands::Show => identity.get_or_create()?,
        IdCommands::Set { id } => {
            let id = UserId::parse(id.trim())?;
            identity.set(&id)?;
            tracing::info!(user_id = %id, "User id replaced");
            id
        }
        IdCommands::Reset => {
            let id = identity.regenerate()?;
            tracing::info!(user_id = %id, "User id regenerated");
            id
        }
    };
    Ok(id)
}
