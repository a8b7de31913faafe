//! Access key provisioning tool. Runs against the same auth database the
//! server uses; keys are printed once at creation and only the digest is
//! stored.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use duetto_server::auth::{AccessKey, SessionStore, SqliteAuthStore};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the auth database file.
    #[clap(value_parser = parse_path)]
    pub auth_db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Provisions a user with a freshly generated access key and prints it.
    /// Fails if the user is already provisioned.
    AddUser { user_id: String },

    /// Rotates the access key of an already provisioned user and prints the
    /// new one. Existing keys stop working immediately.
    RotateKey { user_id: String },

    /// Revokes a user's access along with all of their active sessions.
    RemoveUser { user_id: String },

    /// Verifies an access key without creating a session.
    CheckKey { user_id: String, access_key: String },

    /// Shows all provisioned user ids.
    Users,
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();
    let store = SqliteAuthStore::new(&cli_args.auth_db)
        .with_context(|| format!("Failed to open auth db at {:?}", cli_args.auth_db))?;

    match cli_args.command {
        Command::AddUser { user_id } => {
            if store.provisioned_user_ids()?.contains(&user_id) {
                bail!("User {} is already provisioned, use rotate-key", user_id);
            }
            let key = AccessKey::generate();
            store.upsert_access(&user_id, &key)?;
            println!("Provisioned {} with access key: {}", user_id, key.0);
        }
        Command::RotateKey { user_id } => {
            if !store.provisioned_user_ids()?.contains(&user_id) {
                bail!("User {} is not provisioned, use add-user", user_id);
            }
            let key = AccessKey::generate();
            store.upsert_access(&user_id, &key)?;
            println!("New access key for {}: {}", user_id, key.0);
        }
        Command::RemoveUser { user_id } => {
            if store.delete_access(&user_id)? {
                println!("Removed access and sessions for {}", user_id);
            } else {
                bail!("User {} is not provisioned", user_id);
            }
        }
        Command::CheckKey {
            user_id,
            access_key,
        } => {
            if store.verify_access(&user_id, &AccessKey(access_key))? {
                println!("Access key valid for {}", user_id);
            } else {
                bail!("Access key invalid for {}", user_id);
            }
        }
        Command::Users => {
            for user_id in store.provisioned_user_ids()? {
                println!("{}", user_id);
            }
        }
    }
    Ok(())
}
