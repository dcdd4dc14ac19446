//! Sick Fits CLI - database migrations and account management.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! sf-cli migrate
//!
//! # Replace a user's permissions (USER is always kept)
//! sf-cli user permissions wes@example.com ADMIN ITEMCREATE
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "sf-cli")]
#[command(author, version, about = "Sick Fits CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Manage storefront users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Replace a user's permissions
    Permissions {
        /// The user's email address
        email: String,

        /// Permission labels (ADMIN, ITEMCREATE, ITEMUPDATE, ITEMDELETE, PERMISSIONUPDATE)
        #[arg(num_args = 0..)]
        permissions: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::User { action } => match action {
            UserAction::Permissions { email, permissions } => {
                commands::user::set_permissions(&email, &permissions).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_permissions() {
        let cli = Cli::try_parse_from([
            "sf-cli",
            "user",
            "permissions",
            "wes@example.com",
            "ADMIN",
            "ITEMCREATE",
        ])
        .unwrap_or_else(|e| panic!("{e}"));

        let Commands::User {
            action: UserAction::Permissions { email, permissions },
        } = cli.command
        else {
            panic!("expected user permissions");
        };
        assert_eq!(email, "wes@example.com");
        assert_eq!(permissions, vec!["ADMIN", "ITEMCREATE"]);
    }
}
