//! Stockroom CLI - user management and notification tools.
//!
//! # Usage
//!
//! ```bash
//! # Create the first admin (password from SR_USER_PASSWORD)
//! sr-cli bootstrap -u dana -n "Dana Ortiz" -e dana@example.com
//!
//! # Manage users as an existing admin
//! sr-cli users list --admin dana
//! sr-cli users create --admin dana -u lee -n "Lee Park" -e lee@example.com -r staff
//! sr-cli users set-role --admin dana -u lee -r admin
//! sr-cli users delete --admin dana -u lee
//!
//! # Print a user's unseen-item counts
//! sr-cli counts lee
//! ```
//!
//! # Commands
//!
//! - `bootstrap` - Create the first admin
//! - `users` - List, create, re-role and delete users
//! - `counts` - Print unseen counts for a user

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "sr-cli")]
#[command(author, version, about = "Stockroom dashboard CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the first admin; refused once any admin exists
    Bootstrap {
        /// Login handle
        #[arg(short, long)]
        username: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Sign-in email address
        #[arg(short, long)]
        email: String,
    },
    /// Manage dashboard users
    Users {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Print unseen-item counts for a user
    Counts {
        /// Handle of the user
        handle: String,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// List all users
    List {
        /// Handle of the admin performing the action
        #[arg(long)]
        admin: String,
    },
    /// Create a user (password from `SR_USER_PASSWORD`)
    Create {
        /// Handle of the admin performing the action
        #[arg(long)]
        admin: String,

        /// Login handle
        #[arg(short, long)]
        username: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Sign-in email address
        #[arg(short, long)]
        email: String,

        /// Role (`admin` or `staff`)
        #[arg(short, long, default_value = "staff")]
        role: String,
    },
    /// Change a user's role
    SetRole {
        /// Handle of the admin performing the action
        #[arg(long)]
        admin: String,

        /// Handle of the user to change
        #[arg(short, long)]
        username: String,

        /// New role (`admin` or `staff`)
        #[arg(short, long)]
        role: String,
    },
    /// Delete a user's profile (the identity account is kept)
    Delete {
        /// Handle of the admin performing the action
        #[arg(long)]
        admin: String,

        /// Handle of the user to delete
        #[arg(short, long)]
        username: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), commands::CliError> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    let ctx = commands::Context::from_env()?;

    match cli.command {
        Commands::Bootstrap {
            username,
            name,
            email,
        } => {
            commands::users::bootstrap(&ctx, username, name, email).await?;
        }
        Commands::Users { action } => match action {
            UserAction::List { admin } => commands::users::list(&ctx, &admin).await?,
            UserAction::Create {
                admin,
                username,
                name,
                email,
                role,
            } => {
                commands::users::create(&ctx, &admin, username, name, email, &role).await?;
            }
            UserAction::SetRole {
                admin,
                username,
                role,
            } => commands::users::set_role(&ctx, &admin, &username, &role).await?,
            UserAction::Delete { admin, username } => {
                commands::users::delete(&ctx, &admin, &username).await?;
            }
        },
        Commands::Counts { handle } => commands::counts::print(&ctx, &handle).await?,
    }
    Ok(())
}
