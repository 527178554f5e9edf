//! Campus Market CLI - operator tools for push delivery.
//!
//! # Usage
//!
//! ```bash
//! # Send a notification to every device a user subscribed
//! market-cli notify --user-id 6f1c... --title "Order ready" --body "Pick it up at the desk"
//!
//! # Same, with a link opened on click
//! market-cli notify --user-id 6f1c... --title "New offer" --body "Half price" --url /offers
//!
//! # List a user's stored subscriptions
//! market-cli subscriptions --user-id 6f1c...
//! ```
//!
//! Reads the same environment as the storefront service (`BACKEND_URL`,
//! `BACKEND_SERVICE_KEY`, `PUSH_RELAY_URL`, ...).

#![cfg_attr(not(test), forbid(unsafe_code))]

use campus_market_core::UserId;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "market-cli")]
#[command(author, version, about = "Campus Market CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deliver a push notification to all of a user's subscriptions
    Notify {
        /// Recipient user id
        #[arg(long)]
        user_id: UserId,

        /// Notification title
        #[arg(long)]
        title: String,

        /// Notification body
        #[arg(long)]
        body: String,

        /// Link opened when the notification is clicked
        #[arg(long)]
        url: Option<String>,
    },
    /// List the push subscriptions stored for a user
    Subscriptions {
        /// User id to look up
        #[arg(long)]
        user_id: UserId,
    },
}

#[tokio::main]
async fn main() {
    // .env may carry RUST_LOG
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Notify {
            user_id,
            title,
            body,
            url,
        } => {
            commands::notify::send(user_id, title, body, url).await?;
        }
        Commands::Subscriptions { user_id } => {
            commands::subscriptions::list(user_id).await?;
        }
    }
    Ok(())
}
