use anyhow::Context;
use tracing::{info, warn};

use pony_client::{ClientConfig, PonyClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "pony=debug".into()),
        )
        .init();

    // Reads .env too
    let config = ClientConfig::from_env()?;
    let client = PonyClient::connect(&config)?;

    // Log in from the environment when no session was restored
    if !client.session().is_logged_in() {
        let username = std::env::var("PONY_USERNAME").context("no stored session and PONY_USERNAME is not set")?;
        let password = std::env::var("PONY_PASSWORD").context("PONY_PASSWORD is not set")?;
        let account = client
            .login(&username, &password)
            .await
            .map_err(|e| anyhow::anyhow!("login failed: {}", e.user_message()))?;
        info!("Logged in as {} ({})", account.username, account.id);
    }

    let chats = client
        .list_chats()
        .await
        .map_err(|e| anyhow::anyhow!("could not load chats: {}", e.user_message()))?;

    println!("{} chats", chats.len());
    for chat in &chats {
        let marker = match client.is_member(chat.id).await {
            Ok(true) => "*",
            Ok(false) => " ",
            Err(e) => {
                warn!("membership of chat {} unknown: {}", chat.id, e);
                "?"
            }
        };
        println!("{} [{}] {}", marker, chat.id, chat.name);
    }

    Ok(())
}
