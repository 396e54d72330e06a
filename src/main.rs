use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

use translate_bot::{
    BotConfig, CatalogService, ConsoleSession, Dispatcher, Messages, TranslationBackend,
    WatsonClient,
};

#[derive(Parser, Debug)]
#[command(
    name = "translate-bot",
    version,
    about = "Chat bot that translates phrases through a hosted translation API"
)]
struct Cli {
    /// Name the bot answers to in help output
    #[arg(short = 'n', long = "name", default_value = "translator")]
    name: String,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    translate_bot::logging::init(cli.verbose)?;

    let config = BotConfig::from_env()?;
    let backend: Arc<dyn TranslationBackend> = Arc::new(WatsonClient::new(&config));
    let catalog = Arc::new(CatalogService::new(backend.clone()));
    let messages = Messages::load()?;

    let (sender, receiver) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if sender.send(line).await.is_err() {
                break;
            }
        }
    });

    let session = Arc::new(ConsoleSession::new(receiver, config.reply_timeout));
    let dispatcher = Dispatcher::new(
        cli.name,
        catalog,
        backend,
        session.clone(),
        messages,
        &config,
    )?;

    while let Some(line) = session.next_message().await {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if !dispatcher.dispatch(text).await {
            debug!("ignoring message: {}", text);
        }
    }
    Ok(())
}
