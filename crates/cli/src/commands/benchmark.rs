//! `kudachat benchmark`: probe model access from the command line.

use std::sync::Arc;

use kudachat_agent::{BotSettings, BotState, CommandHandler};
use kudachat_providers::openai_compat::OpenAiCompatProvider;

use super::{CliResult, load_config, open_store};

pub async fn run() -> CliResult {
    let config = load_config()?;
    let Some(api_key) = config.provider.api_key.clone() else {
        return Err("No API key configured: set OPENAI_API_KEY or provider.api_key".into());
    };

    let store = open_store(&config).await?;
    let provider = Arc::new(OpenAiCompatProvider::new(
        "openai",
        config.provider.api_url.clone(),
        api_key,
    ));
    let state = Arc::new(BotState::new(
        store,
        provider,
        BotSettings::from_config(&config),
    ));

    println!("{}", CommandHandler::new(state).benchmark().await);
    Ok(())
}
