//! `kudachat run`: the full bot runtime.

use std::sync::Arc;

use kudachat_agent::{BotSettings, BotState, Dispatcher, command_definitions};
use kudachat_channels::{DiscordChannel, DiscordConfig};
use kudachat_core::{Channel, Provider};
use kudachat_providers::openai_compat::OpenAiCompatProvider;
use tracing::{info, warn};

use super::{CliResult, load_config, open_store};

pub async fn run(port: Option<u16>, register: bool) -> CliResult {
    let mut config = load_config()?;
    if let Some(port) = port {
        config.gateway.port = port;
    }

    let (Some(bot_token), Some(application_id)) = (
        config.discord.bot_token.clone(),
        config.discord.application_id.clone(),
    ) else {
        return Err("Discord credentials missing: set DISCORD_TOKEN and DISCORD_CLIENT_ID".into());
    };
    let Some(api_key) = config.provider.api_key.clone() else {
        return Err("No API key configured: set OPENAI_API_KEY or provider.api_key".into());
    };

    let store = open_store(&config).await?;
    info!(
        path = %store.path().display(),
        model = %store.model().await?,
        "Persona store ready"
    );

    let provider: Arc<dyn Provider> = Arc::new(OpenAiCompatProvider::new(
        "openai",
        config.provider.api_url.clone(),
        api_key,
    ));
    let state = Arc::new(BotState::new(
        store,
        provider,
        BotSettings::from_config(&config),
    ));

    let channel = Arc::new(DiscordChannel::new(DiscordConfig {
        bot_token,
        application_id: application_id.clone(),
        api_url: config.discord.api_url.clone(),
    }));

    if register {
        if let Err(e) = channel
            .register_commands(&command_definitions(&config.models.allowed))
            .await
        {
            warn!(error = %e, "Slash command registration failed");
        }
    }

    let events = channel.start().await?;
    let dispatcher = Arc::new(Dispatcher::new(state, channel.clone(), application_id));
    let dispatch = tokio::spawn(dispatcher.run(events));

    println!("Kudachat running");
    if config.gateway.enabled {
        println!(
            "   Ingress: http://{}:{}/v1/events",
            config.gateway.host, config.gateway.port
        );
        tokio::select! {
            result = kudachat_gateway::start(&config.gateway, channel.clone()) => {
                result.map_err(|e| format!("Gateway failed: {e}"))?;
            }
            _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
        }
    } else {
        warn!("Gateway disabled; only injected events will be handled");
        tokio::signal::ctrl_c().await?;
        info!("Shutdown requested");
    }

    channel.stop().await?;
    if let Err(e) = dispatch.await {
        warn!(error = %e, "Dispatcher task ended abnormally");
    }
    Ok(())
}
