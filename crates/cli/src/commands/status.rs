//! `kudachat status`: show the effective configuration.

use kudachat_config::AppConfig;

use super::{CliResult, load_config};

fn flag(set: bool) -> &'static str {
    if set { "configured" } else { "missing" }
}

pub async fn run() -> CliResult {
    let config = load_config()?;

    println!("Kudachat Status");
    println!("===============");
    println!("  Config dir:     {}", AppConfig::config_dir().display());
    println!("  Data file:      {}", config.data_path.display());
    println!("  Discord:        {}", flag(config.has_discord_credentials()));
    println!("  API key:        {}", flag(config.has_api_key()));
    println!("  API URL:        {}", config.provider.api_url);
    println!("  Default model:  {}", config.models.default);
    println!("  Allowed models: {}", config.models.allowed.join(", "));
    println!("  Image models:   {}", config.models.image_capable.join(", "));
    println!("  Context limit:  {}", config.chat.context_limit);
    println!(
        "  Owner:          {}",
        config.owner_id.as_deref().unwrap_or("(none)")
    );
    println!(
        "  Gateway:        {}",
        if config.gateway.enabled {
            format!("{}:{}", config.gateway.host, config.gateway.port)
        } else {
            "disabled".to_string()
        }
    );

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file, run `kudachat onboard` first");
    }

    Ok(())
}
