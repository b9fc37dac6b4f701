//! `kudachat onboard`: first-time setup.

use kudachat_config::AppConfig;

use super::CliResult;

pub async fn run() -> CliResult {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("Kudachat: First-Time Setup");
    println!("==========================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\nConfig already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("Created config.toml at: {}", config_path.display());
    println!("\nNext steps:");
    println!("   1. Set discord.bot_token and discord.application_id (or DISCORD_TOKEN / DISCORD_CLIENT_ID)");
    println!("   2. Set provider.api_key (or OPENAI_API_KEY)");
    println!("   3. Optionally set owner_id to your Discord user id");
    println!("   4. Run: kudachat run\n");

    Ok(())
}
