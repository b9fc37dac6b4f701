pub mod benchmark;
pub mod onboard;
pub mod run;
pub mod status;
pub mod store;

use kudachat_agent::BotSettings;
use kudachat_config::AppConfig;
use kudachat_store::ConfigStore;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Open the persona store at the configured path, seeding it if absent.
pub async fn open_store(config: &AppConfig) -> Result<ConfigStore, Box<dyn std::error::Error>> {
    let store = ConfigStore::open(config.data_path.clone(), BotSettings::store_seed(config))
        .await
        .map_err(|e| format!("Failed to open persona store: {e}"))?;
    Ok(store)
}
