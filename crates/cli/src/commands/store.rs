//! Operator views over the persona store: usage, personas and the model.

use kudachat_agent::persona::format_parameters;

use super::{CliResult, load_config, open_store};

/// `kudachat usage --community <id>`
pub async fn usage(community: &str) -> CliResult {
    let config = load_config()?;
    let store = open_store(&config).await?;

    let tokens = store.usage(community).await?;
    let cost = tokens as f64 * config.usage.cost_per_token_usd;

    println!("Usage for community {community}");
    println!("  Tokens:          {tokens}");
    println!("  Estimated cost:  ${cost:.4}");
    println!("  Active model:    {}", store.model().await?);
    Ok(())
}

/// `kudachat personas --community <id>`
pub async fn personas(community: &str) -> CliResult {
    let config = load_config()?;
    let store = open_store(&config).await?;

    let active = store.active_persona(community).await?;
    let personas = store.personas(community).await?;

    println!("Personas for community {community}");
    for (name, persona) in &personas {
        let marker = if *name == active.name { " (active)" } else { "" };
        let params = if persona.parameters.is_empty() {
            String::new()
        } else {
            format!(" [{}]", format_parameters(&persona.parameters))
        };
        println!("  {name}{marker}{params}");
        println!("      {}", persona.description);
    }
    Ok(())
}

/// `kudachat model`
pub async fn show_model() -> CliResult {
    let config = load_config()?;
    let store = open_store(&config).await?;
    println!("Active model: {}", store.model().await?);
    Ok(())
}

/// `kudachat model set <name>`
pub async fn set_model(name: &str) -> CliResult {
    let config = load_config()?;
    if !config.models.allowed.iter().any(|m| m == name) {
        return Err(format!(
            "Model '{name}' is not allowed. Allowed models: {}",
            config.models.allowed.join(", ")
        )
        .into());
    }
    let store = open_store(&config).await?;
    store.set_model(name).await?;
    println!("Active model is now {name}");
    Ok(())
}
