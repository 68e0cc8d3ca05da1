use super::utils::open_store;
use analyst_core::BackendSettings;
use analyst_interaction::OllamaBackend;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

pub async fn list(config: Option<&Path>) -> Result<()> {
    let store = open_store(config)?;
    let settings = BackendSettings::load(&store);
    let backend = OllamaBackend::new(settings.clone())?;

    let models = backend
        .list_models()
        .await
        .with_context(|| format!("Failed to list models from {}", settings.url))?;

    if models.is_empty() {
        println!("{}", "No models installed on the backend".yellow());
        return Ok(());
    }
    for model in models {
        if model == settings.model {
            println!("{} {}", "*".green(), model.green().bold());
        } else {
            println!("  {}", model);
        }
    }
    Ok(())
}
