use super::utils::open_store;
use analyst_core::BackendSettings;
use analyst_interaction::url_policy;
use anyhow::{Result, bail};
use colored::Colorize;
use std::path::Path;

pub fn show(config: Option<&Path>) -> Result<()> {
    let store = open_store(config)?;
    let settings = BackendSettings::load(&store);
    println!("{} {}", "config:".dimmed(), store.path().display());
    println!("{} {}", "url:   ".dimmed(), settings.url);
    println!("{} {}", "model: ".dimmed(), settings.model);
    Ok(())
}

pub fn set_url(config: Option<&Path>, url: &str) -> Result<()> {
    if let Err(err) = url_policy::parse_backend_url(url) {
        bail!("{}", err);
    }
    let store = open_store(config)?;
    let mut settings = BackendSettings::load(&store);
    settings.url = url.trim().to_string();
    settings.persist(&store)?;
    println!("Backend URL set to {}", settings.url.green());
    Ok(())
}

pub fn set_model(config: Option<&Path>, model: &str) -> Result<()> {
    if model.trim().is_empty() {
        bail!("Model name must not be blank");
    }
    let store = open_store(config)?;
    let mut settings = BackendSettings::load(&store);
    settings.model = model.trim().to_string();
    settings.persist(&store)?;
    println!("Model set to {}", settings.model.green());
    Ok(())
}

pub fn reset(config: Option<&Path>) -> Result<()> {
    let store = open_store(config)?;
    let mut settings = BackendSettings::load(&store);
    settings.reset_to_defaults();
    settings.persist(&store)?;
    println!("Backend settings restored to {} / {}", settings.url, settings.model);
    Ok(())
}
