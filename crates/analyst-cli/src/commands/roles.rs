use super::utils::open_store;
use analyst_core::role::DEFAULT_ROLE;
use analyst_core::RoleStore;
use anyhow::{Result, bail};
use colored::Colorize;
use std::path::Path;

pub fn list(config: Option<&Path>) -> Result<()> {
    let store = open_store(config)?;
    let roles = RoleStore::from_config(&store);

    for role in roles.roles() {
        let first_line = role.prompt.lines().next().unwrap_or_default();
        if role.name == roles.active_role() {
            println!("{} {}  {}", "*".green(), role.name.green().bold(), first_line.dimmed());
        } else {
            println!("  {}  {}", role.name, first_line.dimmed());
        }
    }
    Ok(())
}

pub fn show(config: Option<&Path>, name: Option<&str>) -> Result<()> {
    let store = open_store(config)?;
    let roles = RoleStore::from_config(&store);
    let name = name.unwrap_or(roles.active_role());
    if !name.trim().is_empty() && !roles.contains(name.trim()) {
        eprintln!("{}", format!("No role named '{}', showing the default", name).yellow());
    }
    println!("{}", roles.get_role_prompt(name));
    Ok(())
}

pub fn add(config: Option<&Path>, name: &str, prompt: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("Role name must not be blank");
    }
    let store = open_store(config)?;
    let mut roles = RoleStore::from_config(&store);
    roles.set_role_prompt(name, prompt);
    roles.persist(&store)?;
    println!("Saved role '{}'", name.trim().green());
    Ok(())
}

pub fn remove(config: Option<&Path>, name: &str) -> Result<()> {
    if name.trim() == DEFAULT_ROLE {
        bail!("The default role '{}' cannot be removed", DEFAULT_ROLE);
    }
    let store = open_store(config)?;
    let mut roles = RoleStore::from_config(&store);
    if !roles.contains(name.trim()) {
        bail!("No role named '{}'", name.trim());
    }
    roles.remove_role(name);
    roles.persist(&store)?;
    println!("Removed role '{}'; active role is '{}'", name.trim(), roles.active_role());
    Ok(())
}

pub fn activate(config: Option<&Path>, name: &str) -> Result<()> {
    let store = open_store(config)?;
    let mut roles = RoleStore::from_config(&store);
    if !roles.contains(name.trim()) {
        bail!("No role named '{}'", name.trim());
    }
    roles.set_active_role(name);
    roles.persist(&store)?;
    println!("Active role: {}", roles.active_role().green());
    Ok(())
}

pub fn reset(config: Option<&Path>) -> Result<()> {
    let store = open_store(config)?;
    let mut roles = RoleStore::from_config(&store);
    roles.reset_to_defaults();
    roles.persist(&store)?;
    println!("Restored {} built-in roles", roles.roles().len());
    Ok(())
}
