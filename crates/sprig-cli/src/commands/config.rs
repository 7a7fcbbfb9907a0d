//! Config command handler

use anyhow::{bail, Result};

use sprig_core::TaskStore;

use crate::output::Output;

/// Show the current configuration
pub fn show(store: &TaskStore, output: &Output) -> Result<()> {
    let config = store.config();

    if output.is_json() {
        println!(
            "{}",
            serde_json::json!({
                "load-url": config.load_url,
                "save-url": config.save_url,
                "merge-command": config.merge_command,
                "last-sync": config.last_sync,
                "unsynched-changes": config.unsynched_changes,
            })
        );
        return Ok(());
    }

    println!("Config file: {}", store.config_path().display());
    println!();
    println!("load-url          = {}", display(config.load_url.as_deref()));
    println!("save-url          = {}", display(config.save_url.as_deref()));
    println!(
        "merge-command     = {}",
        display(config.merge_command.as_deref())
    );
    println!("last-sync         = {}", config.last_sync);
    println!("unsynched-changes = {}", config.unsynched_changes);
    Ok(())
}

/// Set one of the user-owned fields; an empty value clears it
pub fn set(store: &mut TaskStore, key: &str, value: &str, output: &Output) -> Result<()> {
    let value = if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    };

    let config = store.config_mut();
    match key {
        "load-url" => config.load_url = value,
        "save-url" => config.save_url = value,
        "merge-command" => config.merge_command = value,
        "last-sync" | "unsynched-changes" => {
            bail!("{key} is managed automatically and cannot be set by hand");
        }
        _ => bail!("unknown config key \"{key}\" (expected load-url, save-url or merge-command)"),
    }
    store.save_config()?;
    output.success(&format!("{key} updated"));
    Ok(())
}

fn display(value: Option<&str>) -> &str {
    value.unwrap_or("(not set)")
}
