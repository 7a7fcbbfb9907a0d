//! Status command handler

use anyhow::Result;
use chrono::{Local, TimeZone};

use sprig_core::{TaskNode, TaskStore};

use crate::output::Output;

/// Show sync state and where the data lives
pub fn show(store: &TaskStore, output: &Output) -> Result<()> {
    let config = store.config();

    if output.is_json() {
        println!(
            "{}",
            serde_json::json!({
                "data-dir": store.data_dir().display().to_string(),
                "tasks": count_tasks(store.tree().root()),
                "load-url": config.load_url,
                "save-url": config.save_url,
                "merge-command": config.merge_command,
                "last-sync": config.last_sync,
                "unsynched-changes": config.unsynched_changes,
                "sync-ready": config.has_sync_capability(),
            })
        );
        return Ok(());
    }

    if output.is_quiet() {
        println!("{}", if config.unsynched_changes { "dirty" } else { "clean" });
        return Ok(());
    }

    println!("Data dir:   {}", store.data_dir().display());
    println!("Tasks:      {}", count_tasks(store.tree().root()));
    println!(
        "Unsynched:  {}",
        if config.unsynched_changes { "yes" } else { "no" }
    );
    println!("Last sync:  {}", format_last_sync(config.last_sync));
    println!(
        "Sync ready: {}",
        if config.has_sync_capability() {
            "yes"
        } else {
            "no (see `sprig config`)"
        }
    );
    Ok(())
}

fn count_tasks(node: &TaskNode) -> usize {
    node.children()
        .iter()
        .map(|child| 1 + count_tasks(child))
        .sum()
}

fn format_last_sync(millis: i64) -> String {
    if millis == 0 {
        return "never".to_string();
    }
    match Local.timestamp_millis_opt(millis).single() {
        Some(when) => when.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format!("{millis} ms"),
    }
}
