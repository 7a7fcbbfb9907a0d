//! Sync command handler

use std::io::{self, Write};

use anyhow::Result;
use tracing::debug;

use sprig_core::{MergeConfirmer, Reconciliation, SyncEngine, TaskStore};

use crate::output::Output;

/// Asks on the terminal whether an external merge result should be kept
struct PromptConfirmer;

impl MergeConfirmer for PromptConfirmer {
    fn confirm_merge(&self) -> bool {
        print!("Keep the merge result? [y/N] ");
        let _ = io::stdout().flush();
        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            return false;
        }
        matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

/// Fixed answer for --yes and for non-interactive output modes
struct Assume(bool);

impl MergeConfirmer for Assume {
    fn confirm_merge(&self) -> bool {
        self.0
    }
}

/// Run one synchronization attempt
pub fn run(store: &mut TaskStore, yes: bool, output: &Output) -> Result<()> {
    if !store.config().has_sync_capability() {
        anyhow::bail!(
            "Sync is not configured. Set the endpoints with:\n  \
             sprig config set load-url http://your-server/load\n  \
             sprig config set save-url http://your-server/save\n  \
             sprig config set merge-command \"meld {{0}} {{1}}\""
        );
    }

    output.message("Synchronising...");

    let confirmer: Box<dyn MergeConfirmer> = if yes {
        Box::new(Assume(true))
    } else if output.should_prompt() {
        Box::new(PromptConfirmer)
    } else {
        // without a terminal conversation the safe answer is no
        Box::new(Assume(false))
    };

    let report = SyncEngine::new().synchronise(store, confirmer.as_ref())?;
    debug!(?report, "sync finished");

    let outcome = match report.reconciliation {
        Reconciliation::Merged => "merged remote changes",
        Reconciliation::Replaced => "adopted the remote tree",
        Reconciliation::Unchanged => "pushed the local tree",
    };
    if output.is_json() {
        println!(
            "{}",
            serde_json::json!({
                "result": outcome,
                "publish-time": report.publish_time,
                "remote-time": report.remote_time,
            })
        );
    } else {
        output.success(&format!("Sync complete: {outcome}"));
    }
    Ok(())
}
