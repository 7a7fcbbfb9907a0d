//! Tree editing commands
//!
//! Tasks are addressed by dotted sibling-index paths as shown by
//! `sprig list`, so "0.2" is the third child of the first top-level
//! task. An empty path means the (invisible) root.

use anyhow::{anyhow, bail, Context, Result};

use sprig_core::TaskStore;

use crate::output::Output;

/// Parse a dotted path like "0.2.1"; the empty string is the root
pub fn parse_path(text: &str) -> Result<Vec<usize>> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    text.split('.')
        .map(|part| {
            part.parse::<usize>()
                .map_err(|_| anyhow!("invalid task path \"{text}\""))
        })
        .collect()
}

pub fn list(store: &TaskStore, output: &Output) -> Result<()> {
    output.print_tree(store.tree());
    Ok(())
}

pub fn add(
    store: &mut TaskStore,
    label: String,
    under: Option<String>,
    at: Option<usize>,
    output: &Output,
) -> Result<()> {
    if label.is_empty() {
        bail!("task label must not be empty");
    }
    let parent = parse_path(under.as_deref().unwrap_or(""))?;
    let index = match at {
        Some(index) => index,
        None => store
            .tree()
            .child_count(&parent)
            .context("no task at the parent path")?,
    };
    store.tree_mut().insert(&parent, index, label.as_str())?;
    store.changes_made()?;
    output.success(&format!("added \"{label}\""));
    Ok(())
}

pub fn relocate(
    store: &mut TaskStore,
    path: String,
    under: Option<String>,
    at: Option<usize>,
    output: &Output,
) -> Result<()> {
    let from = parse_path(&path)?;
    let parent = parse_path(under.as_deref().unwrap_or(""))?;
    let index = match at {
        Some(index) => index,
        None => {
            let mut count = store
                .tree()
                .child_count(&parent)
                .context("no task at the destination path")?;
            // appending to the task's own parent happens after the detach
            if !from.is_empty() && parent == from[..from.len() - 1] {
                count = count.saturating_sub(1);
            }
            count
        }
    };
    store.tree_mut().relocate(&from, &parent, index)?;
    store.changes_made()?;
    output.success(&format!("moved \"{path}\""));
    Ok(())
}

pub fn rename(
    store: &mut TaskStore,
    path: String,
    label: String,
    output: &Output,
) -> Result<()> {
    if label.is_empty() {
        bail!("task label must not be empty");
    }
    let target = parse_path(&path)?;
    store.tree_mut().rename(&target, label.as_str())?;
    store.changes_made()?;
    output.success(&format!("renamed \"{path}\" to \"{label}\""));
    Ok(())
}

pub fn remove(store: &mut TaskStore, path: String, output: &Output) -> Result<()> {
    let target = parse_path(&path)?;
    let node = store.tree_mut().remove(&target)?;
    store.changes_made()?;
    output.success(&format!("removed \"{}\"", node.label()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use tempfile::TempDir;

    fn quiet() -> Output {
        Output::new(OutputFormat::Quiet)
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(parse_path("").unwrap(), Vec::<usize>::new());
        assert_eq!(parse_path("0").unwrap(), vec![0]);
        assert_eq!(parse_path("0.2.1").unwrap(), vec![0, 2, 1]);
        assert!(parse_path("a.b").is_err());
        assert!(parse_path("0..1").is_err());
    }

    #[test]
    fn test_add_appends_and_marks_dirty() {
        let dir = TempDir::new().unwrap();
        let mut store = TaskStore::open(dir.path()).unwrap();
        store.config_mut().unsynched_changes = false;

        add(&mut store, "first".to_string(), None, None, &quiet()).unwrap();
        add(&mut store, "second".to_string(), None, None, &quiet()).unwrap();
        add(
            &mut store,
            "nested".to_string(),
            Some("1".to_string()),
            None,
            &quiet(),
        )
        .unwrap();

        assert_eq!(store.tree().get(&[0]).unwrap().label(), "first");
        assert_eq!(store.tree().get(&[1, 0]).unwrap().label(), "nested");
        assert!(store.config().unsynched_changes);
    }

    #[test]
    fn test_move_appends_to_new_parent_by_default() {
        let dir = TempDir::new().unwrap();
        let mut store = TaskStore::open(dir.path()).unwrap();
        add(&mut store, "a".to_string(), None, None, &quiet()).unwrap();
        add(&mut store, "b".to_string(), None, None, &quiet()).unwrap();

        relocate(
            &mut store,
            "0".to_string(),
            Some("1".to_string()),
            None,
            &quiet(),
        )
        .unwrap();

        assert_eq!(store.tree().get(&[0]).unwrap().label(), "b");
        assert_eq!(store.tree().get(&[0, 0]).unwrap().label(), "a");
    }

    #[test]
    fn test_move_to_end_of_own_parent() {
        let dir = TempDir::new().unwrap();
        let mut store = TaskStore::open(dir.path()).unwrap();
        add(&mut store, "a".to_string(), None, None, &quiet()).unwrap();
        add(&mut store, "b".to_string(), None, None, &quiet()).unwrap();

        relocate(&mut store, "0".to_string(), None, None, &quiet()).unwrap();

        assert_eq!(store.tree().get(&[0]).unwrap().label(), "b");
        assert_eq!(store.tree().get(&[1]).unwrap().label(), "a");
    }

    #[test]
    fn test_remove_rejects_unknown_path() {
        let dir = TempDir::new().unwrap();
        let mut store = TaskStore::open(dir.path()).unwrap();
        assert!(remove(&mut store, "4".to_string(), &quiet()).is_err());
    }

    #[test]
    fn test_empty_label_rejected() {
        let dir = TempDir::new().unwrap();
        let mut store = TaskStore::open(dir.path()).unwrap();
        assert!(add(&mut store, String::new(), None, None, &quiet()).is_err());
    }
}
