//! External merge tool invocation
//!
//! The merge command is a template the user configures; `{0}` stands
//! for the local task file and `{1}` for the remote snapshot. It runs
//! as one shell command line and blocks until it exits. Its exit status
//! carries no meaning here: whether the merge is acceptable is decided
//! afterwards by the human confirmation gate, not by the tool.

use std::io;
use std::path::Path;
use std::process::Command;

use tracing::debug;

pub const LOCAL_PLACEHOLDER: &str = "{0}";
pub const REMOTE_PLACEHOLDER: &str = "{1}";

/// Substitute both placeholders into the command template
///
/// Plain substring replacement, no quoting or escaping; the template is
/// trusted exactly as the user wrote it.
pub fn render_command(template: &str, local: &Path, remote: &Path) -> String {
    template
        .replace(LOCAL_PLACEHOLDER, &local.display().to_string())
        .replace(REMOTE_PLACEHOLDER, &remote.display().to_string())
}

/// Run the merge tool and wait for it to exit
pub fn run_merge_tool(template: &str, local: &Path, remote: &Path) -> io::Result<()> {
    let command_line = render_command(template, local, remote);
    debug!(command = %command_line, "running external merge tool");
    let status = shell(&command_line).status()?;
    // completion is all that matters; the confirmation gate judges the result
    debug!(code = ?status.code(), "merge tool exited");
    Ok(())
}

fn shell(command_line: &str) -> Command {
    if cfg!(windows) {
        let mut command = Command::new("cmd");
        command.args(["/C", command_line]);
        command
    } else {
        let mut command = Command::new("sh");
        command.args(["-c", command_line]);
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_render_command_substitutes_both_paths() {
        let rendered = render_command(
            "merge {0} into {1}",
            &PathBuf::from("/tmp/tasks.xml"),
            &PathBuf::from("/tmp/merge-temp.xml"),
        );
        assert_eq!(rendered, "merge /tmp/tasks.xml into /tmp/merge-temp.xml");
    }

    #[test]
    fn test_render_command_repeated_placeholder() {
        let rendered = render_command(
            "cp {0} {0}.bak",
            &PathBuf::from("a.xml"),
            &PathBuf::from("b.xml"),
        );
        assert_eq!(rendered, "cp a.xml a.xml.bak");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_merge_tool_executes_shell_line() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("local.xml");
        let remote = dir.path().join("remote.xml");
        fs::write(&local, "local").unwrap();
        fs::write(&remote, "remote").unwrap();

        run_merge_tool("cat {1} > {0}", &local, &remote).unwrap();
        assert_eq!(fs::read_to_string(&local).unwrap(), "remote");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_merge_tool_ignores_exit_status() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("local.xml");
        let remote = dir.path().join("remote.xml");

        run_merge_tool("exit 3", &local, &remote).unwrap();
    }
}
