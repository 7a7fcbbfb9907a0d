//! Output formatting for the CLI
//!
//! Human-readable by default, `--json` for tooling, `--quiet` for
//! scripting.

use sprig_core::{TaskNode, TaskTree};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Whether a yes/no conversation on the terminal is appropriate
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print the whole task tree
    pub fn print_tree(&self, tree: &TaskTree) {
        match self.format {
            OutputFormat::Human => {
                if tree.is_empty() {
                    println!("No tasks.");
                    return;
                }
                let mut path = Vec::new();
                print_children(tree.root(), &mut path);
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(tree.root().children())
                        .unwrap_or_else(|_| "[]".to_string())
                );
            }
            OutputFormat::Quiet => {
                let mut path = Vec::new();
                print_children_quiet(tree.root(), &mut path);
            }
        }
    }
}

fn print_children(node: &TaskNode, path: &mut Vec<usize>) {
    for (index, child) in node.children().iter().enumerate() {
        path.push(index);
        let indent = "  ".repeat(path.len() - 1);
        println!("{}{}  [{}]", indent, child.label(), format_path(path));
        print_children(child, path);
        path.pop();
    }
}

fn print_children_quiet(node: &TaskNode, path: &mut Vec<usize>) {
    for (index, child) in node.children().iter().enumerate() {
        path.push(index);
        println!("{}\t{}", format_path(path), child.label());
        print_children_quiet(child, path);
        path.pop();
    }
}

/// Render a path the way commands accept it, e.g. "0.2.1"
pub fn format_path(path: &[usize]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}
