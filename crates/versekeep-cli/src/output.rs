//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use versekeep_core::cache::{ActivateReport, FetchOutcome, InstallReport};
use versekeep_core::{Annotation, CrossReference, HighlightColor, HistoryEntry};

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
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print a list of annotations of one kind
    ///
    /// `describe` renders the payload for the human format.
    pub fn print_annotations<P: Serialize>(
        &self,
        kind: &str,
        annotations: &[Annotation<P>],
        describe: impl Fn(&P) -> String,
    ) {
        match self.format {
            OutputFormat::Human => {
                if annotations.is_empty() {
                    println!("No {} found.", kind);
                    return;
                }
                for a in annotations {
                    let detail = describe(&a.payload);
                    if detail.is_empty() {
                        println!("{:<16} {}", a.id, a.updated_at.format("%Y-%m-%d %H:%M"));
                    } else {
                        println!(
                            "{:<16} {} | {}",
                            a.id,
                            a.updated_at.format("%Y-%m-%d %H:%M"),
                            detail
                        );
                    }
                }
                println!("\n{} {}", annotations.len(), kind);
            }
            OutputFormat::Json => print_json(&annotations),
            OutputFormat::Quiet => {
                for a in annotations {
                    println!("{}", a.id);
                }
            }
        }
    }

    /// Print history entries
    pub fn print_history(&self, entries: &[HistoryEntry]) {
        match self.format {
            OutputFormat::Human => {
                if entries.is_empty() {
                    println!("No history.");
                    return;
                }
                for entry in entries {
                    println!(
                        "{}  {}",
                        entry.last_viewed_at.format("%Y-%m-%d %H:%M:%S"),
                        entry.id
                    );
                }
            }
            OutputFormat::Json => print_json(&entries),
            OutputFormat::Quiet => {
                for entry in entries {
                    println!("{}", entry.id);
                }
            }
        }
    }

    /// Print cross references of one book
    pub fn print_xrefs(&self, book: u8, edges: &[&CrossReference]) {
        match self.format {
            OutputFormat::Human => {
                if edges.is_empty() {
                    println!("No cross references found.");
                    return;
                }
                for edge in edges {
                    let to: Vec<String> = edge.to.iter().map(|c| c.to_string()).collect();
                    println!(
                        "{}/{}/{} -> {} ({})",
                        book,
                        edge.chapter,
                        edge.verse,
                        to.join(" - "),
                        edge.weight
                    );
                }
                println!("\n{} reference(s)", edges.len());
            }
            OutputFormat::Json => print_json(&edges),
            OutputFormat::Quiet => {
                for edge in edges {
                    let to: Vec<String> = edge.to.iter().map(|c| c.to_string()).collect();
                    println!("{}", to.join("-"));
                }
            }
        }
    }

    /// Print the highlight palette
    pub fn print_palette(&self, palette: &[HighlightColor]) {
        match self.format {
            OutputFormat::Human => {
                for color in palette {
                    println!("{:<8} {}", color.name(), color.hex());
                }
            }
            OutputFormat::Json => {
                let colors: Vec<_> = palette
                    .iter()
                    .map(|c| serde_json::json!({"name": c.name(), "hex": c.hex()}))
                    .collect();
                print_json(&colors);
            }
            OutputFormat::Quiet => {
                for color in palette {
                    println!("{}", color.name().to_lowercase());
                }
            }
        }
    }

    pub fn print_install_report(&self, report: &InstallReport) {
        match self.format {
            OutputFormat::Human => {
                println!("Installed bucket {}", report.bucket);
                println!("  cached: {}", report.cached.len());
                if !report.failed.is_empty() {
                    println!("  failed: {}", report.failed.len());
                    for url in &report.failed {
                        println!("    {}", url);
                    }
                }
            }
            OutputFormat::Json => print_json(report),
            OutputFormat::Quiet => println!("{}", report.bucket),
        }
    }

    pub fn print_activate_report(&self, report: &ActivateReport) {
        match self.format {
            OutputFormat::Human => {
                println!("Active bucket {}", report.bucket);
                if report.deleted.is_empty() {
                    println!("  no old buckets");
                }
                for name in &report.deleted {
                    println!("  deleted {}", name);
                }
            }
            OutputFormat::Json => print_json(report),
            OutputFormat::Quiet => println!("{}", report.bucket),
        }
    }

    pub fn print_fetch(&self, url: &str, outcome: &FetchOutcome) {
        match (self.format, outcome) {
            (OutputFormat::Json, FetchOutcome::Passthrough) => {
                print_json(&serde_json::json!({"url": url, "source": "passthrough"}))
            }
            (OutputFormat::Json, FetchOutcome::Served { response, source }) => {
                print_json(&serde_json::json!({
                    "url": url,
                    "source": source,
                    "status": response.status,
                    "headers": response.headers,
                    "length": response.body.len(),
                }))
            }
            (OutputFormat::Human, FetchOutcome::Passthrough) => {
                println!("{} not intercepted", url);
            }
            (OutputFormat::Human, FetchOutcome::Served { response, source }) => {
                println!(
                    "{} {} ({} bytes, {:?})",
                    response.status,
                    url,
                    response.body.len(),
                    source
                );
            }
            (OutputFormat::Quiet, FetchOutcome::Served { response, .. }) => {
                println!("{}", response.status);
            }
            (OutputFormat::Quiet, FetchOutcome::Passthrough) => {}
        }
    }

    /// Print a plain list of strings
    pub fn print_list(&self, items: &[String]) {
        match self.format {
            OutputFormat::Json => print_json(&items),
            _ => {
                for item in items {
                    println!("{}", item);
                }
            }
        }
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

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
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
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}

/// Truncate a string to max characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Truncate to first line and max length
pub fn truncate_line(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    truncate(first_line, max_len)
}
