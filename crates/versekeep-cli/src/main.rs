//! Versekeep CLI
//!
//! Command-line interface for versekeep - verse annotations, reading
//! history, offline cache and cross-references.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use versekeep_core::address::VerseAddress;
use versekeep_core::{Config, HighlightColor, Library};

mod commands;
mod editor;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "versekeep")]
#[command(about = "Versekeep - Bible annotations, history and offline cache")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage bookmarks
    Bookmark {
        #[command(subcommand)]
        command: BookmarkCommands,
    },
    /// Manage notes
    Note {
        #[command(subcommand)]
        command: NoteCommands,
    },
    /// Manage highlights
    Highlight {
        #[command(subcommand)]
        command: HighlightCommands,
    },
    /// Reading history
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },
    /// Show cross references for a book, chapter or verse
    Xref {
        /// Book number (1-66)
        book: u8,
        #[arg(short, long)]
        chapter: Option<u32>,
        #[arg(short, long, requires = "chapter")]
        verse: Option<u32>,
    },
    /// Offline cache lifecycle
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
    /// Build-time manifest tools
    Manifest {
        #[command(subcommand)]
        command: ManifestCommands,
    },
    /// Print a fresh cache version tag
    Version,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum BookmarkCommands {
    /// Bookmark verses, e.g. `19/23:1-3` or `43/3:16`
    Add { address: VerseAddress },
    /// List bookmarks
    #[command(alias = "ls")]
    List {
        /// Only this chapter (`book/chapter`)
        #[arg(short, long)]
        chapter: Option<String>,
    },
    /// Delete a bookmark by id
    #[command(alias = "delete")]
    Rm { id: String },
    /// Delete every bookmark
    Clear,
}

#[derive(Subcommand)]
enum NoteCommands {
    /// Attach a note to verses
    Add {
        address: VerseAddress,
        /// Note text (opens editor if not provided)
        #[arg(short, long)]
        text: Option<String>,
    },
    /// Replace a note's text
    Edit {
        id: String,
        /// New text (opens editor if not provided)
        #[arg(short, long)]
        text: Option<String>,
    },
    /// List notes
    #[command(alias = "ls")]
    List {
        /// Only this chapter (`book/chapter`)
        #[arg(short, long)]
        chapter: Option<String>,
    },
    /// Delete a note by id
    #[command(alias = "delete")]
    Rm { id: String },
    /// Delete every note
    Clear,
}

#[derive(Subcommand)]
enum HighlightCommands {
    /// Highlight verses
    Add {
        address: VerseAddress,
        /// Palette name or hex token
        #[arg(short, long, default_value = "yellow")]
        color: HighlightColor,
    },
    /// List highlights
    #[command(alias = "ls")]
    List {
        /// Only this chapter (`book/chapter`)
        #[arg(short, long)]
        chapter: Option<String>,
    },
    /// Delete a highlight by id
    #[command(alias = "delete")]
    Rm { id: String },
    /// Delete every highlight
    Clear,
    /// Show the highlight palette
    Colors,
}

#[derive(Subcommand)]
enum HistoryCommands {
    /// Record a visit, e.g. `19/23`, `43/3:16` or `19/23:1-6`
    Record { address: VerseAddress },
    /// Recently visited locations, newest first
    #[command(alias = "ls")]
    List {
        #[arg(short, long)]
        limit: Option<usize>,
        #[arg(short, long, default_value_t = 0)]
        offset: usize,
    },
    /// Forget all history
    Clear,
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Populate the bucket for the configured version
    Install {
        /// Built entry HTML whose hashed assets join the manifest
        #[arg(long)]
        html: Option<std::path::PathBuf>,
    },
    /// Delete buckets from earlier versions
    Activate,
    /// Request a URL through the cache
    Fetch {
        url: String,
        /// Treat as a page navigation
        #[arg(short, long)]
        navigate: bool,
    },
    /// List cache buckets
    Buckets,
}

#[derive(Subcommand)]
enum ManifestCommands {
    /// List hashed assets in an entry HTML file and the merged manifest
    Discover { html: std::path::PathBuf },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, history_limit, log_level, cache.version, cache.origin, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands work on the file directly
    if let Commands::Config { command } = &cli.command {
        return match command.clone() {
            Some(ConfigCommands::Show) | None => commands::config::show(&output),
            Some(ConfigCommands::Set { key, value }) => commands::config::set(key, value, &output),
        };
    }

    let config = Config::load().context("Failed to load configuration")?;
    init_logging(&config);

    match cli.command {
        Commands::Bookmark { command } => {
            handle_bookmark_command(command, &Library::open(&config), &output)
        }
        Commands::Note { command } => handle_note_command(command, &Library::open(&config), &output),
        Commands::Highlight { command } => {
            handle_highlight_command(command, &Library::open(&config), &output)
        }
        Commands::History { command } => {
            let library = Library::open(&config);
            match command {
                HistoryCommands::Record { address } => {
                    commands::history::record(&library, &address, &output)
                }
                HistoryCommands::List { limit, offset } => {
                    commands::history::list(&library, limit, offset, &output)
                }
                HistoryCommands::Clear => commands::history::clear(&library, &output),
            }
        }
        Commands::Xref {
            book,
            chapter,
            verse,
        } => commands::xref::show(&config, book, chapter, verse, &output).await,
        Commands::Cache { command } => match command {
            CacheCommands::Install { html } => {
                commands::cache::install(&config, html.as_deref(), &output).await
            }
            CacheCommands::Activate => commands::cache::activate(&config, &output).await,
            CacheCommands::Fetch { url, navigate } => {
                commands::cache::fetch(&config, &url, navigate, &output).await
            }
            CacheCommands::Buckets => commands::cache::buckets(&config, &output),
        },
        Commands::Manifest { command } => match command {
            ManifestCommands::Discover { html } => {
                commands::manifest::discover(&config, &html, &output)
            }
        },
        Commands::Version => commands::manifest::version(&output),
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

fn handle_bookmark_command(
    command: BookmarkCommands,
    library: &Library,
    output: &Output,
) -> Result<()> {
    let bookmarks = library.bookmarks();
    match command {
        BookmarkCommands::Add { address } => commands::annotation::add(bookmarks, &address, (), output),
        BookmarkCommands::List { chapter } => {
            commands::annotation::list(bookmarks, chapter.as_deref(), output, |_| String::new())
        }
        BookmarkCommands::Rm { id } => commands::annotation::remove(bookmarks, &id, output),
        BookmarkCommands::Clear => commands::annotation::clear(bookmarks, output),
    }
}

fn handle_note_command(command: NoteCommands, library: &Library, output: &Output) -> Result<()> {
    match command {
        NoteCommands::Add { address, text } => commands::note::add(library, &address, text, output),
        NoteCommands::Edit { id, text } => commands::note::edit(library, &id, text, output),
        NoteCommands::List { chapter } => {
            commands::annotation::list(library.notes(), chapter.as_deref(), output, |text| {
                output::truncate_line(text, 60)
            })
        }
        NoteCommands::Rm { id } => commands::annotation::remove(library.notes(), &id, output),
        NoteCommands::Clear => commands::annotation::clear(library.notes(), output),
    }
}

fn handle_highlight_command(
    command: HighlightCommands,
    library: &Library,
    output: &Output,
) -> Result<()> {
    let highlights = library.highlights();
    match command {
        HighlightCommands::Add { address, color } => {
            commands::annotation::add(highlights, &address, color, output)
        }
        HighlightCommands::List { chapter } => {
            commands::annotation::list(highlights, chapter.as_deref(), output, |color| {
                color.to_string()
            })
        }
        HighlightCommands::Rm { id } => commands::annotation::remove(highlights, &id, output),
        HighlightCommands::Clear => commands::annotation::clear(highlights, output),
        HighlightCommands::Colors => {
            output.print_palette(&HighlightColor::PALETTE);
            Ok(())
        }
    }
}

/// Initialize stderr logging
///
/// `RUST_LOG` wins over the configured level.
fn init_logging(config: &Config) {
    let level = &config.log_level;
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("versekeep_core={},versekeep_cli={}", level, level))
    });

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
