#![forbid(unsafe_code)]

mod cmd;
mod output;
mod project;

use clap::{Parser, Subcommand};
use output::OutputMode;
use std::env;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "quill: notes with hybrid lexical and semantic retrieval",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging (debug level for quill and qn).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Project directory (defaults to the current directory).
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Derive the output mode from flags.
    const fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Lifecycle",
        about = "Initialize a quill project",
        long_about = "Create .quill/ with a note database and a default retrieval config.",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    qn init\n\n    # Overwrite an existing config\n    qn init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Notes",
        about = "Add a note",
        long_about = "Store a new note and index it for retrieval.",
        after_help = "EXAMPLES:\n    # Add a note\n    qn add --title \"Paris\" --content \"Paris is the capital of France.\"\n\n    # Emit machine-readable output\n    qn add --title \"Paris\" --content \"...\" --json"
    )]
    Add(cmd::add::AddArgs),

    #[command(
        next_help_heading = "Notes",
        about = "Update a note",
        long_about = "Replace a note's title and/or content and reindex it.",
        after_help = "EXAMPLES:\n    # Replace the content\n    qn update qn-1a2b3c4d --content \"New text\"\n\n    # Use a short prefix when unique\n    qn update 1a2b --title \"Renamed\""
    )]
    Update(cmd::update::UpdateArgs),

    #[command(
        next_help_heading = "Notes",
        about = "Delete a note",
        long_about = "Delete a note and drop every fragment of it from both indexes.",
        after_help = "EXAMPLES:\n    # Delete a note\n    qn delete qn-1a2b3c4d"
    )]
    Delete(cmd::delete::DeleteArgs),

    #[command(
        next_help_heading = "Notes",
        about = "List notes",
        long_about = "List every stored note in creation order.",
        after_help = "EXAMPLES:\n    # List notes\n    qn list\n\n    # Emit machine-readable output\n    qn list --json"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Notes",
        about = "Show one note",
        long_about = "Show a single note by ID.",
        after_help = "EXAMPLES:\n    # Show a note\n    qn show qn-1a2b3c4d\n\n    # Use a short prefix when unique\n    qn show 1a2b"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Retrieval",
        about = "Search notes",
        long_about = "Run a hybrid lexical and semantic search and print cited fragments.",
        after_help = "EXAMPLES:\n    # Top fragments for a query\n    qn search \"capital of France\"\n\n    # Ask for more results\n    qn search \"capital of France\" -n 10 --json"
    )]
    Search(cmd::search::SearchArgs),

    #[command(
        next_help_heading = "Retrieval",
        about = "Build answer context for a query",
        long_about = "Assemble the cited context and prompt an answer generator would receive.",
        after_help = "EXAMPLES:\n    # Show the grounded prompt\n    qn context \"What is the capital of France?\"\n\n    # Emit machine-readable output\n    qn context \"capital\" --json"
    )]
    Context(cmd::context::ContextArgs),

    #[command(
        next_help_heading = "Project Maintenance",
        about = "Verify the indexes agree",
        long_about = "Rebuild both indexes from the store and verify they hold the same fragments.",
        after_help = "EXAMPLES:\n    # Check index consistency\n    qn check\n\n    # Emit machine-readable output\n    qn check --json"
    )]
    Check(cmd::check::CheckArgs),
}

/// Filter used when `QUILL_LOG` is unset.
const fn default_filter(verbose: bool, debug: bool) -> &'static str {
    if verbose || debug {
        "quill=debug,qn=debug,info"
    } else {
        "quill=info,qn=info,warn"
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("QUILL_LOG").unwrap_or_else(|_| {
        EnvFilter::new(default_filter(verbose, env::var("DEBUG").is_ok()))
    });

    let format = env::var("QUILL_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if cli.verbose {
        debug!("verbose logging enabled");
    }

    let project_root = match cli.root.clone() {
        Some(root) => root,
        None => env::current_dir()?,
    };
    let output = cli.output_mode();

    match cli.command {
        Commands::Init(ref args) => cmd::init::run_init(args, output, &project_root),
        Commands::Add(ref args) => cmd::add::run_add(args, output, &project_root),
        Commands::Update(ref args) => cmd::update::run_update(args, output, &project_root),
        Commands::Delete(ref args) => cmd::delete::run_delete(args, output, &project_root),
        Commands::List(ref args) => cmd::list::run_list(args, output, &project_root),
        Commands::Show(ref args) => cmd::show::run_show(args, output, &project_root),
        Commands::Search(ref args) => cmd::search::run_search(args, output, &project_root),
        Commands::Context(ref args) => cmd::context::run_context(args, output, &project_root),
        Commands::Check(ref args) => cmd::check::run_check(args, output, &project_root),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_sets_output_mode() {
        let cli = Cli::parse_from(["qn", "--json", "list"]);
        assert!(cli.json);
        assert!(cli.output_mode().is_json());
    }

    #[test]
    fn json_flag_after_subcommand() {
        let cli = Cli::parse_from(["qn", "list", "--json"]);
        assert!(cli.output_mode().is_json());
    }

    #[test]
    fn default_output_is_human() {
        let cli = Cli::parse_from(["qn", "list"]);
        assert!(!cli.output_mode().is_json());
    }

    #[test]
    fn search_takes_query_and_limit() {
        let cli = Cli::parse_from(["qn", "search", "capital of France", "-n", "7"]);
        match cli.command {
            Commands::Search(args) => {
                assert_eq!(args.query, "capital of France");
                assert_eq!(args.limit, Some(7));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn add_requires_title_and_content() {
        assert!(Cli::try_parse_from(["qn", "add", "--title", "only"]).is_err());
        let cli = Cli::parse_from(["qn", "add", "--title", "t", "--content", "c"]);
        assert!(matches!(cli.command, Commands::Add(_)));
    }

    #[test]
    fn verbose_flag_is_global() {
        assert!(Cli::parse_from(["qn", "list", "-v"]).verbose);
        assert!(Cli::parse_from(["qn", "--verbose", "list"]).verbose);
        assert!(!Cli::parse_from(["qn", "list"]).verbose);
    }

    #[test]
    fn verbose_widens_the_default_filter() {
        assert_eq!(default_filter(false, false), "quill=info,qn=info,warn");
        assert_eq!(default_filter(true, false), "quill=debug,qn=debug,info");
        assert_eq!(default_filter(false, true), default_filter(true, false));
    }

    #[test]
    fn default_filters_parse() {
        for (verbose, debug) in [(false, false), (true, false)] {
            EnvFilter::try_new(default_filter(verbose, debug)).expect("valid directive");
        }
    }

    #[test]
    fn root_flag_is_global() {
        let cli = Cli::parse_from(["qn", "list", "--root", "/tmp/notes"]);
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/notes")));
    }
}
