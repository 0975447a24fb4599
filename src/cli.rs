use std::path::PathBuf;

use archdex::index::KeyKind;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "archdex",
    about = "Look up archive folders by contract, phone, address, or name"
)]
pub struct Cli {
    /// Storage root holding one folder per contract
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search folders by partial name or exact key
    Search(SearchArgs),
    /// List the files inside a folder
    Files(FilesArgs),
    /// Show the descriptor fields of a folder
    Info(InfoArgs),
    /// Show index statistics
    Status(StatusArgs),
    /// Watch the storage root and print change events as JSON lines
    Watch(WatchArgs),
    /// Keep the index live and answer JSON queries on stdin
    Serve(ServeArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SearchMode {
    /// Substring match on the normalized folder name
    Partial,
    /// Exact contract number
    Contract,
    /// Exact phone number
    Phone,
    /// Exact address
    Address,
}

impl SearchMode {
    pub fn key_kind(self) -> Option<KeyKind> {
        match self {
            SearchMode::Partial => None,
            SearchMode::Contract => Some(KeyKind::Contract),
            SearchMode::Phone => Some(KeyKind::Phone),
            SearchMode::Address => Some(KeyKind::Address),
        }
    }
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query
    pub query: String,

    /// What to match the query against
    #[arg(long, value_enum, default_value = "partial")]
    pub by: SearchMode,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Files --

#[derive(Debug, Parser)]
pub struct FilesArgs {
    /// Folder id as printed by `search`
    pub id: u64,

    /// Only list image attachments
    #[arg(long)]
    pub images: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Info --

#[derive(Debug, Parser)]
pub struct InfoArgs {
    /// Folder id as printed by `search`
    pub id: u64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Watch / Serve --

#[derive(Debug, Parser)]
pub struct WatchArgs {
    /// Seconds between polls of the storage root
    #[arg(long, allow_negative_numbers = true)]
    pub interval: Option<f64>,

    /// Also report folders whose names start with a dot
    #[arg(long)]
    pub include_hidden: bool,
}

#[derive(Debug, Parser)]
pub struct ServeArgs {
    #[command(flatten)]
    pub watch: WatchArgs,

    /// Maximum number of buffered change events
    #[arg(long)]
    pub capacity: Option<usize>,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "archdex",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parse_search_defaults() {
        let cli = Cli::parse_from(["archdex", "search", "ivanov"]);
        match cli.command {
            Command::Search(args) => {
                assert_eq!(args.query, "ivanov");
                assert_eq!(args.by, SearchMode::Partial);
                assert!(!args.json);
            }
            _ => panic!("expected search command"),
        }
        assert!(cli.root.is_none());
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn parse_key_search_with_global_root() {
        let cli = Cli::parse_from([
            "archdex",
            "search",
            "0991234567",
            "--by",
            "phone",
            "--root",
            "/srv/archive",
            "-vv",
        ]);
        assert_eq!(cli.root, Some(PathBuf::from("/srv/archive")));
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Search(args) => {
                assert_eq!(args.by.key_kind(), Some(KeyKind::Phone));
            }
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn parse_serve_flags() {
        let cli = Cli::parse_from([
            "archdex",
            "serve",
            "--interval",
            "0.2",
            "--include-hidden",
            "--capacity",
            "8",
        ]);
        match cli.command {
            Command::Serve(args) => {
                assert_eq!(args.watch.interval, Some(0.2));
                assert!(args.watch.include_hidden);
                assert_eq!(args.capacity, Some(8));
            }
            _ => panic!("expected serve command"),
        }
    }

    #[test]
    fn rejects_unknown_search_mode() {
        assert!(
            Cli::try_parse_from(["archdex", "search", "x", "--by", "email"])
                .is_err()
        );
    }

    #[test]
    fn verify_command() {
        Cli::command().debug_assert();
    }
}
