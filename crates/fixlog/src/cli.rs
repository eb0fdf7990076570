use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "fixlog", version)]
#[command(about = "fixlog: error and fix memory for coding agents")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record one tool execution (hook payload on stdin, or flags)
    Capture(CaptureArgs),

    /// Print the session-start digest for a project
    Context {
        /// Project directory (defaults to CWD)
        #[arg(long)]
        cd: Option<String>,

        /// Read the working directory from a hook payload on stdin
        #[arg(long)]
        from_hook: bool,
    },

    /// Rebuild the pattern report from all recorded errors
    Analyze {
        /// Write the report without printing anything
        #[arg(long)]
        quiet: bool,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show totals, fix rate and top patterns
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Remove resolved error records older than N days
    Purge {
        #[arg(long)]
        days: u32,

        /// Show what would be removed without removing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete all recorded errors, fixes and derived data
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Load the built-in fix knowledge
    Preload {
        /// Reload even if already loaded
        #[arg(long)]
        force: bool,
    },
}

impl Commands {
    /// Commands run from agent hooks, where stdout is reserved for advisory
    /// text.
    pub fn is_hook(&self) -> bool {
        matches!(self, Commands::Capture(_) | Commands::Context { .. })
    }
}

#[derive(Args, Debug, Default)]
pub struct CaptureArgs {
    /// Tool name (Bash, Edit, Write, ...); without it the event is read
    /// from stdin as JSON
    #[arg(long)]
    pub tool: Option<String>,

    #[arg(long, allow_hyphen_values = true)]
    pub exit_code: Option<i32>,

    /// Command text
    #[arg(long)]
    pub command: Option<String>,

    /// File touched by an edit/write tool
    #[arg(long)]
    pub file: Option<String>,

    /// Captured tool output
    #[arg(long)]
    pub output: Option<String>,

    #[arg(long)]
    pub session: Option<String>,

    /// Working directory (defaults to CWD)
    #[arg(long)]
    pub cd: Option<String>,
}
