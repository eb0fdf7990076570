use anyhow::Result;
use clap::Parser;

mod analyze_cmd;
mod background;
mod capture_cmd;
mod cli;
mod context_cmd;
mod logging;
mod store_cmds;
mod workspace;

use cli::{Cli, Commands};
use fixlog_config::paths::state_dir;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Hook stdout is injected into the agent's context; keep logs off it.
    let _log_guard = if cli.command.is_hook() {
        logging::init_file_logging(&state_dir())
    } else {
        logging::init_stderr_logging();
        None
    };

    match cli.command {
        Commands::Capture(args) => capture_cmd::handle_capture(args),
        Commands::Context { cd, from_hook } => context_cmd::handle_context(cd, from_hook),
        Commands::Analyze { quiet, json } => analyze_cmd::handle_analyze(quiet, json),
        Commands::Stats { json } => store_cmds::handle_stats(json),
        Commands::Purge { days, dry_run } => store_cmds::handle_purge(days, dry_run),
        Commands::Reset { yes } => store_cmds::handle_reset(yes),
        Commands::Preload { force } => store_cmds::handle_preload(force),
    }
}
