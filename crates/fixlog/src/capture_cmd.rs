use std::io::{IsTerminal, Read};

use anyhow::{Context, Result};
use fixlog_core::AppError;
use fixlog_engine::{CorrelationEngine, EventKind, Outcome, ToolEvent};
use tracing::{debug, warn};

use crate::background::SpawnAnalysis;
use crate::cli::CaptureArgs;
use crate::workspace::{load_config_for, resolve_cwd, store_layout};

/// Record one tool execution and print any advisories. Always succeeds:
/// a broken event or store must never fail the agent's tool call.
pub fn handle_capture(args: CaptureArgs) -> Result<()> {
    match capture(args) {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
        }
        Err(err) => warn!(error = %format!("{err:#}"), "capture skipped"),
    }
    Ok(())
}

fn capture(args: CaptureArgs) -> Result<Vec<String>> {
    let mut event = match args.tool.as_deref() {
        Some(_) => event_from_flags(&args),
        None => ToolEvent::from_json(&read_stdin()?)?,
    };
    if event.cwd.is_none() {
        event.cwd = Some(resolve_cwd(args.cd.as_deref())?);
    }
    let cwd = event.cwd.clone().unwrap_or_default();

    let engine = CorrelationEngine::new(
        store_layout(),
        load_config_for(&cwd),
        SpawnAnalysis::current_exe(),
    );
    let outcome = engine.handle(&event);
    debug!(tool = %event.tool, outcome = outcome_name(&outcome), "capture handled");

    Ok(outcome.advisories().iter().map(ToString::to_string).collect())
}

fn outcome_name(outcome: &Outcome) -> &'static str {
    match outcome {
        Outcome::Ignored => "ignored",
        Outcome::Duplicate => "duplicate",
        Outcome::Recorded { .. } => "recorded",
        Outcome::OperationTracked => "operation_tracked",
        Outcome::Resolved { .. } => "resolved",
    }
}

fn read_stdin() -> Result<String> {
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Err(AppError::InvalidEvent("no payload on stdin and no --tool".into()).into());
    }
    let mut payload = String::new();
    stdin
        .read_to_string(&mut payload)
        .context("failed to read hook payload")?;
    Ok(payload)
}

fn event_from_flags(args: &CaptureArgs) -> ToolEvent {
    let tool = args.tool.clone().unwrap_or_default();
    let command = args.command.clone().unwrap_or_default();
    ToolEvent {
        kind: EventKind::infer(&tool, !command.trim().is_empty()),
        tool,
        exit_code: args.exit_code.unwrap_or(0),
        command,
        file_path: args.file.clone(),
        changes: Vec::new(),
        output: args.output.clone().unwrap_or_default(),
        session_id: args.session.clone().unwrap_or_default(),
        cwd: args.cd.as_ref().map(Into::into),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_from_flags() {
        let args = CaptureArgs {
            tool: Some("Bash".into()),
            exit_code: Some(2),
            command: Some("make".into()),
            output: Some("make: *** [all] Error 1".into()),
            session: Some("s1".into()),
            cd: Some("/work".into()),
            ..CaptureArgs::default()
        };
        let event = event_from_flags(&args);
        assert_eq!(event.kind, EventKind::Command);
        assert_eq!(event.exit_code, 2);
        assert!(event.failed());
        assert_eq!(event.command_text(), "make");
        assert_eq!(event.cwd, Some("/work".into()));
    }

    #[test]
    fn test_file_flags_make_file_operation() {
        let args = CaptureArgs {
            tool: Some("Write".into()),
            file: Some("src/a.rs".into()),
            ..CaptureArgs::default()
        };
        let event = event_from_flags(&args);
        assert_eq!(event.kind, EventKind::FileWrite);
        assert!(!event.failed());
        assert_eq!(event.command_text(), "src/a.rs");
    }
}
