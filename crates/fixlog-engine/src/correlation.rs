//! Failure/fix correlation.
//!
//! Each working directory has at most one pending failure. A failing tool
//! call records an [`ErrorRecord`] and makes it the pending target,
//! replacing any earlier one. Successful edits while a failure is pending
//! are remembered. When the pending command later succeeds, the record is
//! resolved in place and a [`FixRecord`] is appended.
//!
//! Correlation is by normalized command equality only: a command that
//! passes for unrelated reasons is still attributed to the edits made in
//! between. Fixes are best-effort inference, not proof.

use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use fixlog_config::{FixlogConfig, ProjectScope, project_hash};
use fixlog_core::snippet::{
    error_excerpt, extract_file_paths, extract_stack_locations, normalize_command,
};
use fixlog_core::{AppError, ErrorRecord, FixRecord, FixSource};
use fixlog_store::{PendingCorrelation, PendingStore, StoreLayout};
use tracing::{debug, info, warn};

use crate::advisory::{Advisory, NO_OPERATIONS_FIX, advisories_for};
use crate::classifier::Classifier;
use crate::event::ToolEvent;
use crate::seed;

/// Starts a pattern analysis without waiting for it.
pub trait AnalysisTrigger {
    fn fire(&self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTrigger;

impl AnalysisTrigger for NoopTrigger {
    fn fire(&self) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Nothing to do: capture disabled, no command, or nothing pending.
    Ignored,
    /// Same failure as one of the most recent records.
    Duplicate,
    Recorded {
        record: ErrorRecord,
        advisories: Vec<Advisory>,
        /// An earlier pending failure was abandoned.
        superseded: bool,
    },
    OperationTracked,
    Resolved {
        fix: FixRecord,
    },
}

impl Outcome {
    pub fn advisories(&self) -> &[Advisory] {
        match self {
            Outcome::Recorded { advisories, .. } => advisories,
            _ => &[],
        }
    }
}

/// Fresh pending state for `record`, stored at `position` in the global log.
fn pending_for(record: &ErrorRecord, position: usize) -> PendingCorrelation {
    PendingCorrelation {
        command: record.command.clone(),
        snippet: record.snippet.clone(),
        category: record.category,
        sub_category: record.sub_category.clone(),
        framework: record.framework.clone(),
        severity: record.severity,
        position,
        error_timestamp: record.timestamp,
        session_id: record.session_id.clone(),
        project: record.project.clone(),
        project_hash: record.project_hash.clone(),
        operations: Vec::new(),
        omitted_operations: 0,
        files: Default::default(),
    }
}

/// Fix text for a pending failure: the tracked operations in order.
pub fn describe_fix(pending: &PendingCorrelation) -> String {
    if pending.operations.is_empty() {
        return NO_OPERATIONS_FIX.to_string();
    }
    let mut description = pending.operations.join("; ");
    if pending.omitted_operations > 0 {
        description.push_str(&format!(" (+{} more)", pending.omitted_operations));
    }
    description
}

pub struct CorrelationEngine<T: AnalysisTrigger = NoopTrigger> {
    layout: StoreLayout,
    config: FixlogConfig,
    classifier: Classifier,
    trigger: T,
}

impl<T: AnalysisTrigger> CorrelationEngine<T> {
    pub fn new(layout: StoreLayout, config: FixlogConfig, trigger: T) -> Self {
        let classifier = Classifier::from_config(&config.classifier);
        Self {
            layout,
            config,
            classifier,
            trigger,
        }
    }

    pub fn trigger(&self) -> &T {
        &self.trigger
    }

    /// Process one event. Never fails: internal errors are logged and the
    /// event is skipped.
    pub fn handle(&self, event: &ToolEvent) -> Outcome {
        match self.try_handle(event) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    tool = %event.tool,
                    error = %format!("{err:#}"),
                    "capture failed, event skipped"
                );
                Outcome::Ignored
            }
        }
    }

    pub fn try_handle(&self, event: &ToolEvent) -> Result<Outcome> {
        if !self.config.capture.enabled {
            return Ok(Outcome::Ignored);
        }
        let Some(cwd) = event.cwd.as_deref() else {
            debug!(tool = %event.tool, "event without working directory ignored");
            return Ok(Outcome::Ignored);
        };
        let pending = self.layout.pending(&project_hash(cwd));

        if event.failed() {
            return self.record_failure(event, cwd, &pending);
        }

        let Some(mut state) = pending.load() else {
            return Ok(Outcome::Ignored);
        };
        let command = normalize_command(event.command_text());

        if event.kind.is_file_operation() {
            state.record_operation(
                event.operation_summary(),
                event.file_path.as_deref(),
                self.config.capture.max_tracked_operations,
            );
            // A retried edit that now applies resolves its own failure.
            if !command.is_empty() && command == normalize_command(&state.command) {
                return self.resolve(state, event, &command, &pending);
            }
            pending.save(&state)?;
            return Ok(Outcome::OperationTracked);
        }

        if command.is_empty() || command != normalize_command(&state.command) {
            return Ok(Outcome::Ignored);
        }
        self.resolve(state, event, &command, &pending)
    }

    fn record_failure(
        &self,
        event: &ToolEvent,
        cwd: &Path,
        pending: &PendingStore,
    ) -> Result<Outcome> {
        let command = normalize_command(event.command_text());
        if command.is_empty() {
            debug!(tool = %event.tool, "failure without command text ignored");
            return Ok(Outcome::Ignored);
        }

        let capture = &self.config.capture;
        let global = self.layout.global_errors();
        let snippet = error_excerpt(&event.output, capture.snippet_max_chars);

        // A recurrence after a fix is a new failure, not a duplicate.
        let duplicate = global.recent_match(self.config.store.dedup_window, |record| {
            !record.resolved
                && record.session_id == event.session_id
                && normalize_command(&record.command) == command
                && record.snippet == snippet
        })?;
        if let Some((position, record)) = duplicate {
            debug!(command = %command, "duplicate failure suppressed");
            let already_pending = pending
                .load()
                .is_some_and(|state| normalize_command(&state.command) == command);
            if !already_pending {
                // Retrying an earlier failure makes it the one awaiting a fix again.
                pending.save(&pending_for(&record, position))?;
            }
            return Ok(Outcome::Duplicate);
        }

        let scope = ProjectScope::discover(cwd);
        let classification = self
            .classifier
            .classify(&snippet, &format!("{} {}", event.tool, command));

        let mut files = extract_file_paths(&snippet);
        if let Some(path) = event.file_path.as_deref().filter(|path| !path.is_empty()) {
            files.insert(path.to_string());
        }

        let record = ErrorRecord {
            timestamp: Utc::now(),
            session_id: event.session_id.clone(),
            project: scope.name.clone(),
            project_hash: scope.hash.clone(),
            tool: event.tool.clone(),
            command: command.clone(),
            exit_code: event.exit_code,
            stack_locations: extract_stack_locations(&snippet),
            snippet,
            category: classification.category,
            sub_category: classification.sub_category,
            framework: classification.framework,
            severity: classification.severity,
            files,
            resolved: false,
            fix: None,
            fix_command: None,
        };

        global.append(&record)?;
        let sequence = self
            .layout
            .next_append_sequence(|| global.count())
            .unwrap_or_else(|err| {
                warn!(error = %format!("{err:#}"), "failed to advance append sequence");
                0
            });
        global.rotate(self.config.store.global_max_records)?;
        let project_log = self.layout.project_errors(&scope.hash);
        project_log.append(&record)?;
        project_log.rotate(self.config.store.project_max_records)?;

        let previous = pending.load();
        if let Some(previous) = &previous {
            debug!(previous = %previous.command, "superseding pending failure");
        }
        pending.save(&pending_for(
            &record,
            global.last_position()?.unwrap_or_default(),
        ))?;
        info!(
            command = %command,
            category = %record.category,
            sub_category = %record.sub_category,
            "recorded failure"
        );

        if capture.auto_preload
            && let Err(err) = seed::ensure_preloaded(&self.layout)
        {
            warn!(error = %format!("{err:#}"), "seed preload failed");
        }
        let advisories = advisories_for(
            &record,
            &global.load_all()?,
            &self.layout.fixes().load_all()?,
            capture.instant_fix_limit,
        );

        self.maybe_trigger_analysis(sequence);

        Ok(Outcome::Recorded {
            record,
            advisories,
            superseded: previous.is_some(),
        })
    }

    fn resolve(
        &self,
        state: PendingCorrelation,
        event: &ToolEvent,
        command: &str,
        pending: &PendingStore,
    ) -> Result<Outcome> {
        let fix_text = describe_fix(&state);
        let pending_command = normalize_command(&state.command);
        let matches = |record: &ErrorRecord| {
            !record.resolved
                && record.timestamp == state.error_timestamp
                && normalize_command(&record.command) == pending_command
        };
        let resolve_record = |record: &mut ErrorRecord| {
            record.mark_resolved(fix_text.clone(), Some(command.to_string()));
        };

        let global_line = self
            .layout
            .global_errors()
            .update_record(Some(state.position), matches, resolve_record)?;
        if global_line.is_none() {
            let err = AppError::RecordNotFound(state.position);
            warn!(command = %command, error = %err, "pending failure no longer in the global log");
        }
        self.layout
            .project_errors(&state.project_hash)
            .update_record(None, matches, resolve_record)?;

        let fix = FixRecord {
            timestamp: Utc::now(),
            session_id: event.session_id.clone(),
            project: state.project,
            project_hash: state.project_hash,
            command: command.to_string(),
            error_timestamp: state.error_timestamp,
            category: state.category,
            sub_category: state.sub_category,
            framework: state.framework,
            severity: state.severity,
            error_snippet: state.snippet,
            fix: fix_text,
            files: state.files,
            source: FixSource::AutoCorrelation,
        };
        self.layout.fixes().append(&fix)?;
        pending.clear()?;
        info!(command = %command, fix = %fix.fix, "correlated fix");

        Ok(Outcome::Resolved { fix })
    }

    /// Fire when the running append count lands on a multiple of the
    /// interval. The count is not capped by rotation.
    fn maybe_trigger_analysis(&self, sequence: u64) {
        let analysis = &self.config.analysis;
        if !analysis.auto_trigger || analysis.trigger_interval == 0 || sequence == 0 {
            return;
        }
        if sequence % analysis.trigger_interval as u64 == 0 {
            debug!(sequence, "triggering background analysis");
            self.trigger.fire();
        }
    }
}
