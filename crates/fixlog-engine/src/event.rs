//! Tool execution events as delivered by the host agent's hooks.

use std::path::PathBuf;

use fixlog_core::AppError;
use fixlog_core::snippet::bounded;
use serde_json::Value;

/// Characters of `old_string`/`new_string` kept in an edit summary.
const EDIT_EXCERPT_CHARS: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Command,
    FileEdit,
    FileWrite,
    Other,
}

impl EventKind {
    /// Infer the kind from the tool name, falling back to whether a command
    /// was supplied at all.
    pub fn infer(tool: &str, has_command: bool) -> Self {
        match tool.to_ascii_lowercase().as_str() {
            "edit" | "multiedit" | "notebookedit" | "str_replace" | "apply_patch" => {
                EventKind::FileEdit
            }
            "write" | "create" | "write_file" => EventKind::FileWrite,
            "bash" | "shell" | "exec" | "run_shell_command" => EventKind::Command,
            _ if has_command => EventKind::Command,
            _ => EventKind::Other,
        }
    }

    pub fn is_file_operation(self) -> bool {
        matches!(self, EventKind::FileEdit | EventKind::FileWrite)
    }
}

/// One replacement inside a file edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditChange {
    pub old: String,
    pub new: String,
}

/// A normalized tool execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolEvent {
    pub tool: String,
    pub kind: EventKind,
    pub exit_code: i32,
    /// Shell command text; empty for file operations.
    pub command: String,
    pub file_path: Option<String>,
    pub changes: Vec<EditChange>,
    pub output: String,
    pub session_id: String,
    pub cwd: Option<PathBuf>,
}

impl ToolEvent {
    /// Parse a JSON hook payload.
    pub fn from_json(payload: &str) -> Result<Self, AppError> {
        let value: Value = serde_json::from_str(payload)
            .map_err(|err| AppError::InvalidEvent(format!("payload is not json: {err}")))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, AppError> {
        if !value.is_object() {
            return Err(AppError::InvalidEvent("payload is not an object".into()));
        }
        let tool = str_field(value, &["tool_name"])
            .or_else(|| str_field(value, &["tool"]))
            .ok_or_else(|| AppError::InvalidEvent("missing tool_name".into()))?;

        let input = value.get("tool_input").unwrap_or(&Value::Null);
        let response = value.get("tool_response").unwrap_or(&Value::Null);

        let command = str_field(input, &["command"]).unwrap_or_default();
        let file_path = str_field(input, &["file_path"])
            .or_else(|| str_field(input, &["notebook_path"]))
            .or_else(|| str_field(input, &["path"]));

        Ok(Self {
            kind: EventKind::infer(&tool, !command.trim().is_empty()),
            exit_code: resolve_exit_code(value, response),
            changes: edit_changes(input),
            output: response_output(response),
            session_id: str_field(value, &["session_id"]).unwrap_or_default(),
            cwd: str_field(value, &["cwd"])
                .filter(|cwd| !cwd.is_empty())
                .map(PathBuf::from),
            tool,
            command,
            file_path,
        })
    }

    pub fn failed(&self) -> bool {
        self.exit_code != 0
    }

    /// Text identifying the operation: the command, or the file path for
    /// file operations.
    pub fn command_text(&self) -> &str {
        if self.kind.is_file_operation() || self.command.trim().is_empty() {
            self.file_path.as_deref().unwrap_or(&self.command)
        } else {
            &self.command
        }
    }

    /// One-line description of a file operation, used to build fix text.
    pub fn operation_summary(&self) -> String {
        let path = self.file_path.as_deref().unwrap_or("<unknown file>");
        match (self.kind, self.changes.as_slice()) {
            (EventKind::FileWrite, _) => format!("wrote {path}"),
            (_, [change]) => format!(
                "edited {path}: `{}` -> `{}`",
                excerpt(&change.old),
                excerpt(&change.new)
            ),
            (_, []) => format!("edited {path}"),
            (_, changes) => format!("edited {path} ({} changes)", changes.len()),
        }
    }
}

fn excerpt(text: &str) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let cut = bounded(&single_line, EDIT_EXCERPT_CHARS);
    if cut.len() < single_line.len() {
        format!("{cut}...")
    } else {
        cut
    }
}

fn str_field(value: &Value, path: &[&str]) -> Option<String> {
    let mut current = value;
    for key in path {
        current = current.get(key)?;
    }
    current.as_str().map(str::to_string)
}

fn int_field(value: &Value, key: &str) -> Option<i32> {
    let field = value.get(key)?;
    field
        .as_i64()
        .or_else(|| field.as_str().and_then(|text| text.trim().parse().ok()))
        .map(|code| i32::try_from(code).unwrap_or(1))
}

/// Explicit codes win; otherwise error-ish flags imply 1, else 0.
fn resolve_exit_code(event: &Value, response: &Value) -> i32 {
    if let Some(code) = ["exit_code", "exitCode", "returnCode"]
        .iter()
        .find_map(|key| int_field(response, key))
        .or_else(|| int_field(event, "exit_code"))
    {
        return code;
    }

    let is_error = response
        .get("is_error")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let interrupted = response
        .get("interrupted")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let has_error_text = response
        .get("error")
        .and_then(Value::as_str)
        .is_some_and(|text| !text.trim().is_empty());

    if is_error || interrupted || has_error_text {
        1
    } else {
        0
    }
}

/// stderr first, then stdout; hosts that report a single string put it in
/// `output`, `error`, or the response itself.
fn response_output(response: &Value) -> String {
    if let Some(text) = response.as_str() {
        return text.to_string();
    }

    let parts: Vec<String> = ["stderr", "stdout", "output", "error"]
        .iter()
        .filter_map(|key| str_field(response, &[key]))
        .filter(|text| !text.trim().is_empty())
        .collect();
    parts.join("\n")
}

fn edit_changes(input: &Value) -> Vec<EditChange> {
    if let Some(edits) = input.get("edits").and_then(Value::as_array) {
        return edits
            .iter()
            .map(|edit| EditChange {
                old: str_field(edit, &["old_string"]).unwrap_or_default(),
                new: str_field(edit, &["new_string"]).unwrap_or_default(),
            })
            .collect();
    }

    let old = str_field(input, &["old_string"]);
    let new = str_field(input, &["new_string"]).or_else(|| str_field(input, &["new_source"]));
    if old.is_none() && new.is_none() {
        return Vec::new();
    }
    vec![EditChange {
        old: old.unwrap_or_default(),
        new: new.unwrap_or_default(),
    }]
}
