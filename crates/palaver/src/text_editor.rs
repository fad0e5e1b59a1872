use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::models::content::Content;
use crate::storage::{Storage, StorageError};
use crate::tool::{NativeTool, ToolDefinition};

const SNIPPET_LINES: usize = 4;

const DESCRIPTION: &str = "View and modify text files. Supports view (examine a file or list a \
directory), str_replace (replace a unique occurrence of text), create (create a new file) and \
insert (insert text after a given line).";

/// The file editing tool, working inside a storage sandbox
///
/// Every failure, including sandbox violations, is reported as text output so the model can
/// correct itself; `handle` only returns `Err` if the output itself cannot be produced.
pub struct TextEditorTool<S: Storage> {
    storage: S,
    schema: Value,
}

impl<S: Storage> TextEditorTool<S> {
    pub fn new(storage: S) -> Self {
        let schema = json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "enum": ["view", "str_replace", "create", "insert"],
                    "description": "The command to execute"
                },
                "path": {
                    "type": "string",
                    "description": "The file or directory path"
                },
                "view_range": {
                    "type": "array",
                    "items": {"type": "integer"},
                    "minItems": 2,
                    "maxItems": 2,
                    "description": "Optional 1-based line range [start_line, end_line] for view. An end line of -1 reads to the end of the file."
                },
                "old_str": {
                    "type": "string",
                    "description": "The text to replace, must appear exactly once"
                },
                "new_str": {
                    "type": "string",
                    "description": "The replacement text for str_replace or the text to insert"
                },
                "file_text": {
                    "type": "string",
                    "description": "The content of the new file for create"
                },
                "insert_line": {
                    "type": "integer",
                    "description": "The line after which to insert. 0 inserts at the beginning of the file."
                }
            },
            "required": ["command", "path"]
        });
        Self { storage, schema }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn run(&self, input: &Value) -> String {
        let Some(command) = input.get("command").and_then(Value::as_str) else {
            return "Error: Missing 'command' parameter".to_string();
        };
        let Some(path) = input.get("path").and_then(Value::as_str) else {
            return "Error: Missing 'path' parameter".to_string();
        };
        let text = |key: &str| input.get(key).and_then(Value::as_str).unwrap_or("");

        match command {
            "view" => {
                let range = input
                    .get("view_range")
                    .and_then(Value::as_array)
                    .and_then(|range| match range.as_slice() {
                        [start, end] => Some((start.as_i64()?, end.as_i64()?)),
                        _ => None,
                    });
                self.view(path, range)
            }
            "str_replace" => self.str_replace(path, text("old_str"), text("new_str")),
            "insert" => {
                let line = input.get("insert_line").and_then(Value::as_i64).unwrap_or(0);
                self.insert(path, text("new_str"), line)
            }
            "create" => self.create(path, text("file_text")),
            other => format!("ERROR: Unknown command: {}", other),
        }
    }

    fn view(&self, path: &str, range: Option<(i64, i64)>) -> String {
        if self.storage.is_directory(path) {
            return match self.storage.list_directory(path) {
                Ok(entries) => {
                    let mut output = format!("Directory contents of {}:\n", path);
                    for entry in entries {
                        let tag = if entry.is_directory { "DIR" } else { "FILE" };
                        output.push_str(&format!("{}: {}\n", tag, entry.name));
                    }
                    output
                }
                Err(e) => missing_or_error(path, e),
            };
        }

        let content = match self.storage.get_file(path) {
            Ok(content) => content,
            Err(e) => return missing_or_error(path, e),
        };
        let lines: Vec<&str> = content.split('\n').collect();
        let last = lines.len() as i64 - 1;

        let (from, to) = match range {
            Some((start, -1)) => (start - 1, last),
            Some((start, end)) => (start - 1, end - 1),
            None => (0, last),
        };
        let start = from.min(last).max(0);
        let end = to.min(last).max(start);

        format!(
            "Here's the result of running `cat -n` on {}:\n{}\n",
            path,
            numbered(&lines, start as usize, end as usize)
        )
    }

    fn str_replace(&self, path: &str, old_str: &str, new_str: &str) -> String {
        if old_str.is_empty() {
            return "Error: old_str must not be empty".to_string();
        }
        let content = match self.storage.get_file(path) {
            Ok(content) => content,
            Err(e) => return missing_or_error(path, e),
        };

        let positions: Vec<usize> = content.match_indices(old_str).map(|(i, _)| i).collect();
        let position = match positions.as_slice() {
            [] => {
                return format!(
                    "No replacement was performed, old_str `{}` did not appear verbatim in {}.",
                    old_str, path
                )
            }
            [position] => *position,
            _ => {
                let lines = positions
                    .iter()
                    .map(|i| line_of(&content, *i).to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                return format!(
                    "No replacement was performed. Multiple occurrences of old_str `{}` in lines {}. Please ensure it is unique.",
                    old_str, lines
                );
            }
        };

        let mut updated = String::with_capacity(content.len() + new_str.len());
        updated.push_str(&content[..position]);
        updated.push_str(new_str);
        updated.push_str(&content[position + old_str.len()..]);

        if let Err(e) = self.storage.set_file(path, &updated) {
            return missing_or_error(path, e);
        }
        format!(
            "The file {} has been edited. {}Review the changes and make sure they are as expected. Edit the file again if necessary.",
            path,
            snippet(&updated, line_of(&content, position))
        )
    }

    fn insert(&self, path: &str, new_str: &str, after_line: i64) -> String {
        let content = match self.storage.get_file(path) {
            Ok(content) => content,
            Err(e) => return missing_or_error(path, e),
        };
        let mut lines: Vec<&str> = content.split('\n').collect();
        let total = lines.len();

        let index = match usize::try_from(after_line) {
            Ok(index) if index <= total => index,
            _ => {
                return format!(
                    "Error: Line number {} is out of range. File has {} lines.",
                    after_line, total
                )
            }
        };
        lines.insert(index, new_str);
        let updated = lines.join("\n");

        if let Err(e) = self.storage.set_file(path, &updated) {
            return missing_or_error(path, e);
        }
        format!(
            "The file {} has been edited. {}Review the changes and make sure they are as expected (correct indentation, no duplicate lines, etc). Edit the file again if necessary.",
            path,
            snippet(&updated, index + 1)
        )
    }

    fn create(&self, path: &str, file_text: &str) -> String {
        match self.storage.create_file(path, file_text) {
            Ok(()) => format!("File created successfully at: {}", path),
            Err(StorageError::FileExists) => format!(
                "File already exists at: {}. Cannot overwrite files using command `create`.",
                path
            ),
            Err(e) => format!("Error: {}", e),
        }
    }
}

fn missing_or_error(path: &str, error: StorageError) -> String {
    match error {
        StorageError::FileNotFound | StorageError::DirectoryNotFound => format!(
            "The path {} does not exist. Please provide a valid path.",
            path
        ),
        e => format!("Error: {}", e),
    }
}

/// 1-based line holding the byte offset
fn line_of(content: &str, offset: usize) -> usize {
    content[..offset].matches('\n').count() + 1
}

/// Lines `start..=end` in `cat -n` format
fn numbered(lines: &[&str], start: usize, end: usize) -> String {
    lines[start..=end]
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:>6}\t{}", start + i + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn snippet(content: &str, line: usize) -> String {
    let lines: Vec<&str> = content.split('\n').collect();
    let index = line.saturating_sub(1);
    let start = index.saturating_sub(SNIPPET_LINES);
    let end = (index + SNIPPET_LINES).min(lines.len() - 1);
    format!(
        "Here's the result of running `cat -n` on a snippet of the edited file:\n{}\n",
        numbered(&lines, start, end)
    )
}

#[async_trait]
impl<S: Storage> ToolDefinition for TextEditorTool<S> {
    fn name(&self) -> &str {
        "str_replace_based_edit_tool"
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    fn native(&self) -> Option<NativeTool> {
        Some(NativeTool::TextEditor)
    }

    async fn handle(&self, input: Value) -> Result<Vec<Content>> {
        Ok(vec![Content::text(self.run(&input))])
    }
}
