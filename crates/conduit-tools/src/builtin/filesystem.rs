//! Filesystem tools.
//!
//! Every tool reports missing paths and IO failures as `{"success": false}`
//! payloads rather than errors.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::fs;

use crate::error::Result;
use crate::tool::{ParamExt, Tool, ToolResult};

/// Domain key for these tools.
pub const DOMAIN: &str = "filesystem";

/// Default cap on `search_files` matches.
const DEFAULT_MAX_RESULTS: u64 = 100;

/// Maximum directory depth `search_files` descends.
const MAX_SEARCH_DEPTH: usize = 8;

/// Expand a leading `~` to the home directory.
fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~")
        && let Some(home) = std::env::var_os("HOME")
    {
        let rest = rest.trim_start_matches('/');
        return Path::new(&home).join(rest);
    }
    PathBuf::from(path)
}

fn entry_kind(file_type: &std::fs::FileType) -> &'static str {
    if file_type.is_dir() {
        "directory"
    } else if file_type.is_symlink() {
        "symlink"
    } else {
        "file"
    }
}

fn path_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "path": {"type": "string", "description": description}
        },
        "required": ["path"]
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// list_directory
// ─────────────────────────────────────────────────────────────────────────────

/// Lists the entries of a directory.
#[derive(Debug, Clone, Default)]
pub struct ListDirectoryTool;

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the files and subdirectories of a directory."
    }

    fn parameters(&self) -> Value {
        path_schema("Directory to list")
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let path = match params.required_str("path", "provide the directory to list") {
            Ok(p) => expand_path(p),
            Err(e) => return Ok(e.into()),
        };

        let mut reader = match fs::read_dir(&path).await {
            Ok(r) => r,
            Err(e) => {
                return Ok(ToolResult::error(format!(
                    "Failed to read directory {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let mut contents = Vec::new();
        loop {
            let entry = match reader.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    return Ok(ToolResult::error(format!(
                        "Failed to read directory {}: {}",
                        path.display(),
                        e
                    )));
                }
            };
            let (kind, size) = match entry.metadata().await {
                Ok(meta) => (entry_kind(&meta.file_type()), meta.len()),
                Err(_) => ("unknown", 0),
            };
            contents.push(json!({
                "name": entry.file_name().to_string_lossy(),
                "type": kind,
                "size": size,
            }));
        }
        contents.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));

        Ok(ToolResult::ok(json!({
            "path": path.display().to_string(),
            "contents": contents,
        })))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// read_file
// ─────────────────────────────────────────────────────────────────────────────

/// Reads a text file.
#[derive(Debug, Clone, Default)]
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a text file."
    }

    fn parameters(&self) -> Value {
        path_schema("File to read")
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let path = match params.required_str("path", "provide the file to read") {
            Ok(p) => expand_path(p),
            Err(e) => return Ok(e.into()),
        };

        if path.is_dir() {
            return Ok(ToolResult::error(format!(
                "Path is a directory: {}",
                path.display()
            )));
        }

        match fs::read_to_string(&path).await {
            Ok(content) => Ok(ToolResult::ok(json!({
                "path": path.display().to_string(),
                "content": content,
            }))),
            Err(e) => Ok(ToolResult::error(format!(
                "Failed to read file {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// write_file
// ─────────────────────────────────────────────────────────────────────────────

/// Writes (or appends to) a text file, creating parent directories.
#[derive(Debug, Clone, Default)]
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write text to a file, creating it and its parent directories if needed."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File to write"},
                "content": {"type": "string", "description": "Text to write"},
                "append": {"type": "boolean", "default": false, "description": "Append instead of overwrite"}
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let path = match params.required_str("path", "provide the file to write") {
            Ok(p) => expand_path(p),
            Err(e) => return Ok(e.into()),
        };
        let content = match params.required_str("content", "provide the text to write") {
            Ok(c) => c,
            Err(e) => return Ok(e.into()),
        };
        let append = params.optional_bool("append", false);

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = fs::create_dir_all(parent).await
        {
            return Ok(ToolResult::error(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            )));
        }

        let written = if append {
            use tokio::io::AsyncWriteExt;
            match fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
            {
                Ok(mut file) => file.write_all(content.as_bytes()).await,
                Err(e) => Err(e),
            }
        } else {
            fs::write(&path, content).await
        };

        match written {
            Ok(()) => Ok(ToolResult::ok(json!({
                "path": path.display().to_string(),
                "bytesWritten": content.len(),
            }))),
            Err(e) => Ok(ToolResult::error(format!(
                "Failed to write file {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// create_directory
// ─────────────────────────────────────────────────────────────────────────────

/// Creates a directory and any missing parents.
#[derive(Debug, Clone, Default)]
pub struct CreateDirectoryTool;

#[async_trait]
impl Tool for CreateDirectoryTool {
    fn name(&self) -> &str {
        "create_directory"
    }

    fn description(&self) -> &str {
        "Create a directory, including missing parent directories."
    }

    fn parameters(&self) -> Value {
        path_schema("Directory to create")
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let path = match params.required_str("path", "provide the directory to create") {
            Ok(p) => expand_path(p),
            Err(e) => return Ok(e.into()),
        };

        match fs::create_dir_all(&path).await {
            Ok(()) => Ok(ToolResult::ok(json!({"path": path.display().to_string()}))),
            Err(e) => Ok(ToolResult::error(format!(
                "Failed to create directory {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// delete_file
// ─────────────────────────────────────────────────────────────────────────────

/// Deletes a file, or a directory when `recursive` is set.
#[derive(Debug, Clone, Default)]
pub struct DeleteFileTool;

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &str {
        "delete_file"
    }

    fn description(&self) -> &str {
        "Delete a file. Directories require recursive=true."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Path to delete"},
                "recursive": {"type": "boolean", "default": false}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let path = match params.required_str("path", "provide the path to delete") {
            Ok(p) => expand_path(p),
            Err(e) => return Ok(e.into()),
        };
        let recursive = params.optional_bool("recursive", false);

        let meta = match fs::symlink_metadata(&path).await {
            Ok(m) => m,
            Err(e) => {
                return Ok(ToolResult::error(format!(
                    "Cannot delete {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let removed = if meta.is_dir() {
            if !recursive {
                return Ok(ToolResult::error(format!(
                    "{} is a directory; set recursive=true to delete it",
                    path.display()
                )));
            }
            fs::remove_dir_all(&path).await
        } else {
            fs::remove_file(&path).await
        };

        match removed {
            Ok(()) => Ok(ToolResult::ok(json!({"path": path.display().to_string()}))),
            Err(e) => Ok(ToolResult::error(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// get_file_info
// ─────────────────────────────────────────────────────────────────────────────

/// Reports metadata for a path.
#[derive(Debug, Clone, Default)]
pub struct GetFileInfoTool;

#[async_trait]
impl Tool for GetFileInfoTool {
    fn name(&self) -> &str {
        "get_file_info"
    }

    fn description(&self) -> &str {
        "Get size, type and modification time of a file or directory."
    }

    fn parameters(&self) -> Value {
        path_schema("Path to inspect")
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let path = match params.required_str("path", "provide the path to inspect") {
            Ok(p) => expand_path(p),
            Err(e) => return Ok(e.into()),
        };

        let meta = match fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) => {
                return Ok(ToolResult::error(format!(
                    "Failed to stat {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let modified = meta
            .modified()
            .ok()
            .map(|t| DateTime::<Utc>::from(t).to_rfc3339());

        Ok(ToolResult::ok(json!({
            "path": path.display().to_string(),
            "type": entry_kind(&meta.file_type()),
            "size": meta.len(),
            "readonly": meta.permissions().readonly(),
            "modified": modified,
        })))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// search_files
// ─────────────────────────────────────────────────────────────────────────────

/// Finds files whose names contain a pattern (case-insensitive).
#[derive(Debug, Clone, Default)]
pub struct SearchFilesTool;

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        "search_files"
    }

    fn description(&self) -> &str {
        "Recursively search a directory for entries whose names contain a pattern."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Directory to search"},
                "pattern": {"type": "string", "description": "Case-insensitive name fragment"},
                "max_results": {"type": "integer", "default": DEFAULT_MAX_RESULTS}
            },
            "required": ["path", "pattern"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let root = match params.required_str("path", "provide the directory to search") {
            Ok(p) => expand_path(p),
            Err(e) => return Ok(e.into()),
        };
        let pattern = match params.required_str("pattern", "provide a name fragment") {
            Ok(p) => p.to_lowercase(),
            Err(e) => return Ok(e.into()),
        };
        let max_results = params.optional_u64("max_results", DEFAULT_MAX_RESULTS) as usize;

        if !root.is_dir() {
            return Ok(ToolResult::error(format!(
                "Not a directory: {}",
                root.display()
            )));
        }

        let mut matches = Vec::new();
        let mut stack = vec![(root.clone(), 0usize)];
        let mut truncated = false;

        'walk: while let Some((dir, depth)) = stack.pop() {
            let Ok(mut reader) = fs::read_dir(&dir).await else {
                continue;
            };
            while let Ok(Some(entry)) = reader.next_entry().await {
                let path = entry.path();
                let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
                if entry
                    .file_name()
                    .to_string_lossy()
                    .to_lowercase()
                    .contains(&pattern)
                {
                    if matches.len() >= max_results {
                        truncated = true;
                        break 'walk;
                    }
                    matches.push(path.display().to_string());
                }
                if is_dir && depth < MAX_SEARCH_DEPTH {
                    stack.push((path, depth + 1));
                }
            }
        }
        matches.sort();

        Ok(ToolResult::ok(json!({
            "path": root.display().to_string(),
            "matches": matches,
            "truncated": truncated,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.txt"), "hello").unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();

        let result = ListDirectoryTool
            .execute(json!({"path": dir.path()}))
            .await
            .unwrap();
        assert!(result.is_success());

        let contents = result.get("contents").unwrap().as_array().unwrap();
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0]["name"], "a");
        assert_eq!(contents[0]["type"], "directory");
        assert_eq!(contents[1]["name"], "b.txt");
        assert_eq!(contents[1]["size"], 5);
    }

    #[tokio::test]
    async fn test_list_directory_missing_path() {
        let dir = TempDir::new().unwrap();
        let result = ListDirectoryTool
            .execute(json!({"path": dir.path().join("nope")}))
            .await
            .unwrap();
        assert!(result.is_error());
        assert!(result.error_message().unwrap().contains("Failed to read directory"));
    }

    #[tokio::test]
    async fn test_missing_path_parameter() {
        let result = ListDirectoryTool.execute(json!({})).await.unwrap();
        assert!(result.is_error());
        assert!(result.error_message().unwrap().contains("path"));
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("nested/deeper/note.txt");

        let written = WriteFileTool
            .execute(json!({"path": file, "content": "first"}))
            .await
            .unwrap();
        assert!(written.is_success());
        assert_eq!(written.get("bytesWritten"), Some(&json!(5)));

        WriteFileTool
            .execute(json!({"path": file, "content": " second", "append": true}))
            .await
            .unwrap();

        let read = ReadFileTool.execute(json!({"path": file})).await.unwrap();
        assert_eq!(read.get("content"), Some(&json!("first second")));
    }

    #[tokio::test]
    async fn test_read_directory_is_error() {
        let dir = TempDir::new().unwrap();
        let result = ReadFileTool
            .execute(json!({"path": dir.path()}))
            .await
            .unwrap();
        assert!(result.error_message().unwrap().contains("directory"));
    }

    #[tokio::test]
    async fn test_create_and_delete_directory() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("x/y");

        let created = CreateDirectoryTool
            .execute(json!({"path": target}))
            .await
            .unwrap();
        assert!(created.is_success());
        assert!(target.is_dir());

        let refused = DeleteFileTool
            .execute(json!({"path": dir.path().join("x")}))
            .await
            .unwrap();
        assert!(refused.is_error());

        let deleted = DeleteFileTool
            .execute(json!({"path": dir.path().join("x"), "recursive": true}))
            .await
            .unwrap();
        assert!(deleted.is_success());
        assert!(!dir.path().join("x").exists());
    }

    #[tokio::test]
    async fn test_get_file_info() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("data.bin");
        std::fs::write(&file, [0u8; 12]).unwrap();

        let info = GetFileInfoTool.execute(json!({"path": file})).await.unwrap();
        assert_eq!(info.get("type"), Some(&json!("file")));
        assert_eq!(info.get("size"), Some(&json!(12)));
        assert!(info.get("modified").unwrap().is_string());
    }

    #[tokio::test]
    async fn test_search_files() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src/deep")).unwrap();
        std::fs::write(dir.path().join("src/Report.md"), "").unwrap();
        std::fs::write(dir.path().join("src/deep/report-2.md"), "").unwrap();
        std::fs::write(dir.path().join("other.txt"), "").unwrap();

        let result = SearchFilesTool
            .execute(json!({"path": dir.path(), "pattern": "report"}))
            .await
            .unwrap();
        let matches = result.get("matches").unwrap().as_array().unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(result.get("truncated"), Some(&json!(false)));

        let limited = SearchFilesTool
            .execute(json!({"path": dir.path(), "pattern": "report", "max_results": 1}))
            .await
            .unwrap();
        assert_eq!(limited.get("matches").unwrap().as_array().unwrap().len(), 1);
        assert_eq!(limited.get("truncated"), Some(&json!(true)));
    }

    #[test]
    fn test_expand_path_plain() {
        assert_eq!(expand_path("/tmp/x"), PathBuf::from("/tmp/x"));
    }
}
