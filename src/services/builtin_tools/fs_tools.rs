//! Filesystem built-in tools (§4.3): `read_file`, `patch_file`, `write_file`,
//! `list`, `stat`. All paths are resolved and canonicalized against a fixed
//! workspace root; anything that escapes it is rejected before any I/O
//! happens (§4.3 `write_file` "rejects paths escaping the workspace root").
//!
//! Grounded in the atomic write-temp-then-rename pattern
//! (`infrastructure/config/loader.rs::save`).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::error::BuiltinToolError;
use crate::domain::ports::builtin_tool::BuiltinTool;

const TRUNCATE_BYTES: usize = 32_000;

/// Resolve `path` (which may be relative or absolute) against `root`,
/// rejecting any result that ends up outside `root` (§4.3).
fn resolve_in_root(root: &Path, path: &str) -> Result<PathBuf, BuiltinToolError> {
    let joined = root.join(path);
    let mut normalized = PathBuf::new();
    for component in joined.components() {
        use std::path::Component;
        match component {
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(BuiltinToolError::PathEscapesRoot(path.to_string()));
                }
            }
            Component::CurDir => {}
            other => normalized.push(other),
        }
    }
    if !normalized.starts_with(root) {
        return Err(BuiltinToolError::PathEscapesRoot(path.to_string()));
    }
    Ok(normalized)
}

fn truncate_marker(content: String) -> String {
    if content.len() <= TRUNCATE_BYTES {
        return content;
    }
    let total = content.len();
    let mut cut = TRUNCATE_BYTES;
    while !content.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}\n(truncated, total {total} bytes)", &content[..cut])
}

#[derive(Deserialize)]
struct ReadFileArgs {
    path: String,
    offset: Option<usize>,
    limit: Option<usize>,
}

pub struct ReadFileTool {
    root: PathBuf,
}

impl ReadFileTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BuiltinTool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    async fn call(&self, args: Value) -> Result<Value, BuiltinToolError> {
        let args: ReadFileArgs = serde_json::from_value(args).map_err(|e| BuiltinToolError::ArgError { tool: "read_file".into(), detail: e.to_string() })?;
        let path = resolve_in_root(&self.root, &args.path)?;
        let text = std::fs::read_to_string(&path).map_err(|e| BuiltinToolError::Io(e.to_string()))?;

        let lines: Vec<&str> = text.lines().collect();
        let total = lines.len();
        let start = args.offset.unwrap_or(0);
        let end = args.limit.map(|l| (start + l).min(total)).unwrap_or(total);
        let slice = lines.get(start..end).unwrap_or(&[]);

        let header = if start == 0 && end == total {
            "full".to_string()
        } else {
            format!("lines {}-{} of {total}", start + 1, end)
        };

        let mut body = String::new();
        for (i, line) in slice.iter().enumerate() {
            body.push_str(&format!("{:>5}\u{2192}{}\n", start + i + 1, line));
        }

        Ok(json!({ "header": header, "content": truncate_marker(body) }))
    }
}

#[derive(Deserialize)]
struct PatchChange {
    search: String,
    replace: String,
    occurrence: Option<usize>,
}

#[derive(Deserialize)]
struct PatchFileArgs {
    path: String,
    changes: Vec<PatchChange>,
}

pub struct PatchFileTool {
    root: PathBuf,
}

impl PatchFileTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BuiltinTool for PatchFileTool {
    fn name(&self) -> &str {
        "patch_file"
    }

    async fn call(&self, args: Value) -> Result<Value, BuiltinToolError> {
        let args: PatchFileArgs = serde_json::from_value(args).map_err(|e| BuiltinToolError::ArgError { tool: "patch_file".into(), detail: e.to_string() })?;
        let path = resolve_in_root(&self.root, &args.path)?;
        let original = std::fs::read_to_string(&path).map_err(|e| BuiltinToolError::Io(e.to_string()))?;
        let path_display = path.display().to_string();

        let mut content = original;
        for change in &args.changes {
            let matches: Vec<_> = content.match_indices(&change.search).collect();
            if matches.is_empty() {
                return Err(BuiltinToolError::PatchNoMatch(path_display));
            }
            let index = match (matches.len(), change.occurrence) {
                (1, _) => 0,
                (_, Some(occ)) if occ > 0 && occ <= matches.len() => occ - 1,
                (count, _) => return Err(BuiltinToolError::AmbiguousPatch { path: path_display, count }),
            };
            let (byte_pos, _) = matches[index];
            content.replace_range(byte_pos..byte_pos + change.search.len(), &change.replace);
        }

        let tmp = path.with_extension("patch.tmp");
        std::fs::write(&tmp, &content).map_err(|e| BuiltinToolError::Io(e.to_string()))?;
        std::fs::rename(&tmp, &path).map_err(|e| BuiltinToolError::Io(e.to_string()))?;

        Ok(json!({ "path": path_display, "changes_applied": args.changes.len() }))
    }
}

#[derive(Deserialize)]
struct WriteFileArgs {
    path: String,
    content: String,
}

pub struct WriteFileTool {
    root: PathBuf,
}

impl WriteFileTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BuiltinTool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    async fn call(&self, args: Value) -> Result<Value, BuiltinToolError> {
        let args: WriteFileArgs = serde_json::from_value(args).map_err(|e| BuiltinToolError::ArgError { tool: "write_file".into(), detail: e.to_string() })?;
        let path = resolve_in_root(&self.root, &args.path)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BuiltinToolError::Io(e.to_string()))?;
        }
        let tmp = path.with_extension("write.tmp");
        std::fs::write(&tmp, &args.content).map_err(|e| BuiltinToolError::Io(e.to_string()))?;
        std::fs::rename(&tmp, &path).map_err(|e| BuiltinToolError::Io(e.to_string()))?;
        Ok(json!({ "path": path.display().to_string(), "bytes_written": args.content.len() }))
    }
}

#[derive(Deserialize)]
struct ListArgs {
    path: Option<String>,
}

pub struct ListTool {
    root: PathBuf,
}

impl ListTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BuiltinTool for ListTool {
    fn name(&self) -> &str {
        "list"
    }

    async fn call(&self, args: Value) -> Result<Value, BuiltinToolError> {
        let args: ListArgs = serde_json::from_value(args).map_err(|e| BuiltinToolError::ArgError { tool: "list".into(), detail: e.to_string() })?;
        let path = resolve_in_root(&self.root, args.path.as_deref().unwrap_or("."))?;
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&path).map_err(|e| BuiltinToolError::Io(e.to_string()))? {
            let entry = entry.map_err(|e| BuiltinToolError::Io(e.to_string()))?;
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            entries.push(json!({ "name": entry.file_name().to_string_lossy(), "is_dir": is_dir }));
        }
        Ok(json!({ "entries": entries }))
    }
}

#[derive(Deserialize)]
struct StatArgs {
    path: String,
}

pub struct StatTool {
    root: PathBuf,
}

impl StatTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BuiltinTool for StatTool {
    fn name(&self) -> &str {
        "stat"
    }

    async fn call(&self, args: Value) -> Result<Value, BuiltinToolError> {
        let args: StatArgs = serde_json::from_value(args).map_err(|e| BuiltinToolError::ArgError { tool: "stat".into(), detail: e.to_string() })?;
        let path = resolve_in_root(&self.root, &args.path)?;
        let meta = std::fs::metadata(&path).map_err(|e| BuiltinToolError::Io(e.to_string()))?;
        Ok(json!({ "is_dir": meta.is_dir(), "len": meta.len() }))
    }
}

/// Construct the full filesystem tool set for registration (§4.3).
pub fn all(root: impl Into<PathBuf>) -> Vec<Arc<dyn BuiltinTool>> {
    let root = root.into();
    vec![
        Arc::new(ReadFileTool::new(root.clone())),
        Arc::new(PatchFileTool::new(root.clone())),
        Arc::new(WriteFileTool::new(root.clone())),
        Arc::new(ListTool::new(root.clone())),
        Arc::new(StatTool::new(root)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn read_file_reports_full_header() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one\ntwo\nthree").unwrap();
        let tool = ReadFileTool::new(dir.path());
        let result = tool.call(json!({"path": "a.txt"})).await.unwrap();
        assert_eq!(result["header"], "full");
        assert!(result["content"].as_str().unwrap().contains("1\u{2192}one"));
    }

    #[tokio::test]
    async fn read_file_with_offset_and_limit_reports_range_header() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one\ntwo\nthree\nfour").unwrap();
        let tool = ReadFileTool::new(dir.path());
        let result = tool.call(json!({"path": "a.txt", "offset": 1, "limit": 2})).await.unwrap();
        assert_eq!(result["header"], "lines 2-3 of 4");
    }

    #[tokio::test]
    async fn patch_file_rejects_ambiguous_search() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x\nx\n").unwrap();
        let tool = PatchFileTool::new(dir.path());
        let err = tool.call(json!({"path": "a.txt", "changes": [{"search": "x", "replace": "y"}]})).await.unwrap_err();
        assert!(matches!(err, BuiltinToolError::AmbiguousPatch { .. }));
    }

    #[tokio::test]
    async fn patch_file_applies_disambiguated_occurrence() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x\nx\n").unwrap();
        let tool = PatchFileTool::new(dir.path());
        tool.call(json!({"path": "a.txt", "changes": [{"search": "x", "replace": "y", "occurrence": 2}]})).await.unwrap();
        let content = std::fs::read_to_string(dir.path().join("a.txt")).unwrap();
        assert_eq!(content, "x\ny\n");
    }

    #[tokio::test]
    async fn patch_file_no_match_is_rejected() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let tool = PatchFileTool::new(dir.path());
        let err = tool.call(json!({"path": "a.txt", "changes": [{"search": "nope", "replace": "y"}]})).await.unwrap_err();
        assert!(matches!(err, BuiltinToolError::PatchNoMatch(_)));
    }

    #[tokio::test]
    async fn write_file_rejects_path_escaping_root() {
        let dir = tempdir().unwrap();
        let tool = WriteFileTool::new(dir.path());
        let err = tool.call(json!({"path": "../escape.txt", "content": "x"})).await.unwrap_err();
        assert!(matches!(err, BuiltinToolError::PathEscapesRoot(_)));
    }

    #[tokio::test]
    async fn write_file_then_read_file_round_trips() {
        let dir = tempdir().unwrap();
        let writer = WriteFileTool::new(dir.path());
        writer.call(json!({"path": "b.txt", "content": "hello\n"})).await.unwrap();
        let reader = ReadFileTool::new(dir.path());
        let result = reader.call(json!({"path": "b.txt"})).await.unwrap();
        assert!(result["content"].as_str().unwrap().contains("hello"));
    }
}
