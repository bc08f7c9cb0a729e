//! Artifact-emitting tool (§4.3 `artifact` category, §6 "Artifact output
//! format"): produces a `artifact:<kind> { type, title, data }` fenced block
//! and, for form/wizard/batch kinds, infers UI widget hints from the
//! `data.schema` property names and types.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::error::BuiltinToolError;
use crate::domain::models::artifact::ArtifactKind;
use crate::domain::ports::builtin_tool::BuiltinTool;

/// Infer a UI widget hint from a JSON-schema property's declared type and
/// name (§6: "UI-widget hints inferred from property names and schema
/// types").
fn widget_hint(name: &str, schema_type: &str) -> &'static str {
    let lowered = name.to_ascii_lowercase();
    match schema_type {
        "boolean" => "checkbox",
        "integer" | "number" => "number",
        "array" => "multiselect",
        "string" if lowered.contains("password") || lowered.contains("secret") => "password",
        "string" if lowered.contains("date") => "date",
        "string" if lowered.contains("email") => "email",
        "string" if lowered.contains("description") || lowered.contains("notes") || lowered.contains("body") => "textarea",
        _ => "text",
    }
}

fn annotate_widgets(mut data: Value) -> Value {
    let Some(schema) = data.get_mut("schema") else { return data };
    let Some(properties) = schema.get_mut("properties").and_then(|p| p.as_object_mut()) else { return data };

    let hints: Vec<(String, &'static str)> = properties
        .iter()
        .map(|(name, prop)| {
            let schema_type = prop.get("type").and_then(|t| t.as_str()).unwrap_or("string");
            (name.clone(), widget_hint(name, schema_type))
        })
        .collect();

    for (name, hint) in hints {
        if let Some(prop) = properties.get_mut(&name) {
            prop["widget"] = json!(hint);
        }
    }
    data
}

#[derive(Deserialize)]
struct EmitArtifactArgs {
    kind: ArtifactKind,
    title: String,
    data: Value,
}

pub struct EmitArtifactTool {
    artifacts_dir: PathBuf,
}

impl EmitArtifactTool {
    pub fn new(artifacts_dir: impl Into<PathBuf>) -> Self {
        Self { artifacts_dir: artifacts_dir.into() }
    }

    fn render(kind: ArtifactKind, title: &str, data: &Value) -> String {
        let kind_str = serde_json::to_value(kind).ok().and_then(|v| v.as_str().map(str::to_string)).unwrap_or_else(|| "code".to_string());
        let body = json!({ "type": kind_str, "title": title, "data": data });
        format!("```artifact:{kind_str}\n{}\n```", serde_json::to_string_pretty(&body).unwrap_or_default())
    }
}

#[async_trait]
impl BuiltinTool for EmitArtifactTool {
    fn name(&self) -> &str {
        "emit_artifact"
    }

    async fn call(&self, args: Value) -> Result<Value, BuiltinToolError> {
        let args: EmitArtifactArgs = serde_json::from_value(args).map_err(|e| BuiltinToolError::ArgError { tool: "emit_artifact".into(), detail: e.to_string() })?;

        let data = match args.kind {
            ArtifactKind::Form | ArtifactKind::Wizard | ArtifactKind::Toolform | ArtifactKind::Batchtool => annotate_widgets(args.data),
            _ => args.data,
        };

        let block = Self::render(args.kind, &args.title, &data);

        std::fs::create_dir_all(&self.artifacts_dir).map_err(|e| BuiltinToolError::Io(e.to_string()))?;
        let slug: String = args.title.chars().map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '_' }).collect();
        let path = self.artifacts_dir.join(format!("{slug}.artifact.md"));
        std::fs::write(&path, &block).map_err(|e| BuiltinToolError::Io(e.to_string()))?;

        Ok(json!({ "block": block, "path": path.display().to_string() }))
    }
}

/// Construct the artifact tool set for registration (§4.3).
pub fn all(artifacts_dir: impl Into<PathBuf>) -> Vec<Arc<dyn BuiltinTool>> {
    vec![Arc::new(EmitArtifactTool::new(artifacts_dir))]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn emits_a_fenced_artifact_block() {
        let dir = tempdir().unwrap();
        let tool = EmitArtifactTool::new(dir.path());
        let result = tool.call(json!({"kind": "chart", "title": "Sales", "data": {"x": 1}})).await.unwrap();
        let block = result["block"].as_str().unwrap();
        assert!(block.starts_with("```artifact:chart"));
        assert!(block.contains("\"title\": \"Sales\""));
    }

    #[tokio::test]
    async fn form_kind_gets_widget_hints() {
        let dir = tempdir().unwrap();
        let tool = EmitArtifactTool::new(dir.path());
        let data = json!({"schema": {"properties": {"email": {"type": "string"}, "agree": {"type": "boolean"}}}});
        let result = tool.call(json!({"kind": "form", "title": "Signup", "data": data})).await.unwrap();
        let block = result["block"].as_str().unwrap();
        assert!(block.contains("\"widget\": \"email\""));
        assert!(block.contains("\"widget\": \"checkbox\""));
    }
}
