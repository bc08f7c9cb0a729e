//! Extracts tool-invocation intents from free-form model output (§4.1).
//!
//! Accepts four carrier shapes mixed in one response: fenced JSON, bare
//! inline JSON, a `{"thoughts":…, "tool_request":{…}}` wrapper, and
//! `<tool_call>…</tool_call>` tags. Overlapping matches are deduplicated by
//! byte range using the same allocation-light, sorted-interval style as the
//! DAG's cycle detection (`domain/models/dag.rs`). Carrier scanning is plain
//! marker search plus balanced-brace counting rather than a regex engine —
//! the shapes are fixed literal delimiters, not patterns.

use serde_json::Value;

use crate::domain::error::ToolParserError;
use crate::domain::models::tool_call::{ByteRange, ToolCall};

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";
const TOOL_CALL_OPEN: &str = "<tool_call>";
const TOOL_CALL_CLOSE: &str = "</tool_call>";

/// One raw candidate carrier found in the response, before JSON parsing.
struct Candidate {
    range: ByteRange,
    json_text: String,
}

/// The parser's output: the visible text (think-segments stripped) and the
/// ordered, deduplicated tool calls found in it.
#[derive(Debug, Clone, Default)]
pub struct ParsedResponse {
    pub visible_text: String,
    pub tool_calls: Vec<ToolCall>,
}

/// Strip `<think>...</think>` segments from model output (§4.9 step 2a).
pub fn strip_think(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    loop {
        match rest.find(THINK_OPEN) {
            Some(open) => {
                out.push_str(&rest[..open]);
                let after_open = &rest[open + THINK_OPEN.len()..];
                match after_open.find(THINK_CLOSE) {
                    Some(close) => rest = &after_open[close + THINK_CLOSE.len()..],
                    None => return out,
                }
            }
            None => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

/// Parse a model response into visible text plus an ordered, deduplicated
/// list of tool calls (§4.1).
pub fn parse(raw: &str) -> ParsedResponse {
    let visible_text = strip_think(raw);
    let mut candidates = Vec::new();

    candidates.extend(fenced_json_candidates(&visible_text));
    candidates.extend(tagged_candidates(&visible_text));
    candidates.extend(bare_object_candidates(&visible_text));

    candidates.sort_by_key(|c| c.range.start);

    let mut accepted: Vec<ByteRange> = Vec::new();
    let mut tool_calls = Vec::new();
    for candidate in candidates {
        if accepted.iter().any(|a| candidate.range.is_contained_in(a)) {
            continue;
        }
        match extract_call(&candidate.json_text, candidate.range) {
            Ok(Some(call)) => {
                accepted.push(candidate.range);
                tool_calls.push(call);
            }
            Ok(None) => {}
            Err(_malformed) => {
                // soft failure: skip this carrier, keep going (§4.1 rule c)
            }
        }
    }

    ParsedResponse { visible_text, tool_calls }
}

/// Fenced blocks, ```` ```json ... ``` ```` or a bare ```` ``` ... ``` ````,
/// whose body is a JSON object.
fn fenced_json_candidates(text: &str) -> Vec<Candidate> {
    let mut out = Vec::new();
    let mut search_from = 0usize;
    while let Some(rel_start) = text[search_from..].find("```") {
        let fence_start = search_from + rel_start;
        let body_start = fence_start + 3;
        let Some(rel_end) = text[body_start..].find("```") else {
            break;
        };
        let fence_end = body_start + rel_end + 3;
        let mut body = &text[body_start..body_start + rel_end];
        if let Some(stripped) = body.strip_prefix("json") {
            body = stripped;
        }
        let body = body.trim();
        if body.starts_with('{') && body.ends_with('}') {
            out.push(Candidate {
                range: ByteRange::new(fence_start, fence_end),
                json_text: body.to_string(),
            });
        }
        search_from = fence_end;
    }
    out
}

/// `<tool_call>...</tool_call>` tags.
fn tagged_candidates(text: &str) -> Vec<Candidate> {
    let mut out = Vec::new();
    let mut search_from = 0usize;
    while let Some(rel_open) = text[search_from..].find(TOOL_CALL_OPEN) {
        let tag_start = search_from + rel_open;
        let body_start = tag_start + TOOL_CALL_OPEN.len();
        let Some(rel_close) = text[body_start..].find(TOOL_CALL_CLOSE) else {
            break;
        };
        let body_end = body_start + rel_close;
        let tag_end = body_end + TOOL_CALL_CLOSE.len();
        out.push(Candidate {
            range: ByteRange::new(tag_start, tag_end),
            json_text: text[body_start..body_end].trim().to_string(),
        });
        search_from = tag_end;
    }
    out
}

/// Top-level balanced-brace `{...}` spans, for bare inline JSON objects and
/// the reasoning-wrapped shape.
fn bare_object_candidates(text: &str) -> Vec<Candidate> {
    let mut out = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] != b'{' {
            i += 1;
            continue;
        }
        let start = i;
        let mut depth = 0i32;
        let mut in_string = false;
        let mut escape = false;
        let mut end = None;
        let mut j = i;
        while j < bytes.len() {
            let b = bytes[j];
            if in_string {
                if escape {
                    escape = false;
                } else if b == b'\\' {
                    escape = true;
                } else if b == b'"' {
                    in_string = false;
                }
            } else {
                match b {
                    b'"' => in_string = true,
                    b'{' => depth += 1,
                    b'}' => {
                        depth -= 1;
                        if depth == 0 {
                            end = Some(j + 1);
                            break;
                        }
                    }
                    _ => {}
                }
            }
            j += 1;
        }
        match end {
            Some(end) => {
                out.push(Candidate {
                    range: ByteRange::new(start, end),
                    json_text: text[start..end].to_string(),
                });
                i = end;
            }
            None => i = start + 1,
        }
    }
    out
}

fn extract_call(
    json_text: &str,
    origin: ByteRange,
) -> Result<Option<ToolCall>, ToolParserError> {
    let value: Value = serde_json::from_str(json_text)
        .map_err(|e| ToolParserError::MalformedCarrier(e.to_string()))?;

    // Reasoning-wrapped shape.
    if let Some(request) = value.get("tool_request") {
        return extract_name_args(request, origin).map(Some);
    }

    // Flattened and fenced-function shapes.
    if value.get("name").is_some() || value.get("function").is_some() {
        let target = value.get("function").unwrap_or(&value);
        return extract_name_args(target, origin).map(Some);
    }

    Ok(None)
}

fn extract_name_args(value: &Value, origin: ByteRange) -> Result<ToolCall, ToolParserError> {
    let name = value
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| ToolParserError::MalformedCarrier("missing 'name'".to_string()))?
        .to_string();
    let arguments = value
        .get("arguments")
        .or_else(|| value.get("parameters"))
        .cloned()
        .unwrap_or(Value::Object(serde_json::Map::new()));
    Ok(ToolCall { name, arguments, origin })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json_call() {
        let raw = "Sure.\n```json\n{\"name\":\"read_file\",\"arguments\":{\"path\":\"a.txt\"}}\n```\n";
        let parsed = parse(raw);
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(parsed.tool_calls[0].name, "read_file");
    }

    #[test]
    fn parses_tool_call_tag() {
        let raw = "<tool_call>{\"name\":\"bash\",\"parameters\":{\"cmd\":\"ls\"}}</tool_call>";
        let parsed = parse(raw);
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(parsed.tool_calls[0].arguments["cmd"], "ls");
    }

    #[test]
    fn parses_reasoning_wrapped_shape() {
        let raw = r#"{"thoughts":"I should list files","tool_request":{"name":"builtin.list_dir","parameters":{"path":"."}}}"#;
        let parsed = parse(raw);
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(parsed.tool_calls[0].name, "builtin.list_dir");
    }

    #[test]
    fn dedupes_nested_wrapper_and_inner_object() {
        // The bare-object scan also finds the inner tool_request object; it
        // must be discarded because it's contained in the outer match.
        let raw = r#"{"thoughts":"x","tool_request":{"name":"a","parameters":{}}}"#;
        let parsed = parse(raw);
        assert_eq!(parsed.tool_calls.len(), 1);
    }

    #[test]
    fn malformed_carrier_is_skipped_not_fatal() {
        let raw = "prefix {\"broken\": } trailing text with {\"name\":\"ok\",\"arguments\":{}}";
        let parsed = parse(raw);
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(parsed.tool_calls[0].name, "ok");
    }

    #[test]
    fn strips_think_segments() {
        let raw = "<think>internal musing</think>visible answer";
        let parsed = parse(raw);
        assert_eq!(parsed.visible_text, "visible answer");
    }

    #[test]
    fn no_overlapping_byte_ranges_emitted() {
        let raw = r#"{"name":"a","arguments":{"nested":{"name":"b","arguments":{}}}}"#;
        let parsed = parse(raw);
        for i in 0..parsed.tool_calls.len() {
            for j in (i + 1)..parsed.tool_calls.len() {
                assert!(!parsed.tool_calls[i].origin.overlaps(&parsed.tool_calls[j].origin));
            }
        }
    }

    #[test]
    fn ignores_non_object_fenced_block() {
        let raw = "```json\n[1,2,3]\n```";
        let parsed = parse(raw);
        assert!(parsed.tool_calls.is_empty());
    }
}
