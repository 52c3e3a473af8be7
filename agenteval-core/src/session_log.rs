//! Tool-call augmentation by mining session-log files an agent may have
//! dropped in its workspace (spec §4.4, §6). Best-effort and non-fatal: a
//! missing log directory is silently tolerated (spec §9 "forensic"
//! design note).

use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use serde_json::Value;

use crate::model::ToolCallRecord;

/// Recognized session-logging agent kinds.
pub const CLAUDE_CODE: &str = "claude-code";
pub const OPENAI_AGENTS: &str = "openai-agents";
pub const VERCEL_AI: &str = "vercel-ai";

/// Merge tool calls mined from the workspace's session logs into `existing`,
/// deduping by `(toolName, canonical(input))`. Unrecognized `agent_type`
/// values are a no-op.
pub fn augment_tool_calls(
    existing: Vec<ToolCallRecord>,
    workspace: &Path,
    agent_type: Option<&str>,
) -> Vec<ToolCallRecord> {
    let mined = match agent_type {
        Some(CLAUDE_CODE) => scan_claude_code_session_logs(workspace),
        Some(OPENAI_AGENTS) => scan_openai_agents_traces(workspace),
        Some(VERCEL_AI) => scan_vercel_ai_steps(workspace),
        _ => Vec::new(),
    };
    merge_dedup(existing, mined)
}

fn merge_dedup(existing: Vec<ToolCallRecord>, mined: Vec<ToolCallRecord>) -> Vec<ToolCallRecord> {
    let mut seen: std::collections::HashSet<(String, String)> =
        existing.iter().map(|c| c.dedup_key()).collect();
    let mut merged = existing;
    for call in mined {
        let key = call.dedup_key();
        if seen.insert(key) {
            merged.push(call);
        }
    }
    merged
}

fn read_jsonl_lines(path: &Path) -> Vec<Value> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| serde_json::from_str::<Value>(l).ok())
        .collect()
}

fn find_jsonl_under(root: &Path) -> Vec<std::path::PathBuf> {
    if !root.is_dir() {
        return Vec::new();
    }
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "jsonl"))
        .map(|e| e.into_path())
        .collect()
}

/// Scan `{workspace}/.claude/projects/**/*.jsonl` for `tool_use`/`tool_result`
/// pairs. Two-pass: collect `tool_use` blocks by id, then match each
/// `tool_result` by `tool_use_id`.
pub fn scan_claude_code_session_logs(workspace: &Path) -> Vec<ToolCallRecord> {
    let root = workspace.join(".claude").join("projects");
    let mut uses: HashMap<String, (String, Value)> = HashMap::new();
    let mut results: HashMap<String, (Option<Value>, bool)> = HashMap::new();

    for file in find_jsonl_under(&root) {
        for line in read_jsonl_lines(&file) {
            let Some(content) = line.pointer("/message/content").and_then(Value::as_array) else {
                continue;
            };
            for block in content {
                match block.get("type").and_then(Value::as_str) {
                    Some("tool_use") => {
                        let Some(id) = block.get("id").and_then(Value::as_str) else { continue };
                        let name =
                            block.get("name").and_then(Value::as_str).unwrap_or("unknown").to_string();
                        let input = block.get("input").cloned().unwrap_or(Value::Null);
                        uses.insert(id.to_string(), (name, input));
                    }
                    Some("tool_result") => {
                        let Some(id) = block.get("tool_use_id").and_then(Value::as_str) else {
                            continue;
                        };
                        let content = block.get("content").cloned();
                        let is_error =
                            block.get("is_error").and_then(Value::as_bool).unwrap_or(false);
                        results.insert(id.to_string(), (content, is_error));
                    }
                    _ => {}
                }
            }
        }
    }

    uses.into_iter()
        .map(|(id, (name, input))| {
            let (output, is_error) =
                results.get(&id).cloned().unwrap_or((None, false));
            ToolCallRecord {
                tool_name: name,
                tool_use_id: Some(id),
                input,
                output,
                timestamp: Utc::now(),
                duration: None,
                is_error,
            }
        })
        .collect()
}

/// Scan `{workspace}/.openai-agents/traces.jsonl`: `function` spans become
/// tool calls, `handoff` spans become synthetic `Handoff` calls.
pub fn scan_openai_agents_traces(workspace: &Path) -> Vec<ToolCallRecord> {
    let path = workspace.join(".openai-agents").join("traces.jsonl");
    read_jsonl_lines(&path)
        .into_iter()
        .filter(|line| line.get("type").and_then(Value::as_str) == Some("span"))
        .filter_map(|line| match line.get("span_type").and_then(Value::as_str) {
            Some("function") => Some(ToolCallRecord {
                tool_name: line.get("tool_name").and_then(Value::as_str)?.to_string(),
                tool_use_id: None,
                input: line.get("tool_input").cloned().unwrap_or(Value::Null),
                output: line.get("tool_output").cloned(),
                timestamp: Utc::now(),
                duration: None,
                is_error: false,
            }),
            Some("handoff") => Some(ToolCallRecord {
                tool_name: "Handoff".to_string(),
                tool_use_id: None,
                input: serde_json::json!({
                    "from": line.get("from_agent"),
                    "to": line.get("to_agent"),
                }),
                output: None,
                timestamp: Utc::now(),
                duration: None,
                is_error: false,
            }),
            _ => None,
        })
        .collect()
}

/// Scan `{workspace}/.vercel-ai/steps.jsonl`: `step` entries become tool
/// calls, `handoff` entries become synthetic `Handoff` calls.
pub fn scan_vercel_ai_steps(workspace: &Path) -> Vec<ToolCallRecord> {
    let path = workspace.join(".vercel-ai").join("steps.jsonl");
    read_jsonl_lines(&path)
        .into_iter()
        .filter_map(|line| match line.get("type").and_then(Value::as_str) {
            Some("step") => Some(ToolCallRecord {
                tool_name: line.get("tool_name").and_then(Value::as_str)?.to_string(),
                tool_use_id: None,
                input: line.get("tool_input").cloned().unwrap_or(Value::Null),
                output: line.get("tool_output").cloned(),
                timestamp: Utc::now(),
                duration: None,
                is_error: false,
            }),
            Some("handoff") => Some(ToolCallRecord {
                tool_name: "Handoff".to_string(),
                tool_use_id: None,
                input: serde_json::json!({
                    "from": line.get("from_agent"),
                    "to": line.get("to_agent"),
                }),
                output: None,
                timestamp: Utc::now(),
                duration: None,
                is_error: false,
            }),
            _ => None,
        })
        .collect()
}
