//! Rubric-driven LLM judge (spec §4.2). Grounded on the teacher's
//! `adk_eval::llm_judge::LlmJudge` for the judge-wraps-a-model shape and
//! prompt-construction style, adapted to this spec's fenced-```json
//! response contract instead of the teacher's line-prefixed format.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::{Judge, JudgeContext};
use crate::model::JudgeResult;
use crate::schema::EvalCase;

/// External collaborator: the LLM API client used by LLM judges. The
/// engine never constructs one; it only consumes `Arc<dyn JudgeLlm>`
/// supplied by the caller (spec §6).
#[async_trait]
pub trait JudgeLlm: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmJudgeError>;
}

#[derive(Debug, Error)]
pub enum LlmJudgeError {
    #[error("LLM call failed: {0}")]
    CallFailed(String),
}

#[derive(Debug, Clone)]
pub struct LlmJudgeConfig {
    pub max_tokens: usize,
    /// Low for consistency across repeated evaluation.
    pub temperature: f64,
}

impl Default for LlmJudgeConfig {
    fn default() -> Self {
        Self { max_tokens: 1024, temperature: 0.0 }
    }
}

/// One registered instance per rubric file: `id` is the rubric's filename
/// without extension (spec §4.2), and it is this value the judge is
/// registered under.
pub struct LlmJudge {
    rubric_id: String,
    rubrics_dir: PathBuf,
    model: Arc<dyn JudgeLlm>,
    config: LlmJudgeConfig,
}

impl LlmJudge {
    pub const PASS_THRESHOLD: f64 = 70.0;

    pub fn new(rubric_id: impl Into<String>, rubrics_dir: PathBuf, model: Arc<dyn JudgeLlm>) -> Self {
        Self { rubric_id: rubric_id.into(), rubrics_dir, model, config: LlmJudgeConfig::default() }
    }

    pub fn with_config(
        rubric_id: impl Into<String>,
        rubrics_dir: PathBuf,
        model: Arc<dyn JudgeLlm>,
        config: LlmJudgeConfig,
    ) -> Self {
        Self { rubric_id: rubric_id.into(), rubrics_dir, model, config }
    }

    fn target_files<'a>(case: &'a EvalCase) -> &'a [String] {
        match case {
            EvalCase::CodeGen(c) => &c.target_files,
            _ => &[],
        }
    }

    fn read_file_map(&self, working_directory: &std::path::Path, files: &[String]) -> HashMap<String, String> {
        files
            .iter()
            .map(|f| {
                let content = std::fs::read_to_string(working_directory.join(f))
                    .unwrap_or_else(|_| "[FILE NOT FOUND]".to_string());
                (f.clone(), content)
            })
            .collect()
    }

    fn build_rubric_prompt(
        &self,
        rubric: &str,
        output: &str,
        files: &HashMap<String, String>,
    ) -> String {
        let files_section = render_file_map(files);
        format!(
            r#"You are an evaluation judge. Be objective and consistent.

Rubric:
{rubric}

Agent output:
"{output}"

Workspace files:
{files_section}

Respond with a single fenced json block of the exact shape:
```json
{{"score": <0-100>, "passed": <bool>, "confidence": <0-1>, "reasoning": "<text>"}}
```"#
        )
    }

    fn build_pairwise_prompt(
        &self,
        rubric: &str,
        output: &str,
        files: &HashMap<String, String>,
        reference_files: &HashMap<String, String>,
        reference_description: Option<&str>,
        reference_code: Option<&str>,
    ) -> String {
        let files_section = render_file_map(files);
        let reference_section = render_file_map(reference_files);
        let description_line =
            reference_description.map(|d| format!("Reference description: {d}\n")).unwrap_or_default();
        let code_line =
            reference_code.map(|c| format!("Reference code:\n{c}\n")).unwrap_or_default();

        format!(
            r#"You are an evaluation judge comparing an agent's solution against a reference solution.

Rubric:
{rubric}

Agent output:
"{output}"

Agent workspace files:
{files_section}
{description_line}{code_line}Reference workspace files:
{reference_section}

Respond with a single fenced json block of the exact shape:
```json
{{"score": <0-100>, "passed": <bool>, "confidence": <0-1>, "reasoning": "<text>"}}
```"#
        )
    }

    fn parse_response(&self, response: &str) -> JudgeResult {
        let candidate = extract_fenced_json(response).unwrap_or_else(|| response.to_string());
        match serde_json::from_str::<serde_json::Value>(&candidate) {
            Ok(value) => self.judge_result_from_value(&value),
            Err(e) => JudgeResult {
                judge_id: self.rubric_id.clone(),
                passed: false,
                score: 0.0,
                confidence: 0.0,
                reasoning: format!("Failed to parse LLM response: {e}"),
                details: None,
            },
        }
    }

    fn judge_result_from_value(&self, value: &serde_json::Value) -> JudgeResult {
        let score = value.get("score").and_then(serde_json::Value::as_f64).unwrap_or(0.0).clamp(0.0, 100.0);
        let confidence =
            value.get("confidence").and_then(serde_json::Value::as_f64).unwrap_or(0.0).clamp(0.0, 1.0);
        let reasoning = value
            .get("reasoning")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("")
            .to_string();
        let passed = value
            .get("passed")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(score >= Self::PASS_THRESHOLD);

        JudgeResult { judge_id: self.rubric_id.clone(), passed, score, confidence, reasoning, details: None }
    }

    fn error_result(&self, reasoning: String) -> JudgeResult {
        JudgeResult {
            judge_id: self.rubric_id.clone(),
            passed: false,
            score: 0.0,
            confidence: 0.0,
            reasoning,
            details: None,
        }
    }
}

fn render_file_map(files: &HashMap<String, String>) -> String {
    if files.is_empty() {
        return "(none)".to_string();
    }
    let mut keys: Vec<&String> = files.keys().collect();
    keys.sort();
    keys.into_iter().map(|k| format!("--- {k} ---\n{}", files[k])).collect::<Vec<_>>().join("\n")
}

fn extract_fenced_json(text: &str) -> Option<String> {
    let start_marker = "```json";
    let start = text.find(start_marker)? + start_marker.len();
    let rest = &text[start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim().to_string())
}

#[async_trait]
impl Judge for LlmJudge {
    fn id(&self) -> &str {
        &self.rubric_id
    }

    async fn evaluate(&self, ctx: &JudgeContext<'_>) -> JudgeResult {
        let rubric_path = self.rubrics_dir.join(format!("{}.md", self.rubric_id));
        let rubric = match std::fs::read_to_string(&rubric_path) {
            Ok(content) => content,
            Err(e) => return self.error_result(format!("Failed to load rubric '{}': {e}", self.rubric_id)),
        };

        let files = self.read_file_map(&ctx.working_directory, Self::target_files(ctx.eval_case));

        let prompt = match &ctx.eval_case.common().reference_solution {
            Some(reference) if !reference.files.is_empty() || reference.code.is_some() => {
                let reference_files = self.read_file_map(&ctx.working_directory, &reference.files);
                self.build_pairwise_prompt(
                    &rubric,
                    &ctx.execution_result.output,
                    &files,
                    &reference_files,
                    reference.description.as_deref(),
                    reference.code.as_deref(),
                )
            }
            _ => self.build_rubric_prompt(&rubric, &ctx.execution_result.output, &files),
        };

        match self.model.complete(&prompt).await {
            Ok(response) => self.parse_response(&response),
            Err(e) => self.error_result(format!("LLM judge call failed: {e}")),
        }
    }
}
