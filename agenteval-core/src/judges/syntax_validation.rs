use async_trait::async_trait;
use oxc_allocator::Allocator;
use oxc_parser::Parser;
use oxc_span::SourceType;

use super::{Judge, JudgeContext};
use crate::model::JudgeResult;
use crate::schema::EvalCase;

const SUPPORTED_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx"];

/// Parses every `.ts/.tsx/.js/.jsx` target file with a JS/TS-capable
/// parser and requires it to be syntactically valid (spec §4.2). Files
/// with other extensions are not examined.
pub struct SyntaxValidationJudge;

impl SyntaxValidationJudge {
    pub const ID: &'static str = "syntax-validation";
}

#[async_trait]
impl Judge for SyntaxValidationJudge {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn evaluate(&self, ctx: &JudgeContext<'_>) -> JudgeResult {
        let EvalCase::CodeGen(case) = ctx.eval_case else {
            return JudgeResult::not_applicable(Self::ID);
        };
        if !case.syntax_validation {
            return JudgeResult::not_applicable(Self::ID);
        }

        let candidates: Vec<&String> = case
            .target_files
            .iter()
            .filter(|f| {
                std::path::Path::new(f)
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext))
            })
            .collect();

        if candidates.is_empty() {
            return JudgeResult::not_applicable(Self::ID);
        }

        let mut valid = 0usize;
        let mut notes = Vec::new();

        for file in &candidates {
            let path = ctx.working_directory.join(file);
            let Ok(source) = std::fs::read_to_string(&path) else {
                notes.push(format!("{file}: file not found"));
                continue;
            };
            let Ok(source_type) = SourceType::from_path(std::path::Path::new(file)) else {
                notes.push(format!("{file}: unrecognized source type"));
                continue;
            };
            let allocator = Allocator::default();
            let result = Parser::new(&allocator, &source, source_type).parse();
            if result.panicked || !result.errors.is_empty() {
                notes.push(format!("{file}: {} syntax error(s)", result.errors.len().max(1)));
            } else {
                valid += 1;
            }
        }

        let total = candidates.len();
        let score = 100.0 * valid as f64 / total as f64;
        let passed = score >= 90.0;
        let reasoning = if notes.is_empty() {
            format!("All {total} file(s) parsed without syntax errors")
        } else {
            notes.join("; ")
        };

        JudgeResult {
            judge_id: Self::ID.to_string(),
            passed,
            score,
            confidence: 1.0,
            reasoning,
            details: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExecutionResult, Usage};
    use crate::schema::{CaseCommon, CodeGenCase};
    use tempfile::tempdir;

    fn case(target_files: Vec<String>) -> EvalCase {
        EvalCase::CodeGen(CodeGenCase {
            common: CaseCommon {
                id: "c1".into(),
                name: "n".into(),
                description: None,
                tags: None,
                enabled: true,
                timeout: None,
                agent_type: None,
                trials: None,
                reference_solution: None,
            },
            prompt: "generate".into(),
            target_files,
            expected_patterns: None,
            syntax_validation: true,
            build_verification: false,
            judges: vec!["syntax-validation".into()],
        })
    }

    fn exec_result() -> ExecutionResult {
        ExecutionResult {
            success: true,
            output: String::new(),
            tool_calls: vec![],
            duration: 0,
            working_directory: String::new(),
            workspace_id: "ws-1".into(),
            error: None,
            session_id: None,
            num_turns: None,
            usage: Usage::default(),
            transcript: None,
        }
    }

    #[tokio::test]
    async fn valid_typescript_passes() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.ts"), "export function add(a: number, b: number) { return a + b; }").unwrap();
        let case = case(vec!["a.ts".into()]);
        let exec = exec_result();
        let ctx = JudgeContext {
            eval_case: &case,
            execution_result: &exec,
            working_directory: dir.path().to_path_buf(),
            turn_index: None,
        };
        let result = SyntaxValidationJudge.evaluate(&ctx).await;
        assert!(result.passed);
        assert_eq!(result.score, 100.0);
    }

    #[tokio::test]
    async fn malformed_typescript_fails() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.ts"), "export function add(a: number, b: number) { return a +").unwrap();
        let case = case(vec!["a.ts".into()]);
        let exec = exec_result();
        let ctx = JudgeContext {
            eval_case: &case,
            execution_result: &exec,
            working_directory: dir.path().to_path_buf(),
            turn_index: None,
        };
        let result = SyntaxValidationJudge.evaluate(&ctx).await;
        assert!(!result.passed);
    }

    #[tokio::test]
    async fn non_js_files_are_not_applicable() {
        let dir = tempdir().unwrap();
        let case = case(vec!["README.md".into()]);
        let exec = exec_result();
        let ctx = JudgeContext {
            eval_case: &case,
            execution_result: &exec,
            working_directory: dir.path().to_path_buf(),
            turn_index: None,
        };
        let result = SyntaxValidationJudge.evaluate(&ctx).await;
        assert_eq!(result.reasoning, "Not applicable");
    }
}
