use async_trait::async_trait;

use super::{Judge, JudgeContext};
use crate::model::JudgeResult;
use crate::schema::EvalCase;

/// Checks that every `targetFiles[i]` of a `code-gen` case exists under
/// the workspace. Not applicable to other categories (spec §4.2).
pub struct FileExistenceJudge;

impl FileExistenceJudge {
    pub const ID: &'static str = "file-existence";
}

#[async_trait]
impl Judge for FileExistenceJudge {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn evaluate(&self, ctx: &JudgeContext<'_>) -> JudgeResult {
        let EvalCase::CodeGen(case) = ctx.eval_case else {
            return JudgeResult::not_applicable(Self::ID);
        };

        if case.target_files.is_empty() {
            return JudgeResult::not_applicable(Self::ID);
        }

        let mut present = Vec::new();
        let mut missing = Vec::new();
        for file in &case.target_files {
            if ctx.working_directory.join(file).exists() {
                present.push(file.clone());
            } else {
                missing.push(file.clone());
            }
        }

        let expected = case.target_files.len();
        let score = 100.0 * present.len() as f64 / expected as f64;
        let passed = score >= 80.0;
        let reasoning = if missing.is_empty() {
            format!("All {expected} target file(s) exist")
        } else {
            format!("Missing target file(s): {}", missing.join(", "))
        };

        JudgeResult {
            judge_id: Self::ID.to_string(),
            passed,
            score,
            confidence: 1.0,
            reasoning,
            details: Some(serde_json::json!({"present": present, "missing": missing})),
        }
    }
}
