//! Judges: graders that consume an execution result and emit a verdict
//! (spec §4.2).

mod agent_routing;
mod file_existence;
mod llm_judge;
mod pattern_match;
mod skill_invocation;
mod syntax_validation;
mod tool_invocation;

pub use agent_routing::AgentRoutingJudge;
pub use file_existence::FileExistenceJudge;
pub use llm_judge::{JudgeLlm, LlmJudge, LlmJudgeError};
pub use pattern_match::PatternMatchJudge;
pub use skill_invocation::SkillInvocationJudge;
pub use syntax_validation::SyntaxValidationJudge;
pub use tool_invocation::ToolInvocationJudge;

use async_trait::async_trait;
use std::path::PathBuf;

use crate::model::{ExecutionResult, JudgeResult};
use crate::schema::EvalCase;

/// Everything a judge needs to grade one execution.
pub struct JudgeContext<'a> {
    pub eval_case: &'a EvalCase,
    pub execution_result: &'a ExecutionResult,
    pub working_directory: PathBuf,
    /// Set when grading one turn of a multi-turn case.
    pub turn_index: Option<usize>,
}

#[async_trait]
pub trait Judge: Send + Sync {
    /// Stable identifier this judge is registered under.
    fn id(&self) -> &str;

    async fn evaluate(&self, ctx: &JudgeContext<'_>) -> JudgeResult;
}
