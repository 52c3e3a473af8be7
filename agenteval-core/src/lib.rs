//! Evaluation engine for testing non-deterministic AI agents against
//! declarative eval cases (spec §1-§2).
//!
//! The engine is the scheduling, retry, trial, and judgement pipeline
//! that drives each case from loaded definition to final verdict. It
//! consumes a user-supplied agent implementation, eval case files, and
//! (optionally) an LLM client for [`judges::LlmJudge`]; it does not
//! implement any of those itself.

pub mod agent;
pub mod config;
pub mod error;
pub mod harness;
pub mod judges;
pub mod loader;
pub mod model;
pub mod registry;
pub mod report;
pub mod runner;
pub mod schema;
pub mod session_log;
pub mod workspace;

pub use agent::{Agent, AgentContext, AgentInvocation};
pub use config::ResolvedConfig;
pub use error::{EvalError, Result};
pub use harness::TestHarness;
pub use model::{
    ErrorType, EvalCaseResult, EvalSuiteResult, ExecutionResult, JudgeResult, ToolCallRecord,
    Usage,
};
pub use registry::JudgeRegistry;
pub use runner::{EvalRunner, NoopHooks, RunFilter, RunnerHooks};
pub use schema::EvalCase;
pub use workspace::{Workspace, WorkspaceManager};

use std::sync::Arc;

/// Seeds a fresh registry with the six deductive built-ins plus one
/// [`judges::LlmJudge`] per rubric file found directly under
/// `rubrics_dir` (spec §4.1, §4.2: "id = filename without extension").
/// A missing `rubrics_dir` simply yields no LLM judges, not an error —
/// eval suites that use none are unaffected.
pub fn builtin_registry(
    llm: Option<Arc<dyn judges::JudgeLlm>>,
    rubrics_dir: std::path::PathBuf,
    routing_keywords: std::collections::HashMap<String, Vec<String>>,
) -> JudgeRegistry {
    let registry = JudgeRegistry::new();
    registry.register(Arc::new(judges::FileExistenceJudge));
    registry.register(Arc::new(judges::PatternMatchJudge));
    registry.register(Arc::new(judges::ToolInvocationJudge));
    registry.register(Arc::new(judges::SkillInvocationJudge));
    registry.register(Arc::new(judges::SyntaxValidationJudge));
    registry.register(Arc::new(judges::AgentRoutingJudge::new(routing_keywords)));

    if let Some(model) = llm {
        for rubric_id in loader::discover_rubric_ids(&rubrics_dir) {
            registry.register(Arc::new(judges::LlmJudge::new(rubric_id, rubrics_dir.clone(), model.clone())));
        }
    }

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_seeds_six_deductive_judges_without_rubrics() {
        let registry = builtin_registry(None, std::path::PathBuf::from("/nonexistent"), Default::default());
        let ids = registry.list();
        assert_eq!(ids.len(), 6);
        assert!(ids.contains(&"file-existence".to_string()));
        assert!(ids.contains(&"agent-routing".to_string()));
    }
}
