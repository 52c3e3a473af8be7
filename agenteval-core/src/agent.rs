//! The agent function interface (spec §6) — the one external collaborator
//! the harness actually calls. The engine never implements an agent; it
//! consumes `Arc<dyn Agent>` supplied by the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{ToolCallRecord, Usage};

#[derive(Debug, Clone)]
pub struct AgentContext {
    pub working_directory: String,
    pub eval_id: String,
    pub eval_name: String,
    pub session_id: Option<String>,
    /// Milliseconds.
    pub timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentInvocation {
    pub output: String,
    pub success: bool,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRecord>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    /// Milliseconds, if the agent tracked its own duration.
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub num_turns: Option<u32>,
    #[serde(default)]
    pub usage: Usage,
}

#[async_trait]
pub trait Agent: Send + Sync {
    async fn invoke(&self, prompt: &str, context: &AgentContext) -> AgentInvocation;
}
