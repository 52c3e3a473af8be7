//! Eval case and eval suite data model (spec §3).
//!
//! `EvalCase` is expressed as a genuine tagged union over the five case
//! categories rather than one struct with every field optional, so each
//! variant only carries fields that are valid for it.

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Trial configuration: repeat a case N times and require a minimum pass rate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrialConfig {
    pub count: u32,
    #[serde(rename = "passThreshold")]
    pub pass_threshold: f64,
}

impl TrialConfig {
    /// `count ∈ [1,10]`, `passThreshold ∈ [0,1]` (spec §3 invariants).
    pub fn is_valid(&self) -> bool {
        (1..=10).contains(&self.count) && (0.0..=1.0).contains(&self.pass_threshold)
    }
}

/// A reference implementation attached to a case, used by the LLM judge's
/// pairwise-comparison prompt.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ReferenceSolution {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpectedToolCall {
    #[serde(rename = "toolName")]
    pub tool_name: String,
    #[serde(rename = "minCalls")]
    pub min_calls: Option<u32>,
    #[serde(rename = "maxCalls")]
    pub max_calls: Option<u32>,
    #[serde(rename = "expectedInput")]
    pub expected_input: Option<serde_json::Value>,
}

impl ExpectedToolCall {
    /// Defaults per spec §3: `minCalls=1`, `maxCalls=∞`.
    pub fn min_calls(&self) -> u32 {
        self.min_calls.unwrap_or(1)
    }

    pub fn max_calls(&self) -> u32 {
        self.max_calls.unwrap_or(u32::MAX)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpectedSkillCall {
    #[serde(rename = "skillName")]
    pub skill_name: String,
    #[serde(rename = "minCalls")]
    pub min_calls: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpectedPattern {
    pub file: String,
    pub patterns: Vec<String>,
}

/// One turn of a `multi-turn` case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub prompt: String,
    #[serde(rename = "expectedBehavior", default)]
    pub expected_behavior: Option<String>,
    #[serde(default)]
    pub judges: Option<Vec<String>>,
}

/// Fields shared by every eval case, regardless of category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseCommon {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(rename = "agentType", default)]
    pub agent_type: Option<String>,
    #[serde(default)]
    pub trials: Option<TrialConfig>,
    #[serde(rename = "referenceSolution", default)]
    pub reference_solution: Option<ReferenceSolution>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BasicCase {
    #[serde(flatten)]
    pub common: CaseCommon,
    pub prompt: String,
    #[serde(rename = "expectedBehavior", default)]
    pub expected_behavior: Option<String>,
    #[serde(default)]
    pub judges: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCase {
    #[serde(flatten)]
    pub common: CaseCommon,
    pub prompt: String,
    #[serde(rename = "expectedToolCalls")]
    pub expected_tool_calls: Vec<ExpectedToolCall>,
    #[serde(rename = "expectedSkills", default)]
    pub expected_skills: Option<Vec<ExpectedSkillCall>>,
    #[serde(default)]
    pub judges: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeGenCase {
    #[serde(flatten)]
    pub common: CaseCommon,
    pub prompt: String,
    #[serde(rename = "targetFiles")]
    pub target_files: Vec<String>,
    #[serde(rename = "expectedPatterns", default)]
    pub expected_patterns: Option<Vec<ExpectedPattern>>,
    #[serde(rename = "syntaxValidation", default)]
    pub syntax_validation: bool,
    #[serde(rename = "buildVerification", default)]
    pub build_verification: bool,
    #[serde(default)]
    pub judges: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutingCase {
    #[serde(flatten)]
    pub common: CaseCommon,
    pub prompt: String,
    #[serde(rename = "expectedAgent")]
    pub expected_agent: String,
    #[serde(rename = "shouldNotRoute", default)]
    pub should_not_route: Option<Vec<String>>,
    #[serde(default)]
    pub judges: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MultiTurnCase {
    #[serde(flatten)]
    pub common: CaseCommon,
    pub turns: Vec<Turn>,
    #[serde(rename = "sessionPersistence", default)]
    pub session_persistence: bool,
    #[serde(rename = "contextValidation", default)]
    pub context_validation: Option<Vec<String>>,
    #[serde(default)]
    pub judges: Vec<String>,
}

/// A declarative eval case, discriminated by `category` (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "category", rename_all = "kebab-case")]
pub enum EvalCase {
    Basic(BasicCase),
    Tool(ToolCase),
    CodeGen(CodeGenCase),
    Routing(RoutingCase),
    MultiTurn(MultiTurnCase),
}

impl EvalCase {
    pub fn common(&self) -> &CaseCommon {
        match self {
            EvalCase::Basic(c) => &c.common,
            EvalCase::Tool(c) => &c.common,
            EvalCase::CodeGen(c) => &c.common,
            EvalCase::Routing(c) => &c.common,
            EvalCase::MultiTurn(c) => &c.common,
        }
    }

    pub fn id(&self) -> &str {
        &self.common().id
    }

    pub fn category(&self) -> &'static str {
        match self {
            EvalCase::Basic(_) => "basic",
            EvalCase::Tool(_) => "tool",
            EvalCase::CodeGen(_) => "code-gen",
            EvalCase::Routing(_) => "routing",
            EvalCase::MultiTurn(_) => "multi-turn",
        }
    }

    pub fn tags(&self) -> &[String] {
        self.common().tags.as_deref().unwrap_or(&[])
    }

    pub fn enabled(&self) -> bool {
        self.common().enabled
    }

    /// Top-level (global) judges for this case, dispatched against the
    /// final execution result. For `multi-turn` cases this is distinct
    /// from each turn's own `judges` list.
    pub fn judges(&self) -> &[String] {
        match self {
            EvalCase::Basic(c) => &c.judges,
            EvalCase::Tool(c) => &c.judges,
            EvalCase::CodeGen(c) => &c.judges,
            EvalCase::Routing(c) => &c.judges,
            EvalCase::MultiTurn(c) => &c.judges,
        }
    }

    pub fn prompt(&self) -> Option<&str> {
        match self {
            EvalCase::Basic(c) => Some(&c.prompt),
            EvalCase::Tool(c) => Some(&c.prompt),
            EvalCase::CodeGen(c) => Some(&c.prompt),
            EvalCase::Routing(c) => Some(&c.prompt),
            EvalCase::MultiTurn(_) => None,
        }
    }
}

/// A JSON file grouping multiple eval cases (analogous to the teacher's
/// `TestFile`), or referencing other suite files for composition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EvalSuite {
    #[serde(rename = "suiteId", default)]
    pub suite_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cases: Vec<EvalCase>,
    #[serde(rename = "testFiles", default)]
    pub test_files: Vec<String>,
}

impl EvalSuite {
    pub fn load(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let suite = serde_json::from_str(&content)?;
        Ok(suite)
    }

    pub fn save(&self, path: &std::path::Path) -> crate::error::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
