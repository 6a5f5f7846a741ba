//! The per-iteration judge: evaluates one LLM turn against a node's
//! contract and decides whether the node visit is done.

use async_trait::async_trait;

use crate::graph::NodeSpec;
use crate::llm_client::GenerateResult;
use crate::store_traits::OutputAccumulator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// More work pending this turn (tool calls in flight).
    Continue,
    /// The turn did not satisfy the node's contract; loop again.
    Retry,
    /// The node visit is complete; proceed to edge evaluation.
    Accept,
    /// The node visit cannot make progress; fail it.
    Escalate,
}

pub struct JudgeOutcome {
    pub verdict: Verdict,
    pub rationale: String,
}

/// Everything a judge needs to evaluate one turn, gathered by the
/// executor from the step loop's local state.
pub struct JudgeInput<'a> {
    pub node: &'a NodeSpec,
    pub turn: &'a GenerateResult,
    pub accumulator: &'a OutputAccumulator,
    pub user_interaction_count: u32,
}

#[async_trait]
pub trait Judge: Send + Sync {
    async fn evaluate(&self, input: JudgeInput<'_>) -> JudgeOutcome;
}

/// The default judge, applying the four ordered rules verbatim.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImplicitJudge;

#[async_trait]
impl Judge for ImplicitJudge {
    async fn evaluate(&self, input: JudgeInput<'_>) -> JudgeOutcome {
        // Rule 1: tool calls mean more work is pending.
        if input.turn.has_tool_calls() {
            return JudgeOutcome {
                verdict: Verdict::Continue,
                rationale: "tool calls pending".to_string(),
            };
        }

        // Rule 2: client-facing nodes must present to the user before
        // accepting on their very first interaction.
        if input.node.client_facing && input.user_interaction_count == 0 && !input.turn.has_visible_text() {
            return JudgeOutcome {
                verdict: Verdict::Retry,
                rationale: "must present to user first".to_string(),
            };
        }

        // Rule 3: required output keys (outputKeys \ nullableOutputKeys)
        // must all be set.
        let required = input.node.required_output_keys();
        let missing: Vec<&str> = required
            .into_iter()
            .filter(|k| !input.accumulator.outputs().contains_key(*k))
            .collect();
        if !missing.is_empty() {
            return JudgeOutcome {
                verdict: Verdict::Retry,
                rationale: format!("missing required outputs: {}", missing.join(", ")),
            };
        }

        // Rule 4: otherwise accept.
        JudgeOutcome {
            verdict: Verdict::Accept,
            rationale: "all required outputs set".to_string(),
        }
    }
}
