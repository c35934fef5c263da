//! LLM-backed agent: prompt assembly, the bounded multi-turn tool loop,
//! response parsing, validation and the forced-action fallback.

use super::memory::AgentMemory;
use super::observation::Observation;
use super::tools::{execute_tool, TOOL_DEFINITIONS};
use crate::engine::{AgentActionKind, Chips};
use crate::llm::{ChatMessage, ChatTransport, LlmResponse, TransportError};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Instant;

const LOG_TARGET: &str = "agents::driver";

pub const SYSTEM_PROMPT: &str = "You are playing No-Limit Texas Hold'em poker in a tournament. Your goal is to win chips and ultimately win the tournament.

You have access to memory tools to recall information about past hands and opponent behavior. Use these tools strategically to inform your decisions.

When you decide on an action, respond with a JSON object in this exact format:
{
  \"action\": \"fold\" | \"check\" | \"call\" | \"raise\",
  \"raise_to\": <number if raising, otherwise null>,
  \"reasoning\": \"<brief explanation of your decision>\"
}

Important rules:
- Use \"check\" when there's nothing to call (amount to call is 0)
- Use \"call\" when facing a bet you want to match
- If raising, \"raise_to\" is the TOTAL amount you're putting in (not the additional amount)
- You can only raise if \"raise\" is in your legal_actions
- If you can't afford the minimum raise, you can go all-in
- Always provide reasoning for your decision

Think step by step about:
1. Your hand strength and potential
2. Your position and stack size
3. Opponent tendencies (use tools to recall)
4. Pot odds and implied odds
5. Tournament considerations (stack preservation vs. accumulation)";

/// The action a driver hands back to the runner.
#[derive(Clone, Debug, Serialize)]
pub struct AgentAction {
    pub kind: AgentActionKind,
    pub raise_to: Option<Chips>,
    pub reasoning: String,
    pub forced: bool,
    pub retries: u32,
    pub thinking_ms: f64,
}

/// Full trace of a single decision point, handed to the agent logger.
#[derive(Clone, Debug, Default, Serialize)]
pub struct DecisionTrace {
    pub observation: Value,
    pub street: String,
    pub messages: Vec<ChatMessage>,
    pub tool_calls: Vec<Value>,
    pub llm_responses: Vec<Value>,
    pub final_action: Option<Value>,
    pub retries: u32,
    pub error: Option<String>,
    pub forced: bool,
    pub thinking_ms: f64,
}

/// A seat-bound decision maker. Drivers own their seat's memory; the
/// manager routes engine events into it between decisions.
#[async_trait]
pub trait PokerAgent: Send {
    fn name(&self) -> &str;
    fn memory(&self) -> &AgentMemory;
    fn memory_mut(&mut self) -> &mut AgentMemory;
    async fn decide(&mut self, observation: &Observation) -> AgentAction;

    fn traces(&self) -> &[DecisionTrace] {
        &[]
    }
    fn last_trace(&self) -> Option<&DecisionTrace> {
        self.traces().last()
    }
    fn reset(&mut self) {}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedDecision {
    pub kind: AgentActionKind,
    pub raise_to: Option<Chips>,
    pub reasoning: String,
}

/// Content of the first fenced code block (with or without a language tag)
/// that looks like a decision object.
fn extract_fenced_block(text: &str) -> Option<&str> {
    let mut rest = text;
    loop {
        let open = rest.find("```")?;
        let after_ticks = &rest[open + 3..];
        let body_start = after_ticks.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_ticks[body_start..];
        let close = body.find("```")?;
        let content = body[..close].trim();
        if content.contains("\"action\"") && content.contains('{') {
            return Some(content);
        }
        rest = &body[close + 3..];
    }
}

/// First JSON object in `text` containing an `action` key. Trailing prose
/// after the object is tolerated.
fn first_object_with_action(text: &str) -> Option<Value> {
    for (idx, _) in text.match_indices('{') {
        let mut stream = serde_json::Deserializer::from_str(&text[idx..]).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            if value.is_object() && value.get("action").is_some() {
                return Some(value);
            }
        }
    }
    None
}

fn value_as_chips(value: &Value) -> Option<Chips> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    if let Some(f) = value.as_f64() {
        if f >= 0.0 {
            return Some(f as Chips);
        }
    }
    value.as_str().and_then(|s| s.trim().parse().ok())
}

/// Parse a terminal model response into a decision. Accepts plain JSON,
/// JSON in a fenced block, and JSON embedded in surrounding prose. A
/// "raise" without `raise_to` is a protocol error and parses to `None`.
pub fn parse_decision(text: &str) -> Option<ParsedDecision> {
    let data = if let Some(block) = extract_fenced_block(text) {
        first_object_with_action(block).or_else(|| serde_json::from_str(block).ok())?
    } else {
        first_object_with_action(text).or_else(|| serde_json::from_str(text).ok())?
    };

    let kind: AgentActionKind = data.get("action")?.as_str()?.parse().ok()?;
    let raise_to = data.get("raise_to").filter(|v| !v.is_null());
    let raise_to = match raise_to {
        Some(value) => Some(value_as_chips(value)?),
        None => None,
    };
    if kind == AgentActionKind::Raise && raise_to.is_none() {
        return None;
    }
    let reasoning = data
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Some(ParsedDecision {
        kind,
        raise_to,
        reasoning,
    })
}

/// Validate a parsed decision against the observation's legal set and
/// raise bounds. Returns a corrective message on failure.
fn validate_decision(decision: &ParsedDecision, observation: &Observation) -> Result<(), String> {
    if !observation.may(decision.kind) {
        return Err(format!(
            "Action '{}' not in legal actions: {}",
            decision.kind,
            observation
                .legal_actions
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    if decision.kind == AgentActionKind::Raise {
        let Some(raise_to) = decision.raise_to else {
            return Err("Raise action requires raise_to amount".to_string());
        };
        if raise_to < observation.min_raise_to && raise_to < observation.my_stack {
            return Err(format!(
                "Raise to {raise_to} below minimum {}",
                observation.min_raise_to
            ));
        }
        if raise_to > observation.max_raise_to {
            return Err(format!(
                "Raise to {raise_to} exceeds maximum {}",
                observation.max_raise_to
            ));
        }
    }
    Ok(())
}

/// LLM-backed poker agent with the multi-turn tool protocol.
pub struct LlmAgent {
    name: String,
    transport: Box<dyn ChatTransport>,
    max_retries: u32,
    max_turns: u32,
    memory: AgentMemory,
    traces: Vec<DecisionTrace>,
}

impl LlmAgent {
    pub fn new(
        name: impl Into<String>,
        seat: crate::engine::SeatId,
        transport: Box<dyn ChatTransport>,
    ) -> Self {
        let name = name.into();
        Self {
            memory: AgentMemory::new(name.clone(), seat),
            name,
            transport,
            max_retries: 3,
            max_turns: 5,
            traces: Vec::new(),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn model(&self) -> &str {
        self.transport.model()
    }

    /// The bounded tool loop: call the model, execute any requested tools
    /// against this seat's memory, and repeat until a terminal text
    /// response or the turn cap. Tool calls are serialized; memory is
    /// read-only to them.
    async fn run_tool_loop(
        &self,
        messages: &[ChatMessage],
        trace: &mut DecisionTrace,
    ) -> Result<LlmResponse, TransportError> {
        let mut current: Vec<ChatMessage> = messages.to_vec();
        let preserve_blocks = self.transport.preserve_reasoning_blocks();

        let mut response = self
            .transport
            .call(&current, Some(&TOOL_DEFINITIONS))
            .await?;
        for _ in 1..self.max_turns {
            trace.llm_responses.push(json!({
                "content": response.content,
                "reasoning_content": response.reasoning_content,
                "usage": response.usage,
                "latency_ms": response.latency_ms,
            }));
            if response.tool_calls.is_empty() {
                return Ok(response);
            }

            let mut assistant = ChatMessage {
                role: "assistant".to_string(),
                content: response.content.clone(),
                tool_calls: Some(response.tool_calls.clone()),
                tool_call_id: None,
                reasoning_details: None,
            };
            if preserve_blocks {
                // Some providers require reasoning blocks echoed verbatim.
                assistant.reasoning_details = response.reasoning_details.clone();
            }
            current.push(assistant);

            for call in &response.tool_calls {
                let args: Value =
                    serde_json::from_str(&call.function.arguments).unwrap_or_else(|_| json!({}));
                let result = match execute_tool(&call.function.name, &self.memory, &args) {
                    Ok(result) => result,
                    Err(err) => json!({"error": err.to_string()}),
                };
                let result_str = result.to_string();
                trace.tool_calls.push(json!({
                    "tool_name": call.function.name,
                    "arguments": args,
                    "result": result_str,
                }));
                current.push(ChatMessage::tool_result(call.id.clone(), result_str));
            }

            response = self
                .transport
                .call(&current, Some(&TOOL_DEFINITIONS))
                .await?;
        }

        trace.llm_responses.push(json!({
            "content": response.content,
            "reasoning_content": response.reasoning_content,
            "usage": response.usage,
            "latency_ms": response.latency_ms,
        }));
        Ok(response)
    }

    fn forced_action(&self, observation: &Observation, retries: u32, thinking_ms: f64) -> AgentAction {
        // Prefer the free action when the pot is unopened.
        let kind = if observation.may(AgentActionKind::Check) {
            AgentActionKind::Check
        } else {
            AgentActionKind::Fold
        };
        AgentAction {
            kind,
            raise_to: None,
            reasoning: "Forced action after exhausting retries".to_string(),
            forced: true,
            retries,
            thinking_ms,
        }
    }
}

#[async_trait]
impl PokerAgent for LlmAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn memory(&self) -> &AgentMemory {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut AgentMemory {
        &mut self.memory
    }

    fn traces(&self) -> &[DecisionTrace] {
        &self.traces
    }

    fn reset(&mut self) {
        self.memory = AgentMemory::new(self.name.clone(), self.memory.seat);
        self.traces.clear();
    }

    async fn decide(&mut self, observation: &Observation) -> AgentAction {
        let started = Instant::now();
        let mut trace = DecisionTrace {
            observation: serde_json::to_value(observation).unwrap_or(Value::Null),
            street: observation.street.to_string(),
            ..Default::default()
        };

        let mut messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(observation.render_prompt()),
        ];

        let mut retries = 0u32;
        while retries <= self.max_retries {
            let response = match self.run_tool_loop(&messages, &mut trace).await {
                Ok(response) => response,
                Err(err) => {
                    tracing::warn!(
                        target: LOG_TARGET,
                        agent = %self.name,
                        error = %err,
                        "transport failure during decision"
                    );
                    trace.error = Some(err.to_string());
                    retries += 1;
                    trace.retries = retries;
                    continue;
                }
            };

            // Thinking models may leave the text channel empty and answer
            // on the reasoning channel instead.
            let response_text = response
                .content
                .clone()
                .filter(|c| !c.trim().is_empty())
                .or(response.reasoning_content.clone());

            let Some(response_text) = response_text else {
                retries += 1;
                trace.retries = retries;
                messages.push(ChatMessage::user(
                    "Please provide your action decision in the required JSON format.",
                ));
                continue;
            };

            let Some(decision) = parse_decision(&response_text) else {
                retries += 1;
                trace.retries = retries;
                messages.push(ChatMessage::assistant(response_text));
                messages.push(ChatMessage::user(
                    "Invalid response format. Please respond with a JSON object containing 'action', 'raise_to' (if raising), and 'reasoning'.",
                ));
                continue;
            };

            if let Err(error) = validate_decision(&decision, observation) {
                retries += 1;
                trace.retries = retries;
                messages.push(ChatMessage::assistant(response_text));
                messages.push(ChatMessage::user(format!(
                    "Invalid action: {error}. Please choose a valid action."
                )));
                continue;
            }

            let thinking_ms = started.elapsed().as_secs_f64() * 1000.0;
            let action = AgentAction {
                kind: decision.kind,
                raise_to: decision.raise_to,
                reasoning: decision.reasoning,
                forced: false,
                retries,
                thinking_ms,
            };
            trace.final_action = serde_json::to_value(&action).ok();
            trace.thinking_ms = thinking_ms;
            trace.messages = messages;
            self.traces.push(trace);
            return action;
        }

        let thinking_ms = started.elapsed().as_secs_f64() * 1000.0;
        let action = self.forced_action(observation, self.max_retries, thinking_ms);
        tracing::warn!(
            target: LOG_TARGET,
            agent = %self.name,
            action = %action.kind,
            "max retries exceeded, forcing action"
        );
        trace.error = Some(format!(
            "Max retries ({}) exceeded, forcing {}",
            self.max_retries, action.kind
        ));
        trace.forced = true;
        trace.final_action = serde_json::to_value(&action).ok();
        trace.thinking_ms = thinking_ms;
        trace.messages = messages;
        self.traces.push(trace);
        action
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let decision =
            parse_decision(r#"{"action": "call", "raise_to": null, "reasoning": "pot odds"}"#)
                .unwrap();
        assert_eq!(decision.kind, AgentActionKind::Call);
        assert_eq!(decision.raise_to, None);
        assert_eq!(decision.reasoning, "pot odds");
    }

    #[test]
    fn parses_fenced_block_with_language_tag() {
        let text = "Let me think.\n```json\n{\"action\": \"raise\", \"raise_to\": 40, \"reasoning\": \"value\"}\n```\nDone.";
        let decision = parse_decision(text).unwrap();
        assert_eq!(decision.kind, AgentActionKind::Raise);
        assert_eq!(decision.raise_to, Some(40));
    }

    #[test]
    fn parses_fenced_block_without_language_tag() {
        let text = "```\n{\"action\": \"fold\", \"reasoning\": \"weak\"}\n```";
        let decision = parse_decision(text).unwrap();
        assert_eq!(decision.kind, AgentActionKind::Fold);
    }

    #[test]
    fn parses_json_embedded_in_prose() {
        let text = "I will call here. {\"action\": \"check\", \"raise_to\": null, \"reasoning\": \"free card\"} That is my move.";
        let decision = parse_decision(text).unwrap();
        assert_eq!(decision.kind, AgentActionKind::Check);
    }

    #[test]
    fn skips_code_blocks_without_a_decision() {
        let text =
            "```\nsome example\n```\n```json\n{\"action\": \"call\", \"reasoning\": \"ok\"}\n```";
        let decision = parse_decision(text).unwrap();
        assert_eq!(decision.kind, AgentActionKind::Call);
    }

    #[test]
    fn action_is_case_insensitive() {
        let decision = parse_decision(r#"{"action": "CHECK", "reasoning": ""}"#).unwrap();
        assert_eq!(decision.kind, AgentActionKind::Check);
    }

    #[test]
    fn raise_without_amount_is_a_protocol_error() {
        assert!(parse_decision(r#"{"action": "raise", "reasoning": "big"}"#).is_none());
        assert!(parse_decision(r#"{"action": "raise", "raise_to": null}"#).is_none());
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(parse_decision(r#"{"action": "shove", "reasoning": ""}"#).is_none());
        assert!(parse_decision("no json here at all").is_none());
    }

    #[test]
    fn raise_to_accepts_numeric_strings() {
        let decision = parse_decision(r#"{"action": "raise", "raise_to": "60"}"#).unwrap();
        assert_eq!(decision.raise_to, Some(60));
    }

    #[test]
    fn validate_rejects_illegal_kind_and_bad_bounds() {
        let mut obs = test_observation();
        obs.legal_actions = vec![AgentActionKind::Fold, AgentActionKind::Call];
        let decision = ParsedDecision {
            kind: AgentActionKind::Check,
            raise_to: None,
            reasoning: String::new(),
        };
        assert!(validate_decision(&decision, &obs).is_err());

        obs.legal_actions = vec![
            AgentActionKind::Fold,
            AgentActionKind::Call,
            AgentActionKind::Raise,
        ];
        let below_min = ParsedDecision {
            kind: AgentActionKind::Raise,
            raise_to: Some(5),
            reasoning: String::new(),
        };
        assert!(validate_decision(&below_min, &obs).is_err());

        let over_max = ParsedDecision {
            kind: AgentActionKind::Raise,
            raise_to: Some(1_000),
            reasoning: String::new(),
        };
        assert!(validate_decision(&over_max, &obs).is_err());

        // All-in below the minimum is accepted.
        let mut short = obs.clone();
        short.my_stack = 10;
        short.min_raise_to = 30;
        short.max_raise_to = 12;
        let all_in_short = ParsedDecision {
            kind: AgentActionKind::Raise,
            raise_to: Some(10),
            reasoning: String::new(),
        };
        assert!(validate_decision(&all_in_short, &short).is_ok());
    }

    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a script of responses; repeats the last one when exhausted.
    struct ScriptedTransport {
        responses: Mutex<VecDeque<LlmResponse>>,
        last: LlmResponse,
    }

    impl ScriptedTransport {
        fn boxed(script: Vec<LlmResponse>) -> Box<dyn ChatTransport> {
            let last = script.last().cloned().unwrap_or_else(|| text_response(""));
            Box::new(Self {
                responses: Mutex::new(script.into()),
                last,
            })
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        fn model(&self) -> &str {
            "test/scripted"
        }

        fn preserve_reasoning_blocks(&self) -> bool {
            true
        }

        async fn call(
            &self,
            _messages: &[ChatMessage],
            _tools: Option<&Value>,
        ) -> Result<LlmResponse, TransportError> {
            let mut responses = self.responses.lock().unwrap();
            Ok(responses.pop_front().unwrap_or_else(|| self.last.clone()))
        }
    }

    fn text_response(text: &str) -> LlmResponse {
        LlmResponse {
            content: Some(text.to_string()),
            reasoning_content: None,
            reasoning_details: None,
            tool_calls: vec![],
            usage: Default::default(),
            model: "test/scripted".to_string(),
            provider: None,
            latency_ms: 1.0,
        }
    }

    fn tool_call_response(name: &str, arguments: &str) -> LlmResponse {
        LlmResponse {
            tool_calls: vec![crate::llm::ToolCall {
                id: "call_1".to_string(),
                kind: "function".to_string(),
                function: crate::llm::ToolFunction {
                    name: name.to_string(),
                    arguments: arguments.to_string(),
                },
            }],
            ..text_response("")
        }
    }

    #[tokio::test]
    async fn valid_decision_passes_through() {
        let transport = ScriptedTransport::boxed(vec![text_response(
            r#"{"action": "call", "raise_to": null, "reasoning": "priced in"}"#,
        )]);
        let mut agent = LlmAgent::new("Hero", 1, transport);
        let action = agent.decide(&test_observation()).await;
        assert_eq!(action.kind, AgentActionKind::Call);
        assert!(!action.forced);
        assert_eq!(action.retries, 0);
        assert_eq!(agent.traces().len(), 1);
        assert!(agent.last_trace().unwrap().final_action.is_some());
    }

    #[tokio::test]
    async fn illegal_action_consumes_retries_then_forces_fold() {
        // A model that insists on "check" while facing a bet: every attempt
        // consumes one retry with a corrective message, then the driver
        // forces a fold (check is not legal here).
        let transport = ScriptedTransport::boxed(vec![text_response(
            r#"{"action": "check", "reasoning": "free"}"#,
        )]);
        let mut agent = LlmAgent::new("Hero", 1, transport).with_max_retries(3);
        let obs = test_observation(); // to_call = 2, check not legal
        let action = agent.decide(&obs).await;
        assert_eq!(action.kind, AgentActionKind::Fold);
        assert!(action.forced);
        assert_eq!(action.retries, 3);

        let trace = agent.last_trace().unwrap();
        assert!(trace.forced);
        assert!(trace
            .messages
            .iter()
            .any(|m| m.content.as_deref().is_some_and(|c| c.contains("Invalid action"))));
    }

    #[tokio::test]
    async fn forced_action_is_check_when_legal() {
        let transport = ScriptedTransport::boxed(vec![text_response("not json, ever")]);
        let mut agent = LlmAgent::new("Hero", 1, transport).with_max_retries(1);
        let mut obs = test_observation();
        obs.to_call = 0;
        obs.legal_actions = vec![AgentActionKind::Check, AgentActionKind::Raise];
        let action = agent.decide(&obs).await;
        assert_eq!(action.kind, AgentActionKind::Check);
        assert!(action.forced);
    }

    #[tokio::test]
    async fn tool_calls_run_against_memory_before_the_decision() {
        let transport = ScriptedTransport::boxed(vec![
            tool_call_response("recall_my_hands", r#"{"limit": 5}"#),
            text_response(r#"{"action": "fold", "reasoning": "nothing here"}"#),
        ]);
        let mut agent = LlmAgent::new("Hero", 1, transport);
        let action = agent.decide(&test_observation()).await;
        assert_eq!(action.kind, AgentActionKind::Fold);
        let trace = agent.last_trace().unwrap();
        assert_eq!(trace.tool_calls.len(), 1);
        assert_eq!(trace.tool_calls[0]["tool_name"], "recall_my_hands");
    }

    #[tokio::test]
    async fn empty_response_consumes_one_retry() {
        let empty = LlmResponse {
            content: Some("   ".to_string()),
            ..text_response("")
        };
        let transport = ScriptedTransport::boxed(vec![
            empty,
            text_response(r#"{"action": "call", "reasoning": "ok"}"#),
        ]);
        let mut agent = LlmAgent::new("Hero", 1, transport);
        let action = agent.decide(&test_observation()).await;
        assert_eq!(action.kind, AgentActionKind::Call);
        assert_eq!(action.retries, 1);
    }

    fn test_observation() -> Observation {
        Observation {
            hand_number: 1,
            street: crate::engine::Street::Preflop,
            my_seat: 1,
            my_position: "BTN".to_string(),
            my_hole_cards: ["Ah".parse().unwrap(), "Kd".parse().unwrap()],
            my_stack: 200,
            community_cards: vec![],
            pot_size: 3,
            to_call: 2,
            min_raise_to: 4,
            max_raise_to: 200,
            small_blind: 1,
            big_blind: 2,
            button_seat: 1,
            players: vec![],
            actions_this_hand: vec![],
            legal_actions: vec![
                AgentActionKind::Fold,
                AgentActionKind::Call,
                AgentActionKind::Raise,
            ],
        }
    }
}
