//! Memory query tools exposed to the models.
//!
//! Dispatch is a closed switch over three tool names; the tools only read
//! the seat's own memory.

use super::memory::{AgentMemory, HandRecord, ObservedAction};
use crate::engine::{SeatId, Street};
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("tool argument `{0}` is invalid")]
    BadArgument(&'static str),
}

/// Tool schemas in the OpenAI function-calling format.
pub static TOOL_DEFINITIONS: Lazy<Value> = Lazy::new(|| {
    json!([
        {
            "type": "function",
            "function": {
                "name": "recall_opponent_actions",
                "description": "Query past actions by opponents. Use this to recall betting patterns, raises, folds, and showdown information for specific opponents.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "opponent_seat": {
                            "type": "integer",
                            "description": "Filter by opponent's seat number (1-8)"
                        },
                        "opponent_name": {
                            "type": "string",
                            "description": "Filter by opponent's name"
                        },
                        "street": {
                            "type": "string",
                            "enum": ["preflop", "flop", "turn", "river"],
                            "description": "Filter by betting street"
                        },
                        "action_type": {
                            "type": "string",
                            "enum": ["fold", "call", "raise", "check", "bet"],
                            "description": "Filter by action type"
                        },
                        "limit": {
                            "type": "integer",
                            "description": "Maximum number of actions to return (default: 20)",
                            "default": 20
                        }
                    },
                    "required": []
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "recall_my_hands",
                "description": "Retrieve your own hand history and outcomes. Use this to review your past plays, results, and patterns.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "result": {
                            "type": "string",
                            "enum": ["won", "lost", "folded", "split"],
                            "description": "Filter by hand result"
                        },
                        "position": {
                            "type": "string",
                            "description": "Filter by position (BTN, SB, BB, UTG, MP, CO)"
                        },
                        "limit": {
                            "type": "integer",
                            "description": "Maximum number of hands to return (default: 10)",
                            "default": 10
                        }
                    },
                    "required": []
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "search_observations",
                "description": "Free-text search across your observation history. Use this to find hands involving specific cards, actions, or outcomes.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Search query (e.g., 'AA', 'all_in', 'river raise')"
                        },
                        "limit": {
                            "type": "integer",
                            "description": "Maximum number of results to return (default: 10)",
                            "default": 10
                        }
                    },
                    "required": ["query"]
                }
            }
        }
    ])
});

fn format_action(hand_number: u64, action: &ObservedAction) -> Value {
    json!({
        "hand_number": hand_number,
        "street": action.street,
        "seat": action.seat,
        "player": action.player_name,
        "action": action.kind,
        "amount": action.amount,
    })
}

fn format_hand_summary(hand: &HandRecord) -> Value {
    json!({
        "hand_number": hand.hand_number,
        "position": hand.my_position,
        "hole_cards": hand.my_hole_cards,
        "community_cards": hand.community_cards,
        "result": hand.result,
        "chips_won": hand.chips_won,
        "pot_size": hand.pot_size,
        "num_actions": hand.actions.len(),
    })
}

fn arg_u64(args: &Value, key: &str) -> Option<u64> {
    args.get(key).and_then(Value::as_u64)
}

fn arg_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

/// Filtered view of observed opponent actions, most recent last.
pub fn recall_opponent_actions(memory: &AgentMemory, args: &Value) -> Value {
    let opponent_seat = arg_u64(args, "opponent_seat").map(|s| s as SeatId);
    let opponent_name = arg_str(args, "opponent_name");
    let street: Option<Street> = arg_str(args, "street").and_then(|s| s.parse().ok());
    let action_type = arg_str(args, "action_type");
    let limit = arg_u64(args, "limit").unwrap_or(20) as usize;

    let mut actions = Vec::new();
    for hand in memory.hands() {
        for action in &hand.actions {
            if action.seat == memory.seat {
                continue;
            }
            if let Some(seat) = opponent_seat {
                if action.seat != seat {
                    continue;
                }
            }
            if let Some(name) = opponent_name {
                if !action.player_name.eq_ignore_ascii_case(name) {
                    continue;
                }
            }
            if let Some(street) = street {
                if action.street != street {
                    continue;
                }
            }
            if let Some(kind) = action_type {
                if !action.kind.as_str().eq_ignore_ascii_case(kind) {
                    continue;
                }
            }
            actions.push(format_action(hand.hand_number, action));
        }
    }
    let start = actions.len().saturating_sub(limit);
    let actions = &actions[start..];

    let mut showdowns = Vec::new();
    if let Some(seat) = opponent_seat {
        for hand in memory.showdowns_by_opponent(seat) {
            if let Some(cards) = hand.showdown_cards.get(&seat) {
                showdowns.push(json!({
                    "hand_number": hand.hand_number,
                    "cards": cards,
                    "community_cards": hand.community_cards,
                }));
            }
        }
    }
    let start = showdowns.len().saturating_sub(5);
    let showdowns = &showdowns[start..];

    json!({
        "total_actions_found": actions.len(),
        "actions": actions,
        "showdowns": showdowns,
    })
}

/// The seat's own hand history with win/fold counts.
pub fn recall_my_hands(memory: &AgentMemory, args: &Value) -> Value {
    let result = arg_str(args, "result");
    let position = arg_str(args, "position");
    let limit = arg_u64(args, "limit").unwrap_or(10) as usize;

    let filtered: Vec<&HandRecord> = memory
        .hands()
        .iter()
        .filter(|h| {
            result
                .map(|r| h.result.as_str().eq_ignore_ascii_case(r))
                .unwrap_or(true)
        })
        .filter(|h| {
            position
                .map(|p| h.my_position.eq_ignore_ascii_case(p))
                .unwrap_or(true)
        })
        .collect();
    let start = filtered.len().saturating_sub(limit);
    let page = &filtered[start..];

    let total = memory.hands().len();
    let wins = memory.winning_hands().len();
    let folds = memory
        .hands()
        .iter()
        .filter(|h| h.result == super::memory::HandOutcome::Folded)
        .count();

    json!({
        "total_hands_played": total,
        "wins": wins,
        "folds": folds,
        "win_rate": if total > 0 { wins as f64 / total as f64 } else { 0.0 },
        "hands": page
            .iter()
            .map(|h| {
                let mut summary = format_hand_summary(h);
                summary["actions"] = Value::Array(
                    h.actions
                        .iter()
                        .filter(|a| a.seat == memory.seat)
                        .map(|a| format_action(h.hand_number, a))
                        .collect(),
                );
                summary
            })
            .collect::<Vec<_>>(),
    })
}

/// Substring search over the denormalized observation history.
pub fn search_observations(memory: &AgentMemory, args: &Value) -> Result<Value, ToolError> {
    let query = arg_str(args, "query").ok_or(ToolError::BadArgument("query"))?;
    let limit = arg_u64(args, "limit").unwrap_or(10) as usize;

    let matches = memory.search(query);
    let start = matches.len().saturating_sub(limit);
    let page = &matches[start..];

    Ok(json!({
        "query": query,
        "matches_found": page.len(),
        "hands": page
            .iter()
            .map(|h| {
                let mut summary = format_hand_summary(h);
                summary["all_actions"] = Value::Array(
                    h.actions
                        .iter()
                        .map(|a| format_action(h.hand_number, a))
                        .collect(),
                );
                summary["showdown_cards"] = serde_json::to_value(&h.showdown_cards)
                    .unwrap_or(Value::Null);
                summary
            })
            .collect::<Vec<_>>(),
    }))
}

/// Execute one tool call against a seat's memory.
pub fn execute_tool(name: &str, memory: &AgentMemory, args: &Value) -> Result<Value, ToolError> {
    match name {
        "recall_opponent_actions" => Ok(recall_opponent_actions(memory, args)),
        "recall_my_hands" => Ok(recall_my_hands(memory, args)),
        "search_observations" => search_observations(memory, args),
        other => Err(ToolError::UnknownTool(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::memory::HandOutcome;
    use crate::engine::ActionKind;

    fn card(s: &str) -> crate::engine::Card {
        s.parse().unwrap()
    }

    fn memory() -> AgentMemory {
        let mut memory = AgentMemory::new("Hero", 1);
        for hand_number in 1..=3u64 {
            memory.start_hand(hand_number, [card("Ah"), card("Kd")], "BTN".to_string());
            memory.record_action(Street::Preflop, 2, "Villain", ActionKind::Raise, Some(10));
            memory.record_action(Street::Preflop, 1, "Hero", ActionKind::Call, Some(10));
            memory.record_action(Street::Flop, 2, "Villain", ActionKind::Check, None);
            if hand_number == 3 {
                memory.record_showdown(2, [card("Qc"), card("Qd")]);
                memory.end_hand(HandOutcome::Won, 20, 20, 120);
            } else {
                memory.end_hand(HandOutcome::Folded, 0, 20, 100);
            }
        }
        memory
    }

    #[test]
    fn recall_opponent_actions_skips_own_and_filters() {
        let memory = memory();
        let out = recall_opponent_actions(&memory, &json!({}));
        // 2 villain actions per hand, own actions excluded
        assert_eq!(out["total_actions_found"], 6);

        let out = recall_opponent_actions(&memory, &json!({"street": "flop"}));
        assert_eq!(out["total_actions_found"], 3);

        let out = recall_opponent_actions(
            &memory,
            &json!({"opponent_seat": 2, "action_type": "raise"}),
        );
        assert_eq!(out["total_actions_found"], 3);
        assert_eq!(out["showdowns"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn recall_opponent_actions_respects_limit_most_recent_last() {
        let memory = memory();
        let out = recall_opponent_actions(&memory, &json!({"limit": 2}));
        let actions = out["actions"].as_array().unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[1]["hand_number"], 3);
    }

    #[test]
    fn recall_my_hands_reports_stats_and_filters_by_result() {
        let memory = memory();
        let out = recall_my_hands(&memory, &json!({}));
        assert_eq!(out["total_hands_played"], 3);
        assert_eq!(out["wins"], 1);
        assert_eq!(out["folds"], 2);

        let out = recall_my_hands(&memory, &json!({"result": "won"}));
        assert_eq!(out["hands"].as_array().unwrap().len(), 1);
        // Own actions only in the per-hand listing.
        assert_eq!(out["hands"][0]["actions"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn search_observations_requires_a_query() {
        let memory = memory();
        assert!(search_observations(&memory, &json!({})).is_err());
        let out = search_observations(&memory, &json!({"query": "villain"})).unwrap();
        assert_eq!(out["matches_found"], 3);
    }

    #[test]
    fn unknown_tool_is_rejected() {
        let memory = memory();
        assert!(matches!(
            execute_tool("drop_tables", &memory, &json!({})),
            Err(ToolError::UnknownTool(_))
        ));
    }
}
