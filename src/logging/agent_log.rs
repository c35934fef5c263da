//! Per-hand agent decision traces persisted as `agents/hand_NNN.json`.

use crate::agents::DecisionTrace;
use crate::engine::SeatId;
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Aggregate decision stats per agent, consumed by the reporter.
#[derive(Clone, Debug, Default, Serialize)]
pub struct AgentStats {
    pub agent_name: String,
    pub seat: SeatId,
    pub total_decisions: u64,
    pub total_retries: u64,
    pub forced_actions: u64,
    pub total_thinking_ms: f64,
}

/// Collects full decision traces per seat and writes one JSON file per
/// hand, plus running per-agent stats.
pub struct AgentLogger {
    agents_dir: PathBuf,
    names: BTreeMap<SeatId, String>,
    stats: BTreeMap<SeatId, AgentStats>,
    current_hand: Vec<Value>,
}

impl AgentLogger {
    pub fn new(log_dir: impl AsRef<Path>) -> Result<Self> {
        let agents_dir = log_dir.as_ref().join("agents");
        fs::create_dir_all(&agents_dir)
            .with_context(|| format!("creating agent log dir {}", agents_dir.display()))?;
        Ok(Self {
            agents_dir,
            names: BTreeMap::new(),
            stats: BTreeMap::new(),
            current_hand: Vec::new(),
        })
    }

    pub fn register_agent(&mut self, seat: SeatId, name: impl Into<String>) {
        let name = name.into();
        self.names.insert(seat, name.clone());
        self.stats.insert(
            seat,
            AgentStats {
                agent_name: name,
                seat,
                ..Default::default()
            },
        );
    }

    pub fn start_hand(&mut self) {
        self.current_hand.clear();
    }

    /// Record one decision point with its full trace.
    pub fn log_decision(&mut self, seat: SeatId, hand_number: u64, trace: &DecisionTrace) {
        let name = self
            .names
            .get(&seat)
            .cloned()
            .unwrap_or_else(|| format!("Agent_{seat}"));
        let mut decision = json!({
            "seat": seat,
            "agent_name": name,
            "hand_number": hand_number,
            "street": trace.street,
            "observation": trace.observation,
            "conversation": trace.messages,
            "tool_calls": trace.tool_calls,
            "llm_responses": trace.llm_responses,
            "final_action": trace.final_action,
            "thinking_ms": (trace.thinking_ms * 10.0).round() / 10.0,
            "retries": trace.retries,
            "forced": trace.forced,
        });
        if let Some(error) = &trace.error {
            decision["error"] = json!(error);
        }
        self.current_hand.push(decision);

        if let Some(stats) = self.stats.get_mut(&seat) {
            stats.total_decisions += 1;
            stats.total_retries += trace.retries as u64;
            if trace.forced {
                stats.forced_actions += 1;
            }
            stats.total_thinking_ms += trace.thinking_ms;
        }
    }

    /// Write this hand's decisions to `agents/hand_NNN.json`.
    pub fn end_hand(&mut self, hand_number: u64) -> Result<()> {
        if self.current_hand.is_empty() {
            return Ok(());
        }
        let path = self.agents_dir.join(format!("hand_{hand_number:03}.json"));
        let body = json!({
            "hand_number": hand_number,
            "decisions": self.current_hand,
        });
        fs::write(&path, serde_json::to_string_pretty(&body)?)
            .with_context(|| format!("writing {}", path.display()))?;
        self.current_hand.clear();
        Ok(())
    }

    pub fn stats(&self) -> Vec<&AgentStats> {
        self.stats.values().collect()
    }

    /// Final per-agent summary file with aggregate stats.
    pub fn save_summary(&self) -> Result<()> {
        let path = self.agents_dir.join("stats.json");
        let body: Vec<Value> = self
            .stats
            .values()
            .map(|s| serde_json::to_value(s).unwrap_or(Value::Null))
            .collect();
        fs::write(&path, serde_json::to_string_pretty(&body)?)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "poker_bench_agent_log_{tag}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn trace(retries: u32, forced: bool) -> DecisionTrace {
        DecisionTrace {
            street: "preflop".to_string(),
            retries,
            forced,
            thinking_ms: 120.0,
            ..Default::default()
        }
    }

    #[test]
    fn decisions_accumulate_stats_and_write_per_hand_files() {
        let dir = temp_dir("stats");
        let mut logger = AgentLogger::new(&dir).unwrap();
        logger.register_agent(1, "A");
        logger.register_agent(2, "B");

        logger.start_hand();
        logger.log_decision(1, 1, &trace(0, false));
        logger.log_decision(2, 1, &trace(2, true));
        logger.end_hand(1).unwrap();

        let data = fs::read_to_string(dir.join("agents/hand_001.json")).unwrap();
        let parsed: Value = serde_json::from_str(&data).unwrap();
        assert_eq!(parsed["decisions"].as_array().unwrap().len(), 2);
        assert_eq!(parsed["decisions"][1]["forced"], true);

        let stats = logger.stats();
        let b = stats.iter().find(|s| s.agent_name == "B").unwrap();
        assert_eq!(b.total_decisions, 1);
        assert_eq!(b.total_retries, 2);
        assert_eq!(b.forced_actions, 1);

        logger.save_summary().unwrap();
        assert!(dir.join("agents/stats.json").exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_hand_writes_no_file() {
        let dir = temp_dir("empty");
        let mut logger = AgentLogger::new(&dir).unwrap();
        logger.register_agent(1, "A");
        logger.start_hand();
        logger.end_hand(7).unwrap();
        assert!(!dir.join("agents/hand_007.json").exists());
        let _ = fs::remove_dir_all(&dir);
    }
}
