//! Benchmark configuration: serde structs with defaults plus a post-parse
//! validation pass.

use crate::engine::{BlindLevel, Chips};
use crate::llm::{ProviderSettings, ReasoningSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("blind schedule cannot be empty")]
    EmptySchedule,
    #[error("last blind level must have no hand count (infinite)")]
    FiniteLastLevel,
    #[error("blind level {level}: requires 0 < sb < bb (got sb={sb}, bb={bb})")]
    BadBlinds { level: usize, sb: Chips, bb: Chips },
    #[error("big blind must strictly increase across levels (level {level})")]
    NonIncreasingBlinds { level: usize },
    #[error("number of agents ({agents}) must match tournament seats ({seats})")]
    AgentCountMismatch { agents: usize, seats: usize },
    #[error("tournament seats must be between 2 and 8 (got {0})")]
    BadSeatCount(u32),
    #[error("tournament requires num_runs >= 1")]
    BadRunCount,
    #[error("starting stack must be at least 1")]
    BadStartingStack,
    #[error("agent_settings.max_retries must be at least 1")]
    BadMaxRetries,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlindLevelConfig {
    /// `None` means the level is final and serves indefinitely.
    #[serde(default)]
    pub hands: Option<u32>,
    pub sb: Chips,
    pub bb: Chips,
}

fn default_num_runs() -> u32 {
    10
}

fn default_seats() -> u32 {
    6
}

fn default_starting_stack() -> Chips {
    200
}

fn default_seed_base() -> u64 {
    42
}

fn default_blind_schedule() -> Vec<BlindLevelConfig> {
    vec![
        BlindLevelConfig { hands: Some(20), sb: 1, bb: 2 },
        BlindLevelConfig { hands: Some(20), sb: 2, bb: 4 },
        BlindLevelConfig { hands: Some(20), sb: 4, bb: 8 },
        BlindLevelConfig { hands: Some(20), sb: 8, bb: 16 },
        BlindLevelConfig { hands: Some(20), sb: 16, bb: 32 },
        BlindLevelConfig { hands: None, sb: 32, bb: 64 },
    ]
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TournamentSettings {
    pub num_runs: u32,
    pub seats: u32,
    pub starting_stack: Chips,
    pub blind_schedule: Vec<BlindLevelConfig>,
    pub seed_base: u64,
}

impl Default for TournamentSettings {
    fn default() -> Self {
        Self {
            num_runs: default_num_runs(),
            seats: default_seats(),
            starting_stack: default_starting_stack(),
            blind_schedule: default_blind_schedule(),
            seed_base: default_seed_base(),
        }
    }
}

fn default_model() -> String {
    "openai/gpt-4o".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Per-agent reasoning config; overrides the global default.
    #[serde(default)]
    pub reasoning: Option<ReasoningSettings>,
    /// OpenRouter provider preferences for this agent.
    #[serde(default)]
    pub provider: Option<ProviderSettings>,
}

fn default_max_retries() -> u32 {
    3
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettingsConfig {
    pub max_retries: u32,
    pub reasoning: Option<ReasoningSettings>,
}

impl Default for AgentSettingsConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            reasoning: None,
        }
    }
}

fn default_log_dir() -> String {
    "./logs".to_string()
}

fn default_verbose() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub log_dir: String,
    pub verbose: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            verbose: default_verbose(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    pub tournament: TournamentSettings,
    pub agents: Vec<AgentConfig>,
    pub agent_settings: AgentSettingsConfig,
    pub output: OutputConfig,
}

impl BenchmarkConfig {
    /// Semantic validation over the parsed config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tournament.num_runs < 1 {
            return Err(ConfigError::BadRunCount);
        }
        if !(2..=8).contains(&self.tournament.seats) {
            return Err(ConfigError::BadSeatCount(self.tournament.seats));
        }
        if self.tournament.starting_stack < 1 {
            return Err(ConfigError::BadStartingStack);
        }
        if self.agent_settings.max_retries < 1 {
            return Err(ConfigError::BadMaxRetries);
        }

        let schedule = &self.tournament.blind_schedule;
        if schedule.is_empty() {
            return Err(ConfigError::EmptySchedule);
        }
        if schedule[schedule.len() - 1].hands.is_some() {
            return Err(ConfigError::FiniteLastLevel);
        }
        for (i, level) in schedule.iter().enumerate() {
            if level.sb == 0 || level.bb <= level.sb {
                return Err(ConfigError::BadBlinds {
                    level: i + 1,
                    sb: level.sb,
                    bb: level.bb,
                });
            }
        }
        for (i, pair) in schedule.windows(2).enumerate() {
            if pair[1].bb <= pair[0].bb {
                return Err(ConfigError::NonIncreasingBlinds { level: i + 2 });
            }
        }

        if self.agents.len() != self.tournament.seats as usize {
            return Err(ConfigError::AgentCountMismatch {
                agents: self.agents.len(),
                seats: self.tournament.seats as usize,
            });
        }
        Ok(())
    }

    /// Blind schedule in engine form.
    pub fn blind_levels(&self) -> Vec<BlindLevel> {
        self.tournament
            .blind_schedule
            .iter()
            .enumerate()
            .map(|(i, level)| BlindLevel {
                level: i as u32 + 1,
                hands: level.hands,
                small_blind: level.sb,
                big_blind: level.bb,
            })
            .collect()
    }
}

/// Load and validate a config file.
pub fn load_config(path: impl AsRef<Path>) -> Result<BenchmarkConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let data = std::fs::read_to_string(path)?;
    let config: BenchmarkConfig = serde_json::from_str(&data)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agents(n: usize) -> Vec<AgentConfig> {
        (0..n)
            .map(|i| AgentConfig {
                name: format!("Agent_{}", i + 1),
                model: default_model(),
                reasoning: None,
                provider: None,
            })
            .collect()
    }

    #[test]
    fn default_config_with_matching_agents_validates() {
        let config = BenchmarkConfig {
            agents: agents(6),
            ..Default::default()
        };
        config.validate().unwrap();
        assert_eq!(config.blind_levels().len(), 6);
        assert_eq!(config.blind_levels()[0].big_blind, 2);
    }

    #[test]
    fn agent_count_must_match_seats() {
        let config = BenchmarkConfig {
            agents: agents(4),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::AgentCountMismatch { agents: 4, seats: 6 })
        ));
    }

    #[test]
    fn last_level_must_be_infinite() {
        let mut config = BenchmarkConfig {
            agents: agents(6),
            ..Default::default()
        };
        config.tournament.blind_schedule = vec![BlindLevelConfig {
            hands: Some(20),
            sb: 1,
            bb: 2,
        }];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::FiniteLastLevel)
        ));
    }

    #[test]
    fn big_blind_must_strictly_increase() {
        let mut config = BenchmarkConfig {
            agents: agents(6),
            ..Default::default()
        };
        config.tournament.blind_schedule = vec![
            BlindLevelConfig { hands: Some(20), sb: 2, bb: 4 },
            BlindLevelConfig { hands: None, sb: 2, bb: 4 },
        ];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonIncreasingBlinds { level: 2 })
        ));
    }

    #[test]
    fn minimal_json_parses_with_defaults() {
        let json = r#"{
            "tournament": {"seats": 2, "num_runs": 1},
            "agents": [
                {"name": "A", "model": "openai/gpt-4o-mini"},
                {"name": "B"}
            ]
        }"#;
        let config: BenchmarkConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
        assert_eq!(config.tournament.starting_stack, 200);
        assert_eq!(config.agents[1].model, "openai/gpt-4o");
        assert_eq!(config.output.log_dir, "./logs");
    }

    #[test]
    fn reasoning_and_provider_settings_parse() {
        let json = r#"{
            "tournament": {"seats": 2, "num_runs": 1},
            "agent_settings": {"max_retries": 5, "reasoning": {"enabled": true, "effort": "high"}},
            "agents": [
                {"name": "A", "provider": {"order": ["anthropic"], "data_collection": "deny"}},
                {"name": "B", "reasoning": {"enabled": false}}
            ]
        }"#;
        let config: BenchmarkConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
        assert_eq!(config.agent_settings.max_retries, 5);
        assert_eq!(
            config.agent_settings.reasoning.as_ref().unwrap().effort.as_deref(),
            Some("high")
        );
        let provider = config.agents[0].provider.as_ref().unwrap();
        assert_eq!(provider.order.as_ref().unwrap()[0], "anthropic");
    }
}
