//! Cross-run aggregation: per-run results files, summary.json and the
//! terminal leaderboard.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Result from a single tournament run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TournamentResult {
    pub run_number: u32,
    pub seed: u64,
    pub total_hands: u64,
    /// agent name -> placement (1 = winner)
    pub placements: BTreeMap<String, u32>,
    #[serde(default)]
    pub agent_stats: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Serialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub avg_placement: f64,
    pub wins: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct AgentSummary {
    pub avg_placement: f64,
    pub wins: u32,
    pub placements: Vec<u32>,
    pub invalid_action_rate: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct Telemetry {
    pub total_hands: u64,
    pub avg_hands_per_tournament: f64,
    pub invalid_action_rate: BTreeMap<String, f64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Summary {
    pub num_runs: usize,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub agent_details: BTreeMap<String, AgentSummary>,
    pub telemetry: Telemetry,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Append-only sink for run results; generates the final summary.
pub struct Reporter {
    log_dir: PathBuf,
    results: Vec<TournamentResult>,
}

impl Reporter {
    pub fn new(log_dir: impl AsRef<Path>) -> Self {
        Self {
            log_dir: log_dir.as_ref().to_path_buf(),
            results: Vec::new(),
        }
    }

    pub fn add_result(&mut self, result: TournamentResult) {
        self.results.push(result);
    }

    pub fn results(&self) -> &[TournamentResult] {
        &self.results
    }

    pub fn generate_summary(&self) -> Summary {
        let mut all_agents: BTreeSet<String> = BTreeSet::new();
        for result in &self.results {
            all_agents.extend(result.placements.keys().cloned());
        }

        let mut agent_details: BTreeMap<String, AgentSummary> = BTreeMap::new();
        for name in &all_agents {
            let mut placements = Vec::new();
            let mut wins = 0u32;
            let mut total_retries = 0u64;
            let mut total_decisions = 0u64;

            for result in &self.results {
                if let Some(&placement) = result.placements.get(name) {
                    placements.push(placement);
                    if placement == 1 {
                        wins += 1;
                    }
                }
                if let Some(stats) = result.agent_stats.get(name) {
                    total_retries += stats
                        .get("total_retries")
                        .and_then(Value::as_u64)
                        .unwrap_or(0);
                    total_decisions += stats
                        .get("total_decisions")
                        .and_then(Value::as_u64)
                        .unwrap_or(0);
                }
            }

            let avg_placement = if placements.is_empty() {
                0.0
            } else {
                placements.iter().map(|&p| p as f64).sum::<f64>() / placements.len() as f64
            };
            let invalid_action_rate = if total_decisions > 0 {
                round4(total_retries as f64 / total_decisions as f64)
            } else {
                0.0
            };

            agent_details.insert(
                name.clone(),
                AgentSummary {
                    avg_placement: round2(avg_placement),
                    wins,
                    placements,
                    invalid_action_rate,
                },
            );
        }

        let mut leaderboard: Vec<LeaderboardEntry> = agent_details
            .iter()
            .map(|(name, details)| LeaderboardEntry {
                name: name.clone(),
                avg_placement: details.avg_placement,
                wins: details.wins,
            })
            .collect();
        leaderboard.sort_by(|a, b| {
            a.avg_placement
                .partial_cmp(&b.avg_placement)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let total_hands: u64 = self.results.iter().map(|r| r.total_hands).sum();
        let avg_hands = if self.results.is_empty() {
            0.0
        } else {
            total_hands as f64 / self.results.len() as f64
        };
        let invalid_action_rate = agent_details
            .iter()
            .map(|(name, details)| (name.clone(), details.invalid_action_rate))
            .collect();

        Summary {
            num_runs: self.results.len(),
            leaderboard,
            agent_details,
            telemetry: Telemetry {
                total_hands,
                avg_hands_per_tournament: (avg_hands * 10.0).round() / 10.0,
                invalid_action_rate,
            },
        }
    }

    pub fn save_summary(&self) -> Result<PathBuf> {
        let summary = self.generate_summary();
        let path = self.log_dir.join("summary.json");
        fs::write(&path, serde_json::to_string_pretty(&summary)?)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    pub fn save_run_results(&self, result: &TournamentResult) -> Result<PathBuf> {
        let run_dir = self
            .log_dir
            .join(format!("tournament_{:03}", result.run_number));
        fs::create_dir_all(&run_dir)
            .with_context(|| format!("creating {}", run_dir.display()))?;
        let path = run_dir.join("results.json");
        fs::write(&path, serde_json::to_string_pretty(result)?)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    /// Human-readable summary and leaderboard on stdout.
    pub fn print_summary(&self) {
        let summary = self.generate_summary();

        println!("\n{}", "=".repeat(60));
        println!("TOURNAMENT SUMMARY");
        println!("{}", "=".repeat(60));
        println!("\nTotal runs: {}", summary.num_runs);
        println!("Total hands played: {}", summary.telemetry.total_hands);
        println!(
            "Avg hands per tournament: {}",
            summary.telemetry.avg_hands_per_tournament
        );

        println!("\n--- LEADERBOARD ---");
        for (i, entry) in summary.leaderboard.iter().enumerate() {
            println!(
                "{}. {}: avg placement {}, wins: {}",
                i + 1,
                entry.name,
                entry.avg_placement,
                entry.wins
            );
        }

        println!("\n--- INVALID ACTION RATES ---");
        for (name, rate) in &summary.telemetry.invalid_action_rate {
            println!("  {name}: {:.2}%", rate * 100.0);
        }
        println!("{}\n", "=".repeat(60));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(run: u32, placements: &[(&str, u32)], retries: &[(&str, u64, u64)]) -> TournamentResult {
        TournamentResult {
            run_number: run,
            seed: 42 + run as u64,
            total_hands: 50,
            placements: placements
                .iter()
                .map(|(n, p)| (n.to_string(), *p))
                .collect(),
            agent_stats: retries
                .iter()
                .map(|(n, r, d)| {
                    (
                        n.to_string(),
                        json!({"total_retries": r, "total_decisions": d}),
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn summary_averages_placements_and_sorts_leaderboard() {
        let mut reporter = Reporter::new(std::env::temp_dir());
        reporter.add_result(result(
            1,
            &[("A", 1), ("B", 2)],
            &[("A", 1, 10), ("B", 0, 10)],
        ));
        reporter.add_result(result(
            2,
            &[("A", 2), ("B", 1)],
            &[("A", 1, 10), ("B", 0, 10)],
        ));
        reporter.add_result(result(
            3,
            &[("A", 1), ("B", 2)],
            &[("A", 0, 10), ("B", 0, 10)],
        ));

        let summary = reporter.generate_summary();
        assert_eq!(summary.num_runs, 3);
        assert_eq!(summary.leaderboard[0].name, "A");
        assert_eq!(summary.leaderboard[0].wins, 2);
        assert_eq!(summary.agent_details["A"].avg_placement, 1.33);
        assert_eq!(summary.agent_details["A"].invalid_action_rate, 0.0667);
        assert_eq!(summary.telemetry.total_hands, 150);
        assert_eq!(summary.telemetry.avg_hands_per_tournament, 50.0);
    }

    #[test]
    fn run_results_serialize_with_placements() {
        let r = result(1, &[("A", 1)], &[]);
        let value = serde_json::to_value(&r).unwrap();
        assert_eq!(value["run_number"], 1);
        assert_eq!(value["placements"]["A"], 1);
    }
}
