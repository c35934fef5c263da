//! Multi-run orchestration: K independently seeded tournaments feeding one
//! reporter.

use super::runner::{TournamentRunConfig, TournamentRunner};
use crate::agents::AgentManager;
use crate::config::BenchmarkConfig;
use crate::logging::{Reporter, Summary, TournamentResult};
use anyhow::{Context, Result};
use std::path::PathBuf;

const LOG_TARGET: &str = "tournament::orchestrator";

/// Runs `num_runs` tournaments with `seed = seed_base + run_number`. Each
/// run owns a disjoint object graph (deck, engine, agents, memories); only
/// the reporter's append-only sink is shared across runs.
pub struct MultiRunManager {
    config: BenchmarkConfig,
    log_dir: PathBuf,
    reporter: Reporter,
}

impl MultiRunManager {
    pub fn new(config: BenchmarkConfig, log_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("creating log dir {}", log_dir.display()))?;
        let reporter = Reporter::new(&log_dir);
        Ok(Self {
            config,
            log_dir,
            reporter,
        })
    }

    /// Run every tournament and emit the cross-run summary. A fatal error
    /// in one run is recorded and the next run proceeds.
    pub async fn run_all(&mut self) -> Result<Summary> {
        let num_runs = self.config.tournament.num_runs;
        for run_number in 1..=num_runs {
            tracing::info!(
                target: LOG_TARGET,
                run = run_number,
                of = num_runs,
                "starting tournament run"
            );

            match self.run_single(run_number).await {
                Ok(result) => {
                    println!(
                        "\nRun {run_number}/{num_runs} complete - {} hands played",
                        result.total_hands
                    );
                    println!("Placements:");
                    let mut placements: Vec<_> = result.placements.iter().collect();
                    placements.sort_by_key(|(_, rank)| **rank);
                    for (name, rank) in placements {
                        println!("  {rank}. {name}");
                    }

                    self.reporter.save_run_results(&result)?;
                    self.reporter.add_result(result);
                }
                Err(err) => {
                    // Per-run isolation: record the failure, keep going.
                    tracing::error!(
                        target: LOG_TARGET,
                        run = run_number,
                        error = %format!("{err:#}"),
                        "tournament run failed"
                    );
                }
            }
        }

        let summary = self.reporter.generate_summary();
        self.reporter.save_summary()?;
        self.reporter.print_summary();
        Ok(summary)
    }

    async fn run_single(&mut self, run_number: u32) -> Result<TournamentResult> {
        let seed = self.config.tournament.seed_base + run_number as u64;
        let run_dir = self.log_dir.join(format!("tournament_{run_number:03}"));
        std::fs::create_dir_all(&run_dir)
            .with_context(|| format!("creating {}", run_dir.display()))?;

        // Fresh agents and memories for every run.
        let manager = AgentManager::from_config(&self.config.agents, &self.config.agent_settings)
            .context("building agents")?;

        let run_config = TournamentRunConfig {
            num_players: self.config.tournament.seats,
            starting_stack: self.config.tournament.starting_stack,
            blind_levels: self.config.blind_levels(),
            blind_schedule_config: self.config.tournament.blind_schedule.clone(),
            seed,
            log_dir: run_dir,
        };

        let runner = TournamentRunner::new(run_config, manager)?;
        runner.save_meta()?;
        let mut result = runner.run().await?;
        result.run_number = run_number;
        Ok(result)
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }
}
