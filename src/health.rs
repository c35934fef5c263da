//! Config and model health checks backing the `check` subcommand.

use crate::config::{load_config, BenchmarkConfig};
use crate::llm::{ChatMessage, LlmClient, LlmConfig, API_KEY_ENV};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

const LOG_TARGET: &str = "health";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HealthStatus {
    Pass,
    Warn,
    Fail,
}

impl HealthStatus {
    fn icon(self) -> &'static str {
        match self {
            HealthStatus::Pass => "\u{2713}",
            HealthStatus::Warn => "\u{26a0}",
            HealthStatus::Fail => "\u{2717}",
        }
    }

    fn color(self) -> &'static str {
        match self {
            HealthStatus::Pass => "\x1b[92m",
            HealthStatus::Warn => "\x1b[93m",
            HealthStatus::Fail => "\x1b[91m",
        }
    }
}

#[derive(Clone, Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: HealthStatus,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct HealthReport {
    pub results: Vec<CheckResult>,
}

impl HealthReport {
    fn add(&mut self, name: &str, status: HealthStatus, message: impl Into<String>) {
        self.results.push(CheckResult {
            name: name.to_string(),
            status,
            message: message.into(),
        });
    }

    pub fn overall(&self) -> HealthStatus {
        if self.results.iter().any(|r| r.status == HealthStatus::Fail) {
            HealthStatus::Fail
        } else if self.results.iter().any(|r| r.status == HealthStatus::Warn) {
            HealthStatus::Warn
        } else {
            HealthStatus::Pass
        }
    }

    pub fn passed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == HealthStatus::Pass)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == HealthStatus::Fail)
            .count()
    }

    pub fn warnings(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == HealthStatus::Warn)
            .count()
    }

    pub fn print(&self) {
        const RESET: &str = "\x1b[0m";
        println!("\nHealth check results");
        println!("{}", "-".repeat(60));
        for result in &self.results {
            println!(
                "{}{} {:<24}{} {}",
                result.status.color(),
                result.status.icon(),
                result.name,
                RESET,
                result.message
            );
        }
        println!("{}", "-".repeat(60));
        println!(
            "{} passed, {} warnings, {} failed\n",
            self.passed(),
            self.warnings(),
            self.failed()
        );
    }
}

/// Runs the per-check pass/warn/fail suite over a config file.
pub struct HealthChecker {
    config_path: PathBuf,
    probe_models: bool,
}

impl HealthChecker {
    pub fn new(config_path: impl AsRef<Path>, probe_models: bool) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            probe_models,
        }
    }

    pub async fn run(&self) -> HealthReport {
        let mut report = HealthReport::default();

        let config = self.check_config(&mut report);
        self.check_api_key(&mut report);

        if let Some(config) = config {
            self.check_agent_names(&config, &mut report);
            self.check_log_dir(&config, &mut report);
            if self.probe_models {
                self.probe_models(&config, &mut report).await;
            }
        }
        report
    }

    fn check_config(&self, report: &mut HealthReport) -> Option<BenchmarkConfig> {
        if !self.config_path.exists() {
            report.add(
                "config_file",
                HealthStatus::Fail,
                format!("not found: {}", self.config_path.display()),
            );
            return None;
        }
        match load_config(&self.config_path) {
            Ok(config) => {
                report.add(
                    "config_file",
                    HealthStatus::Pass,
                    format!("loaded {}", self.config_path.display()),
                );
                report.add(
                    "config_schema",
                    HealthStatus::Pass,
                    format!(
                        "{} runs, {} seats, {} blind levels",
                        config.tournament.num_runs,
                        config.tournament.seats,
                        config.tournament.blind_schedule.len()
                    ),
                );
                Some(config)
            }
            Err(err) => {
                report.add("config_schema", HealthStatus::Fail, err.to_string());
                None
            }
        }
    }

    fn check_api_key(&self, report: &mut HealthReport) {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => {
                report.add("api_key", HealthStatus::Pass, format!("{API_KEY_ENV} is set"));
            }
            _ => {
                report.add(
                    "api_key",
                    HealthStatus::Fail,
                    format!("{API_KEY_ENV} not found in environment"),
                );
            }
        }
    }

    fn check_agent_names(&self, config: &BenchmarkConfig, report: &mut HealthReport) {
        let mut seen = BTreeSet::new();
        let duplicates: Vec<&str> = config
            .agents
            .iter()
            .filter(|a| !seen.insert(a.name.as_str()))
            .map(|a| a.name.as_str())
            .collect();
        if duplicates.is_empty() {
            report.add(
                "agent_names",
                HealthStatus::Pass,
                format!("{} unique agent names", config.agents.len()),
            );
        } else {
            report.add(
                "agent_names",
                HealthStatus::Warn,
                format!("duplicate names: {}", duplicates.join(", ")),
            );
        }
    }

    fn check_log_dir(&self, config: &BenchmarkConfig, report: &mut HealthReport) {
        let dir = Path::new(&config.output.log_dir);
        let probe = dir.join(".health_check");
        let outcome = std::fs::create_dir_all(dir)
            .and_then(|_| std::fs::write(&probe, b"ok"))
            .and_then(|_| std::fs::remove_file(&probe));
        match outcome {
            Ok(()) => report.add(
                "log_dir",
                HealthStatus::Pass,
                format!("{} is writable", dir.display()),
            ),
            Err(err) => report.add(
                "log_dir",
                HealthStatus::Fail,
                format!("{} not writable: {err}", dir.display()),
            ),
        }
    }

    /// One-token probe per distinct model; a slow or failing model warns
    /// rather than fails, since providers can be transiently unavailable.
    async fn probe_models(&self, config: &BenchmarkConfig, report: &mut HealthReport) {
        let models: BTreeSet<&str> = config.agents.iter().map(|a| a.model.as_str()).collect();
        for model in models {
            let llm_config = LlmConfig {
                model: model.to_string(),
                max_tokens: 8,
                max_retries: 1,
                request_timeout: Duration::from_secs(30),
                ..LlmConfig::default()
            };
            let client = match LlmClient::new(llm_config) {
                Ok(client) => client,
                Err(err) => {
                    report.add(
                        &format!("model:{model}"),
                        HealthStatus::Fail,
                        err.to_string(),
                    );
                    continue;
                }
            };
            let messages = [ChatMessage::user("Reply with the single word: ok")];
            match client.call(&messages, None).await {
                Ok(response) => {
                    tracing::debug!(
                        target: LOG_TARGET,
                        model,
                        latency_ms = response.latency_ms,
                        "model probe succeeded"
                    );
                    report.add(
                        &format!("model:{model}"),
                        HealthStatus::Pass,
                        format!("responded in {:.0}ms", response.latency_ms),
                    );
                }
                Err(err) => {
                    report.add(
                        &format!("model:{model}"),
                        HealthStatus::Warn,
                        format!("probe failed: {err}"),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_status_prefers_fail_over_warn() {
        let mut report = HealthReport::default();
        report.add("a", HealthStatus::Pass, "");
        assert_eq!(report.overall(), HealthStatus::Pass);
        report.add("b", HealthStatus::Warn, "");
        assert_eq!(report.overall(), HealthStatus::Warn);
        report.add("c", HealthStatus::Fail, "");
        assert_eq!(report.overall(), HealthStatus::Fail);
        assert_eq!(report.passed(), 1);
        assert_eq!(report.warnings(), 1);
        assert_eq!(report.failed(), 1);
    }

    #[tokio::test]
    async fn missing_config_file_fails() {
        let checker = HealthChecker::new("/nonexistent/config.json", false);
        let report = checker.run().await;
        assert_eq!(report.overall(), HealthStatus::Fail);
        assert!(report
            .results
            .iter()
            .any(|r| r.name == "config_file" && r.status == HealthStatus::Fail));
    }
}
