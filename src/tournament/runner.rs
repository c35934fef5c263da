//! Drives one tournament: hands until a single seat holds all the chips.

use super::scorer::PlacementScorer;
use crate::agents::{
    position_label, AgentManager, HandOutcome, Observation, SeatResult, SeatView,
};
use crate::config::BlindLevelConfig;
use crate::engine::{
    normalize, Action, ActionKind, AgentActionKind, BlindLevel, BlindSchedule, Card, Chips, Deck,
    HandState, Player, SeatId,
};
use crate::logging::{
    AgentLogger, HandLogger, LoggedAction, LoggedPlayer, TournamentResult,
};
use crate::agents::ActionView;
use anyhow::{anyhow, Context, Result};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;

const LOG_TARGET: &str = "tournament::runner";

/// Configuration for a single tournament run.
#[derive(Clone, Debug)]
pub struct TournamentRunConfig {
    pub num_players: u32,
    pub starting_stack: Chips,
    pub blind_levels: Vec<BlindLevel>,
    pub blind_schedule_config: Vec<BlindLevelConfig>,
    pub seed: u64,
    pub log_dir: PathBuf,
}

/// Runs a single poker tournament over an owned engine, agent manager and
/// loggers. One decision is in flight at a time; the engine only mutates
/// between model calls.
pub struct TournamentRunner {
    config: TournamentRunConfig,
    manager: AgentManager,
    scorer: PlacementScorer,
    hand_logger: HandLogger,
    agent_logger: AgentLogger,
    game: HandState,
    hand_number: u64,
}

impl TournamentRunner {
    pub fn new(config: TournamentRunConfig, manager: AgentManager) -> Result<Self> {
        let mut scorer = PlacementScorer::new(config.num_players as usize);
        let hand_logger = HandLogger::new(&config.log_dir)?;
        let mut agent_logger = AgentLogger::new(&config.log_dir)?;

        let mut players = Vec::new();
        for seat in manager.seats() {
            let name = manager
                .agent_name(seat)
                .ok_or_else(|| anyhow!("no agent at seat {seat}"))?
                .to_string();
            scorer.register_player(seat, name.clone());
            agent_logger.register_agent(seat, name.clone());
            players.push(Player::new(seat, name, config.starting_stack));
        }

        let deck = Deck::new(config.seed);
        let schedule = BlindSchedule::new(config.blind_levels.clone())
            .context("invalid blind schedule")?;
        let game = HandState::new(players, deck, schedule, 1);

        Ok(Self {
            config,
            manager,
            scorer,
            hand_logger,
            agent_logger,
            game,
            hand_number: 0,
        })
    }

    pub fn save_meta(&self) -> Result<()> {
        let meta = json!({
            "seed": self.config.seed,
            "num_players": self.config.num_players,
            "starting_stack": self.config.starting_stack,
            "blind_schedule": self.config.blind_schedule_config,
        });
        let path = self.config.log_dir.join("meta.json");
        std::fs::write(&path, serde_json::to_string_pretty(&meta)?)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Play hands until one seat survives, then assemble the run result.
    pub async fn run(mut self) -> Result<TournamentResult> {
        while !self.scorer.is_tournament_over() {
            self.hand_number += 1;
            self.play_hand()
                .await
                .with_context(|| format!("hand {}", self.hand_number))?;
            self.check_eliminations();
            self.game.rotate_button();
        }

        self.agent_logger.save_summary()?;

        let placements = self.scorer.placements_by_name();
        let agent_stats = self
            .agent_logger
            .stats()
            .into_iter()
            .map(|s| {
                (
                    s.agent_name.clone(),
                    serde_json::to_value(s).unwrap_or_default(),
                )
            })
            .collect();

        tracing::info!(
            target: LOG_TARGET,
            seed = self.config.seed,
            total_hands = self.hand_number,
            "tournament complete"
        );

        Ok(TournamentResult {
            run_number: 0, // assigned by the orchestrator
            seed: self.config.seed,
            total_hands: self.hand_number,
            placements,
            agent_stats,
        })
    }

    async fn play_hand(&mut self) -> Result<()> {
        self.game.start_hand(self.hand_number)?;

        let hole_cards: BTreeMap<SeatId, [Card; 2]> = self
            .manager
            .active_seats()
            .into_iter()
            .filter_map(|seat| {
                self.game
                    .players()
                    .get(&seat)
                    .and_then(|p| p.hole_cards)
                    .map(|cards| (seat, cards))
            })
            .collect();

        let (sb, bb) = self.game.blinds();
        let blind_level = self.game.blind_level();
        tracing::info!(
            target: LOG_TARGET,
            hand = self.hand_number,
            blind_level,
            sb,
            bb,
            button = self.game.button_seat,
            "starting hand"
        );

        let logged_players: Vec<LoggedPlayer> = self
            .game
            .players()
            .values()
            .filter(|p| !p.has_folded || p.bet_this_hand > 0)
            .map(|p| LoggedPlayer {
                seat: p.seat,
                name: p.name.clone(),
                stack_start: p.stack + p.bet_this_hand,
            })
            .collect();
        self.hand_logger.start_hand(
            self.hand_number,
            blind_level,
            self.game.button_seat,
            sb,
            bb,
            logged_players,
            hole_cards.clone(),
        );
        // Blind posts are engine actions; mirror them into the hand log.
        for action in self.game.actions.clone() {
            if matches!(action.action.kind, ActionKind::PostSb | ActionKind::PostBb) {
                self.hand_logger.record_action(LoggedAction {
                    street: action.street,
                    seat: action.seat,
                    action: action.action.kind.to_string(),
                    amount: Some(action.action.amount),
                    pot_after: Some(action.pot_after),
                    forced: false,
                    retries: 0,
                    thinking_ms: 0.0,
                });
            }
        }

        self.agent_logger.start_hand();
        self.manager
            .start_hand(self.hand_number, &hole_cards, self.game.button_seat);

        while !self.game.is_complete() {
            self.play_action().await?;
        }

        let result = self
            .game
            .result()
            .cloned()
            .ok_or_else(|| anyhow!("hand completed without a result"))?;

        for (&seat, &cards) in &result.showdown_cards {
            self.hand_logger.record_showdown(seat, cards);
            self.manager.record_showdown(seat, cards);
        }
        self.hand_logger.record_community_cards(&self.game.community);
        self.manager.update_community_cards(&self.game.community);

        self.hand_logger.end_hand(
            result.winners.clone(),
            result.pot,
            result.pots_awarded.clone(),
        )?;
        self.agent_logger.end_hand(self.hand_number)?;

        let mut seat_results: BTreeMap<SeatId, SeatResult> = BTreeMap::new();
        for seat in self.manager.active_seats() {
            let Some(player) = self.game.players().get(&seat) else {
                continue;
            };
            let outcome = if result.winners.contains(&seat) {
                if result.winners.len() > 1 {
                    HandOutcome::Split
                } else {
                    HandOutcome::Won
                }
            } else if player.has_folded {
                HandOutcome::Folded
            } else {
                HandOutcome::Lost
            };
            seat_results.insert(
                seat,
                SeatResult {
                    result: outcome,
                    chips_won: result.pots_awarded.get(&seat).copied().unwrap_or(0),
                    final_stack: player.stack,
                },
            );
        }
        self.manager.end_hand(&seat_results, result.pot);
        Ok(())
    }

    /// Obtain one decision from the seat holding the action and apply it.
    async fn play_action(&mut self) -> Result<()> {
        let Some(seat) = self.game.action_to else {
            return Ok(());
        };
        let street = self.game.street;

        let observation = self.build_observation(seat)?;
        let agent_action = self.manager.get_action(seat, &observation).await?;
        let mut forced = agent_action.forced;
        let retries = agent_action.retries;

        let view = self.game.betting_view();
        let player_state = self.game.player(seat)?.bet_state();
        let engine_action =
            match normalize(agent_action.kind, agent_action.raise_to, &player_state, &view) {
                Ok(action) => action,
                Err(err) => {
                    tracing::warn!(
                        target: LOG_TARGET,
                        seat,
                        error = %err,
                        "agent action failed normalization, substituting fallback"
                    );
                    forced = true;
                    self.fallback_action(seat)?
                }
            };

        let applied = match self.game.apply(seat, engine_action) {
            Ok(()) => engine_action,
            Err(err) => {
                // Should be unreachable after the driver's own fallback.
                tracing::error!(
                    target: LOG_TARGET,
                    seat,
                    error = %err,
                    "engine rejected normalized action"
                );
                forced = true;
                let fallback = self.fallback_action(seat)?;
                self.game.apply(seat, fallback).map_err(|fatal| {
                    anyhow!("fallback action also rejected for seat {seat}: {fatal} (original: {err})")
                })?;
                fallback
            }
        };

        tracing::debug!(
            target: LOG_TARGET,
            seat,
            action = %applied,
            street = %street,
            pot = self.game.pot,
            forced,
            retries,
            "action applied"
        );

        let pot_after = self.game.actions.last().map(|a| a.pot_after);
        self.hand_logger.record_action(LoggedAction {
            street,
            seat,
            action: applied.kind.to_string(),
            amount: Some(applied.amount),
            pot_after,
            forced,
            retries,
            thinking_ms: agent_action.thinking_ms,
        });

        if let Some(trace) = self.manager.last_trace(seat) {
            let trace = trace.clone();
            self.agent_logger.log_decision(seat, self.hand_number, &trace);
        }

        let amount = (applied.amount > 0).then_some(applied.amount);
        self.manager
            .record_action(street, seat, applied.kind, amount);
        self.manager.update_community_cards(&self.game.community);
        Ok(())
    }

    fn fallback_action(&self, seat: SeatId) -> Result<Action> {
        let to_call = self.game.to_call(seat)?;
        if to_call == 0 {
            Ok(Action::check())
        } else {
            Ok(Action::fold())
        }
    }

    fn build_observation(&self, seat: SeatId) -> Result<Observation> {
        let player = self.game.player(seat)?;
        let (sb, bb) = self.game.blinds();
        let view = self.game.betting_view();
        let to_call = view.to_call(&player.bet_state());

        let mut legal_actions: Vec<AgentActionKind> = Vec::new();
        for action in self.game.legal_actions_for(seat)? {
            let kind = match action.kind {
                ActionKind::Fold => AgentActionKind::Fold,
                ActionKind::Check => AgentActionKind::Check,
                ActionKind::Call => AgentActionKind::Call,
                ActionKind::Bet | ActionKind::Raise | ActionKind::AllIn => AgentActionKind::Raise,
                ActionKind::PostSb | ActionKind::PostBb => continue,
            };
            if !legal_actions.contains(&kind) {
                legal_actions.push(kind);
            }
        }

        let active_seats: Vec<SeatId> = self.game.active_seats();
        let position = position_label(seat, self.game.button_seat, &active_seats);

        let hole_cards = player
            .hole_cards
            .ok_or_else(|| anyhow!("seat {seat} has no hole cards"))?;

        Ok(Observation {
            hand_number: self.hand_number,
            street: self.game.street,
            my_seat: seat,
            my_position: position,
            my_hole_cards: hole_cards,
            my_stack: player.stack,
            community_cards: self.game.community.clone(),
            pot_size: self.game.pot,
            to_call,
            min_raise_to: view.current_bet + view.min_raise,
            max_raise_to: player.stack + player.bet_this_round,
            small_blind: sb,
            big_blind: bb,
            button_seat: self.game.button_seat,
            players: self
                .game
                .players()
                .values()
                .map(|p| SeatView {
                    seat: p.seat,
                    name: p.name.clone(),
                    stack: p.stack,
                    is_active: !p.has_folded && p.stack > 0,
                    is_folded: p.has_folded,
                })
                .collect(),
            actions_this_hand: self
                .game
                .actions
                .iter()
                .map(|a| ActionView {
                    street: a.street,
                    seat: a.seat,
                    action: a.action.kind.to_string(),
                    amount: a.action.amount,
                })
                .collect(),
            legal_actions,
        })
    }

    /// Register seats that lost their last chip this hand, grouping
    /// same-hand bust-outs so they share a placement.
    fn check_eliminations(&mut self) {
        let eliminated: Vec<SeatId> = self
            .game
            .players()
            .values()
            .filter(|p| p.stack == 0 && self.manager.is_active(p.seat))
            .map(|p| p.seat)
            .collect();
        if eliminated.is_empty() {
            return;
        }

        self.scorer
            .record_multi_elimination(&eliminated, self.hand_number);
        for seat in eliminated {
            tracing::info!(
                target: LOG_TARGET,
                seat,
                hand = self.hand_number,
                "player eliminated"
            );
            self.manager.eliminate_seat(seat);
        }
    }

    pub fn scorer(&self) -> &PlacementScorer {
        &self.scorer
    }
}
