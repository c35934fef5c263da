//! Seat-to-agent routing and memory fan-out.

use super::driver::{AgentAction, DecisionTrace, LlmAgent, PokerAgent};
use super::memory::{position_label, HandOutcome};
use super::observation::Observation;
use crate::config::{AgentConfig, AgentSettingsConfig};
use crate::engine::{ActionKind, Card, Chips, SeatId, Street};
use crate::llm::{LlmClient, LlmConfig, TransportError};
use anyhow::Context;
use std::collections::BTreeMap;

const LOG_TARGET: &str = "agents::manager";

/// Per-seat outcome handed to memories when a hand closes.
#[derive(Clone, Debug)]
pub struct SeatResult {
    pub result: HandOutcome,
    pub chips_won: Chips,
    pub final_stack: Chips,
}

/// Holds the seat->agent map, fans engine events out to every active
/// seat's memory and forwards decision requests. Eliminated seats stop
/// receiving events.
pub struct AgentManager {
    agents: BTreeMap<SeatId, Box<dyn PokerAgent>>,
    active_seats: Vec<SeatId>,
    eliminated_seats: Vec<SeatId>,
}

impl AgentManager {
    pub fn new() -> Self {
        Self {
            agents: BTreeMap::new(),
            active_seats: Vec::new(),
            eliminated_seats: Vec::new(),
        }
    }

    /// Build one LLM driver per configured agent. Per-agent reasoning and
    /// provider settings override the global defaults.
    pub fn from_config(
        agent_configs: &[AgentConfig],
        settings: &AgentSettingsConfig,
    ) -> Result<Self, TransportError> {
        let mut manager = Self::new();
        for (i, config) in agent_configs.iter().enumerate() {
            let seat = (i + 1) as SeatId;
            let reasoning = config
                .reasoning
                .clone()
                .or_else(|| settings.reasoning.clone())
                .unwrap_or_default();
            let llm_config = LlmConfig {
                model: config.model.clone(),
                reasoning,
                provider: config.provider.clone(),
                ..LlmConfig::default()
            };
            let llm = LlmClient::new(llm_config)?;
            let agent = LlmAgent::new(config.name.clone(), seat, Box::new(llm))
                .with_max_retries(settings.max_retries);
            manager.add_agent(seat, Box::new(agent));
        }
        Ok(manager)
    }

    pub fn add_agent(&mut self, seat: SeatId, agent: Box<dyn PokerAgent>) {
        self.agents.insert(seat, agent);
        self.active_seats.push(seat);
    }

    pub fn agent(&self, seat: SeatId) -> Option<&dyn PokerAgent> {
        self.agents.get(&seat).map(|a| a.as_ref())
    }

    pub fn agent_name(&self, seat: SeatId) -> Option<&str> {
        self.agents.get(&seat).map(|a| a.name())
    }

    pub fn is_active(&self, seat: SeatId) -> bool {
        self.active_seats.contains(&seat)
    }

    pub fn active_seats(&self) -> Vec<SeatId> {
        self.active_seats.clone()
    }

    pub fn seats(&self) -> Vec<SeatId> {
        self.agents.keys().copied().collect()
    }

    pub fn eliminate_seat(&mut self, seat: SeatId) {
        if let Some(idx) = self.active_seats.iter().position(|&s| s == seat) {
            self.active_seats.remove(idx);
            self.eliminated_seats.push(seat);
            tracing::info!(target: LOG_TARGET, seat, "seat eliminated");
        }
    }

    pub async fn get_action(
        &mut self,
        seat: SeatId,
        observation: &Observation,
    ) -> anyhow::Result<AgentAction> {
        let agent = self
            .agents
            .get_mut(&seat)
            .with_context(|| format!("no agent at seat {seat}"))?;
        Ok(agent.decide(observation).await)
    }

    pub fn start_hand(
        &mut self,
        hand_number: u64,
        hole_cards: &BTreeMap<SeatId, [Card; 2]>,
        button_seat: SeatId,
    ) {
        let active = self.active_seats.clone();
        for &seat in &active {
            let Some(cards) = hole_cards.get(&seat) else {
                continue;
            };
            let position = position_label(seat, button_seat, &active);
            if let Some(agent) = self.agents.get_mut(&seat) {
                agent.memory_mut().start_hand(hand_number, *cards, position);
            }
        }
    }

    pub fn record_action(
        &mut self,
        street: Street,
        seat: SeatId,
        kind: ActionKind,
        amount: Option<Chips>,
    ) {
        let player_name = self.agent_name(seat).unwrap_or_default().to_string();
        for active_seat in self.active_seats.clone() {
            if let Some(agent) = self.agents.get_mut(&active_seat) {
                agent
                    .memory_mut()
                    .record_action(street, seat, &player_name, kind, amount);
            }
        }
    }

    pub fn update_community_cards(&mut self, cards: &[Card]) {
        for seat in self.active_seats.clone() {
            if let Some(agent) = self.agents.get_mut(&seat) {
                agent.memory_mut().update_community(cards);
            }
        }
    }

    pub fn record_showdown(&mut self, seat: SeatId, cards: [Card; 2]) {
        for active_seat in self.active_seats.clone() {
            if let Some(agent) = self.agents.get_mut(&active_seat) {
                agent.memory_mut().record_showdown(seat, cards);
            }
        }
    }

    pub fn end_hand(&mut self, results: &BTreeMap<SeatId, SeatResult>, pot_size: Chips) {
        for seat in self.active_seats.clone() {
            let Some(agent) = self.agents.get_mut(&seat) else {
                continue;
            };
            match results.get(&seat) {
                Some(result) => agent.memory_mut().end_hand(
                    result.result,
                    result.chips_won,
                    pot_size,
                    result.final_stack,
                ),
                None => agent
                    .memory_mut()
                    .end_hand(HandOutcome::Folded, 0, pot_size, 0),
            }
        }
    }

    pub fn last_trace(&self, seat: SeatId) -> Option<&DecisionTrace> {
        self.agents.get(&seat).and_then(|a| a.last_trace())
    }

    pub fn traces(&self, seat: SeatId) -> &[DecisionTrace] {
        self.agents.get(&seat).map(|a| a.traces()).unwrap_or(&[])
    }

    pub fn reset_for_tournament(&mut self) {
        self.active_seats = self.agents.keys().copied().collect();
        self.eliminated_seats.clear();
        for agent in self.agents.values_mut() {
            agent.reset();
        }
    }
}

impl Default for AgentManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::memory::AgentMemory;
    use async_trait::async_trait;

    struct StubAgent {
        name: String,
        memory: AgentMemory,
    }

    impl StubAgent {
        fn boxed(name: &str, seat: SeatId) -> Box<dyn PokerAgent> {
            Box::new(Self {
                name: name.to_string(),
                memory: AgentMemory::new(name, seat),
            })
        }
    }

    #[async_trait]
    impl PokerAgent for StubAgent {
        fn name(&self) -> &str {
            &self.name
        }

        fn memory(&self) -> &AgentMemory {
            &self.memory
        }

        fn memory_mut(&mut self) -> &mut AgentMemory {
            &mut self.memory
        }

        async fn decide(&mut self, _observation: &Observation) -> AgentAction {
            AgentAction {
                kind: crate::engine::AgentActionKind::Fold,
                raise_to: None,
                reasoning: String::new(),
                forced: false,
                retries: 0,
                thinking_ms: 0.0,
            }
        }

        fn reset(&mut self) {
            self.memory = AgentMemory::new(self.name.clone(), self.memory.seat);
        }
    }

    fn manager_with_two_seats() -> AgentManager {
        let mut manager = AgentManager::new();
        manager.add_agent(1, StubAgent::boxed("A", 1));
        manager.add_agent(2, StubAgent::boxed("B", 2));
        manager
    }

    fn card(s: &str) -> Card {
        s.parse().unwrap()
    }

    #[test]
    fn events_fan_out_to_active_seats_only() {
        let mut manager = manager_with_two_seats();
        let mut holes = BTreeMap::new();
        holes.insert(1, [card("Ah"), card("Kd")]);
        holes.insert(2, [card("2c"), card("7d")]);
        manager.start_hand(1, &holes, 1);
        manager.eliminate_seat(2);
        manager.record_action(Street::Preflop, 1, ActionKind::Raise, Some(10));

        let mut results = BTreeMap::new();
        results.insert(
            1,
            SeatResult {
                result: HandOutcome::Won,
                chips_won: 3,
                final_stack: 103,
            },
        );
        manager.end_hand(&results, 3);

        let hand = manager.agent(1).unwrap().memory().hands().last().unwrap().clone();
        assert_eq!(hand.actions.len(), 1);
        // Eliminated seat saw neither the action nor the hand close.
        assert!(manager.agent(2).unwrap().memory().hands().is_empty());
    }

    #[test]
    fn eliminate_moves_seat_out_of_active_set() {
        let mut manager = manager_with_two_seats();
        assert!(manager.is_active(2));
        manager.eliminate_seat(2);
        assert!(!manager.is_active(2));
        assert_eq!(manager.active_seats(), vec![1]);
        // Idempotent.
        manager.eliminate_seat(2);
        assert_eq!(manager.active_seats(), vec![1]);
    }

    #[test]
    fn reset_restores_all_seats_and_clears_memories() {
        let mut manager = manager_with_two_seats();
        let mut holes = BTreeMap::new();
        holes.insert(1, [card("Ah"), card("Kd")]);
        manager.start_hand(1, &holes, 1);
        manager.end_hand(&BTreeMap::new(), 0);
        manager.eliminate_seat(2);

        manager.reset_for_tournament();
        assert_eq!(manager.active_seats(), vec![1, 2]);
        assert!(manager.agent(1).unwrap().memory().hands().is_empty());
    }
}
