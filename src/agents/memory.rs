//! Per-seat memory of legally observed play.

use crate::engine::{ActionKind, Card, Chips, SeatId, Street};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single action observed during play.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedAction {
    pub street: Street,
    pub seat: SeatId,
    pub player_name: String,
    pub kind: ActionKind,
    pub amount: Option<Chips>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandOutcome {
    Won,
    Lost,
    Folded,
    Split,
}

impl HandOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            HandOutcome::Won => "won",
            HandOutcome::Lost => "lost",
            HandOutcome::Folded => "folded",
            HandOutcome::Split => "split",
        }
    }
}

impl fmt::Display for HandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HandOutcome {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "won" => Ok(HandOutcome::Won),
            "lost" => Ok(HandOutcome::Lost),
            "folded" => Ok(HandOutcome::Folded),
            "split" => Ok(HandOutcome::Split),
            _ => Err(()),
        }
    }
}

/// Record of one completed hand from a single seat's perspective.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HandRecord {
    pub hand_number: u64,
    pub my_position: String,
    pub my_hole_cards: [Card; 2],
    pub community_cards: Vec<Card>,
    pub actions: Vec<ObservedAction>,
    pub showdown_cards: BTreeMap<SeatId, [Card; 2]>,
    pub result: HandOutcome,
    pub chips_won: Chips,
    pub pot_size: Chips,
    pub my_final_stack: Chips,
}

impl HandRecord {
    pub fn opponent_actions(&self, opponent_seat: SeatId) -> Vec<&ObservedAction> {
        self.actions.iter().filter(|a| a.seat == opponent_seat).collect()
    }

    pub fn actions_on_street(&self, street: Street) -> Vec<&ObservedAction> {
        self.actions.iter().filter(|a| a.street == street).collect()
    }

    /// Denormalized text view used by the substring search.
    fn search_haystack(&self) -> String {
        let mut text = String::new();
        for card in &self.my_hole_cards {
            text.push_str(&card.to_string().to_lowercase());
            text.push(' ');
        }
        for card in &self.community_cards {
            text.push_str(&card.to_string().to_lowercase());
            text.push(' ');
        }
        text.push_str(&self.my_position.to_lowercase());
        text.push(' ');
        text.push_str(self.result.as_str());
        for action in &self.actions {
            text.push(' ');
            text.push_str(action.kind.as_str());
            text.push(' ');
            text.push_str(&action.player_name.to_lowercase());
        }
        text
    }
}

/// Position label for a seat: clockwise rank relative to the button among
/// active seats, heads-up collapsing BTN=SB.
pub fn position_label(seat: SeatId, button_seat: SeatId, active_seats: &[SeatId]) -> String {
    if !active_seats.contains(&seat) {
        return "OUT".to_string();
    }

    let mut sorted: Vec<SeatId> = active_seats.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();
    let btn_idx = sorted
        .iter()
        .position(|&s| s == button_seat)
        .unwrap_or(0);
    let seat_idx = sorted.iter().position(|&s| s == seat).unwrap_or(0);
    let relative = (seat_idx + n - btn_idx) % n;

    match relative {
        0 => "BTN".to_string(),
        1 if n == 2 => "BB".to_string(), // heads-up: the button is the SB
        1 => "SB".to_string(),
        2 => "BB".to_string(),
        _ if n <= 4 => {
            if relative == 3 {
                "UTG".to_string()
            } else {
                "CO".to_string()
            }
        }
        3 => "UTG".to_string(),
        _ if relative == n - 1 => "CO".to_string(),
        _ => format!("MP{}", relative - 3),
    }
}

/// Stores what one seat has legally observed. Grow-only within a
/// tournament; destroyed on reset. Tools read it, they never mutate it.
#[derive(Clone, Debug)]
pub struct AgentMemory {
    pub agent_name: String,
    pub seat: SeatId,
    hands: Vec<HandRecord>,
    current: Option<HandRecord>,
}

impl AgentMemory {
    pub fn new(agent_name: impl Into<String>, seat: SeatId) -> Self {
        Self {
            agent_name: agent_name.into(),
            seat,
            hands: Vec::new(),
            current: None,
        }
    }

    pub fn hands(&self) -> &[HandRecord] {
        &self.hands
    }

    pub fn start_hand(&mut self, hand_number: u64, hole_cards: [Card; 2], position: String) {
        self.current = Some(HandRecord {
            hand_number,
            my_position: position,
            my_hole_cards: hole_cards,
            community_cards: Vec::new(),
            actions: Vec::new(),
            showdown_cards: BTreeMap::new(),
            result: HandOutcome::Folded,
            chips_won: 0,
            pot_size: 0,
            my_final_stack: 0,
        });
    }

    pub fn record_action(
        &mut self,
        street: Street,
        seat: SeatId,
        player_name: &str,
        kind: ActionKind,
        amount: Option<Chips>,
    ) {
        if let Some(hand) = self.current.as_mut() {
            hand.actions.push(ObservedAction {
                street,
                seat,
                player_name: player_name.to_string(),
                kind,
                amount,
            });
        }
    }

    pub fn update_community(&mut self, cards: &[Card]) {
        if let Some(hand) = self.current.as_mut() {
            hand.community_cards = cards.to_vec();
        }
    }

    pub fn record_showdown(&mut self, seat: SeatId, cards: [Card; 2]) {
        if let Some(hand) = self.current.as_mut() {
            hand.showdown_cards.insert(seat, cards);
        }
    }

    pub fn end_hand(
        &mut self,
        result: HandOutcome,
        chips_won: Chips,
        pot_size: Chips,
        final_stack: Chips,
    ) {
        if let Some(mut hand) = self.current.take() {
            hand.result = result;
            hand.chips_won = chips_won;
            hand.pot_size = pot_size;
            hand.my_final_stack = final_stack;
            self.hands.push(hand);
        }
    }

    pub fn hand(&self, hand_number: u64) -> Option<&HandRecord> {
        self.hands.iter().find(|h| h.hand_number == hand_number)
    }

    pub fn hands_against(&self, opponent_seat: SeatId) -> Vec<&HandRecord> {
        self.hands
            .iter()
            .filter(|h| h.actions.iter().any(|a| a.seat == opponent_seat))
            .collect()
    }

    pub fn showdowns_by_opponent(&self, opponent_seat: SeatId) -> Vec<&HandRecord> {
        self.hands
            .iter()
            .filter(|h| h.showdown_cards.contains_key(&opponent_seat))
            .collect()
    }

    pub fn winning_hands(&self) -> Vec<&HandRecord> {
        self.hands
            .iter()
            .filter(|h| h.result == HandOutcome::Won)
            .collect()
    }

    pub fn recent_hands(&self, n: usize) -> &[HandRecord] {
        let start = self.hands.len().saturating_sub(n);
        &self.hands[start..]
    }

    /// Substring search over the denormalized view of each hand; results
    /// are in hand order (most recent last).
    pub fn search(&self, query: &str) -> Vec<&HandRecord> {
        let query = query.to_lowercase();
        self.hands
            .iter()
            .filter(|h| h.search_haystack().contains(&query))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(s: &str) -> Card {
        s.parse().unwrap()
    }

    fn memory_with_hand() -> AgentMemory {
        let mut memory = AgentMemory::new("TestBot", 1);
        memory.start_hand(1, [card("Ah"), card("Kd")], "BTN".to_string());
        memory.record_action(Street::Preflop, 2, "Villain", ActionKind::Raise, Some(10));
        memory.record_action(Street::Preflop, 1, "TestBot", ActionKind::Call, Some(10));
        memory.update_community(&[card("2c"), card("7d"), card("Jh")]);
        memory.record_showdown(2, [card("Qc"), card("Qd")]);
        memory.end_hand(HandOutcome::Lost, 0, 20, 90);
        memory
    }

    #[test]
    fn end_hand_stores_the_record() {
        let memory = memory_with_hand();
        assert_eq!(memory.hands().len(), 1);
        let hand = memory.hand(1).unwrap();
        assert_eq!(hand.result, HandOutcome::Lost);
        assert_eq!(hand.pot_size, 20);
        assert_eq!(hand.actions.len(), 2);
    }

    #[test]
    fn actions_without_a_started_hand_are_dropped() {
        let mut memory = AgentMemory::new("TestBot", 1);
        memory.record_action(Street::Preflop, 2, "Villain", ActionKind::Fold, None);
        memory.end_hand(HandOutcome::Won, 10, 10, 100);
        assert!(memory.hands().is_empty());
    }

    #[test]
    fn queries_filter_by_opponent_and_street() {
        let memory = memory_with_hand();
        let hand = memory.hand(1).unwrap();
        assert_eq!(hand.opponent_actions(2).len(), 1);
        assert_eq!(hand.actions_on_street(Street::Preflop).len(), 2);
        assert_eq!(memory.hands_against(2).len(), 1);
        assert_eq!(memory.showdowns_by_opponent(2).len(), 1);
        assert!(memory.showdowns_by_opponent(3).is_empty());
    }

    #[test]
    fn search_matches_cards_results_and_names() {
        let memory = memory_with_hand();
        assert_eq!(memory.search("ah").len(), 1);
        assert_eq!(memory.search("lost").len(), 1);
        assert_eq!(memory.search("villain").len(), 1);
        assert!(memory.search("flush").is_empty());
    }

    #[test]
    fn position_labels_follow_button() {
        let seats = [1, 2, 3, 4, 5, 6];
        assert_eq!(position_label(3, 3, &seats), "BTN");
        assert_eq!(position_label(4, 3, &seats), "SB");
        assert_eq!(position_label(5, 3, &seats), "BB");
        assert_eq!(position_label(6, 3, &seats), "UTG");
        assert_eq!(position_label(1, 3, &seats), "MP1");
        assert_eq!(position_label(2, 3, &seats), "CO");
    }

    #[test]
    fn heads_up_button_is_small_blind() {
        let seats = [2, 5];
        assert_eq!(position_label(2, 2, &seats), "BTN");
        assert_eq!(position_label(5, 2, &seats), "BB");
    }

    #[test]
    fn eliminated_seat_is_out() {
        assert_eq!(position_label(4, 1, &[1, 2, 3]), "OUT");
    }
}
