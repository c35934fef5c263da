//! Per-seat observation: the public state plus the seat's own private
//! cards, produced on demand and discarded after use.

use crate::engine::{AgentActionKind, Card, Chips, SeatId, Street};
use serde::{Deserialize, Serialize};

/// What one player may see about another seat.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeatView {
    pub seat: SeatId,
    pub name: String,
    pub stack: Chips,
    pub is_active: bool,
    pub is_folded: bool,
}

/// One public action with its amount, as shown to agents.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionView {
    pub street: Street,
    pub seat: SeatId,
    pub action: String,
    pub amount: Chips,
}

/// Game state observable by a single seat.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Observation {
    pub hand_number: u64,
    pub street: Street,

    pub my_seat: SeatId,
    pub my_position: String,
    pub my_hole_cards: [Card; 2],
    pub my_stack: Chips,

    pub community_cards: Vec<Card>,
    pub pot_size: Chips,
    /// Chips this seat must add to continue (not the table's raw bet level).
    pub to_call: Chips,
    pub min_raise_to: Chips,
    /// Effective all-in: stack plus chips already in this round.
    pub max_raise_to: Chips,

    pub small_blind: Chips,
    pub big_blind: Chips,
    pub button_seat: SeatId,

    pub players: Vec<SeatView>,
    pub actions_this_hand: Vec<ActionView>,
    pub legal_actions: Vec<AgentActionKind>,
}

impl Observation {
    pub fn may(&self, kind: AgentActionKind) -> bool {
        self.legal_actions.contains(&kind)
    }

    fn format_chips(&self, chips: Chips) -> String {
        if self.big_blind > 0 {
            let bbs = chips as f64 / self.big_blind as f64;
            format!("{bbs:.1}BB ({chips} chips)")
        } else {
            format!("{chips} chips")
        }
    }

    /// Human-readable rendering sent to the model.
    pub fn render_prompt(&self) -> String {
        let mut lines = vec![
            format!("=== POKER DECISION - Hand #{} ===", self.hand_number),
            String::new(),
            "YOUR INFORMATION:".to_string(),
            format!("  Seat: {}", self.my_seat),
            format!("  Position: {}", self.my_position),
            format!(
                "  Hole Cards: {} {}",
                self.my_hole_cards[0], self.my_hole_cards[1]
            ),
            format!("  Stack: {}", self.format_chips(self.my_stack)),
            String::new(),
            "GAME STATE:".to_string(),
            format!("  Street: {}", self.street),
            format!(
                "  Community Cards: {}",
                if self.community_cards.is_empty() {
                    "None".to_string()
                } else {
                    self.community_cards
                        .iter()
                        .map(|c| c.to_string())
                        .collect::<Vec<_>>()
                        .join(" ")
                }
            ),
            format!("  Pot: {}", self.format_chips(self.pot_size)),
            format!(
                "  To Call: {}",
                if self.to_call == 0 {
                    "nothing (can check)".to_string()
                } else {
                    self.format_chips(self.to_call)
                }
            ),
            String::new(),
            format!("BLINDS: {}/{}", self.small_blind, self.big_blind),
            format!("Button: Seat {}", self.button_seat),
            String::new(),
            "PLAYERS:".to_string(),
        ];

        for p in &self.players {
            let status = if p.is_folded {
                "folded"
            } else if !p.is_active {
                "out"
            } else {
                "active"
            };
            lines.push(format!(
                "  Seat {}: {} - {} ({})",
                p.seat,
                p.name,
                self.format_chips(p.stack),
                status
            ));
        }

        lines.push(String::new());
        lines.push("ACTION HISTORY THIS HAND:".to_string());
        if self.actions_this_hand.is_empty() {
            lines.push("  No actions yet".to_string());
        } else {
            let mut current_street: Option<Street> = None;
            for a in &self.actions_this_hand {
                if current_street != Some(a.street) {
                    current_street = Some(a.street);
                    lines.push(format!("  {}:", a.street.as_str().to_uppercase()));
                }
                let mut action = a.action.clone();
                if a.amount > 0 {
                    action.push_str(&format!(" {}", a.amount));
                }
                lines.push(format!("    Seat {}: {}", a.seat, action));
            }
        }

        lines.push(String::new());
        lines.push("LEGAL ACTIONS:".to_string());
        lines.push(format!(
            "  {}",
            self.legal_actions
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ));
        if self.may(AgentActionKind::Raise) {
            lines.push(format!(
                "  Raise range: {} to {}",
                self.format_chips(self.min_raise_to),
                self.format_chips(self.max_raise_to)
            ));
        }

        lines.push(String::new());
        lines.push("=== MAKE YOUR DECISION ===".to_string());

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation() -> Observation {
        Observation {
            hand_number: 3,
            street: Street::Flop,
            my_seat: 2,
            my_position: "BB".to_string(),
            my_hole_cards: ["Ah".parse().unwrap(), "Kd".parse().unwrap()],
            my_stack: 180,
            community_cards: vec![
                "2c".parse().unwrap(),
                "7d".parse().unwrap(),
                "Jh".parse().unwrap(),
            ],
            pot_size: 40,
            to_call: 10,
            min_raise_to: 20,
            max_raise_to: 190,
            small_blind: 1,
            big_blind: 2,
            button_seat: 1,
            players: vec![
                SeatView {
                    seat: 1,
                    name: "Alice".to_string(),
                    stack: 200,
                    is_active: true,
                    is_folded: false,
                },
                SeatView {
                    seat: 2,
                    name: "Bob".to_string(),
                    stack: 180,
                    is_active: true,
                    is_folded: false,
                },
            ],
            actions_this_hand: vec![ActionView {
                street: Street::Flop,
                seat: 1,
                action: "bet".to_string(),
                amount: 10,
            }],
            legal_actions: vec![
                AgentActionKind::Fold,
                AgentActionKind::Call,
                AgentActionKind::Raise,
            ],
        }
    }

    #[test]
    fn prompt_contains_private_and_public_state() {
        let prompt = observation().render_prompt();
        assert!(prompt.contains("Hand #3"));
        assert!(prompt.contains("Hole Cards: Ah Kd"));
        assert!(prompt.contains("2c 7d Jh"));
        assert!(prompt.contains("To Call: 5.0BB (10 chips)"));
        assert!(prompt.contains("fold, call, raise"));
        assert!(prompt.contains("Raise range"));
    }

    #[test]
    fn prompt_omits_raise_range_when_raising_is_illegal() {
        let mut obs = observation();
        obs.legal_actions = vec![AgentActionKind::Fold, AgentActionKind::Call];
        let prompt = obs.render_prompt();
        assert!(!prompt.contains("Raise range"));
    }

    #[test]
    fn observation_serializes_for_traces() {
        let value = serde_json::to_value(observation()).unwrap();
        assert_eq!(value["my_hole_cards"][0], "Ah");
        assert_eq!(value["legal_actions"][0], "fold");
        assert_eq!(value["street"], "flop");
    }
}
