//! Per-hand player and result state.

use super::actions::{Action, PlayerBetState};
use super::cards::Card;
use super::types::{Chips, SeatId, Street};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Player {
    pub seat: SeatId,
    pub name: String,
    pub stack: Chips,
    pub hole_cards: Option<[Card; 2]>,
    pub bet_this_round: Chips,
    pub bet_this_hand: Chips,
    pub has_acted: bool,
    pub is_all_in: bool,
    pub has_folded: bool,
}

impl Player {
    pub fn new(seat: SeatId, name: impl Into<String>, stack: Chips) -> Self {
        Self {
            seat,
            name: name.into(),
            stack,
            hole_cards: None,
            bet_this_round: 0,
            bet_this_hand: 0,
            has_acted: false,
            is_all_in: false,
            has_folded: false,
        }
    }

    pub fn bet_state(&self) -> PlayerBetState {
        PlayerBetState {
            seat: self.seat,
            stack: self.stack,
            bet_this_round: self.bet_this_round,
            has_acted: self.has_acted,
            is_all_in: self.is_all_in,
            has_folded: self.has_folded,
        }
    }

    pub fn reset_for_hand(&mut self) {
        self.hole_cards = None;
        self.bet_this_round = 0;
        self.bet_this_hand = 0;
        self.has_acted = false;
        self.is_all_in = false;
        self.has_folded = false;
    }

    pub fn reset_for_street(&mut self) {
        self.bet_this_round = 0;
        self.has_acted = false;
    }
}

/// One entry of the public action log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandAction {
    pub street: Street,
    pub seat: SeatId,
    pub action: Action,
    pub pot_after: Chips,
}

/// A pot restricted to the seats that matched its contribution level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SidePot {
    pub amount: Chips,
    pub eligible: BTreeSet<SeatId>,
}

/// Result of a completed hand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandResult {
    pub hand_number: u64,
    pub winners: Vec<SeatId>,
    pub winning_hand: String,
    pub pot: Chips,
    pub pots_awarded: BTreeMap<SeatId, Chips>,
    pub showdown_cards: BTreeMap<SeatId, [Card; 2]>,
}
