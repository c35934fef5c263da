//! The betting-round state machine for a single hand.

use super::actions::{self, Action, ActionKind, BettingView};
use super::blinds::BlindSchedule;
use super::cards::{Card, Deck};
use super::errors::EngineError;
use super::eval;
use super::state::{HandAction, HandResult, Player, SidePot};
use super::types::{Chips, SeatId, Street};
use std::collections::BTreeMap;

const LOG_TARGET: &str = "engine::game";

/// State of one hand: Preflop -> Flop -> Turn -> River -> Showdown.
///
/// Owned by the tournament runner for the lifetime of a run; all mutation
/// goes through `start_hand` and `apply`.
#[derive(Debug)]
pub struct HandState {
    players: BTreeMap<SeatId, Player>,
    deck: Deck,
    schedule: BlindSchedule,
    pub button_seat: SeatId,

    pub hand_number: u64,
    pub street: Street,
    pub community: Vec<Card>,
    pub pot: Chips,
    pub current_bet: Chips,
    pub min_raise: Chips,
    pub last_raiser: Option<SeatId>,
    pub actions: Vec<HandAction>,
    pub action_to: Option<SeatId>,
    side_pots: Vec<SidePot>,
    complete: bool,
    result: Option<HandResult>,
}

impl HandState {
    pub fn new(
        players: Vec<Player>,
        deck: Deck,
        schedule: BlindSchedule,
        button_seat: SeatId,
    ) -> Self {
        Self {
            players: players.into_iter().map(|p| (p.seat, p)).collect(),
            deck,
            schedule,
            button_seat,
            hand_number: 0,
            street: Street::Preflop,
            community: Vec::new(),
            pot: 0,
            current_bet: 0,
            min_raise: 0,
            last_raiser: None,
            actions: Vec::new(),
            action_to: None,
            side_pots: Vec::new(),
            complete: false,
            result: None,
        }
    }

    pub fn players(&self) -> &BTreeMap<SeatId, Player> {
        &self.players
    }

    pub fn player(&self, seat: SeatId) -> Result<&Player, EngineError> {
        self.players.get(&seat).ok_or(EngineError::UnknownSeat(seat))
    }

    /// Seats still in the hand (not folded).
    pub fn active_seats(&self) -> Vec<SeatId> {
        self.players
            .values()
            .filter(|p| !p.has_folded)
            .map(|p| p.seat)
            .collect()
    }

    /// Seats that can still take actions (not folded, not all-in).
    pub fn seats_to_act(&self) -> Vec<SeatId> {
        self.players
            .values()
            .filter(|p| !p.has_folded && !p.is_all_in)
            .map(|p| p.seat)
            .collect()
    }

    /// All seats in clockwise order starting left of the button, ending at
    /// the button.
    pub fn seats_in_order(&self) -> Vec<SeatId> {
        let seats: Vec<SeatId> = self.players.keys().copied().collect();
        let split = seats
            .iter()
            .position(|&s| s > self.button_seat)
            .unwrap_or(seats.len());
        let mut order: Vec<SeatId> = seats[split..].to_vec();
        order.extend_from_slice(&seats[..split]);
        order
    }

    pub fn betting_view(&self) -> BettingView {
        let (_, bb) = self.schedule.blinds(self.hand_number.max(1));
        BettingView {
            pot: self.pot,
            current_bet: self.current_bet,
            min_raise: self.min_raise,
            big_blind: bb,
            last_raiser: self.last_raiser,
        }
    }

    pub fn blinds(&self) -> (Chips, Chips) {
        self.schedule.blinds(self.hand_number.max(1))
    }

    pub fn blind_level(&self) -> u32 {
        self.schedule.level(self.hand_number.max(1))
    }

    pub fn to_call(&self, seat: SeatId) -> Result<Chips, EngineError> {
        let player = self.player(seat)?;
        Ok(self.betting_view().to_call(&player.bet_state()))
    }

    pub fn legal_actions_for(&self, seat: SeatId) -> Result<Vec<Action>, EngineError> {
        let player = self.player(seat)?;
        Ok(actions::legal_actions(
            &player.bet_state(),
            &self.betting_view(),
        ))
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn result(&self) -> Option<&HandResult> {
        self.result.as_ref()
    }

    pub fn side_pots(&self) -> &[SidePot] {
        &self.side_pots
    }

    /// Begin a new hand: reset seats, reshuffle, deal hole cards clockwise
    /// from left of the button (two at a time), post blinds and point the
    /// action at the first seat after the big blind.
    pub fn start_hand(&mut self, hand_number: u64) -> Result<(), EngineError> {
        self.hand_number = hand_number;
        self.street = Street::Preflop;
        self.community.clear();
        self.pot = 0;
        self.side_pots.clear();
        self.current_bet = 0;
        self.min_raise = 0;
        self.last_raiser = None;
        self.actions.clear();
        self.action_to = None;
        self.complete = false;
        self.result = None;

        for player in self.players.values_mut() {
            player.reset_for_hand();
            if player.stack == 0 {
                player.has_folded = true;
            }
        }

        if self.active_seats().len() < 2 {
            return Err(EngineError::InvariantViolation(
                "a hand requires at least two seats with chips".into(),
            ));
        }

        self.deck.shuffle();
        let deal_order: Vec<SeatId> = self
            .seats_in_order()
            .into_iter()
            .filter(|s| !self.players[s].has_folded)
            .collect();
        for seat in &deal_order {
            let cards = self.deck.deal(2)?;
            if let Some(player) = self.players.get_mut(seat) {
                player.hole_cards = Some([cards[0], cards[1]]);
            }
        }

        self.post_blinds();
        self.set_preflop_action();
        if self.action_to.is_none() {
            // blinds left at most one seat able to act
            self.close_street()?;
        }
        Ok(())
    }

    fn post_blinds(&mut self) {
        let (sb, bb) = self.schedule.blinds(self.hand_number);
        self.min_raise = bb;

        let order: Vec<SeatId> = self
            .seats_in_order()
            .into_iter()
            .filter(|s| !self.players[s].has_folded)
            .collect();
        if order.len() < 2 {
            return;
        }

        let (sb_seat, bb_seat) = if order.len() == 2 {
            // Heads-up: the button posts the small blind.
            let sb_seat = if order.contains(&self.button_seat) {
                self.button_seat
            } else {
                order[0]
            };
            let bb_seat = *order.iter().find(|&&s| s != sb_seat).unwrap_or(&order[0]);
            (sb_seat, bb_seat)
        } else {
            // `order` starts left of the button, so the first two entries
            // are the blinds even when the button seat is eliminated.
            let btn_idx = order.iter().position(|&s| s == self.button_seat);
            match btn_idx {
                Some(i) => (order[(i + 1) % order.len()], order[(i + 2) % order.len()]),
                None => (order[0], order[1]),
            }
        };

        self.post_blind(sb_seat, sb, ActionKind::PostSb);
        self.post_blind(bb_seat, bb, ActionKind::PostBb);

        self.current_bet = bb;
        self.last_raiser = None;
    }

    fn post_blind(&mut self, seat: SeatId, amount: Chips, kind: ActionKind) {
        let Some(player) = self.players.get_mut(&seat) else {
            return;
        };
        let actual = amount.min(player.stack);
        player.stack -= actual;
        player.bet_this_round = actual;
        player.bet_this_hand = actual;
        self.pot += actual;
        if player.stack == 0 {
            player.is_all_in = true;
        }
        let is_all_in = player.is_all_in;
        self.actions.push(HandAction {
            street: self.street,
            seat,
            action: Action {
                kind,
                amount: actual,
                is_all_in,
            },
            pot_after: self.pot,
        });
    }

    fn set_preflop_action(&mut self) {
        let order: Vec<SeatId> = self
            .seats_in_order()
            .into_iter()
            .filter(|s| {
                let p = &self.players[s];
                !p.has_folded && !p.is_all_in
            })
            .collect();
        if order.is_empty() {
            self.action_to = None;
            return;
        }

        let bb_seat = self
            .actions
            .iter()
            .find(|a| a.action.kind == ActionKind::PostBb)
            .map(|a| a.seat);
        self.action_to = match bb_seat.and_then(|bb| order.iter().position(|&s| s == bb)) {
            Some(idx) => Some(order[(idx + 1) % order.len()]),
            None => Some(order[0]),
        };
    }

    fn set_postflop_action(&mut self) {
        let order: Vec<SeatId> = self
            .seats_in_order()
            .into_iter()
            .filter(|s| {
                let p = &self.players[s];
                !p.has_folded && !p.is_all_in
            })
            .collect();
        self.action_to = order.first().copied();
    }

    /// Apply a validated action from the seat currently holding the action.
    pub fn apply(&mut self, seat: SeatId, action: Action) -> Result<(), EngineError> {
        if self.action_to != Some(seat) {
            return Err(EngineError::OutOfTurn {
                seat,
                action_to: self.action_to,
            });
        }
        if matches!(action.kind, ActionKind::PostSb | ActionKind::PostBb) {
            return Err(EngineError::InvariantViolation(
                "blinds are posted by the engine".into(),
            ));
        }

        let view = self.betting_view();
        let player = self.player(seat)?;
        actions::validate(&action, &player.bet_state(), &view)?;

        match action.kind {
            ActionKind::Fold => {
                if let Some(p) = self.players.get_mut(&seat) {
                    p.has_folded = true;
                }
            }
            ActionKind::Check => {}
            ActionKind::Call => {
                self.commit_chips(seat, action.amount)?;
            }
            ActionKind::Bet | ActionKind::Raise | ActionKind::AllIn => {
                let bet_this_round = self.players[&seat].bet_this_round;
                let added = action.amount.saturating_sub(bet_this_round);
                self.commit_chips(seat, added)?;
                if action.amount > self.current_bet {
                    let raise_amount = action.amount - view.current_bet;
                    let full_raise = raise_amount >= view.min_raise;
                    self.current_bet = action.amount;
                    if full_raise {
                        self.min_raise = raise_amount.max(view.big_blind);
                        self.last_raiser = Some(seat);
                        // A full raise reopens the action for everyone behind.
                        for p in self.players.values_mut() {
                            if p.seat != seat && !p.has_folded && !p.is_all_in {
                                p.has_acted = false;
                            }
                        }
                    }
                }
            }
            ActionKind::PostSb | ActionKind::PostBb => unreachable!(),
        }

        if let Some(p) = self.players.get_mut(&seat) {
            p.has_acted = true;
        }
        self.actions.push(HandAction {
            street: self.street,
            seat,
            action,
            pot_after: self.pot,
        });

        self.advance()
    }

    fn commit_chips(&mut self, seat: SeatId, amount: Chips) -> Result<(), EngineError> {
        let player = self
            .players
            .get_mut(&seat)
            .ok_or(EngineError::UnknownSeat(seat))?;
        player.stack = player.stack.checked_sub(amount).ok_or_else(|| {
            EngineError::InvariantViolation(format!(
                "seat {seat} committing {amount} with stack {}",
                player.stack
            ))
        })?;
        player.bet_this_round += amount;
        player.bet_this_hand += amount;
        if player.stack == 0 {
            player.is_all_in = true;
        }
        self.pot += amount;
        Ok(())
    }

    fn advance(&mut self) -> Result<(), EngineError> {
        if self.active_seats().len() == 1 {
            self.end_hand_by_folds();
            return Ok(());
        }

        let to_act = self.seats_to_act();
        if to_act.is_empty() {
            return self.close_street();
        }

        let all_acted = to_act.iter().all(|s| self.players[s].has_acted);
        let bets_matched = self.active_seats().iter().all(|s| {
            let p = &self.players[s];
            p.bet_this_round == self.current_bet || p.is_all_in
        });
        if all_acted && bets_matched {
            return self.close_street();
        }

        // Seats still owing an action or chips this street.
        let owing: Vec<SeatId> = to_act
            .into_iter()
            .filter(|s| {
                let p = &self.players[s];
                !p.has_acted || p.bet_this_round < self.current_bet
            })
            .collect();
        if owing.is_empty() {
            return self.close_street();
        }

        let order = self.seats_in_order();
        let from = self.action_to.unwrap_or(self.button_seat);
        let start = order.iter().position(|&s| s == from).unwrap_or(0);
        for i in 1..=order.len() {
            let candidate = order[(start + i) % order.len()];
            if owing.contains(&candidate) {
                self.action_to = Some(candidate);
                return Ok(());
            }
        }
        self.close_street()
    }

    fn close_street(&mut self) -> Result<(), EngineError> {
        for player in self.players.values_mut() {
            player.reset_for_street();
        }
        let (_, bb) = self.schedule.blinds(self.hand_number);
        self.current_bet = 0;
        self.min_raise = bb;
        self.last_raiser = None;

        match self.street {
            Street::Preflop => {
                self.street = Street::Flop;
                let cards = self.deck.deal(3)?;
                self.community.extend(cards);
                self.set_postflop_action();
            }
            Street::Flop => {
                self.street = Street::Turn;
                self.community.push(self.deck.deal_one()?);
                self.set_postflop_action();
            }
            Street::Turn => {
                self.street = Street::River;
                self.community.push(self.deck.deal_one()?);
                self.set_postflop_action();
            }
            Street::River => return self.showdown(),
            Street::Showdown => return Ok(()),
        }

        // With at most one seat still able to act, betting is over; run the
        // remaining board out.
        if self.seats_to_act().len() <= 1 && self.active_seats().len() >= 2 {
            return self.run_out_board();
        }
        Ok(())
    }

    fn run_out_board(&mut self) -> Result<(), EngineError> {
        while self.community.len() < 5 {
            match self.community.len() {
                0 => {
                    let cards = self.deck.deal(3)?;
                    self.community.extend(cards);
                    self.street = Street::Flop;
                }
                3 => {
                    self.community.push(self.deck.deal_one()?);
                    self.street = Street::Turn;
                }
                _ => {
                    self.community.push(self.deck.deal_one()?);
                    self.street = Street::River;
                }
            }
        }
        self.showdown()
    }

    fn end_hand_by_folds(&mut self) {
        let winner_seat = self.active_seats()[0];
        let pot = self.pot;
        if let Some(winner) = self.players.get_mut(&winner_seat) {
            winner.stack += pot;
        }
        self.street = Street::Showdown;
        self.complete = true;
        self.action_to = None;
        self.result = Some(HandResult {
            hand_number: self.hand_number,
            winners: vec![winner_seat],
            winning_hand: String::new(),
            pot,
            pots_awarded: BTreeMap::from([(winner_seat, pot)]),
            showdown_cards: BTreeMap::new(),
        });
        tracing::debug!(
            target: LOG_TARGET,
            hand = self.hand_number,
            winner = winner_seat,
            pot,
            "hand won without showdown"
        );
    }

    fn showdown(&mut self) -> Result<(), EngineError> {
        self.street = Street::Showdown;
        self.complete = true;
        self.action_to = None;

        let actives = self.active_seats();
        if actives.len() == 1 {
            self.end_hand_by_folds();
            return Ok(());
        }

        let mut holes: BTreeMap<SeatId, [Card; 2]> = BTreeMap::new();
        for &seat in &actives {
            let cards = self.players[&seat].hole_cards.ok_or_else(|| {
                EngineError::InvariantViolation(format!("seat {seat} has no hole cards at showdown"))
            })?;
            holes.insert(seat, cards);
        }

        let (overall_winners, best_rank) = eval::winners(&holes, &self.community)?;
        let pots = self.compute_pots()?;
        let pot_sum: Chips = pots.iter().map(|p| p.amount).sum();
        if pot_sum != self.pot {
            return Err(EngineError::InvariantViolation(format!(
                "side-pot sum {pot_sum} != pot {}",
                self.pot
            )));
        }

        let clockwise = self.seats_in_order();
        let mut pots_awarded: BTreeMap<SeatId, Chips> = BTreeMap::new();
        for pot in &pots {
            let mut pot_winners: Vec<SeatId> = overall_winners
                .iter()
                .copied()
                .filter(|s| pot.eligible.contains(s))
                .collect();
            if pot_winners.is_empty() {
                let eligible_holes: BTreeMap<SeatId, [Card; 2]> = holes
                    .iter()
                    .filter(|(s, _)| pot.eligible.contains(s))
                    .map(|(&s, &h)| (s, h))
                    .collect();
                if eligible_holes.is_empty() {
                    continue;
                }
                pot_winners = eval::winners(&eligible_holes, &self.community)?.0;
            }

            // Split evenly; odd chips go one at a time clockwise from the
            // first winner left of the button.
            let share = pot.amount / pot_winners.len() as Chips;
            let remainder = pot.amount % pot_winners.len() as Chips;
            let ordered: Vec<SeatId> = clockwise
                .iter()
                .copied()
                .filter(|s| pot_winners.contains(s))
                .collect();
            for (i, seat) in ordered.iter().enumerate() {
                let extra = if (i as Chips) < remainder { 1 } else { 0 };
                let won = share + extra;
                if won == 0 {
                    continue;
                }
                if let Some(p) = self.players.get_mut(seat) {
                    p.stack += won;
                }
                *pots_awarded.entry(*seat).or_insert(0) += won;
            }
        }

        self.side_pots = pots;
        self.result = Some(HandResult {
            hand_number: self.hand_number,
            winners: overall_winners,
            winning_hand: best_rank.class_name().to_string(),
            pot: self.pot,
            pots_awarded,
            showdown_cards: holes,
        });
        tracing::debug!(
            target: LOG_TARGET,
            hand = self.hand_number,
            pot = self.pot,
            winning_hand = best_rank.class_name(),
            "showdown complete"
        );
        Ok(())
    }

    /// Side pots by contribution tier. Levels come from the non-folded
    /// seats; folded contributions count toward pot amounts up to the tier
    /// they reach but never toward eligibility. Any folded surplus above
    /// the top tier accrues to the top pot so the tiers sum to the pot.
    fn compute_pots(&self) -> Result<Vec<SidePot>, EngineError> {
        let mut levels: Vec<Chips> = self
            .players
            .values()
            .filter(|p| !p.has_folded && p.bet_this_hand > 0)
            .map(|p| p.bet_this_hand)
            .collect();
        levels.sort_unstable();
        levels.dedup();
        if levels.is_empty() {
            return Err(EngineError::InvariantViolation(
                "no contributions at showdown".into(),
            ));
        }

        let mut pots: Vec<SidePot> = Vec::new();
        let mut prev: Chips = 0;
        let mut assigned: Chips = 0;
        for &level in &levels {
            let mut amount: Chips = 0;
            for p in self.players.values() {
                amount += p.bet_this_hand.min(level) - p.bet_this_hand.min(prev);
            }
            let eligible = self
                .players
                .values()
                .filter(|p| !p.has_folded && p.bet_this_hand >= level)
                .map(|p| p.seat)
                .collect();
            assigned += amount;
            pots.push(SidePot { amount, eligible });
            prev = level;
        }

        let total: Chips = self.players.values().map(|p| p.bet_this_hand).sum();
        if total > assigned {
            if let Some(last) = pots.last_mut() {
                last.amount += total - assigned;
            }
        }
        Ok(pots)
    }

    /// Rotate the dealer button to the next seat with chips, by ascending
    /// seat index when the previous button seat was eliminated.
    pub fn rotate_button(&mut self) {
        let active: Vec<SeatId> = self
            .players
            .values()
            .filter(|p| p.stack > 0)
            .map(|p| p.seat)
            .collect();
        if active.is_empty() {
            return;
        }

        if let Some(idx) = active.iter().position(|&s| s == self.button_seat) {
            self.button_seat = active[(idx + 1) % active.len()];
        } else {
            self.button_seat = active
                .iter()
                .copied()
                .find(|&s| s > self.button_seat)
                .unwrap_or(active[0]);
        }
    }
}
