//! Poker action definitions, the legal-action set and the validator.

use super::errors::ActionError;
use super::types::{Chips, SeatId};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Fold,
    Check,
    Call,
    Bet,
    Raise,
    AllIn,
    PostSb,
    PostBb,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Fold => "fold",
            ActionKind::Check => "check",
            ActionKind::Call => "call",
            ActionKind::Bet => "bet",
            ActionKind::Raise => "raise",
            ActionKind::AllIn => "all_in",
            ActionKind::PostSb => "post_sb",
            ActionKind::PostBb => "post_bb",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An engine-internal action. `amount` is the total committed this round
/// for bets and raises, the chips added for calls, zero otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    #[serde(default)]
    pub amount: Chips,
    #[serde(default)]
    pub is_all_in: bool,
}

impl Action {
    pub fn fold() -> Self {
        Self {
            kind: ActionKind::Fold,
            amount: 0,
            is_all_in: false,
        }
    }

    pub fn check() -> Self {
        Self {
            kind: ActionKind::Check,
            amount: 0,
            is_all_in: false,
        }
    }

    pub fn call(amount: Chips, is_all_in: bool) -> Self {
        Self {
            kind: ActionKind::Call,
            amount,
            is_all_in,
        }
    }

    pub fn bet(amount: Chips, is_all_in: bool) -> Self {
        Self {
            kind: ActionKind::Bet,
            amount,
            is_all_in,
        }
    }

    pub fn raise(amount: Chips, is_all_in: bool) -> Self {
        Self {
            kind: ActionKind::Raise,
            amount,
            is_all_in,
        }
    }

    pub fn all_in(amount: Chips) -> Self {
        Self {
            kind: ActionKind::AllIn,
            amount,
            is_all_in: true,
        }
    }

    pub fn is_aggressive(&self) -> bool {
        matches!(
            self.kind,
            ActionKind::Bet | ActionKind::Raise | ActionKind::AllIn
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ActionKind::Fold | ActionKind::Check | ActionKind::PostSb | ActionKind::PostBb => {
                f.write_str(self.kind.as_str())
            }
            ActionKind::Call => {
                write!(f, "call {}", self.amount)?;
                if self.is_all_in {
                    f.write_str(" (all-in)")?;
                }
                Ok(())
            }
            ActionKind::Bet | ActionKind::Raise | ActionKind::AllIn => {
                write!(f, "raise to {}", self.amount)?;
                if self.is_all_in {
                    f.write_str(" (all-in)")?;
                }
                Ok(())
            }
        }
    }
}

/// The restricted action vocabulary an agent may submit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentActionKind {
    Fold,
    Check,
    Call,
    Raise,
}

impl AgentActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentActionKind::Fold => "fold",
            AgentActionKind::Check => "check",
            AgentActionKind::Call => "call",
            AgentActionKind::Raise => "raise",
        }
    }
}

impl fmt::Display for AgentActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AgentActionKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fold" => Ok(AgentActionKind::Fold),
            "check" => Ok(AgentActionKind::Check),
            "call" => Ok(AgentActionKind::Call),
            "raise" => Ok(AgentActionKind::Raise),
            _ => Err(()),
        }
    }
}

/// Per-player state the validator needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayerBetState {
    pub seat: SeatId,
    pub stack: Chips,
    pub bet_this_round: Chips,
    pub has_acted: bool,
    pub is_all_in: bool,
    pub has_folded: bool,
}

/// Street-level betting state the validator needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BettingView {
    pub pot: Chips,
    pub current_bet: Chips,
    pub min_raise: Chips,
    pub big_blind: Chips,
    pub last_raiser: Option<SeatId>,
}

impl BettingView {
    pub fn to_call(&self, player: &PlayerBetState) -> Chips {
        self.current_bet.saturating_sub(player.bet_this_round)
    }
}

/// Whether the player may still open or raise the betting. A full raise
/// resets `has_acted` for everyone behind it, so an already-acted player
/// facing only an all-in for less is not reopened.
fn may_raise(player: &PlayerBetState, betting: &BettingView) -> bool {
    betting.current_bet == 0 || !player.has_acted
}

/// Every legal action for a player in the current betting state.
pub fn legal_actions(player: &PlayerBetState, betting: &BettingView) -> Vec<Action> {
    if player.has_folded || player.is_all_in {
        return Vec::new();
    }

    let mut actions = Vec::new();
    let to_call = betting.to_call(player);

    if to_call > 0 {
        actions.push(Action::fold());
    }

    if to_call == 0 {
        actions.push(Action::check());
    } else if to_call >= player.stack {
        actions.push(Action::call(player.stack, true));
    } else {
        actions.push(Action::call(to_call, false));
    }

    if player.stack > to_call && may_raise(player, betting) {
        if betting.current_bet == 0 {
            let min_bet = betting.big_blind;
            if player.stack >= min_bet {
                actions.push(Action::bet(min_bet, player.stack == min_bet));
                if player.stack > min_bet {
                    actions.push(Action::all_in(player.stack + player.bet_this_round));
                }
            }
        } else {
            let min_raise_to = betting.current_bet + betting.min_raise;
            let max_raise_to = player.stack + player.bet_this_round;
            if max_raise_to >= min_raise_to {
                actions.push(Action::raise(min_raise_to, max_raise_to == min_raise_to));
                if max_raise_to > min_raise_to {
                    actions.push(Action::all_in(max_raise_to));
                }
            } else {
                // all-in for less than a full raise
                actions.push(Action::all_in(max_raise_to));
            }
        }
    }

    actions
}

/// Validate a proposed engine action against the player and betting state.
pub fn validate(
    action: &Action,
    player: &PlayerBetState,
    betting: &BettingView,
) -> Result<(), ActionError> {
    if player.has_folded {
        return Err(ActionError::AlreadyFolded);
    }
    if player.is_all_in {
        return Err(ActionError::AlreadyAllIn);
    }

    let to_call = betting.to_call(player);

    match action.kind {
        ActionKind::Fold => {
            if to_call == 0 {
                return Err(ActionError::FoldWithNothingToCall);
            }
            Ok(())
        }
        ActionKind::Check => {
            if to_call > 0 {
                return Err(ActionError::CheckFacingBet { to_call });
            }
            Ok(())
        }
        ActionKind::Call => {
            if to_call == 0 {
                return Err(ActionError::NothingToCall);
            }
            let expected = to_call.min(player.stack);
            if action.amount != expected {
                return Err(ActionError::BadCallAmount {
                    expected,
                    got: action.amount,
                });
            }
            Ok(())
        }
        ActionKind::Bet | ActionKind::Raise | ActionKind::AllIn => {
            let maximum = player.stack + player.bet_this_round;
            if action.amount > maximum {
                return Err(ActionError::OverStack { maximum });
            }
            if !may_raise(player, betting) {
                return Err(ActionError::ActionNotReopened);
            }
            let is_full_stack = action.is_all_in && action.amount == maximum;
            if betting.current_bet == 0 {
                if action.amount < betting.big_blind && !is_full_stack {
                    return Err(ActionError::BetBelowMinimum {
                        minimum: betting.big_blind,
                    });
                }
            } else {
                let minimum_to = betting.current_bet + betting.min_raise;
                if action.amount < minimum_to && !is_full_stack {
                    return Err(ActionError::RaiseBelowMinimum { minimum_to });
                }
            }
            Ok(())
        }
        ActionKind::PostSb | ActionKind::PostBb => Ok(()),
    }
}

/// Map an agent's `(kind, raise_to)` to an engine action. Fold with nothing
/// to call normalizes to check; `raise_to` is clamped into
/// `[min_raise_to, stack + bet_this_round]`; a "raise" of an unopened pot
/// becomes a bet.
pub fn normalize(
    kind: AgentActionKind,
    raise_to: Option<Chips>,
    player: &PlayerBetState,
    betting: &BettingView,
) -> Result<Action, ActionError> {
    let to_call = betting.to_call(player);

    match kind {
        AgentActionKind::Fold => {
            if to_call == 0 {
                Ok(Action::check())
            } else {
                Ok(Action::fold())
            }
        }
        AgentActionKind::Check => {
            if to_call > 0 {
                Err(ActionError::CheckFacingBet { to_call })
            } else {
                Ok(Action::check())
            }
        }
        AgentActionKind::Call => {
            if to_call == 0 {
                Ok(Action::check())
            } else if to_call >= player.stack {
                Ok(Action::call(player.stack, true))
            } else {
                Ok(Action::call(to_call, false))
            }
        }
        AgentActionKind::Raise => {
            let Some(requested) = raise_to else {
                return Err(ActionError::RaiseRequiresAmount);
            };
            let max_to = player.stack + player.bet_this_round;
            let min_to = if betting.current_bet == 0 {
                betting.big_blind
            } else {
                betting.current_bet + betting.min_raise
            };
            let to = if max_to < min_to {
                max_to // all-in for less than a full raise
            } else {
                requested.clamp(min_to, max_to)
            };
            let is_all_in = to == max_to;
            if betting.current_bet == 0 {
                Ok(Action::bet(to, is_all_in))
            } else {
                Ok(Action::raise(to, is_all_in))
            }
        }
    }
}
