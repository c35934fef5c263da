use super::types::{Chips, SeatId};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("player has already folded")]
    AlreadyFolded,
    #[error("player is already all-in")]
    AlreadyAllIn,
    #[error("cannot fold when there's nothing to call (check instead)")]
    FoldWithNothingToCall,
    #[error("cannot check when facing a bet of {to_call}")]
    CheckFacingBet { to_call: Chips },
    #[error("nothing to call (check instead)")]
    NothingToCall,
    #[error("call amount must be {expected}, got {got}")]
    BadCallAmount { expected: Chips, got: Chips },
    #[error("cannot bet more than stack allows ({maximum})")]
    OverStack { maximum: Chips },
    #[error("minimum bet is {minimum}")]
    BetBelowMinimum { minimum: Chips },
    #[error("minimum raise is to {minimum_to}")]
    RaiseBelowMinimum { minimum_to: Chips },
    #[error("action is not reopened; only call or fold are available")]
    ActionNotReopened,
    #[error("raise requires an amount")]
    RaiseRequiresAmount,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cannot deal {requested} cards, only {remaining} remain")]
    DeckExhausted { requested: usize, remaining: usize },
    #[error("invalid card string: {0}")]
    BadCard(String),
    #[error("not seat {seat}'s turn to act (action is on {action_to:?})")]
    OutOfTurn {
        seat: SeatId,
        action_to: Option<SeatId>,
    },
    #[error("no such seat: {0}")]
    UnknownSeat(SeatId),
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error("blind schedule invalid: {0}")]
    InvalidSchedule(&'static str),
    #[error("expected {expected} community cards, got {got}")]
    BadBoard { expected: usize, got: usize },
    #[error("hand invariant violated: {0}")]
    InvariantViolation(String),
}
