//! 5-of-7 hand evaluation.
//!
//! Each 5-card subset is classified into a category plus a category-specific
//! tie-break vector, packed base-16 into a `u32` strength score; the best
//! subset wins. Public ranks invert the score so that smaller = stronger and
//! the royal flush evaluates to rank 1.

use super::cards::{Card, Rank};
use super::errors::EngineError;
use super::types::SeatId;
use std::collections::BTreeMap;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum HandCategory {
    HighCard = 0,
    OnePair = 1,
    TwoPair = 2,
    ThreeOfAKind = 3,
    Straight = 4,
    Flush = 5,
    FullHouse = 6,
    FourOfAKind = 7,
    StraightFlush = 8,
}

impl HandCategory {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => HandCategory::HighCard,
            1 => HandCategory::OnePair,
            2 => HandCategory::TwoPair,
            3 => HandCategory::ThreeOfAKind,
            4 => HandCategory::Straight,
            5 => HandCategory::Flush,
            6 => HandCategory::FullHouse,
            7 => HandCategory::FourOfAKind,
            _ => HandCategory::StraightFlush,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HandCategory::HighCard => "High Card",
            HandCategory::OnePair => "Pair",
            HandCategory::TwoPair => "Two Pair",
            HandCategory::ThreeOfAKind => "Three of a Kind",
            HandCategory::Straight => "Straight",
            HandCategory::Flush => "Flush",
            HandCategory::FullHouse => "Full House",
            HandCategory::FourOfAKind => "Four of a Kind",
            HandCategory::StraightFlush => "Straight Flush",
        }
    }
}

/// Base-16 multipliers for packing (cat, c1..c5).
const M5: u32 = 1_048_576; // 16^5
const M4: u32 = 65_536; // 16^4
const M3: u32 = 4_096; // 16^3
const M2: u32 = 256; // 16^2
const M1: u32 = 16; // 16^1
const M0: u32 = 1; // 16^0

/// Strongest possible score: a royal flush, (8, [14,0,0,0,0]).
const BEST_SCORE: u32 = 8 * M5 + 14 * M4;

/// Public hand rank: a total order where smaller is stronger and the royal
/// flush is rank 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct HandRank(pub u32);

impl HandRank {
    fn from_score(score: u32) -> Self {
        HandRank(BEST_SCORE + 1 - score)
    }

    pub fn category(self) -> HandCategory {
        let score = BEST_SCORE + 1 - self.0;
        HandCategory::from_u8((score / M5) as u8)
    }

    pub fn class_name(self) -> &'static str {
        self.category().name()
    }
}

#[inline]
fn pack_score(cat: HandCategory, c: [u8; 5]) -> u32 {
    (cat.as_u8() as u32) * M5
        + (c[0] as u32) * M4
        + (c[1] as u32) * M3
        + (c[2] as u32) * M2
        + (c[3] as u32) * M1
        + (c[4] as u32) * M0
}

/// Straight high card over 5 distinct descending ranks; handles the wheel.
fn straight_high(uniq_desc: &[Rank]) -> Option<Rank> {
    if uniq_desc.len() != 5 {
        return None;
    }
    let r = uniq_desc;
    if r.windows(2).all(|w| w[0] == w[1] + 1) {
        return Some(r[0]);
    }
    if r == [14, 5, 4, 3, 2] {
        return Some(5); // wheel: A-5-4-3-2
    }
    None
}

/// Classify exactly five cards into (category, tie-break vector).
fn classify_five(cards: [Card; 5]) -> (HandCategory, [u8; 5]) {
    let mut ranks: Vec<Rank> = cards.iter().map(|c| c.rank).collect();
    ranks.sort_unstable_by(|a, b| b.cmp(a));

    let same_suit = cards.iter().all(|c| c.suit == cards[0].suit);

    let mut uniq = ranks.clone();
    uniq.dedup();

    // (count, rank) groups, highest count then highest rank first
    let mut groups: Vec<(u8, Rank)> = uniq
        .iter()
        .map(|&r| (ranks.iter().filter(|&&x| x == r).count() as u8, r))
        .collect();
    groups.sort_unstable_by(|a, b| b.cmp(a));

    if let Some(high) = straight_high(&uniq) {
        let cat = if same_suit {
            HandCategory::StraightFlush
        } else {
            HandCategory::Straight
        };
        return (cat, [high, 0, 0, 0, 0]);
    }
    if same_suit {
        return (
            HandCategory::Flush,
            [ranks[0], ranks[1], ranks[2], ranks[3], ranks[4]],
        );
    }
    match groups[0].0 {
        4 => (HandCategory::FourOfAKind, [groups[0].1, groups[1].1, 0, 0, 0]),
        3 if groups[1].0 >= 2 => {
            (HandCategory::FullHouse, [groups[0].1, groups[1].1, 0, 0, 0])
        }
        3 => (
            HandCategory::ThreeOfAKind,
            [groups[0].1, groups[1].1, groups[2].1, 0, 0],
        ),
        2 if groups[1].0 == 2 => (
            HandCategory::TwoPair,
            [groups[0].1, groups[1].1, groups[2].1, 0, 0],
        ),
        2 => (
            HandCategory::OnePair,
            [groups[0].1, groups[1].1, groups[2].1, groups[3].1, 0],
        ),
        _ => (
            HandCategory::HighCard,
            [ranks[0], ranks[1], ranks[2], ranks[3], ranks[4]],
        ),
    }
}

/// Best packed score over every 5-card subset of `cards` (5..=7 cards).
fn best_score(cards: &[Card]) -> u32 {
    let n = cards.len();
    let mut best = 0u32;
    for a in 0..n - 4 {
        for b in a + 1..n - 3 {
            for c in b + 1..n - 2 {
                for d in c + 1..n - 1 {
                    for e in d + 1..n {
                        let five = [cards[a], cards[b], cards[c], cards[d], cards[e]];
                        let (cat, tiebreak) = classify_five(five);
                        best = best.max(pack_score(cat, tiebreak));
                    }
                }
            }
        }
    }
    best
}

/// Evaluate two hole cards against a 3..=5 card board. Smaller rank is
/// stronger; invariant under permutation of hole and board.
pub fn evaluate(hole: [Card; 2], board: &[Card]) -> Result<HandRank, EngineError> {
    if !(3..=5).contains(&board.len()) {
        return Err(EngineError::BadBoard {
            expected: 5,
            got: board.len(),
        });
    }
    let mut cards = Vec::with_capacity(7);
    cards.extend_from_slice(&hole);
    cards.extend_from_slice(board);
    Ok(HandRank::from_score(best_score(&cards)))
}

/// All seats tied at the minimum (best) rank over a complete board.
pub fn winners(
    hole_cards: &BTreeMap<SeatId, [Card; 2]>,
    board: &[Card],
) -> Result<(Vec<SeatId>, HandRank), EngineError> {
    if board.len() != 5 {
        return Err(EngineError::BadBoard {
            expected: 5,
            got: board.len(),
        });
    }
    let mut ranks: BTreeMap<SeatId, HandRank> = BTreeMap::new();
    for (&seat, &hole) in hole_cards {
        ranks.insert(seat, evaluate(hole, board)?);
    }
    let best = *ranks
        .values()
        .min()
        .ok_or_else(|| EngineError::InvariantViolation("no hands at showdown".into()))?;
    let tied = ranks
        .iter()
        .filter(|(_, &r)| r == best)
        .map(|(&s, _)| s)
        .collect();
    Ok((tied, best))
}
