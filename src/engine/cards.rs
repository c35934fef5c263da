//! Cards and the seeded deck.

use super::errors::EngineError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub type Rank = u8; // 2..=14 (T=10, J=11, Q=12, K=13, A=14)

const RANK_CHARS: &str = "23456789TJQKA";

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Suit {
    Clubs = 0,
    Diamonds = 1,
    Hearts = 2,
    Spades = 3,
}

impl Suit {
    pub fn as_char(self) -> char {
        match self {
            Suit::Clubs => 'c',
            Suit::Diamonds => 'd',
            Suit::Hearts => 'h',
            Suit::Spades => 's',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'c' => Some(Suit::Clubs),
            'd' => Some(Suit::Diamonds),
            'h' => Some(Suit::Hearts),
            's' => Some(Suit::Spades),
            _ => None,
        }
    }

    pub const ALL: [Suit; 4] = [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades];
}

/// A playing card. Value-typed; renders as two characters ("Ah", "Td").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Self {
        debug_assert!((2..=14).contains(&rank));
        Self { rank, suit }
    }

    fn rank_char(self) -> char {
        RANK_CHARS
            .chars()
            .nth((self.rank - 2) as usize)
            .unwrap_or('?')
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank_char(), self.suit.as_char())
    }
}

impl FromStr for Card {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let (Some(r), Some(u), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(EngineError::BadCard(s.to_string()));
        };
        let rank = RANK_CHARS
            .find(r.to_ascii_uppercase())
            .map(|i| i as Rank + 2)
            .ok_or_else(|| EngineError::BadCard(s.to_string()))?;
        let suit = Suit::from_char(u.to_ascii_lowercase())
            .ok_or_else(|| EngineError::BadCard(s.to_string()))?;
        Ok(Card::new(rank, suit))
    }
}

impl Serialize for Card {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Card {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CardVisitor;

        impl Visitor<'_> for CardVisitor {
            type Value = Card;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a two-character card string like \"Ah\"")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Card, E> {
                v.parse().map_err(|_| E::custom(format!("invalid card: {v}")))
            }
        }

        deserializer.deserialize_str(CardVisitor)
    }
}

/// The 52 distinct cards in a stable rank-major order.
pub fn standard_deck() -> Vec<Card> {
    let mut cards = Vec::with_capacity(52);
    for rank in 2..=14 {
        for suit in Suit::ALL {
            cards.push(Card::new(rank, suit));
        }
    }
    cards
}

/// A seeded deck. Given equal seeds, two decks return identical deal
/// sequences across an entire run; the RNG stream is bound at construction
/// and `shuffle` only advances it.
#[derive(Clone, Debug)]
pub struct Deck {
    cards: Vec<Card>,
    rng: StdRng,
    dealt: usize,
}

impl Deck {
    pub fn new(seed: u64) -> Self {
        let mut deck = Self {
            cards: standard_deck(),
            rng: StdRng::seed_from_u64(seed),
            dealt: 0,
        };
        deck.shuffle();
        deck
    }

    /// Rebuild the full 52 cards, reorder with the bound RNG and reset the
    /// dealt cursor. Called at the start of every hand.
    pub fn shuffle(&mut self) {
        self.cards = standard_deck();
        self.cards.shuffle(&mut self.rng);
        self.dealt = 0;
    }

    pub fn deal(&mut self, n: usize) -> Result<Vec<Card>, EngineError> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(EngineError::DeckExhausted {
                requested: n,
                remaining,
            });
        }
        let cards = self.cards[self.dealt..self.dealt + n].to_vec();
        self.dealt += n;
        Ok(cards)
    }

    pub fn deal_one(&mut self) -> Result<Card, EngineError> {
        Ok(self.deal(1)?[0])
    }

    pub fn remaining(&self) -> usize {
        self.cards.len() - self.dealt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn standard_deck_has_52_distinct_cards() {
        let deck = standard_deck();
        assert_eq!(deck.len(), 52);
        let distinct: HashSet<_> = deck.iter().collect();
        assert_eq!(distinct.len(), 52);
    }

    #[test]
    fn card_round_trips_through_strings() {
        for s in ["Ah", "Td", "2c", "Ks", "9s"] {
            let card: Card = s.parse().unwrap();
            assert_eq!(card.to_string(), s);
        }
        assert!("Xx".parse::<Card>().is_err());
        assert!("A".parse::<Card>().is_err());
        assert!("Ahh".parse::<Card>().is_err());
    }

    #[test]
    fn equal_seeds_produce_identical_sequences() {
        let mut a = Deck::new(42);
        let mut b = Deck::new(42);
        for _ in 0..3 {
            assert_eq!(a.deal(52).unwrap(), b.deal(52).unwrap());
            a.shuffle();
            b.shuffle();
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = Deck::new(1);
        let mut b = Deck::new(2);
        assert_ne!(a.deal(52).unwrap(), b.deal(52).unwrap());
    }

    #[test]
    fn deal_past_end_fails() {
        let mut deck = Deck::new(7);
        deck.deal(50).unwrap();
        assert_eq!(deck.remaining(), 2);
        assert!(matches!(
            deck.deal(3),
            Err(EngineError::DeckExhausted {
                requested: 3,
                remaining: 2
            })
        ));
        // A failed deal leaves the cursor untouched.
        assert_eq!(deck.deal(2).unwrap().len(), 2);
    }

    #[test]
    fn shuffle_resets_cursor_and_restores_all_cards() {
        let mut deck = Deck::new(9);
        deck.deal(20).unwrap();
        deck.shuffle();
        assert_eq!(deck.remaining(), 52);
        let all: HashSet<_> = deck.deal(52).unwrap().into_iter().collect();
        assert_eq!(all.len(), 52);
    }
}
