//! Complete hand histories persisted as `hands/hand_NNN.json`.

use crate::engine::{Card, Chips, SeatId, Street};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggedPlayer {
    pub seat: SeatId,
    pub name: String,
    pub stack_start: Chips,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggedAction {
    pub street: Street,
    pub seat: SeatId,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Chips>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pot_after: Option<Chips>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub forced: bool,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub retries: u32,
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub thinking_ms: f64,
}

fn is_false(v: &bool) -> bool {
    !v
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

fn is_zero_f64(v: &f64) -> bool {
    *v == 0.0
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Blinds {
    pub small: Chips,
    pub big: Chips,
}

/// Complete log of a single hand.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HandLog {
    pub hand_number: u64,
    pub blind_level: u32,
    pub button_seat: SeatId,
    pub blinds: Blinds,
    pub players: Vec<LoggedPlayer>,
    pub hole_cards: BTreeMap<SeatId, [Card; 2]>,
    pub community_cards: Vec<Card>,
    pub actions: Vec<LoggedAction>,
    pub showdown: BTreeMap<SeatId, [Card; 2]>,
    pub winners: Vec<SeatId>,
    pub pot: Chips,
    pub pots_awarded: BTreeMap<SeatId, Chips>,
}

/// Writes one JSON file per hand into `<log_dir>/hands/`. No file handle
/// is held across hand boundaries.
pub struct HandLogger {
    hands_dir: PathBuf,
    current: Option<HandLog>,
}

impl HandLogger {
    pub fn new(log_dir: impl AsRef<Path>) -> Result<Self> {
        let hands_dir = log_dir.as_ref().join("hands");
        fs::create_dir_all(&hands_dir)
            .with_context(|| format!("creating hand log dir {}", hands_dir.display()))?;
        Ok(Self {
            hands_dir,
            current: None,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn start_hand(
        &mut self,
        hand_number: u64,
        blind_level: u32,
        button_seat: SeatId,
        small_blind: Chips,
        big_blind: Chips,
        players: Vec<LoggedPlayer>,
        hole_cards: BTreeMap<SeatId, [Card; 2]>,
    ) {
        self.current = Some(HandLog {
            hand_number,
            blind_level,
            button_seat,
            blinds: Blinds {
                small: small_blind,
                big: big_blind,
            },
            players,
            hole_cards,
            community_cards: Vec::new(),
            actions: Vec::new(),
            showdown: BTreeMap::new(),
            winners: Vec::new(),
            pot: 0,
            pots_awarded: BTreeMap::new(),
        });
    }

    pub fn record_action(&mut self, action: LoggedAction) {
        if let Some(hand) = self.current.as_mut() {
            hand.actions.push(action);
        }
    }

    pub fn record_community_cards(&mut self, cards: &[Card]) {
        if let Some(hand) = self.current.as_mut() {
            hand.community_cards = cards.to_vec();
        }
    }

    pub fn record_showdown(&mut self, seat: SeatId, cards: [Card; 2]) {
        if let Some(hand) = self.current.as_mut() {
            hand.showdown.insert(seat, cards);
        }
    }

    /// Finish the hand and write it to disk.
    pub fn end_hand(
        &mut self,
        winners: Vec<SeatId>,
        pot: Chips,
        pots_awarded: BTreeMap<SeatId, Chips>,
    ) -> Result<()> {
        let Some(mut hand) = self.current.take() else {
            return Ok(());
        };
        hand.winners = winners;
        hand.pot = pot;
        hand.pots_awarded = pots_awarded;

        let path = self.hand_path(hand.hand_number);
        let json = serde_json::to_string_pretty(&hand)?;
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    fn hand_path(&self, hand_number: u64) -> PathBuf {
        self.hands_dir.join(format!("hand_{hand_number:03}.json"))
    }

    pub fn read_hand(&self, hand_number: u64) -> Result<Option<Value>> {
        let path = self.hand_path(hand_number);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(s: &str) -> Card {
        s.parse().unwrap()
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "poker_bench_hand_log_{tag}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn hand_log_round_trips_through_json() {
        let dir = temp_dir("roundtrip");
        let mut logger = HandLogger::new(&dir).unwrap();
        logger.start_hand(
            1,
            1,
            2,
            1,
            2,
            vec![LoggedPlayer {
                seat: 1,
                name: "A".to_string(),
                stack_start: 200,
            }],
            BTreeMap::from([(1, [card("Ah"), card("Kd")])]),
        );
        logger.record_action(LoggedAction {
            street: Street::Preflop,
            seat: 1,
            action: "call".to_string(),
            amount: Some(2),
            pot_after: Some(4),
            forced: false,
            retries: 0,
            thinking_ms: 0.0,
        });
        logger.record_community_cards(&[card("2c"), card("7d"), card("Jh")]);
        logger.record_showdown(1, [card("Ah"), card("Kd")]);
        logger
            .end_hand(vec![1], 4, BTreeMap::from([(1, 4)]))
            .unwrap();

        let loaded = logger.read_hand(1).unwrap().unwrap();
        assert_eq!(loaded["hand_number"], 1);
        assert_eq!(loaded["blinds"]["big"], 2);
        assert_eq!(loaded["hole_cards"]["1"][0], "Ah");
        assert_eq!(loaded["actions"][0]["action"], "call");
        assert_eq!(loaded["actions"][0]["pot_after"], 4);
        assert_eq!(loaded["pots_awarded"]["1"], 4);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn end_hand_without_start_is_a_no_op() {
        let dir = temp_dir("noop");
        let mut logger = HandLogger::new(&dir).unwrap();
        logger.end_hand(vec![], 0, BTreeMap::new()).unwrap();
        assert!(logger.read_hand(1).unwrap().is_none());
        let _ = fs::remove_dir_all(&dir);
    }
}
