//! Blind schedule: hand number -> (SB, BB, level).

use super::errors::EngineError;
use super::types::Chips;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindLevel {
    pub level: u32,
    /// Number of hands this level serves; `None` means the level is final
    /// and serves indefinitely.
    pub hands: Option<u32>,
    pub small_blind: Chips,
    pub big_blind: Chips,
}

impl BlindLevel {
    pub fn is_final(&self) -> bool {
        self.hands.is_none()
    }
}

pub fn default_schedule() -> Vec<BlindLevel> {
    let steps: [(Option<u32>, Chips, Chips); 6] = [
        (Some(20), 1, 2),
        (Some(20), 2, 4),
        (Some(20), 4, 8),
        (Some(20), 8, 16),
        (Some(20), 16, 32),
        (None, 32, 64),
    ];
    steps
        .iter()
        .enumerate()
        .map(|(i, &(hands, sb, bb))| BlindLevel {
            level: i as u32 + 1,
            hands,
            small_blind: sb,
            big_blind: bb,
        })
        .collect()
}

/// Walks blind levels by hand count. Levels consume their quota in order;
/// the last level serves forever.
#[derive(Clone, Debug)]
pub struct BlindSchedule {
    levels: Vec<BlindLevel>,
}

impl BlindSchedule {
    pub fn new(levels: Vec<BlindLevel>) -> Result<Self, EngineError> {
        if levels.is_empty() {
            return Err(EngineError::InvalidSchedule("blind schedule cannot be empty"));
        }
        if !levels[levels.len() - 1].is_final() {
            return Err(EngineError::InvalidSchedule(
                "last blind level must be infinite",
            ));
        }
        for level in &levels {
            if level.small_blind == 0 || level.big_blind <= level.small_blind {
                return Err(EngineError::InvalidSchedule(
                    "each level requires 0 < sb < bb",
                ));
            }
        }
        if levels.windows(2).any(|w| w[1].big_blind <= w[0].big_blind) {
            return Err(EngineError::InvalidSchedule(
                "big blind must strictly increase across levels",
            ));
        }
        Ok(Self { levels })
    }

    /// The blind level serving 1-indexed hand `hand_number`.
    pub fn level_for_hand(&self, hand_number: u64) -> &BlindLevel {
        debug_assert!(hand_number >= 1);
        let hands_played = hand_number.saturating_sub(1);
        let mut cumulative = 0u64;
        for level in &self.levels {
            let Some(quota) = level.hands else {
                return level;
            };
            cumulative += quota as u64;
            if hands_played < cumulative {
                return level;
            }
        }
        // unreachable with a valid schedule; the last level is infinite
        &self.levels[self.levels.len() - 1]
    }

    pub fn blinds(&self, hand_number: u64) -> (Chips, Chips) {
        let level = self.level_for_hand(hand_number);
        (level.small_blind, level.big_blind)
    }

    pub fn level(&self, hand_number: u64) -> u32 {
        self.level_for_hand(hand_number).level
    }

    pub fn levels(&self) -> &[BlindLevel] {
        &self.levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> BlindSchedule {
        BlindSchedule::new(default_schedule()).unwrap()
    }

    #[test]
    fn levels_consume_their_quota_in_order() {
        let s = schedule();
        assert_eq!(s.level(1), 1);
        assert_eq!(s.level(20), 1);
        assert_eq!(s.level(21), 2);
        assert_eq!(s.level(40), 2);
        assert_eq!(s.level(41), 3);
    }

    #[test]
    fn final_level_serves_indefinitely() {
        let s = schedule();
        assert_eq!(s.blinds(101), (32, 64));
        assert_eq!(s.blinds(100_000), (32, 64));
    }

    #[test]
    fn empty_schedule_is_rejected() {
        assert!(BlindSchedule::new(vec![]).is_err());
    }

    #[test]
    fn finite_last_level_is_rejected() {
        let levels = vec![BlindLevel {
            level: 1,
            hands: Some(10),
            small_blind: 1,
            big_blind: 2,
        }];
        assert!(BlindSchedule::new(levels).is_err());
    }

    #[test]
    fn non_increasing_big_blind_is_rejected() {
        let levels = vec![
            BlindLevel {
                level: 1,
                hands: Some(10),
                small_blind: 2,
                big_blind: 4,
            },
            BlindLevel {
                level: 2,
                hands: None,
                small_blind: 2,
                big_blind: 4,
            },
        ];
        assert!(BlindSchedule::new(levels).is_err());
    }
}
