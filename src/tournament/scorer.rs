//! Placement scoring: elimination order, same-hand ties, final ranks.

use crate::engine::SeatId;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Record of a player elimination.
#[derive(Clone, Debug, Serialize)]
pub struct Elimination {
    pub seat: SeatId,
    pub agent_name: String,
    pub hand_number: u64,
}

/// Tracks eliminations and derives placements. Placement 1 is the unique
/// survivor; seats busting on the same hand share a rank and the next
/// earlier elimination ranks `rank + group size`.
#[derive(Clone, Debug)]
pub struct PlacementScorer {
    num_players: usize,
    eliminations: Vec<Elimination>,
    active: BTreeSet<SeatId>,
    names: BTreeMap<SeatId, String>,
}

impl PlacementScorer {
    pub fn new(num_players: usize) -> Self {
        Self {
            num_players,
            eliminations: Vec::new(),
            active: (1..=num_players as SeatId).collect(),
            names: BTreeMap::new(),
        }
    }

    pub fn register_player(&mut self, seat: SeatId, name: impl Into<String>) {
        self.names.insert(seat, name.into());
    }

    fn name_for(&self, seat: SeatId) -> String {
        self.names
            .get(&seat)
            .cloned()
            .unwrap_or_else(|| format!("Player_{seat}"))
    }

    pub fn record_elimination(&mut self, seat: SeatId, hand_number: u64) {
        if !self.active.remove(&seat) {
            return;
        }
        self.eliminations.push(Elimination {
            seat,
            agent_name: self.name_for(seat),
            hand_number,
        });
    }

    /// Record several seats busting on the same hand; they share a placement.
    pub fn record_multi_elimination(&mut self, seats: &[SeatId], hand_number: u64) {
        for &seat in seats {
            self.record_elimination(seat, hand_number);
        }
    }

    pub fn remaining_players(&self) -> BTreeSet<SeatId> {
        self.active.clone()
    }

    pub fn is_tournament_over(&self) -> bool {
        self.active.len() <= 1
    }

    pub fn winner(&self) -> Option<SeatId> {
        if self.active.len() == 1 {
            self.active.iter().next().copied()
        } else {
            None
        }
    }

    pub fn eliminations(&self) -> &[Elimination] {
        &self.eliminations
    }

    /// Final placements for every seat. A bijection onto 1..=N except for
    /// tied groups, whose sizes sum to N.
    pub fn placements(&self) -> BTreeMap<SeatId, u32> {
        let mut placements = BTreeMap::new();
        for &seat in &self.active {
            placements.insert(seat, 1);
        }

        // Group eliminations by hand number; later hands place higher.
        let mut by_hand: BTreeMap<u64, Vec<SeatId>> = BTreeMap::new();
        for elim in &self.eliminations {
            by_hand.entry(elim.hand_number).or_default().push(elim.seat);
        }

        let mut rank = self.active.len() as u32 + 1;
        for (_, group) in by_hand.iter().rev() {
            for &seat in group {
                placements.insert(seat, rank);
            }
            rank += group.len() as u32;
        }
        placements
    }

    pub fn placements_by_name(&self) -> BTreeMap<String, u32> {
        self.placements()
            .into_iter()
            .map(|(seat, rank)| (self.name_for(seat), rank))
            .collect()
    }

    /// Percentile for a seat: 1.0 for the winner, 1/N for last place.
    pub fn placement_percentile(&self, seat: SeatId) -> f64 {
        let Some(&placement) = self.placements().get(&seat) else {
            return 0.0;
        };
        (self.num_players as f64 - placement as f64 + 1.0) / self.num_players as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer(n: usize) -> PlacementScorer {
        let mut scorer = PlacementScorer::new(n);
        for seat in 1..=n as SeatId {
            scorer.register_player(seat, format!("Agent_{seat}"));
        }
        scorer
    }

    #[test]
    fn eliminations_rank_in_reverse_order() {
        let mut s = scorer(4);
        s.record_elimination(3, 5);
        s.record_elimination(1, 9);
        s.record_elimination(4, 12);
        assert!(s.is_tournament_over());
        assert_eq!(s.winner(), Some(2));

        let placements = s.placements();
        assert_eq!(placements[&2], 1);
        assert_eq!(placements[&4], 2);
        assert_eq!(placements[&1], 3);
        assert_eq!(placements[&3], 4);
    }

    #[test]
    fn same_hand_eliminations_share_a_rank() {
        let mut s = scorer(5);
        s.record_elimination(2, 3);
        s.record_multi_elimination(&[4, 5], 7);
        s.record_elimination(1, 10);
        let placements = s.placements();
        assert_eq!(placements[&3], 1);
        assert_eq!(placements[&1], 2);
        assert_eq!(placements[&4], 3);
        assert_eq!(placements[&5], 3);
        assert_eq!(placements[&2], 5);

        // Group sizes sum to N.
        let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
        for rank in placements.values() {
            *counts.entry(*rank).or_default() += 1;
        }
        assert_eq!(counts.values().sum::<usize>(), 5);
    }

    #[test]
    fn double_elimination_is_ignored() {
        let mut s = scorer(3);
        s.record_elimination(2, 1);
        s.record_elimination(2, 2);
        assert_eq!(s.eliminations().len(), 1);
    }

    #[test]
    fn all_remaining_bust_on_final_hand_ties_for_first() {
        let mut s = scorer(3);
        s.record_elimination(1, 4);
        s.record_multi_elimination(&[2, 3], 9);
        // Nobody survives; the final group shares rank 1.
        let placements = s.placements();
        assert_eq!(placements[&2], 1);
        assert_eq!(placements[&3], 1);
        assert_eq!(placements[&1], 3);
    }

    #[test]
    fn percentile_spans_winner_to_last() {
        let mut s = scorer(4);
        s.record_elimination(1, 2);
        s.record_elimination(2, 4);
        s.record_elimination(3, 6);
        assert_eq!(s.placement_percentile(4), 1.0);
        assert_eq!(s.placement_percentile(1), 0.25);
    }

    #[test]
    fn names_map_to_placements() {
        let mut s = scorer(2);
        s.record_elimination(2, 1);
        let by_name = s.placements_by_name();
        assert_eq!(by_name["Agent_1"], 1);
        assert_eq!(by_name["Agent_2"], 2);
    }
}
