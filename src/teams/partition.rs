//! Greedy two-way balanced partition
//!
//! Participants are taken strongest first and each goes to the side with the
//! lower rating sum so far, ties going to side A. On the full-roster paths a
//! side stops taking players once it holds half the roster (rounded up), which
//! keeps the side sizes within one of each other.

use crate::teams::rng::seeded_shuffle;
use crate::types::{Participant, PlayerId, TeamSide};
use serde::{Deserialize, Serialize};

/// Two sides with their rating sums
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    pub team_a: Vec<PlayerId>,
    pub team_b: Vec<PlayerId>,
    pub sum_a: i64,
    pub sum_b: i64,
}

impl Partition {
    /// Absolute rating-sum difference between the sides
    pub fn difference(&self) -> i64 {
        (self.sum_a - self.sum_b).abs()
    }

    pub fn len(&self) -> usize {
        self.team_a.len() + self.team_b.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&mut self, side: TeamSide, participant: &Participant) {
        match side {
            TeamSide::A => {
                self.team_a.push(participant.id.clone());
                self.sum_a += participant.rating as i64;
            }
            TeamSide::B => {
                self.team_b.push(participant.id.clone());
                self.sum_b += participant.rating as i64;
            }
        }
    }

    fn side_len(&self, side: TeamSide) -> usize {
        match side {
            TeamSide::A => self.team_a.len(),
            TeamSide::B => self.team_b.len(),
        }
    }
}

/// Place participants strongest first onto the lower-sum side.
///
/// With `cap`, a side holding `cap` players takes no more.
pub(crate) fn place_greedily(
    partition: &mut Partition,
    participants: &[Participant],
    cap: Option<usize>,
) {
    let mut ordered: Vec<&Participant> = participants.iter().collect();
    // stable: equal ratings keep their incoming order
    ordered.sort_by(|a, b| b.rating.cmp(&a.rating));

    for participant in ordered {
        let preferred = if partition.sum_a <= partition.sum_b {
            TeamSide::A
        } else {
            TeamSide::B
        };

        let side = match cap {
            Some(cap) if partition.side_len(preferred) >= cap => preferred.other(),
            _ => preferred,
        };

        partition.push(side, participant);
    }
}

/// Greedy partition of the participants in the order given
pub fn partition_balanced(participants: &[Participant]) -> Partition {
    let mut partition = Partition::default();
    let cap = participants.len().div_ceil(2);
    place_greedily(&mut partition, participants, Some(cap));
    partition
}

/// Seeded shuffle followed by the greedy partition.
///
/// Equally rated participants land on different sides for different seeds.
pub fn partition_shuffled(participants: &[Participant], seed: u32) -> Partition {
    let shuffled = seeded_shuffle(participants, seed);
    partition_balanced(&shuffled)
}
