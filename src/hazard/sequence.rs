//! Hazard sequences and the per-venue hazard model
//!
//! A sequence is a ring of hazards firing in lockstep: member `i` fires
//! `seq_delay(i)` seconds before member `i + 1`, and the last member's delay
//! wraps around to the first. The ring's period is the sum of all delays.

use glam::Vec3;
use serde::Serialize;

use super::aoe::{AoeShape, RepeatingAoe};

/// Index of a sequence within its `HazardModel`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SequenceId(pub usize);

/// One member of one sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HazardId {
    pub sequence: SequenceId,
    pub member: usize,
}

/// How the anchor instant relates to the observed member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// The member is firing at the anchor instant; the next one is its successor
    Firing,
    /// The member will fire at the anchor instant
    Upcoming,
}

#[derive(Debug, Clone, Serialize)]
pub struct HazardSequence {
    pub name: String,
    members: Vec<RepeatingAoe>,
    first_observed: Option<usize>,
}

impl HazardSequence {
    /// Sequence of identically shaped hazards from `(position, delay)` pairs
    pub fn new(name: impl Into<String>, shape: AoeShape, instances: impl IntoIterator<Item = (Vec3, f32)>) -> Self {
        let members = instances
            .into_iter()
            .map(|(origin, delay)| RepeatingAoe::new(shape, origin, delay))
            .collect();
        Self::from_members(name, members)
    }

    /// Sequence from pre-built members; their period is recomputed from the delays
    pub fn from_members(name: impl Into<String>, mut members: Vec<RepeatingAoe>) -> Self {
        let repeat: f32 = members.iter().map(|m| m.seq_delay).sum();
        for member in &mut members {
            member.repeat = repeat;
        }
        Self {
            name: name.into(),
            members,
            first_observed: None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn repeat(&self) -> f32 {
        self.members.first().map(|m| m.repeat).unwrap_or(0.0)
    }

    pub fn members(&self) -> &[RepeatingAoe] {
        &self.members
    }

    pub fn member(&self, index: usize) -> Option<&RepeatingAoe> {
        self.members.get(index)
    }

    /// Member that was seen first, used to label route strategies
    pub fn first_observed(&self) -> Option<usize> {
        self.first_observed
    }

    pub fn is_synchronized(&self) -> bool {
        self.members.iter().any(|m| m.next_activation.is_some())
    }

    /// First member whose origin lies within `tolerance_sq` (squared distance) of `pos`
    pub fn find_member(&self, pos: Vec3, tolerance_sq: f32) -> Option<usize> {
        self.members
            .iter()
            .position(|m| (m.origin - pos).length_squared() < tolerance_sq)
    }

    /// Assign every member's next activation from one observation of `index`
    pub fn synchronize(&mut self, index: usize, anchor: f32, kind: Anchor) {
        let n = self.members.len();
        if index >= n {
            return;
        }
        if self.first_observed.is_none() {
            self.first_observed = Some(index);
        }
        match kind {
            Anchor::Upcoming => {
                let mut t = anchor;
                for k in 0..n {
                    let member = &mut self.members[(index + k) % n];
                    member.next_activation = Some(t);
                    t += member.seq_delay;
                }
            }
            Anchor::Firing => {
                // The observed member wraps around to a full period later
                let mut t = anchor;
                for k in 1..=n {
                    t += self.members[(index + k - 1) % n].seq_delay;
                    self.members[(index + k) % n].next_activation = Some(t);
                }
            }
        }
    }

    /// Forget all timing knowledge
    pub fn reset(&mut self) {
        self.first_observed = None;
        for member in &mut self.members {
            member.next_activation = None;
        }
    }
}

/// All hazard sequences of one venue
///
/// Owned by the venue session; written only by the synchronizer and read by
/// the planners.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HazardModel {
    sequences: Vec<HazardSequence>,
}

impl HazardModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sequence: HazardSequence) -> SequenceId {
        self.sequences.push(sequence);
        SequenceId(self.sequences.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn sequence(&self, id: SequenceId) -> Option<&HazardSequence> {
        self.sequences.get(id.0)
    }

    pub fn sequence_mut(&mut self, id: SequenceId) -> Option<&mut HazardSequence> {
        self.sequences.get_mut(id.0)
    }

    pub fn sequences(&self) -> impl Iterator<Item = (SequenceId, &HazardSequence)> {
        self.sequences.iter().enumerate().map(|(i, s)| (SequenceId(i), s))
    }

    pub fn find(&self, name: &str) -> Option<SequenceId> {
        self.sequences.iter().position(|s| s.name == name).map(SequenceId)
    }

    pub fn hazard(&self, id: HazardId) -> Option<&RepeatingAoe> {
        self.sequence(id.sequence)?.member(id.member)
    }

    /// Every hazard of the venue, in sequence then member order
    pub fn hazards(&self) -> impl Iterator<Item = (HazardId, &RepeatingAoe)> {
        self.sequences().flat_map(|(sequence, s)| {
            s.members()
                .iter()
                .enumerate()
                .map(move |(member, aoe)| (HazardId { sequence, member }, aoe))
        })
    }

    /// Hazards of the listed sequences; an empty list means every sequence
    pub fn hazards_in<'a>(&'a self, ids: &'a [SequenceId]) -> impl Iterator<Item = (HazardId, &'a RepeatingAoe)> + 'a {
        self.hazards()
            .filter(move |(id, _)| ids.is_empty() || ids.contains(&id.sequence))
    }

    pub fn reset(&mut self) {
        for sequence in &mut self.sequences {
            sequence.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn exaflare() -> HazardSequence {
        let xs = [-12.0, -4.0, 4.0, 12.0];
        HazardSequence::new(
            "exaflare",
            AoeShape::Circle { radius: 6.0 },
            xs.iter()
                .map(|&x| (Vec3::new(x, 0.0, 200.0), if x == 12.0 { 1.9 } else { 1.4 })),
        )
    }

    #[test]
    fn test_repeat_is_sum_of_delays() {
        let seq = exaflare();
        assert!((seq.repeat() - 6.1).abs() < 1e-5);
        assert!(seq.members().iter().all(|m| m.repeat == seq.repeat()));
    }

    #[test]
    fn test_find_member_within_tolerance() {
        let seq = exaflare();
        assert_eq!(seq.find_member(Vec3::new(4.5, 0.0, 200.3), 1.0), Some(2));
        assert_eq!(seq.find_member(Vec3::new(5.0, 0.0, 200.5), 1.0), None);
    }

    #[test]
    fn test_firing_walk_starts_after_observed() {
        let mut seq = exaflare();
        seq.synchronize(3, 10.0, Anchor::Firing);
        let next: Vec<f32> = seq.members().iter().map(|m| m.next_activation.unwrap()).collect();
        // Member 3 fired at 10.0 and its gap to member 0 is 1.9
        assert!((next[0] - 11.9).abs() < 1e-4);
        assert!((next[1] - 13.3).abs() < 1e-4);
        assert!((next[2] - 14.7).abs() < 1e-4);
        assert!((next[3] - 16.1).abs() < 1e-4);
    }

    #[test]
    fn test_upcoming_walk_starts_at_observed() {
        let mut seq = exaflare();
        seq.synchronize(1, 5.0, Anchor::Upcoming);
        let next: Vec<f32> = seq.members().iter().map(|m| m.next_activation.unwrap()).collect();
        assert!((next[1] - 5.0).abs() < 1e-4);
        assert!((next[2] - 6.4).abs() < 1e-4);
        assert!((next[3] - 7.8).abs() < 1e-4);
        assert!((next[0] - 9.7).abs() < 1e-4);
    }

    #[test]
    fn test_first_observed_recorded_once() {
        let mut seq = exaflare();
        assert!(!seq.is_synchronized());
        seq.synchronize(2, 0.0, Anchor::Firing);
        seq.synchronize(0, 3.0, Anchor::Firing);
        assert_eq!(seq.first_observed(), Some(2));
        seq.reset();
        assert_eq!(seq.first_observed(), None);
        assert!(!seq.is_synchronized());
    }

    #[test]
    fn test_out_of_range_index_is_ignored() {
        let mut seq = exaflare();
        seq.synchronize(9, 0.0, Anchor::Firing);
        assert!(!seq.is_synchronized());
    }

    #[test]
    fn test_model_lookup() {
        let mut model = HazardModel::new();
        let a = model.add(exaflare());
        let b = model.add(HazardSequence::new(
            "pair",
            AoeShape::Square { half_side: 3.0 },
            [(Vec3::ZERO, 2.5), (Vec3::X * 5.0, 2.5)],
        ));
        assert_eq!(model.find("pair"), Some(b));
        assert_eq!(model.hazards().count(), 6);
        assert_eq!(model.hazards_in(&[a]).count(), 4);
        assert_eq!(model.hazards_in(&[]).count(), 6);
        let id = HazardId { sequence: b, member: 1 };
        assert_eq!(model.hazard(id).unwrap().origin, Vec3::X * 5.0);
    }

    proptest! {
        #[test]
        fn prop_ring_walk_periodicity(
            delays in prop::collection::vec(0.1f32..3.0, 1..8),
            start in 0usize..8,
            anchor in 0.0f32..100.0,
            firing in any::<bool>(),
        ) {
            let n = delays.len();
            let i = start % n;
            let mut seq = HazardSequence::new(
                "ring",
                AoeShape::Circle { radius: 1.0 },
                delays.iter().enumerate().map(|(k, &d)| (Vec3::new(k as f32 * 10.0, 0.0, 0.0), d)),
            );
            let kind = if firing { Anchor::Firing } else { Anchor::Upcoming };
            seq.synchronize(i, anchor, kind);

            let repeat = seq.repeat();
            let at = |k: usize| seq.member(k).unwrap().next_activation.unwrap();
            // Successor fires delay(i) after the anchor
            if n > 1 || firing {
                prop_assert!((at((i + 1) % n) - (anchor + delays[i])).abs() < 1e-3);
            }
            // Consecutive members stay delay(j) apart all the way around the ring
            let first = if firing { (i + 1) % n } else { i };
            for k in 0..n - 1 {
                let j = (first + k) % n;
                prop_assert!((at((j + 1) % n) - (at(j) + delays[j])).abs() < 1e-3);
            }
            // Back in phase after exactly one period
            let member = seq.member(i).unwrap();
            let phase = member.time_until_activation(anchor + repeat).unwrap();
            prop_assert!(phase < 1e-2 || (repeat - phase) < 1e-2);
        }
    }
}
