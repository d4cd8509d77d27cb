//! Lineage arena
//!
//! Per-source concurrent forks form a forest. Blocks live in an arena
//! keyed by bank hash with parent references by key lookup, so faulty or
//! malicious lineage (cycles, unknown parents) can never create a
//! reference cycle; unknown parents older than the buffer window are
//! treated as fresh roots.

use shared_types::{short_hex, BankHash, BlockState, Slot, SourceId};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;
use tracing::warn;

/// One tracked block.
#[derive(Debug, Clone)]
pub struct ForkLineageNode {
    /// This block's identity.
    pub bank_hash: BankHash,
    /// Lineage pointer, resolved by arena lookup.
    pub parent_bank_hash: BankHash,
    /// Block height.
    pub slot: Slot,
    /// First source that reported this block.
    pub source_id: SourceId,
    /// When the block was first seen.
    pub first_seen_at: Instant,
    /// Fork-resolution state.
    pub state: BlockState,
    /// All sources that have corroborated this block.
    pub sources: BTreeSet<SourceId>,
}

/// Arena of tracked blocks plus the canonical-chain view.
#[derive(Default)]
pub struct LineageArena {
    nodes: HashMap<BankHash, ForkLineageNode>,
    by_slot: BTreeMap<Slot, Vec<BankHash>>,
    canonical: BTreeMap<Slot, BankHash>,
}

impl LineageArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sighting of a block from one source.
    ///
    /// Returns `true` if the block was new to the arena.
    pub fn observe(
        &mut self,
        bank_hash: BankHash,
        parent_bank_hash: BankHash,
        slot: Slot,
        source_id: SourceId,
    ) -> bool {
        match self.nodes.get_mut(&bank_hash) {
            Some(node) => {
                node.sources.insert(source_id);
                false
            }
            None => {
                let mut sources = BTreeSet::new();
                sources.insert(source_id);
                self.nodes.insert(
                    bank_hash,
                    ForkLineageNode {
                        bank_hash,
                        parent_bank_hash,
                        slot,
                        source_id,
                        first_seen_at: Instant::now(),
                        state: BlockState::Speculative,
                        sources,
                    },
                );
                self.by_slot.entry(slot).or_default().push(bank_hash);
                true
            }
        }
    }

    /// Look up a block.
    #[must_use]
    pub fn node(&self, bank_hash: &BankHash) -> Option<&ForkLineageNode> {
        self.nodes.get(bank_hash)
    }

    /// Fork-resolution state of a block, if tracked.
    #[must_use]
    pub fn state_of(&self, bank_hash: &BankHash) -> Option<BlockState> {
        self.nodes.get(bank_hash).map(|n| n.state)
    }

    /// The canonical block at a slot, if one has been chosen.
    #[must_use]
    pub fn canonical_at(&self, slot: Slot) -> Option<BankHash> {
        self.canonical.get(&slot).copied()
    }

    /// All tracked blocks at a slot.
    #[must_use]
    pub fn blocks_at(&self, slot: Slot) -> &[BankHash] {
        self.by_slot.get(&slot).map_or(&[], Vec::as_slice)
    }

    /// Number of tracked blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Select the winning speculative block at `slot` by the tie-break
    /// rule: most distinct corroborating sources, then lexicographically
    /// smallest bank hash.
    ///
    /// The result depends only on the set of sightings, never on their
    /// arrival order.
    #[must_use]
    pub fn select_candidate(&self, slot: Slot) -> Option<BankHash> {
        self.by_slot
            .get(&slot)?
            .iter()
            .filter_map(|hash| self.nodes.get(hash))
            .filter(|node| node.state == BlockState::Speculative)
            .max_by(|a, b| {
                a.sources
                    .len()
                    .cmp(&b.sources.len())
                    // Reverse on the hash so that max_by picks the
                    // lexicographically smallest on a vote tie.
                    .then_with(|| b.bank_hash.cmp(&a.bank_hash))
            })
            .map(|node| node.bank_hash)
    }

    /// Mark `bank_hash` canonical at its slot and abandon its siblings.
    ///
    /// Returns the abandoned sibling hashes.
    pub fn set_canonical(&mut self, bank_hash: BankHash) -> Vec<BankHash> {
        let slot = match self.nodes.get_mut(&bank_hash) {
            Some(node) => {
                node.state = BlockState::Canonical;
                node.slot
            }
            None => return Vec::new(),
        };
        self.canonical.insert(slot, bank_hash);

        let mut abandoned = Vec::new();
        if let Some(siblings) = self.by_slot.get(&slot) {
            for sibling in siblings.clone() {
                if sibling == bank_hash {
                    continue;
                }
                if let Some(node) = self.nodes.get_mut(&sibling) {
                    if node.state == BlockState::Speculative {
                        node.state = BlockState::Abandoned;
                        abandoned.push(sibling);
                    }
                }
            }
        }
        abandoned
    }

    /// Demote a previously-canonical block during rollback.
    pub fn mark_abandoned(&mut self, bank_hash: &BankHash) {
        if let Some(node) = self.nodes.get_mut(bank_hash) {
            if node.state == BlockState::Canonical {
                self.canonical.remove(&node.slot);
            }
            node.state = BlockState::Abandoned;
        }
    }

    /// Walk the parent chain of `tip` down to (but excluding) its
    /// canonical or out-of-window attachment point.
    ///
    /// Returns the non-canonical chain in ascending slot order. Unknown
    /// parents end the walk: the oldest collected block becomes a fresh
    /// root, which is logged but not fatal.
    #[must_use]
    pub fn chain_to_attachment(&self, tip: BankHash) -> Vec<BankHash> {
        let mut chain = Vec::new();
        let mut cursor = tip;
        while let Some(node) = self.nodes.get(&cursor) {
            if node.state == BlockState::Canonical {
                break;
            }
            chain.push(cursor);
            let parent = node.parent_bank_hash;
            if !self.nodes.contains_key(&parent) {
                warn!(
                    block = %short_hex(&cursor),
                    parent = %short_hex(&parent),
                    slot = node.slot,
                    "Unknown parent outside buffer window; treating block as fresh root"
                );
                break;
            }
            cursor = parent;
        }
        chain.reverse();
        chain
    }

    /// The lowest slot at which the chain disagrees with the current
    /// canonical view, if any. A disagreement at a previously-canonical
    /// slot is the discontinuity that triggers rollback.
    #[must_use]
    pub fn divergence_slot(&self, chain: &[BankHash]) -> Option<Slot> {
        for hash in chain {
            let node = self.nodes.get(hash)?;
            if let Some(existing) = self.canonical_at(node.slot) {
                if existing != *hash {
                    return Some(node.slot);
                }
            }
        }
        None
    }

    /// Previously-canonical blocks at or above `slot`, ascending.
    #[must_use]
    pub fn canonical_from(&self, slot: Slot) -> Vec<(Slot, BankHash)> {
        self.canonical
            .range(slot..)
            .map(|(s, h)| (*s, *h))
            .collect()
    }

    /// Slots with tracked blocks in `(after, through]`, ascending.
    #[must_use]
    pub fn tracked_slots(&self, after: Slot, through: Slot) -> Vec<Slot> {
        if through <= after {
            return Vec::new();
        }
        self.by_slot
            .range(after + 1..=through)
            .map(|(slot, _)| *slot)
            .collect()
    }

    /// Abandon speculative blocks below `cutoff_slot` (they fell out of
    /// the reorg window without confirmation).
    ///
    /// Returns the abandoned hashes.
    pub fn abandon_stale(&mut self, cutoff_slot: Slot) -> Vec<BankHash> {
        let mut abandoned = Vec::new();
        for (_, hashes) in self.by_slot.range(..cutoff_slot) {
            for hash in hashes {
                if let Some(node) = self.nodes.get(hash) {
                    if node.state == BlockState::Speculative {
                        abandoned.push(*hash);
                    }
                }
            }
        }
        for hash in &abandoned {
            if let Some(node) = self.nodes.get_mut(hash) {
                node.state = BlockState::Abandoned;
            }
        }
        abandoned
    }

    /// Drop all bookkeeping for blocks below `cutoff_slot`.
    ///
    /// Returns how many blocks were pruned.
    pub fn prune(&mut self, cutoff_slot: Slot) -> usize {
        let stale_slots: Vec<Slot> = self
            .by_slot
            .range(..cutoff_slot)
            .map(|(slot, _)| *slot)
            .collect();
        let mut pruned = 0;
        for slot in stale_slots {
            if let Some(hashes) = self.by_slot.remove(&slot) {
                for hash in hashes {
                    self.nodes.remove(&hash);
                    pruned += 1;
                }
            }
            self.canonical.remove(&slot);
        }
        pruned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(n: u8) -> BankHash {
        let mut h = [0u8; 32];
        h[0] = n;
        h
    }

    #[test]
    fn test_observe_tracks_sources() {
        let mut arena = LineageArena::new();
        assert!(arena.observe(hash(1), hash(0), 10, 1));
        assert!(!arena.observe(hash(1), hash(0), 10, 2));

        let node = arena.node(&hash(1)).unwrap();
        assert_eq!(node.sources.len(), 2);
        assert_eq!(node.state, BlockState::Speculative);
    }

    #[test]
    fn test_tiebreak_prefers_more_sources() {
        let mut arena = LineageArena::new();
        arena.observe(hash(0x02), hash(0), 10, 1);
        arena.observe(hash(0x02), hash(0), 10, 2);
        arena.observe(hash(0x02), hash(0), 10, 3);
        arena.observe(hash(0x01), hash(0), 10, 4);

        assert_eq!(arena.select_candidate(10), Some(hash(0x02)));
    }

    #[test]
    fn test_tiebreak_exact_tie_lexicographic() {
        let mut arena = LineageArena::new();
        arena.observe(hash(0x02), hash(0), 10, 1);
        arena.observe(hash(0x01), hash(0), 10, 2);

        // One source each: the smaller hash wins, regardless of which
        // sighting arrived first.
        assert_eq!(arena.select_candidate(10), Some(hash(0x01)));
    }

    #[test]
    fn test_tiebreak_arrival_order_independent() {
        let mut forward = LineageArena::new();
        forward.observe(hash(0x05), hash(0), 7, 1);
        forward.observe(hash(0x09), hash(0), 7, 2);
        forward.observe(hash(0x09), hash(0), 7, 3);

        let mut reversed = LineageArena::new();
        reversed.observe(hash(0x09), hash(0), 7, 3);
        reversed.observe(hash(0x09), hash(0), 7, 2);
        reversed.observe(hash(0x05), hash(0), 7, 1);

        assert_eq!(forward.select_candidate(7), reversed.select_candidate(7));
        assert_eq!(forward.select_candidate(7), Some(hash(0x09)));
    }

    #[test]
    fn test_set_canonical_abandons_siblings() {
        let mut arena = LineageArena::new();
        arena.observe(hash(1), hash(0), 10, 1);
        arena.observe(hash(2), hash(0), 10, 2);

        let abandoned = arena.set_canonical(hash(1));
        assert_eq!(abandoned, vec![hash(2)]);
        assert_eq!(arena.state_of(&hash(1)), Some(BlockState::Canonical));
        assert_eq!(arena.state_of(&hash(2)), Some(BlockState::Abandoned));
        assert_eq!(arena.canonical_at(10), Some(hash(1)));
    }

    #[test]
    fn test_chain_to_attachment_walks_to_canonical() {
        let mut arena = LineageArena::new();
        arena.observe(hash(1), hash(0), 10, 1);
        arena.set_canonical(hash(1));
        arena.observe(hash(2), hash(1), 11, 1);
        arena.observe(hash(3), hash(2), 12, 1);

        let chain = arena.chain_to_attachment(hash(3));
        assert_eq!(chain, vec![hash(2), hash(3)]);
    }

    #[test]
    fn test_chain_to_attachment_unknown_parent_is_root() {
        let mut arena = LineageArena::new();
        arena.observe(hash(5), hash(99), 20, 1);
        arena.observe(hash(6), hash(5), 21, 1);

        let chain = arena.chain_to_attachment(hash(6));
        assert_eq!(chain, vec![hash(5), hash(6)]);
    }

    #[test]
    fn test_divergence_detected() {
        let mut arena = LineageArena::new();
        arena.observe(hash(1), hash(0), 50, 1);
        arena.set_canonical(hash(1));

        // Sibling branch at the same slot, chained one slot further.
        arena.observe(hash(11), hash(0), 50, 2);
        arena.observe(hash(12), hash(11), 51, 2);

        let chain = arena.chain_to_attachment(hash(12));
        assert_eq!(arena.divergence_slot(&chain), Some(50));
    }

    #[test]
    fn test_no_divergence_on_plain_extension() {
        let mut arena = LineageArena::new();
        arena.observe(hash(1), hash(0), 50, 1);
        arena.set_canonical(hash(1));
        arena.observe(hash(2), hash(1), 51, 1);

        let chain = arena.chain_to_attachment(hash(2));
        assert_eq!(arena.divergence_slot(&chain), None);
    }

    #[test]
    fn test_abandon_stale_and_prune() {
        let mut arena = LineageArena::new();
        arena.observe(hash(1), hash(0), 10, 1);
        arena.observe(hash(2), hash(1), 80, 1);

        let abandoned = arena.abandon_stale(64);
        assert_eq!(abandoned, vec![hash(1)]);
        assert_eq!(arena.state_of(&hash(2)), Some(BlockState::Speculative));

        let pruned = arena.prune(64);
        assert_eq!(pruned, 1);
        assert!(arena.node(&hash(1)).is_none());
        assert_eq!(arena.len(), 1);
    }
}
