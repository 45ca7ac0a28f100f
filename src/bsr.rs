//! The canonical ambiguous parse output: a set of
//! `(slot, i, k, j)` quadruples compactly encoding every derivation of the
//! source under the grammar.
use crate::grammar::NonTerminalId;
use std::collections::{HashMap, HashSet};

/// A production alternative with a dot marking how many symbols have been
/// consumed so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    pub non_terminal: NonTerminalId,
    pub alternative: usize,
    pub dot: usize,
}

/// `(slot, i, k, j)`: the left sub-sequence (symbols `0..dot`) derives
/// `source[i..k]`, the right sub-sequence (the symbol just before `dot`)
/// derives `source[k..j]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bsr {
    pub slot: Slot,
    pub i: usize,
    pub k: usize,
    pub j: usize,
}

/// The BSR set `Y`, indexed for the two lookups the disambiguator and forest
/// builder need: "which alternatives of `nt` reach `(i, j)` as a complete
/// derivation" (roots) and "what are the valid middle splits for a given
/// slot and span" (splits).
#[derive(Default)]
pub struct BsrSet {
    elements: HashSet<Bsr>,
    roots: HashMap<(NonTerminalId, usize, usize), HashSet<usize>>,
    splits: HashMap<(NonTerminalId, usize, usize, usize, usize), HashSet<usize>>,
    /// Alternatives with zero symbols trivially match the empty string at
    /// `(non_terminal, i)`; they produce no quadruple since there is no
    /// symbol boundary to record; see [`BsrSet::mark_empty`].
    empty_roots: HashMap<(NonTerminalId, usize), HashSet<usize>>,
}

impl BsrSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Records a BSR element. `is_final` marks whether `slot.dot` is the last
    /// dot position of its alternative (making `(non_terminal, i, j)` a root
    /// span for that alternative).
    pub fn insert(&mut self, bsr: Bsr, is_final: bool) {
        if !self.elements.insert(bsr) {
            return;
        }
        if is_final {
            self.roots
                .entry((bsr.slot.non_terminal, bsr.i, bsr.j))
                .or_default()
                .insert(bsr.slot.alternative);
        }
        self.splits
            .entry((
                bsr.slot.non_terminal,
                bsr.slot.alternative,
                bsr.slot.dot,
                bsr.i,
                bsr.j,
            ))
            .or_default()
            .insert(bsr.k);
    }

    /// Records that the zero-symbol `alternative` of `non_terminal` matched
    /// trivially at `i` (span `(i, i)`).
    pub fn mark_empty(&mut self, non_terminal: NonTerminalId, alternative: usize, i: usize) {
        self.empty_roots
            .entry((non_terminal, i))
            .or_default()
            .insert(alternative);
    }

    pub fn is_empty_root(&self, non_terminal: NonTerminalId, alternative: usize, i: usize) -> bool {
        self.empty_roots
            .get(&(non_terminal, i))
            .map(|set| set.contains(&alternative))
            .unwrap_or(false)
    }

    /// Every alternative of `non_terminal` that derives `source[i..j]`
    /// entirely, in the order they were recorded.
    pub fn roots_at(&self, non_terminal: NonTerminalId, i: usize, j: usize) -> Vec<usize> {
        let mut alts: HashSet<usize> = self
            .roots
            .get(&(non_terminal, i, j))
            .cloned()
            .unwrap_or_default();
        if i == j {
            if let Some(empty) = self.empty_roots.get(&(non_terminal, i)) {
                alts.extend(empty.iter().copied());
            }
        }
        let mut alts: Vec<usize> = alts.into_iter().collect();
        alts.sort_unstable();
        alts
    }

    /// The valid middle splits recorded for `(non_terminal, alternative, dot, i, j)`.
    pub fn splits_at(
        &self,
        non_terminal: NonTerminalId,
        alternative: usize,
        dot: usize,
        i: usize,
        j: usize,
    ) -> Vec<usize> {
        self.splits
            .get(&(non_terminal, alternative, dot, i, j))
            .map(|set| {
                let mut ks: Vec<usize> = set.iter().copied().collect();
                ks.sort_unstable();
                ks
            })
            .unwrap_or_default()
    }

    pub fn contains_root(&self, non_terminal: NonTerminalId, i: usize, j: usize) -> bool {
        self.roots.contains_key(&(non_terminal, i, j))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedups_and_indexes_by_span() {
        let mut set = BsrSet::new();
        let nt = NonTerminalId(0);
        let slot = Slot {
            non_terminal: nt,
            alternative: 0,
            dot: 2,
        };
        set.insert(
            Bsr {
                slot,
                i: 0,
                k: 1,
                j: 2,
            },
            true,
        );
        set.insert(
            Bsr {
                slot,
                i: 0,
                k: 1,
                j: 2,
            },
            true,
        );
        assert_eq!(set.len(), 1);
        assert_eq!(set.roots_at(nt, 0, 2), vec![0]);
        assert_eq!(set.splits_at(nt, 0, 2, 0, 2), vec![1]);
    }
}
