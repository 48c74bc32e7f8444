//! Cross-version value mapping shared with the outer comparator
//!
//! The outer comparator tags operands that occupy the same structural role on
//! both sides with a common serial number and records the pair in the
//! cross-mapped-values table. The snippet core borrows this state for
//! speculative comparisons and restores it from explicit snapshots.

use crate::compare::outer::{BlockComparator, InlineDecision};
use crate::ir::Local;
use std::collections::{BTreeMap, HashMap};

/// Serial number assigned to a pair of structurally corresponding values
pub type SerialNumber = usize;

/// Serial-number maps of both sides and the cross-mapped-values table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingState {
    /// Left value name to serial number
    pub sn_map_l: HashMap<String, SerialNumber>,
    /// Right value name to serial number
    pub sn_map_r: HashMap<String, SerialNumber>,
    /// Serial number to the (left, right) pair assumed equal
    pub mapped_values_by_sn: BTreeMap<SerialNumber, (Local, Local)>,
    next_sn: SerialNumber,
}

impl MappingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `left` and `right` a fresh common serial number
    pub fn map_pair(&mut self, left: &Local, right: &Local) -> SerialNumber {
        let sn = self.next_sn;
        self.next_sn += 1;
        self.sn_map_l.insert(left.name.clone(), sn);
        self.sn_map_r.insert(right.name.clone(), sn);
        self.mapped_values_by_sn
            .insert(sn, (left.clone(), right.clone()));
        sn
    }

    pub fn serial_l(&self, name: &str) -> Option<SerialNumber> {
        self.sn_map_l.get(name).copied()
    }

    pub fn serial_r(&self, name: &str) -> Option<SerialNumber> {
        self.sn_map_r.get(name).copied()
    }

    pub fn pair(&self, sn: SerialNumber) -> Option<&(Local, Local)> {
        self.mapped_values_by_sn.get(&sn)
    }

    /// Drop the serial number of a left value along with its pair
    pub fn unmap_l(&mut self, name: &str) {
        if let Some(sn) = self.sn_map_l.remove(name) {
            if let Some((_, right)) = self.mapped_values_by_sn.remove(&sn) {
                if self.sn_map_r.get(&right.name) == Some(&sn) {
                    self.sn_map_r.remove(&right.name);
                }
            }
        }
    }

    /// Drop the serial number of a right value along with its pair
    pub fn unmap_r(&mut self, name: &str) {
        if let Some(sn) = self.sn_map_r.remove(name) {
            if let Some((left, _)) = self.mapped_values_by_sn.remove(&sn) {
                if self.sn_map_l.get(&left.name) == Some(&sn) {
                    self.sn_map_l.remove(&left.name);
                }
            }
        }
    }

    pub fn snapshot(&self) -> MappingSnapshot {
        MappingSnapshot(self.clone())
    }

    /// Overwrite the whole state with a snapshot, by value
    pub fn restore(&mut self, snapshot: &MappingSnapshot) {
        *self = snapshot.0.clone();
    }
}

/// Immutable copy of a [`MappingState`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingSnapshot(MappingState);

impl MappingSnapshot {
    pub fn state(&self) -> &MappingState {
        &self.0
    }
}

/// Scope of one speculative comparison
///
/// Captures the mapping and the inlining decision when created. The caller
/// ends the scope explicitly with [`Attempt::commit`] or
/// [`Attempt::rollback`]; dropping it restores nothing.
#[must_use = "an attempt must be committed or rolled back"]
#[derive(Debug, Clone)]
pub struct Attempt {
    mapping: MappingSnapshot,
    inline: InlineDecision,
}

impl Attempt {
    pub fn begin<C: BlockComparator + ?Sized>(outer: &C) -> Self {
        Self {
            mapping: outer.mapping().snapshot(),
            inline: outer.inline_decision(),
        }
    }

    pub fn snapshot(&self) -> &MappingSnapshot {
        &self.mapping
    }

    /// Keep the mutations made during the attempt; yields the state from
    /// before it
    pub fn commit(self) -> MappingSnapshot {
        self.mapping
    }

    /// Undo every mapping and inlining change made during the attempt
    pub fn rollback<C: BlockComparator + ?Sized>(self, outer: &mut C) {
        outer.mapping_mut().restore(&self.mapping);
        outer.set_inline_decision(self.inline);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Type;

    fn local(name: &str) -> Local {
        Local::new(name, Type::Int(32))
    }

    #[test]
    fn test_map_pair_assigns_fresh_serials() {
        let mut state = MappingState::new();
        let a = state.map_pair(&local("a"), &local("x"));
        let b = state.map_pair(&local("b"), &local("y"));
        assert_ne!(a, b);
        assert_eq!(state.serial_l("a"), Some(a));
        assert_eq!(state.serial_r("y"), Some(b));
        assert_eq!(state.pair(b), Some(&(local("b"), local("y"))));
        assert_eq!(state.serial_l("x"), None);
    }

    #[test]
    fn test_unmap_removes_both_sides() {
        let mut state = MappingState::new();
        state.map_pair(&local("a"), &local("x"));
        state.unmap_l("a");
        assert_eq!(state.serial_l("a"), None);
        assert_eq!(state.serial_r("x"), None);
        assert!(state.mapped_values_by_sn.is_empty());

        state.map_pair(&local("b"), &local("y"));
        state.unmap_r("y");
        assert_eq!(state.serial_l("b"), None);
    }

    #[test]
    fn test_restore_is_by_value() {
        let mut state = MappingState::new();
        state.map_pair(&local("a"), &local("x"));
        let snapshot = state.snapshot();

        state.map_pair(&local("c"), &local("z"));
        state.unmap_l("a");
        assert_ne!(&state, snapshot.state());

        state.restore(&snapshot);
        assert_eq!(&state, snapshot.state());

        // Serial numbers handed out after a restore do not collide
        let sn = state.map_pair(&local("d"), &local("w"));
        assert_eq!(state.pair(sn), Some(&(local("d"), local("w"))));
        assert_eq!(state.mapped_values_by_sn.len(), 2);
    }
}
