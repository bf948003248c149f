//! Sampled, in-memory history of organ (and optionally branch) state
//!
//! The recorder is told about every finished step. Every `rate`-th call it
//! appends a snapshot holding owned copies of the organ state and, in
//! detailed mode, of every branch state in storage order. Snapshots are
//! never handed out mutably, so later steps cannot rewrite them.

use std::ops::Index;

use crate::core::types::Step;
use crate::engine::branch::Branch;
use crate::engine::params::{BranchState, OrganState};

/// Organ state (and optionally all branch states) at one recorded step
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySnapshot {
    /// 1-based number of the step this snapshot closes
    pub step: Step,
    pub organ: OrganState,
    /// Present only when detailed history was enabled at record time
    pub branches: Option<Vec<BranchState>>,
}

/// Append-only, step-ordered list of snapshots
#[derive(Debug, Clone, Default)]
pub struct HistoryLog {
    snapshots: Vec<HistorySnapshot>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&HistorySnapshot> {
        self.snapshots.get(index)
    }

    /// Oldest snapshot
    pub fn first(&self) -> Option<&HistorySnapshot> {
        self.snapshots.first()
    }

    /// Newest snapshot
    pub fn last(&self) -> Option<&HistorySnapshot> {
        self.snapshots.last()
    }

    /// Snapshot recorded `back` entries before the newest one
    pub fn back(&self, back: usize) -> Option<&HistorySnapshot> {
        let index = self.snapshots.len().checked_sub(back + 1)?;
        self.snapshots.get(index)
    }

    /// Oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &HistorySnapshot> {
        self.snapshots.iter()
    }

    pub fn organ_states(&self) -> impl Iterator<Item = &OrganState> {
        self.snapshots.iter().map(|s| &s.organ)
    }

    pub fn as_slice(&self) -> &[HistorySnapshot] {
        &self.snapshots
    }

    fn push(&mut self, snapshot: HistorySnapshot) {
        self.snapshots.push(snapshot);
    }
}

impl Index<usize> for HistoryLog {
    type Output = HistorySnapshot;

    fn index(&self, index: usize) -> &Self::Output {
        &self.snapshots[index]
    }
}

impl<'a> IntoIterator for &'a HistoryLog {
    type Item = &'a HistorySnapshot;
    type IntoIter = std::slice::Iter<'a, HistorySnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.snapshots.iter()
    }
}

/// Decides which steps get recorded and owns the resulting log
#[derive(Debug, Clone, Default)]
pub struct HistoryRecorder {
    rate: u32,
    detailed: bool,
    steps: Step,
    log: HistoryLog,
}

impl HistoryRecorder {
    /// A recorder that records nothing until [`HistoryRecorder::configure`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every `rate` steps (0 disables recording)
    pub fn configure(&mut self, rate: u32, detailed: bool) {
        self.rate = rate;
        self.detailed = detailed;
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub fn is_detailed(&self) -> bool {
        self.detailed
    }

    /// Steps seen so far, recorded or not
    pub fn steps(&self) -> Step {
        self.steps
    }

    pub fn log(&self) -> &HistoryLog {
        &self.log
    }

    /// Count a finished step and snapshot it if it falls on the sampling rate
    ///
    /// Returns whether a snapshot was appended.
    pub(crate) fn record(&mut self, organ: &OrganState, branches: &[Branch]) -> bool {
        self.steps += 1;
        if self.rate == 0 || self.steps % Step::from(self.rate) != 0 {
            return false;
        }

        let branch_states: Option<Vec<BranchState>> = self
            .detailed
            .then(|| branches.iter().map(|b| b.state().clone()).collect());

        self.log.push(HistorySnapshot {
            step: self.steps,
            organ: organ.clone(),
            branches: branch_states,
        });
        tracing::trace!(step = self.steps, entries = self.log.len(), "history snapshot recorded");
        true
    }
}
