//! Organ-level container
//!
//! [`Engine`] owns every branch of one simulated organ, the aggregated
//! [`OrganState`], the update strategy and the history recorder. Concrete
//! organ models wrap an engine and implement [`Organ::step`] on top of the
//! building blocks exposed here:
//!
//! 1. adjust organ-level forcing terms through [`Engine::organ_mut`]
//! 2. run exactly one [`Engine::update_branches`] pass, which also re-derives
//!    the volume aggregates from the updated branch states
//! 3. derive pressure and flow from the new aggregates
//! 4. finish with exactly one [`Engine::record_history`]
//!
//! Graph construction (`add_branch`, `remove_branch`, ...) takes `&mut self`
//! and can therefore never overlap a running step.

use std::io::Read;
use std::sync::Arc;

use ahash::AHashMap;

use crate::core::config::{ExternalConfig, GlobalBranchConfig};
use crate::core::error::{LungError, Result};
use crate::core::types::{BranchId, Step};
use crate::engine::branch::{Branch, BranchModel, StepContext};
use crate::engine::dispatch::UpdateStrategy;
use crate::engine::history::{HistoryLog, HistoryRecorder};
use crate::engine::params::{BranchState, OrganState, StepInput};

/// A simulated organ: an engine plus the organ-level physics
pub trait Organ {
    type Model: BranchModel;

    fn engine(&self) -> &Engine<Self::Model>;

    fn engine_mut(&mut self) -> &mut Engine<Self::Model>;

    /// Advance simulated time by one step
    ///
    /// Implementations run one branch pass and one history record per call.
    fn step(&mut self, input: &StepInput);

    /// Step once per input, in order
    fn run<I>(&mut self, inputs: I)
    where
        I: IntoIterator<Item = StepInput>,
        Self: Sized,
    {
        for input in inputs {
            self.step(&input);
        }
    }

    /// Build the branch graph from an external description
    ///
    /// No format is defined by default; the call reports
    /// [`LungError::Unimplemented`] and leaves the organ untouched.
    fn load_structure(&mut self, _source: &mut dyn Read) -> Result<()> {
        tracing::warn!("structure loading has to be implemented by the organ model");
        Err(LungError::Unimplemented("load_structure"))
    }

    fn organ_state(&self) -> &OrganState {
        self.engine().organ()
    }

    fn history(&self) -> &HistoryLog {
        self.engine().history()
    }
}

/// Branch storage, aggregate state and step plumbing shared by all organs
#[derive(Debug)]
pub struct Engine<M> {
    model: M,
    external: ExternalConfig,
    global: Option<Arc<GlobalBranchConfig>>,
    organ: OrganState,
    branches: Vec<Branch>,
    index: AHashMap<BranchId, usize>,
    next_id: u32,
    strategy: UpdateStrategy,
    history: HistoryRecorder,
    /// Start-of-pass branch states, reused across steps
    previous: Vec<BranchState>,
}

impl<M: BranchModel> Engine<M> {
    /// Create an empty engine with storage reserved for
    /// `external.branch_capacity` branches
    ///
    /// Without a global branch configuration only
    /// [`Engine::add_branch_with_global`] can add branches.
    pub fn new(model: M, external: ExternalConfig, global: Option<GlobalBranchConfig>) -> Self {
        let capacity = external.branch_capacity;
        Self {
            model,
            external,
            global: global.map(Arc::new),
            organ: OrganState::default(),
            branches: Vec::with_capacity(capacity),
            index: AHashMap::with_capacity(capacity),
            next_id: 0,
            strategy: UpdateStrategy::Serial,
            history: HistoryRecorder::new(),
            previous: Vec::with_capacity(capacity),
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn external(&self) -> &ExternalConfig {
        &self.external
    }

    pub fn global(&self) -> Option<&GlobalBranchConfig> {
        self.global.as_deref()
    }

    pub fn organ(&self) -> &OrganState {
        &self.organ
    }

    /// Organ state for an [`Organ::step`] implementation
    ///
    /// Meant for the forcing terms (`p`, `p_ip`, `v_ip`, `q`, `dp`, `inhale`).
    /// The volume aggregates `v`, `v_max` and `v_min` belong to the engine:
    /// writes to them are overwritten by the next [`Engine::update_branches`]
    /// or [`Engine::refresh_aggregates`].
    pub fn organ_mut(&mut self) -> &mut OrganState {
        &mut self.organ
    }

    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    pub fn contains(&self, id: BranchId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn branch(&self, id: BranchId) -> Option<&Branch> {
        self.index.get(&id).map(|&slot| &self.branches[slot])
    }

    /// All branches in storage (insertion) order
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn branch_ids(&self) -> impl Iterator<Item = BranchId> + '_ {
        self.branches.iter().map(Branch::id)
    }

    /// Add a branch using the engine's global branch configuration
    ///
    /// Pass `&[]` for a root, `&[parent]` for a single connection.
    /// Fails with [`LungError::MissingGlobalConfig`] if the engine was built
    /// without one; nothing is changed in that case.
    pub fn add_branch(&mut self, state: BranchState, connections: &[BranchId]) -> Result<BranchId> {
        let global = self.global.clone().ok_or(LungError::MissingGlobalConfig)?;
        self.insert_branch(state, connections, Some(global))
    }

    /// Add a branch with an explicitly supplied global configuration
    pub fn add_branch_with_global(
        &mut self,
        state: BranchState,
        connections: &[BranchId],
        global: Arc<GlobalBranchConfig>,
    ) -> Result<BranchId> {
        self.insert_branch(state, connections, Some(global))
    }

    fn insert_branch(
        &mut self,
        state: BranchState,
        connections: &[BranchId],
        global: Option<Arc<GlobalBranchConfig>>,
    ) -> Result<BranchId> {
        self.ensure_all(connections)?;

        let id = BranchId(self.next_id);
        self.next_id += 1;

        let mut branch = Branch::new(id, global, state);
        self.model.init(branch.state_mut());
        branch.add_connections(connections);
        self.organ.add_branch_adjustments(branch.state());

        self.index.insert(id, self.branches.len());
        self.branches.push(branch);

        tracing::debug!(
            %id,
            connections = connections.len(),
            total = self.branches.len(),
            "branch added"
        );
        Ok(id)
    }

    /// Remove a branch and every connection pointing at it
    ///
    /// Aggregates are reduced by the removed branch's contribution and the
    /// remaining branches keep their relative storage order.
    pub fn remove_branch(&mut self, id: BranchId) -> Result<Branch> {
        let slot = self.slot(id)?;

        for branch in &mut self.branches {
            branch.sever(id);
        }
        self.organ.remove_branch_adjustments(self.branches[slot].state());

        let removed = self.branches.remove(slot);
        self.index.remove(&id);
        for (offset, branch) in self.branches[slot..].iter().enumerate() {
            self.index.insert(branch.id(), slot + offset);
        }

        tracing::debug!(%id, total = self.branches.len(), "branch removed");
        Ok(removed)
    }

    /// Add a directed connection `from -> to`
    pub fn connect(&mut self, from: BranchId, to: BranchId) -> Result<()> {
        self.ensure_all(&[to])?;
        let slot = self.slot(from)?;
        self.branches[slot].add_connection(to);
        Ok(())
    }

    /// Drop one connection `from -> to`; returns whether it existed
    pub fn disconnect(&mut self, from: BranchId, to: BranchId) -> Result<bool> {
        let slot = self.slot(from)?;
        Ok(self.branches[slot].delete_connection(to))
    }

    pub fn clear_connections(&mut self, id: BranchId) -> Result<()> {
        let slot = self.slot(id)?;
        self.branches[slot].delete_connections();
        Ok(())
    }

    /// Mark a branch rigid or collapsible, keeping aggregates consistent
    pub fn set_branch_static(&mut self, id: BranchId, is_static: bool) -> Result<()> {
        let slot = self.slot(id)?;
        let state = self.branches[slot].state_mut();
        self.organ.remove_branch_adjustments(state);
        state.set_static(is_static);
        self.organ.add_branch_adjustments(state);
        Ok(())
    }

    /// Follow first connections `order` times starting at `from`
    ///
    /// `Ok(None)` if the chain ends early. A walk longer than the number of
    /// branches must revisit one, which is reported as
    /// [`LungError::CyclicConnections`].
    pub fn connection_of_order(&self, order: usize, from: BranchId) -> Result<Option<BranchId>> {
        let mut current = self.branch(from).ok_or(LungError::UnknownBranch(from))?;
        for hop in 0..order {
            if hop >= self.branches.len() {
                return Err(LungError::CyclicConnections { from, order });
            }
            match current.first_connection().and_then(|next| self.branch(next)) {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current.id()))
    }

    /// Configure history sampling: one snapshot every `rate` steps (0 = off)
    pub fn track_history(&mut self, rate: u32, detailed: bool) {
        self.history.configure(rate, detailed);
    }

    /// Update branches in parallel on `workers` threads from now on
    ///
    /// Every branch's local update within one step must be independent of
    /// every other branch's update in that step. Connection states are read
    /// from a start-of-pass copy, so a model that only touches its own state
    /// (as [`BranchModel::time_step`] enforces) gives identical results in
    /// serial and parallel mode. `workers == 0` switches back to serial.
    pub fn use_threading(&mut self, workers: usize) -> Result<()> {
        self.strategy = UpdateStrategy::parallel(workers)?;
        tracing::debug!(workers, parallel = self.strategy.is_parallel(), "update strategy changed");
        Ok(())
    }

    pub fn use_serial(&mut self) {
        self.strategy = UpdateStrategy::Serial;
    }

    pub fn strategy(&self) -> &UpdateStrategy {
        &self.strategy
    }

    pub fn history(&self) -> &HistoryLog {
        self.history.log()
    }

    pub fn history_recorder(&self) -> &HistoryRecorder {
        &self.history
    }

    /// Steps completed so far
    pub fn steps(&self) -> Step {
        self.history.steps()
    }

    /// Run every branch's local update once, then re-derive the aggregates
    pub fn update_branches(&mut self, input: &StepInput) {
        self.previous.clear();
        self.previous.extend(self.branches.iter().map(|b| b.state().clone()));

        let ctx = StepContext::new(
            &self.external,
            &self.organ,
            input,
            &self.previous,
            &self.index,
        );
        self.strategy.run(&mut self.branches, &self.model, &ctx);
        self.refresh_aggregates();
    }

    /// Recompute `v`, `v_max` and `v_min` as sums over the present branches
    ///
    /// Local updates may move a branch's volume and maximum volume, so the
    /// incremental add/remove adjustments alone would drift.
    pub fn refresh_aggregates(&mut self) {
        let mut totals = OrganState {
            v: 0.0,
            v_max: 0.0,
            v_min: 0.0,
            ..self.organ.clone()
        };
        for branch in &self.branches {
            totals.add_branch_adjustments(branch.state());
        }
        self.organ = totals;
    }

    /// Close the current step in the history recorder
    pub fn record_history(&mut self) {
        self.history.record(&self.organ, &self.branches);
    }

    fn slot(&self, id: BranchId) -> Result<usize> {
        self.index
            .get(&id)
            .copied()
            .ok_or(LungError::UnknownBranch(id))
    }

    fn ensure_all(&self, ids: &[BranchId]) -> Result<()> {
        match ids.iter().find(|id| !self.contains(**id)) {
            Some(&missing) => Err(LungError::UnknownBranch(missing)),
            None => Ok(()),
        }
    }
}
