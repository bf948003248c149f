//! Branches and the local-update capability
//!
//! A [`Branch`] owns its [`BranchState`] and a list of directed connections
//! to other branches. Connections are [`BranchId`] handles resolved through
//! the owning engine, never references into branch storage, so growing or
//! shrinking that storage cannot invalidate them.
//!
//! The physics of a branch is supplied by a [`BranchModel`]. During a step
//! the model mutates only the branch it is handed and reads everything else
//! through a [`BranchContext`], including the state of its connections as
//! they were *before* the current branch pass began.

use std::sync::Arc;

use ahash::AHashMap;

use crate::core::config::{ExternalConfig, GlobalBranchConfig};
use crate::core::types::BranchId;
use crate::engine::params::{BranchState, OrganState, StepInput};

/// Local physics of one kind of branch
///
/// Implementations must be `Sync`: a parallel branch pass shares one model
/// across all workers.
pub trait BranchModel: Send + Sync {
    /// Model-specific setup, run once when a branch is added after the
    /// generic derived-field rules have been applied
    fn init(&self, _state: &mut BranchState) {}

    /// Advance `state` by one step
    ///
    /// `state` is the only thing this call may change. Connection states
    /// seen through `ctx` are from the start of the branch pass.
    fn time_step(&self, state: &mut BranchState, ctx: &BranchContext<'_>);
}

/// Read-only data shared by every local update of one branch pass
#[derive(Debug)]
pub struct StepContext<'a> {
    pub external: &'a ExternalConfig,
    pub organ: &'a OrganState,
    pub input: &'a StepInput,
    previous: &'a [BranchState],
    index: &'a AHashMap<BranchId, usize>,
}

impl<'a> StepContext<'a> {
    pub(crate) fn new(
        external: &'a ExternalConfig,
        organ: &'a OrganState,
        input: &'a StepInput,
        previous: &'a [BranchState],
        index: &'a AHashMap<BranchId, usize>,
    ) -> Self {
        Self {
            external,
            organ,
            input,
            previous,
            index,
        }
    }

    /// State of any branch as it was when the pass started
    pub fn previous_state(&self, id: BranchId) -> Option<&'a BranchState> {
        self.index.get(&id).and_then(|&slot| self.previous.get(slot))
    }
}

/// What a single local update is allowed to see
#[derive(Debug)]
pub struct BranchContext<'a> {
    step: &'a StepContext<'a>,
    global: Option<&'a GlobalBranchConfig>,
    connections: &'a [BranchId],
}

impl<'a> BranchContext<'a> {
    pub fn external(&self) -> &'a ExternalConfig {
        self.step.external
    }

    pub fn organ(&self) -> &'a OrganState {
        self.step.organ
    }

    pub fn input(&self) -> &'a StepInput {
        self.step.input
    }

    pub fn global(&self) -> Option<&'a GlobalBranchConfig> {
        self.global
    }

    pub fn connections(&self) -> &'a [BranchId] {
        self.connections
    }

    /// Start-of-pass state of one of this branch's connections
    pub fn connection_state(&self, id: BranchId) -> Option<&'a BranchState> {
        self.step.previous_state(id)
    }

    /// Start-of-pass state of the first connection, if any
    pub fn upstream(&self) -> Option<&'a BranchState> {
        self.connections
            .first()
            .and_then(|&id| self.step.previous_state(id))
    }

    /// Start-of-pass states of all connections, in connection order
    pub fn connection_states(&self) -> impl Iterator<Item = &'a BranchState> + 'a {
        let step = self.step;
        self.connections
            .iter()
            .filter_map(move |&id| step.previous_state(id))
    }
}

/// One unit of the simulated graph
#[derive(Debug, Clone)]
pub struct Branch {
    id: BranchId,
    state: BranchState,
    global: Option<Arc<GlobalBranchConfig>>,
    connections: Vec<BranchId>,
}

impl Branch {
    /// Build a branch, deriving its dependent state fields
    pub(crate) fn new(
        id: BranchId,
        global: Option<Arc<GlobalBranchConfig>>,
        mut state: BranchState,
    ) -> Self {
        state.init();
        Self {
            id,
            state,
            global,
            connections: Vec::new(),
        }
    }

    pub fn id(&self) -> BranchId {
        self.id
    }

    pub fn state(&self) -> &BranchState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut BranchState {
        &mut self.state
    }

    pub fn global(&self) -> Option<&GlobalBranchConfig> {
        self.global.as_deref()
    }

    pub fn connections(&self) -> &[BranchId] {
        &self.connections
    }

    pub fn first_connection(&self) -> Option<BranchId> {
        self.connections.first().copied()
    }

    pub fn is_connected_to(&self, id: BranchId) -> bool {
        self.connections.contains(&id)
    }

    pub fn add_connection(&mut self, id: BranchId) {
        self.connections.push(id);
    }

    pub fn add_connections(&mut self, ids: &[BranchId]) {
        self.connections.extend_from_slice(ids);
    }

    /// Remove the first connection to `id`; returns whether one existed
    pub fn delete_connection(&mut self, id: BranchId) -> bool {
        match self.connections.iter().position(|&c| c == id) {
            Some(pos) => {
                self.connections.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Remove every connection to `id`
    pub(crate) fn sever(&mut self, id: BranchId) {
        self.connections.retain(|&c| c != id);
    }

    pub fn delete_connections(&mut self) {
        self.connections.clear();
    }

    /// Run the local update for this branch
    pub(crate) fn time_step<M>(&mut self, model: &M, step: &StepContext<'_>)
    where
        M: BranchModel + ?Sized,
    {
        let ctx = BranchContext {
            step,
            global: self.global.as_deref(),
            connections: &self.connections,
        };
        model.time_step(&mut self.state, &ctx);
    }
}
