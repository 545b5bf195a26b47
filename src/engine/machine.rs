//! The statechart interpreter: lifecycle, queues, and the processing loop.

use crate::core::graph::{StateGraph, StateId, StateKind};
use crate::core::hierarchy;
use crate::core::Event;
use crate::engine::error::MachineError;
use crate::engine::queue::{DelayedEventId, SharedQueue};
use crate::properties::{
    AnimationDriver, AnimationToken, PropertyAssignment, PropertyStore, RestorableId,
    RestorePolicy,
};
use crate::trace::MachineTrace;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Machine-level run state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// Not started, or stopped.
    NotRunning,
    /// Performing the initial microstep that enters the root's defaults.
    Starting,
    /// Processing events.
    Running,
}

/// Why the processing loop last yielded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Both queues drained; control returned to the host loop.
    EventQueueEmpty,
    /// The machine reached a final configuration.
    Finished,
    /// `stop()` was called, or a fault had no error state to route to.
    Stopped,
}

/// Cloneable producer-side handle: post events and request a stop from
/// outside the owning processing context. Effects are observed on the
/// next drain.
#[derive(Clone)]
pub struct PostHandle {
    shared: Arc<SharedQueue>,
}

impl PostHandle {
    /// Append an external event.
    pub fn post_event(&self, event: Event) {
        self.shared.post(event);
    }

    /// Append an external event after `delay`; cancellable until it fires.
    pub fn post_delayed_event(&self, event: Event, delay: Duration) -> DelayedEventId {
        self.shared.post_delayed(event, delay)
    }

    /// Cancel a delayed event. Returns `false` if it already fired.
    pub fn cancel_delayed_event(&self, id: DelayedEventId) -> bool {
        self.shared.cancel(id)
    }

    /// Ask the machine to stop at the next drain.
    pub fn request_stop(&self) {
        self.shared.request_stop();
    }
}

pub(crate) struct PendingAnimation {
    pub(crate) state: StateId,
    pub(crate) assignment: PropertyAssignment,
}

/// The hierarchical statechart interpreter.
///
/// Single-threaded and event-loop-cooperative: the interpreter never
/// spawns threads and never blocks. Producers append to the external
/// queue through [`post_event`](Self::post_event) or a [`PostHandle`];
/// the host drives processing by calling
/// [`process_events`](Self::process_events) (or [`dispatch`](Self::dispatch)
/// as a post-and-process convenience). Internal events are always drained
/// completely before the next external event is considered.
///
/// Built via [`MachineBuilder`](crate::builder::MachineBuilder); see the
/// crate-level docs for a complete example.
pub struct StateMachine {
    pub(crate) graph: StateGraph,
    pub(crate) run_state: RunState,
    pub(crate) stop_reason: Option<StopReason>,
    pub(crate) configuration: HashSet<StateId>,
    pub(crate) internal_queue: VecDeque<Event>,
    pub(crate) shared: Arc<SharedQueue>,
    processing: bool,
    pub(crate) restore_policy: RestorePolicy,
    pub(crate) restorables: HashMap<RestorableId, Value>,
    pub(crate) store: PropertyStore,
    pub(crate) driver: Option<Box<dyn AnimationDriver>>,
    pub(crate) pending: HashMap<AnimationToken, PendingAnimation>,
    error: Option<MachineError>,
    error_string: String,
    pub(crate) trace: MachineTrace,
}

impl StateMachine {
    pub(crate) fn from_parts(
        graph: StateGraph,
        restore_policy: RestorePolicy,
        store: PropertyStore,
        driver: Option<Box<dyn AnimationDriver>>,
    ) -> Self {
        Self {
            graph,
            run_state: RunState::NotRunning,
            stop_reason: None,
            configuration: HashSet::new(),
            internal_queue: VecDeque::new(),
            shared: Arc::new(SharedQueue::new()),
            processing: false,
            restore_policy,
            restorables: HashMap::new(),
            store,
            driver,
            pending: HashMap::new(),
            error: None,
            error_string: String::new(),
            trace: MachineTrace::new(),
        }
    }

    /// Start the machine: enter the root's default descendants and begin
    /// processing queued events.
    ///
    /// Calling `start` on a machine that is already started is rejected
    /// without touching the configuration.
    pub fn start(&mut self) -> Result<(), MachineError> {
        if !matches!(self.run_state, RunState::NotRunning) {
            return Err(MachineError::AlreadyStarted);
        }
        self.run_state = RunState::Starting;
        self.error = None;
        self.error_string.clear();
        self.stop_reason = None;
        self.configuration.clear();
        self.restorables.clear();
        self.internal_queue.clear();
        self.trace = MachineTrace::new();
        debug!("starting statechart interpreter");

        let mut to_enter = HashSet::new();
        super::microstep::add_states_to_enter(
            &self.graph,
            &[StateGraph::ROOT],
            StateGraph::ROOT,
            &mut to_enter,
        );
        let entry_list = hierarchy::entry_ordered(&self.graph, &to_enter);
        self.enter_states(&entry_list);

        self.run_state = RunState::Running;
        // Stabilize eventless transitions enabled by the initial entry
        // before draining the queues.
        self.macrostep(None);
        self.process_events();
        Ok(())
    }

    /// Stop the machine. Always safe and idempotent; a machine that
    /// already finished keeps its `Finished` stop reason.
    pub fn stop(&mut self) {
        if matches!(self.run_state, RunState::NotRunning) {
            return;
        }
        self.do_stop();
    }

    fn do_stop(&mut self) {
        let tokens: Vec<AnimationToken> = self.pending.keys().copied().collect();
        if let Some(driver) = self.driver.as_mut() {
            for token in &tokens {
                driver.stop(*token);
            }
        }
        self.pending.clear();
        self.internal_queue.clear();
        self.shared.clear();
        self.configuration.clear();
        self.restorables.clear();
        self.run_state = RunState::NotRunning;
        self.stop_reason = Some(StopReason::Stopped);
        debug!("statechart interpreter stopped");
    }

    /// Whether the machine is processing or ready to process events.
    pub fn is_running(&self) -> bool {
        matches!(self.run_state, RunState::Running | RunState::Starting)
    }

    /// Current machine-level run state.
    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    /// Why processing last yielded, once it has.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// Append an external event. Processed on the next
    /// [`process_events`](Self::process_events) drain.
    pub fn post_event(&self, event: Event) {
        self.shared.post(event);
    }

    /// Append an external event after `delay`. The returned handle
    /// cancels it as long as it has not fired.
    pub fn post_delayed_event(&self, event: Event, delay: Duration) -> DelayedEventId {
        self.shared.post_delayed(event, delay)
    }

    /// Cancel a delayed event; `false` if it already fired or was
    /// already cancelled.
    pub fn cancel_delayed_event(&self, id: DelayedEventId) -> bool {
        self.shared.cancel(id)
    }

    /// A cloneable handle for posting from producer contexts.
    pub fn post_handle(&self) -> PostHandle {
        PostHandle {
            shared: self.shared.clone(),
        }
    }

    /// Whether a wake-up is pending (events were posted since the last
    /// drain).
    pub fn processing_scheduled(&self) -> bool {
        self.shared.is_scheduled()
    }

    /// Post one event and drain the queues: the common synchronous-host
    /// pattern.
    pub fn dispatch(&mut self, event: Event) {
        self.post_event(event);
        self.process_events();
    }

    /// The scheduler callback: drain due-delayed events, then process
    /// queued events one macrostep at a time until both queues are empty,
    /// the machine finishes, or a stop is requested. Not re-entrant;
    /// posting during processing only enqueues.
    pub fn process_events(&mut self) {
        if self.processing || !matches!(self.run_state, RunState::Running) {
            return;
        }
        self.processing = true;
        // Consume the wake-up before draining: a producer posting after
        // this point re-arms the flag, so its event is never stranded
        // behind a cleared flag.
        self.shared.clear_scheduled();
        loop {
            if self.shared.take_stop() {
                self.do_stop();
                break;
            }
            // Completion is only declared once the internal queue has
            // drained, so region-done events get their chance to drive
            // outer transitions first.
            if self.internal_queue.is_empty() && self.check_finished() {
                break;
            }
            self.shared.promote_due(Instant::now());
            let next = self
                .internal_queue
                .pop_front()
                .or_else(|| self.shared.pop_external());
            let Some(event) = next else {
                self.stop_reason = Some(StopReason::EventQueueEmpty);
                break;
            };
            trace!(event = %event.name, "processing event");
            self.macrostep(Some(event));
            if !matches!(self.run_state, RunState::Running) {
                break;
            }
        }
        self.processing = false;
    }

    /// One event-driven microstep followed by the eventless drain that
    /// stabilizes the macrostep.
    fn macrostep(&mut self, event: Option<Event>) {
        if let Some(event) = event {
            match self.select_transitions(Some(&event)) {
                Ok(enabled) if !enabled.is_empty() => self.microstep(Some(&event), &enabled),
                Ok(_) => {
                    trace!(event = %event.name, "no enabled transitions; event discarded");
                }
                Err((state, fault)) => {
                    let name = self.graph.node(state).name.clone();
                    self.handle_fault(MachineError::GuardFailed { state: name, fault }, state);
                }
            }
        }
        while matches!(self.run_state, RunState::Running) {
            match self.select_transitions(None) {
                Ok(enabled) if !enabled.is_empty() => self.microstep(None, &enabled),
                Ok(_) => break,
                Err((state, fault)) => {
                    let name = self.graph.node(state).name.clone();
                    self.handle_fault(MachineError::GuardFailed { state: name, fault }, state);
                    break;
                }
            }
        }
    }

    /// Active configuration in entry order (root first).
    pub fn configuration(&self) -> Vec<StateId> {
        hierarchy::entry_ordered(&self.graph, &self.configuration)
    }

    /// Names of the active configuration in entry order.
    pub fn active_names(&self) -> Vec<&str> {
        self.configuration()
            .into_iter()
            .filter_map(|id| self.graph.name_of(id))
            .collect()
    }

    /// Whether a state is in the active configuration.
    pub fn is_active(&self, state: StateId) -> bool {
        self.configuration.contains(&state)
    }

    /// The static graph this machine interprets.
    pub fn graph(&self) -> &StateGraph {
        &self.graph
    }

    /// The property surface the engine assigns through.
    pub fn properties(&self) -> &PropertyStore {
        &self.store
    }

    /// Mutable access for hosts that change properties between drains.
    pub fn properties_mut(&mut self) -> &mut PropertyStore {
        &mut self.store
    }

    /// Text of the last recorded error, or empty.
    pub fn error_string(&self) -> &str {
        &self.error_string
    }

    /// The last recorded error, if any.
    pub fn last_error(&self) -> Option<&MachineError> {
        self.error.as_ref()
    }

    /// Ordered enter/exit trace of the current run.
    pub fn trace(&self) -> &MachineTrace {
        &self.trace
    }

    /// Host callback: an animation started by the engine completed. The
    /// deferred assignment is finalized and processing resumes. Unknown
    /// or stale tokens are ignored.
    pub fn animation_finished(&mut self, token: AnimationToken) {
        if let Some(pending) = self.pending.remove(&token) {
            trace!(
                object = pending.assignment.target.as_str(),
                property = pending.assignment.property.as_str(),
                "animation finished; finalizing assignment"
            );
            self.store.apply(&pending.assignment);
            self.shared.schedule();
            self.process_events();
        }
    }

    pub(crate) fn set_error(&mut self, error: MachineError) {
        self.error_string = error.to_string();
        tracing::error!(error = %self.error_string, "machine error recorded");
        self.error = Some(error);
    }

    /// Nearest error state declared on the context or one of its
    /// ancestors.
    pub(crate) fn find_error_state(&self, context: StateId) -> Option<StateId> {
        std::iter::once(context)
            .chain(hierarchy::proper_ancestors(&self.graph, context, None))
            .find_map(|s| self.graph.node(s).error_state)
    }

    /// Absorb a guard/action fault: record it, then route to the nearest
    /// declared error state, or halt fatally if none is declared. This is
    /// the only place runtime faults are absorbed rather than propagated.
    pub(crate) fn handle_fault(&mut self, error: MachineError, context: StateId) {
        self.set_error(error);
        match self.find_error_state(context) {
            Some(error_state) => {
                debug!(
                    state = self.graph.node(error_state).name.as_str(),
                    "routing to declared error state"
                );
                self.route_to(context, error_state);
            }
            None => {
                warn!("no error state declared; halting with fatal machine error");
                self.run_state = RunState::NotRunning;
                self.stop_reason = Some(StopReason::Stopped);
            }
        }
    }

    /// If every active leaf is a final state, halt with `Finished`.
    fn check_finished(&mut self) -> bool {
        if self.in_final_configuration() {
            debug!("machine reached a final configuration");
            self.run_state = RunState::NotRunning;
            self.stop_reason = Some(StopReason::Finished);
            return true;
        }
        false
    }

    fn in_final_configuration(&self) -> bool {
        let mut saw_leaf = false;
        for &s in &self.configuration {
            let has_active_child = self
                .graph
                .children_of(s)
                .iter()
                .any(|c| self.configuration.contains(c));
            if !has_active_child {
                saw_leaf = true;
                if !hierarchy::is_final(&self.graph, s) {
                    return false;
                }
            }
        }
        saw_leaf
    }

    /// Region-completion test: a compound is in a final state when an
    /// active final child exists; a parallel when all regions are.
    pub(crate) fn is_in_final_state(&self, s: StateId) -> bool {
        match self.graph.kind_of(s) {
            Some(StateKind::Compound { .. }) => self.graph.children_of(s).iter().any(|&c| {
                self.configuration.contains(&c) && hierarchy::is_final(&self.graph, c)
            }),
            Some(StateKind::Parallel) => self
                .graph
                .children_of(s)
                .iter()
                .all(|&c| self.is_in_final_state(c)),
            _ => false,
        }
    }
}
