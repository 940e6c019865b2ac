//! Graph scheduler: node table, edge wiring and per-node workers.
//!
//! Every installed node gets one dedicated worker thread. A worker blocks on
//! its node's input queues until the trigger condition holds, runs the
//! node's process function, and pushes the collected outputs into every
//! edge leaving the written slot. Each destination applies its own queue
//! policy, so a slow consumer only ever affects its own inputs.
//!
//! # Concurrency
//!
//! - No global lock: nodes only share the queues of the edges between them.
//! - One invocation per node at a time (one worker per node).
//! - Wiring may change while workers run. A delivery snapshots the edge list
//!   and registers itself on each edge; `disconnect` unregisters the edge and
//!   waits for in-flight deliveries through it before returning.

use crate::buffer::MediaBuffer;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::{EdgeId, NodeId};
use crate::pipeline::node::{NodeCounters, NodeStats, Process, ProcessContext};
use crate::pipeline::queue::{InputQueues, PushOutcome};
use crate::pipeline::slot::{HoldInput, SlotMap, ThreadModel};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Back-off for source nodes whose process function produced nothing.
const SOURCE_IDLE_BACKOFF: Duration = Duration::from_millis(2);

// ── Edges ──

struct Edge {
    id: EdgeId,
    src_slot: usize,
    dst_slot: usize,
    target: Arc<NodeCore>,
    connected: AtomicBool,
    in_flight: Mutex<usize>,
    idle: Condvar,
}

impl Edge {
    /// Register a delivery. Fails once the edge has been disconnected.
    fn enter(&self) -> bool {
        let mut n = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.connected.load(Ordering::Acquire) {
            return false;
        }
        *n += 1;
        true
    }

    fn exit(&self) {
        let mut n = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        *n -= 1;
        if *n == 0 {
            self.idle.notify_all();
        }
    }

    /// Mark the edge disconnected and wait until no delivery uses it.
    fn quiesce(&self) {
        {
            let _n = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            self.connected.store(false, Ordering::Release);
        }
        self.target.inputs.wake_producers();
        let mut n = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        while *n > 0 {
            n = self.idle.wait(n).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Read-only description of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeInfo {
    pub id: EdgeId,
    pub source: NodeId,
    pub source_slot: usize,
    pub dest: NodeId,
    pub dest_slot: usize,
}

/// Snapshot of a single node.
#[derive(Debug, Clone)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub name: String,
    pub thread_model: ThreadModel,
    pub inputs: usize,
    pub outputs: usize,
    pub running: bool,
    pub stats: NodeStats,
}

/// Complete topology snapshot of the graph.
#[derive(Debug, Clone, Default)]
pub struct TopologySnapshot {
    pub nodes: Vec<NodeSnapshot>,
    pub edges: Vec<EdgeInfo>,
}

// ── Nodes ──

struct NodeCore {
    id: NodeId,
    name: String,
    thread_model: ThreadModel,
    inputs: InputQueues,
    outputs: RwLock<Vec<Vec<Arc<Edge>>>>,
    hold: Vec<HoldInput>,
    stopping: AtomicBool,
    counters: NodeCounters,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl NodeCore {
    fn output_count(&self) -> usize {
        self.hold.len()
    }

    fn edges_from(&self, slot: usize) -> Vec<Arc<Edge>> {
        let outputs = self.outputs.read().unwrap_or_else(PoisonError::into_inner);
        outputs.get(slot).cloned().unwrap_or_default()
    }

    /// Push `buffer` into every edge leaving `slot`.
    fn deliver(&self, slot: usize, buffer: MediaBuffer) {
        let keep_waiting = || !self.stopping.load(Ordering::Acquire);
        for edge in self.edges_from(slot) {
            if !edge.enter() {
                continue;
            }
            let connected = || keep_waiting() && edge.connected.load(Ordering::Acquire);
            let outcome = edge.target.inputs.push(edge.dst_slot, buffer.clone(), &connected);
            edge.exit();

            match outcome {
                PushOutcome::Queued => {}
                PushOutcome::DroppedOldest => {
                    edge.target.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(
                        "'{}' input {} full, dropped oldest buffer",
                        edge.target.name,
                        edge.dst_slot
                    );
                }
                PushOutcome::Rejected => {
                    tracing::trace!(
                        "'{}' rejected buffer from '{}' on {}",
                        edge.target.name,
                        self.name,
                        edge.id
                    );
                    continue;
                }
            }
            self.counters.delivered.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Attach the hold-input relation to an output buffer.
    fn hold(&self, slot: usize, buffer: MediaBuffer, source: Option<&MediaBuffer>) -> MediaBuffer {
        match (self.hold[slot], source) {
            (HoldInput::Hold, Some(input)) => buffer.with_related(vec![input.clone()]),
            (HoldInput::InheritFromInput, Some(input)) => {
                buffer.with_related(input.related().to_vec())
            }
            _ => buffer,
        }
    }

    /// Ask the worker to exit and discard queued input. Does not join.
    fn request_stop(&self) {
        if self.stopping.swap(true, Ordering::AcqRel) {
            return;
        }
        let dropped = self.inputs.stop();
        self.counters
            .dropped
            .fetch_add(dropped as u64, Ordering::Relaxed);
        // Producers blocked on our downstream edges re-check `stopping`.
        let outputs = self.outputs.read().unwrap_or_else(PoisonError::into_inner);
        for edge in outputs.iter().flatten() {
            edge.target.inputs.wake_producers();
        }
        tracing::debug!("Stopping node '{}' ({} queued buffers dropped)", self.name, dropped);
    }

    fn join(&self) {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                // Stopped from inside its own process function; the loop exits on return.
                return;
            }
            if handle.join().is_err() {
                tracing::error!("Worker of node '{}' terminated abnormally", self.name);
            }
            tracing::info!("Node '{}' stopped", self.name);
        }
    }

    fn is_running(&self) -> bool {
        !self.stopping.load(Ordering::Acquire)
    }
}

fn run_worker(core: Arc<NodeCore>, mut process: Box<dyn Process>) {
    tracing::debug!("Worker for '{}' started", core.name);
    let is_source = core.inputs.slot_count() == 0;
    let needs_hold = core.hold.iter().any(|h| *h != HoldInput::None);

    while core.is_running() {
        let inputs = if is_source {
            Vec::new()
        } else {
            match core.inputs.wait_and_fetch() {
                Some(inputs) => inputs,
                None => break,
            }
        };
        let hold_source = if needs_hold {
            inputs.first().cloned().flatten()
        } else {
            None
        };

        let mut ctx = ProcessContext::new(
            core.id,
            &core.name,
            inputs,
            core.output_count(),
            &core.stopping,
        );
        let result = catch_unwind(AssertUnwindSafe(|| process.process(&mut ctx)));

        match result {
            Ok(true) => {
                core.counters.processed.fetch_add(1, Ordering::Relaxed);
                let (_, outputs) = ctx.into_parts();
                for (slot, buffer) in outputs {
                    let buffer = core.hold(slot, buffer, hold_source.as_ref());
                    core.deliver(slot, buffer);
                }
            }
            Ok(false) => {
                core.counters.failed.fetch_add(1, Ordering::Relaxed);
                if is_source {
                    thread::sleep(SOURCE_IDLE_BACKOFF);
                }
            }
            Err(_) => {
                core.counters.failed.fetch_add(1, Ordering::Relaxed);
                core.counters.panicked.fetch_add(1, Ordering::Relaxed);
                tracing::error!("Process function of '{}' panicked; cycle dropped", core.name);
            }
        }
    }
    tracing::debug!("Worker for '{}' exiting", core.name);
}

// ── Graph ──

/// The processing graph: a table of nodes, each with its own worker.
///
/// All methods take `&self`, so a graph can be shared behind an `Arc` and
/// rewired from any thread.
pub struct Graph {
    nodes: RwLock<Vec<Option<Arc<NodeCore>>>>,
    next_edge: AtomicU64,
}

impl Graph {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
            next_edge: AtomicU64::new(0),
        }
    }

    fn node(&self, id: NodeId) -> PipelineResult<Arc<NodeCore>> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        nodes
            .get(id.index())
            .and_then(Clone::clone)
            .ok_or(PipelineError::UnknownNode(id))
    }

    fn live_nodes(&self) -> Vec<Arc<NodeCore>> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        nodes.iter().flatten().cloned().collect()
    }

    // ── Graph building ──

    /// Validate `slot_map`, register the node, and start its worker.
    pub fn install(&self, name: impl Into<String>, mut slot_map: SlotMap) -> PipelineResult<NodeId> {
        let name = name.into();
        slot_map.validate(&name)?;
        let process = slot_map
            .process
            .take()
            .ok_or_else(|| PipelineError::MissingProcess(name.clone()))?;

        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        if nodes.iter().flatten().any(|n| n.name == name) {
            return Err(PipelineError::DuplicateName(name));
        }
        let id = NodeId::from_index(nodes.len())?;

        let hold = (0..slot_map.outputs).map(|s| slot_map.hold_mode(s)).collect();
        let core = Arc::new(NodeCore {
            id,
            name: name.clone(),
            thread_model: slot_map.thread_model,
            inputs: InputQueues::new(slot_map.inputs.clone()),
            outputs: RwLock::new(vec![Vec::new(); slot_map.outputs]),
            hold,
            stopping: AtomicBool::new(false),
            counters: NodeCounters::default(),
            worker: Mutex::new(None),
        });

        let worker_core = core.clone();
        let handle = thread::Builder::new()
            .name(format!("{}-{}", slot_map.thread_model.thread_prefix(), name))
            .spawn(move || run_worker(worker_core, process))
            .map_err(|e| PipelineError::Spawn {
                node: name.clone(),
                message: e.to_string(),
            })?;
        *core.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        nodes.push(Some(core));
        tracing::info!(
            "Installed node '{}' as {} ({} inputs, {} outputs, {:?})",
            name,
            id,
            slot_map.inputs.len(),
            slot_map.outputs,
            slot_map.thread_model
        );
        Ok(id)
    }

    /// Connect output `src_slot` of `source` to input `dst_slot` of `dest`.
    ///
    /// Legal at any time after both nodes are installed, including while
    /// the graph is running.
    pub fn connect(
        &self,
        source: NodeId,
        src_slot: usize,
        dest: NodeId,
        dst_slot: usize,
    ) -> PipelineResult<EdgeId> {
        let src = self.node(source)?;
        let dst = self.node(dest)?;
        if src_slot >= src.output_count() {
            return Err(PipelineError::InvalidSlot {
                node: source,
                direction: "output",
                slot: src_slot,
            });
        }
        if dst_slot >= dst.inputs.slot_count() {
            return Err(PipelineError::InvalidSlot {
                node: dest,
                direction: "input",
                slot: dst_slot,
            });
        }

        let id = EdgeId(self.next_edge.fetch_add(1, Ordering::Relaxed));
        let edge = Arc::new(Edge {
            id,
            src_slot,
            dst_slot,
            target: dst.clone(),
            connected: AtomicBool::new(true),
            in_flight: Mutex::new(0),
            idle: Condvar::new(),
        });
        src.outputs
            .write()
            .unwrap_or_else(PoisonError::into_inner)[src_slot]
            .push(edge);
        tracing::debug!(
            "Connected '{}'[{}] -> '{}'[{}] ({})",
            src.name,
            src_slot,
            dst.name,
            dst_slot,
            id
        );
        Ok(id)
    }

    /// Remove every edge from `source` to `dest`, waiting for in-flight
    /// deliveries on them to finish. Returns the number of edges removed.
    pub fn disconnect(&self, source: NodeId, dest: NodeId) -> PipelineResult<usize> {
        let src = self.node(source)?;
        let removed = Self::detach_edges(&src, |edge| edge.target.id == dest);
        for edge in &removed {
            edge.quiesce();
        }
        if !removed.is_empty() {
            tracing::debug!(
                "Disconnected {} edge(s) '{}' -> {}",
                removed.len(),
                src.name,
                dest
            );
        }
        Ok(removed.len())
    }

    fn detach_edges(src: &NodeCore, matches: impl Fn(&Edge) -> bool) -> Vec<Arc<Edge>> {
        let mut outputs = src.outputs.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = Vec::new();
        for slot in outputs.iter_mut() {
            let (gone, kept): (Vec<_>, Vec<_>) = slot.drain(..).partition(|e| matches(e));
            *slot = kept;
            removed.extend(gone);
        }
        removed
    }

    /// Stop a node: its worker finishes (or abandons) the current call and
    /// exits, queued input is dropped. Idempotent.
    pub fn stop(&self, node: NodeId) -> PipelineResult<()> {
        let core = self.node(node)?;
        core.request_stop();
        core.join();
        Ok(())
    }

    /// Stop a node, remove every edge touching it, and drop it from the table.
    pub fn uninstall(&self, node: NodeId) -> PipelineResult<()> {
        let core = self.node(node)?;
        core.request_stop();
        core.join();

        for other in self.live_nodes() {
            for edge in Self::detach_edges(&other, |edge| edge.target.id == node) {
                edge.quiesce();
            }
        }
        for edge in Self::detach_edges(&core, |_| true) {
            edge.quiesce();
        }

        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = nodes.get_mut(node.index()) {
            *entry = None;
        }
        tracing::info!("Uninstalled node '{}'", core.name);
        Ok(())
    }

    /// Stop every node. Stop requests go out first so that no worker blocks
    /// on a neighbour that is about to exit.
    pub fn shutdown(&self) {
        let nodes = self.live_nodes();
        for core in &nodes {
            core.request_stop();
        }
        for core in &nodes {
            core.join();
        }
    }

    // ── Data injection ──

    /// Push a buffer into an input slot from outside the graph (capture
    /// sources, tests). The slot's full-queue policy applies.
    pub fn send(&self, node: NodeId, slot: usize, buffer: MediaBuffer) -> PipelineResult<PushOutcome> {
        let core = self.node(node)?;
        if slot >= core.inputs.slot_count() {
            return Err(PipelineError::InvalidSlot {
                node,
                direction: "input",
                slot,
            });
        }
        if !core.is_running() {
            return Err(PipelineError::Stopped(node));
        }
        let outcome = core.inputs.push(slot, buffer, &|| true);
        if outcome == PushOutcome::DroppedOldest {
            core.counters.dropped.fetch_add(1, Ordering::Relaxed);
        }
        Ok(outcome)
    }

    // ── Introspection ──

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.live_nodes()
            .into_iter()
            .find(|n| n.name == name)
            .map(|n| n.id)
    }

    pub fn stats(&self, node: NodeId) -> PipelineResult<NodeStats> {
        Ok(self.node(node)?.counters.snapshot())
    }

    pub fn is_running(&self, node: NodeId) -> PipelineResult<bool> {
        Ok(self.node(node)?.is_running())
    }

    /// Number of buffers waiting on an input slot.
    pub fn queue_len(&self, node: NodeId, slot: usize) -> PipelineResult<usize> {
        Ok(self.node(node)?.inputs.len(slot))
    }

    /// Buffers waiting on an input slot, oldest first.
    pub fn queued(&self, node: NodeId, slot: usize) -> PipelineResult<Vec<MediaBuffer>> {
        Ok(self.node(node)?.inputs.queued(slot))
    }

    /// Snapshot of all live nodes and edges.
    pub fn topology(&self) -> TopologySnapshot {
        let mut snapshot = TopologySnapshot::default();
        for core in self.live_nodes() {
            let outputs = core.outputs.read().unwrap_or_else(PoisonError::into_inner);
            for edge in outputs.iter().flatten() {
                snapshot.edges.push(EdgeInfo {
                    id: edge.id,
                    source: core.id,
                    source_slot: edge.src_slot,
                    dest: edge.target.id,
                    dest_slot: edge.dst_slot,
                });
            }
            snapshot.nodes.push(NodeSnapshot {
                id: core.id,
                name: core.name.clone(),
                thread_model: core.thread_model,
                inputs: core.inputs.slot_count(),
                outputs: core.output_count(),
                running: core.is_running(),
                stats: core.counters.snapshot(),
            });
        }
        snapshot
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Graph {
    fn drop(&mut self) {
        self.shutdown();
    }
}
