//! Host-side reconciliation
//!
//! The reconciler runs on the host's UI loop. It fans each decoded event out
//! to every node of the configured type, creating missing controls first,
//! and keeps one `ViewerNodeState` per node.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use super::client::ViewerEvent;
use super::config::{LayoutPolicy, ViewerConfig};
use super::envelope::FrameEnvelope;
use super::state::{ApplyOutcome, NodeView, ViewerNodeState};

/// What the graph editor must provide
pub trait DisplayHost {
    type NodeId: Clone + Eq + Hash + fmt::Debug;

    /// Nodes currently in the graph with this declared type
    fn nodes_of_type(&self, node_type: &str) -> Vec<Self::NodeId>;

    /// Whether the node's display controls exist right now
    fn has_controls(&self, node: &Self::NodeId) -> bool;

    /// Attach display controls; may be called again after the host drops them
    fn create_controls(&mut self, node: &Self::NodeId);

    /// Redraw (and resize) a node from its state
    fn redraw(&mut self, node: &Self::NodeId, view: &NodeView<'_>);
}

/// Applies viewer events to a host's display nodes
pub struct Reconciler<H: DisplayHost> {
    host: H,
    node_type: String,
    layout: LayoutPolicy,
    nodes: HashMap<H::NodeId, ViewerNodeState>,
    connected: bool,
}

impl<H: DisplayHost> Reconciler<H> {
    pub fn new(host: H, config: &ViewerConfig) -> Self {
        Self {
            host,
            node_type: config.node_type.clone(),
            layout: config.layout,
            nodes: HashMap::new(),
            connected: false,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    pub fn node_state(&self, node: &H::NodeId) -> Option<&ViewerNodeState> {
        self.nodes.get(node)
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Handle one client event; returns the number of nodes redrawn
    pub fn handle(&mut self, event: ViewerEvent) -> usize {
        match event {
            ViewerEvent::Connected => {
                self.on_connected();
                0
            }
            ViewerEvent::Frame(envelope) => self.apply_frame(&envelope),
            ViewerEvent::Disconnected { .. } => self.on_disconnected(),
            ViewerEvent::Connecting { .. } | ViewerEvent::RetryScheduled { .. } => 0,
        }
    }

    /// Apply a frame to every matching node
    pub fn apply_frame(&mut self, envelope: &FrameEnvelope) -> usize {
        let targets = self.sync_nodes();
        let mut redrawn = 0;

        for node in targets {
            self.ensure_controls(&node);
            let state = self.nodes.entry(node.clone()).or_default();
            match state.apply(envelope, &self.layout) {
                ApplyOutcome::Applied => {
                    self.host.redraw(&node, &state.view());
                    redrawn += 1;
                }
                ApplyOutcome::Stale => {
                    tracing::debug!(
                        node = ?node,
                        sequence = envelope.sequence,
                        "Skipping stale frame"
                    );
                }
            }
        }

        tracing::debug!(
            sequence = envelope.sequence,
            kind = %envelope.kind,
            nodes = redrawn,
            "Frame applied"
        );
        redrawn
    }

    /// New connection: sequence numbering may have restarted
    pub fn on_connected(&mut self) {
        self.connected = true;
        for state in self.nodes.values_mut() {
            state.reset_sequence();
        }
    }

    /// Show the disconnected indicator on every node, keeping frames
    pub fn on_disconnected(&mut self) -> usize {
        self.connected = false;
        let targets = self.sync_nodes();
        for node in &targets {
            self.ensure_controls(node);
            let state = self.nodes.entry(node.clone()).or_default();
            state.mark_disconnected();
            self.host.redraw(node, &state.view());
        }
        targets.len()
    }

    /// Current matching nodes; forgets state of nodes that left the graph
    fn sync_nodes(&mut self) -> Vec<H::NodeId> {
        let targets = self.host.nodes_of_type(&self.node_type);
        self.nodes.retain(|id, _| targets.contains(id));
        targets
    }

    fn ensure_controls(&mut self, node: &H::NodeId) {
        if !self.host.has_controls(node) {
            tracing::debug!(node = ?node, "Creating display controls");
            self.host.create_controls(node);
        }
    }
}
