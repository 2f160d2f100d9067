//! Per-node display state and layout

use std::collections::BTreeMap;

use super::config::LayoutPolicy;
use super::envelope::FrameEnvelope;
use crate::frame::{probe, Dimensions, FrameMetadata, SlotName, SlotPayload};
use crate::hub::EventKind;

/// What the node's indicator shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// No frame received yet
    Waiting,
    Live,
    /// Connection lost; the last frame stays on screen
    Disconnected,
}

/// Result of applying an event to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// Sequence at or below the last one applied on this connection
    Stale,
}

/// Placement within a node, in node-local pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Computed node geometry
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeLayout {
    pub main: Option<Rect>,
    /// Auxiliary image slots in slot order
    pub aux: Vec<(SlotName, Rect)>,
    pub width: u32,
    pub height: u32,
}

impl NodeLayout {
    /// Lay out a slot set
    ///
    /// The main image's aspect ratio sets the main area height at a fixed
    /// width. Auxiliary images share one row of fixed squares below it,
    /// whatever their own proportions.
    pub fn compute(slots: &BTreeMap<SlotName, SlotPayload>, policy: &LayoutPolicy) -> Self {
        let main = slots.get(&SlotName::Main).map(|payload| {
            let height = match dimensions_of(payload) {
                Some(dims) if dims.width > 0 => {
                    let h = f64::from(policy.content_width) / dims.aspect_ratio();
                    (h.round() as u32).max(1)
                }
                // Non-image or unreadable main: a text panel
                _ => policy.aux_size,
            };
            Rect {
                x: 0,
                y: 0,
                width: policy.content_width,
                height,
            }
        });
        let main_height = main.map_or(0, |r| r.height);

        let row_y = if main.is_some() {
            main_height + policy.gap
        } else {
            0
        };
        let aux: Vec<(SlotName, Rect)> = slots
            .iter()
            .filter(|(name, payload)| name.is_auxiliary() && payload.is_image())
            .enumerate()
            .map(|(i, (name, _))| {
                let x = i as u32 * (policy.aux_size + policy.gap);
                (
                    *name,
                    Rect {
                        x,
                        y: row_y,
                        width: policy.aux_size,
                        height: policy.aux_size,
                    },
                )
            })
            .collect();

        let row_width = aux.last().map_or(0, |(_, r)| r.x + r.width);
        let height = if aux.is_empty() {
            main_height
        } else {
            row_y + policy.aux_size
        };

        Self {
            main,
            width: policy.content_width.max(row_width),
            height,
            aux,
        }
    }
}

fn dimensions_of(payload: &SlotPayload) -> Option<Dimensions> {
    if !payload.is_image() {
        return None;
    }
    payload
        .dimensions
        .or_else(|| probe(&payload.data).ok().map(|info| info.dimensions))
}

/// Borrowed snapshot handed to the host for drawing
#[derive(Debug, Clone, Copy)]
pub struct NodeView<'a> {
    pub status: NodeStatus,
    pub kind: Option<EventKind>,
    pub sequence: Option<u64>,
    pub slots: &'a BTreeMap<SlotName, SlotPayload>,
    pub metadata: &'a FrameMetadata,
    pub layout: &'a NodeLayout,
}

/// Display state of one node
#[derive(Debug, Clone)]
pub struct ViewerNodeState {
    status: NodeStatus,
    last_sequence: Option<u64>,
    kind: Option<EventKind>,
    slots: BTreeMap<SlotName, SlotPayload>,
    metadata: FrameMetadata,
    layout: NodeLayout,
    frames_applied: u64,
}

impl Default for ViewerNodeState {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewerNodeState {
    pub fn new() -> Self {
        Self {
            status: NodeStatus::Waiting,
            last_sequence: None,
            kind: None,
            slots: BTreeMap::new(),
            metadata: FrameMetadata::default(),
            layout: NodeLayout::default(),
            frames_applied: 0,
        }
    }

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    pub fn slot(&self, name: SlotName) -> Option<&SlotPayload> {
        self.slots.get(&name)
    }

    pub fn layout(&self) -> &NodeLayout {
        &self.layout
    }

    pub fn frames_applied(&self) -> u64 {
        self.frames_applied
    }

    /// Replace the slot buffers with an event's frame set
    ///
    /// Slots missing from the event are cleared.
    pub fn apply(&mut self, envelope: &FrameEnvelope, policy: &LayoutPolicy) -> ApplyOutcome {
        if let (Some(seq), Some(last)) = (envelope.sequence, self.last_sequence) {
            if seq <= last {
                return ApplyOutcome::Stale;
            }
        }
        if envelope.sequence.is_some() {
            self.last_sequence = envelope.sequence;
        }

        self.kind = Some(envelope.kind);
        self.slots = envelope.frame.slots.clone();
        self.metadata = envelope.frame.metadata.clone();
        self.layout = NodeLayout::compute(&self.slots, policy);
        self.status = NodeStatus::Live;
        self.frames_applied += 1;
        ApplyOutcome::Applied
    }

    /// Keep the last frame but show the disconnected indicator
    pub fn mark_disconnected(&mut self) {
        self.status = NodeStatus::Disconnected;
    }

    /// A new connection restarts the server's numbering
    pub fn reset_sequence(&mut self) {
        self.last_sequence = None;
    }

    pub fn view(&self) -> NodeView<'_> {
        NodeView {
            status: self.status,
            kind: self.kind,
            sequence: self.last_sequence,
            slots: &self.slots,
            metadata: &self.metadata,
            layout: &self.layout,
        }
    }
}
