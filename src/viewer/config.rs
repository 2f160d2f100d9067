//! Viewer configuration

use std::time::Duration;

/// Node type the bundled listener node registers under
pub const DEFAULT_NODE_TYPE: &str = "A3DListener";

/// Delays between reconnection attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Wait after the first failure of a healthy connection
    pub initial_delay: Duration,
    /// Wait after an attempt that failed right after a retry
    pub repeat_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(3),
            repeat_delay: Duration::from_secs(10),
        }
    }
}

/// Display-node sizing rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutPolicy {
    /// Width of the main slot area; its height follows the aspect ratio
    pub content_width: u32,
    /// Edge length of each auxiliary thumbnail
    pub aux_size: u32,
    /// Spacing between the main area and the thumbnail row
    pub gap: u32,
}

impl Default for LayoutPolicy {
    fn default() -> Self {
        Self {
            content_width: 512,
            aux_size: 128,
            gap: 4,
        }
    }
}

/// Viewer client configuration
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Event-stream URL
    pub events_url: String,

    /// Declared node type receiving frames
    pub node_type: String,

    pub reconnect: ReconnectPolicy,

    pub layout: LayoutPolicy,

    /// Capacity of the client → host event channel
    pub event_buffer: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            events_url: "http://127.0.0.1:8199/events".into(),
            node_type: DEFAULT_NODE_TYPE.into(),
            reconnect: ReconnectPolicy::default(),
            layout: LayoutPolicy::default(),
            event_buffer: 256,
        }
    }
}

impl ViewerConfig {
    /// Create a config for an events URL
    pub fn new(events_url: impl Into<String>) -> Self {
        Self {
            events_url: events_url.into(),
            ..Default::default()
        }
    }

    /// Set the node type to feed
    pub fn node_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = node_type.into();
        self
    }

    /// Set reconnection delays
    pub fn reconnect_delays(mut self, initial: Duration, repeat: Duration) -> Self {
        self.reconnect = ReconnectPolicy {
            initial_delay: initial,
            repeat_delay: repeat,
        };
        self
    }

    pub fn layout(mut self, layout: LayoutPolicy) -> Self {
        self.layout = layout;
        self
    }

    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }
}
