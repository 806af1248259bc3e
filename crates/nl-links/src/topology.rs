//! Run-time topology changes: user port commands and jumper plugs.

use tracing::{info, warn};

/// Where a commanded port should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum PortTarget {
    /// A regular node index.
    Node(usize),
    /// The network's ground node.
    Ground,
    /// The node the port was given at initialization.
    Default,
}

/// A one-shot request to move a link port, serviced at the start of the
/// link's next major step.
///
/// After any execution attempt, successful or not, the command resets to
/// empty. A command with `execute == false` stays pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct UserPortCommand {
    pub port: Option<usize>,
    pub target: Option<PortTarget>,
    pub execute: bool,
}

impl UserPortCommand {
    /// A complete command ready for execution.
    pub fn new(port: usize, target: PortTarget) -> Self {
        Self {
            port: Some(port),
            target: Some(target),
            execute: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.port.is_none() && self.target.is_none() && !self.execute
    }
}

/// A connector attached to one jumper port.
///
/// The plug reports the node the port should attach to, or `None` when it is
/// in its no-connection state. Requests are queued and applied by
/// [`Plug::update`], which the jumper calls once per major step.
pub trait Plug: std::fmt::Debug {
    fn name(&self) -> &str;

    /// Service pending requests and return the active node.
    fn update(&mut self) -> Option<usize>;

    /// Currently active node without servicing requests.
    fn active_node(&self) -> Option<usize>;

    /// Queue a connection to the socket at `index` in the plug's socket list.
    fn request_connection(&mut self, index: usize);

    /// Queue a disconnection.
    fn request_disconnection(&mut self);
}

/// A plug that can connect to any one of a fixed list of socket nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct SocketPlug {
    name: String,
    sockets: Vec<usize>,
    active: Option<usize>,
    connect_request: Option<usize>,
    disconnect_request: bool,
}

impl SocketPlug {
    /// Create a plug over `sockets` (node indices), initially connected to
    /// the socket at `initial` if given and valid.
    pub fn new(name: impl Into<String>, sockets: Vec<usize>, initial: Option<usize>) -> Self {
        let name = name.into();
        let active = initial.filter(|&i| i < sockets.len());
        if initial.is_some() && active.is_none() {
            warn!(plug = %name, ?initial, "initial socket out of range, starting disconnected");
        }
        Self {
            name,
            sockets,
            active,
            connect_request: None,
            disconnect_request: false,
        }
    }

    pub fn sockets(&self) -> &[usize] {
        &self.sockets
    }

    /// Index of the active socket within the socket list.
    pub fn active_socket(&self) -> Option<usize> {
        self.active
    }
}

impl Plug for SocketPlug {
    fn name(&self) -> &str {
        &self.name
    }

    fn update(&mut self) -> Option<usize> {
        if std::mem::take(&mut self.disconnect_request) && self.active.is_some() {
            info!(plug = %self.name, "plug disconnected");
            self.active = None;
        }
        if let Some(index) = self.connect_request.take() {
            if index < self.sockets.len() {
                if self.active != Some(index) {
                    info!(plug = %self.name, node = self.sockets[index], "plug connected");
                }
                self.active = Some(index);
            } else {
                warn!(plug = %self.name, index, "connection request to unknown socket ignored");
            }
        }
        self.active_node()
    }

    fn active_node(&self) -> Option<usize> {
        self.active.map(|i| self.sockets[i])
    }

    fn request_connection(&mut self, index: usize) {
        self.connect_request = Some(index);
    }

    fn request_disconnection(&mut self) {
        self.disconnect_request = true;
    }
}
