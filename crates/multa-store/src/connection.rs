//! Primary-node connection state.

use std::fmt;

/// Connection to the primary node.
///
/// `Connected` is not sticky: every explicit probe re-checks the node and
/// may land in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No probe attempted yet
    #[default]
    Uninitialized,
    /// Probe in flight
    Connecting,
    /// Last probe succeeded
    Connected {
        /// Version string reported by the node
        version: String,
    },
    /// Last probe failed
    Failed {
        /// Probe error
        reason: String,
    },
}

impl ConnectionState {
    /// Whether the last probe succeeded.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("uninitialized"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected { version } => write!(f, "connected ({version})"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}
