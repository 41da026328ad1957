//! Shared-resource channels targeted by the contention load.

use serde::{Deserialize, Serialize};

use crate::InitialParams;

/// A shared hardware or system resource the load generator contends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// CPU caches
    Cache,
    /// Sockets and the network stack
    Network,
    /// DRAM row buffers
    RowBuffer,
    /// Memory bandwidth
    Memory,
    /// Block device reads and writes
    DiskIo,
    /// Translation lookaside buffer
    Tlb,
}

impl Channel {
    /// Every channel, in the order tune-all mode visits them.
    pub const ALL: [Channel; 6] = [
        Channel::Cache,
        Channel::Network,
        Channel::RowBuffer,
        Channel::Memory,
        Channel::DiskIo,
        Channel::Tlb,
    ];

    /// Name understood by the load generator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Cache => "cache",
            Channel::Network => "network",
            Channel::RowBuffer => "row_buffer",
            Channel::Memory => "memory",
            Channel::DiskIo => "disk_io",
            Channel::Tlb => "tlb",
        }
    }

    /// Hardware event that characterises contention on this channel.
    ///
    /// Channels without a dedicated counter fall back to `cycles`.
    pub fn secondary_metric(&self) -> &'static str {
        match self {
            Channel::Cache => "cache-misses",
            Channel::RowBuffer | Channel::Memory => "bus-cycles",
            Channel::Network | Channel::DiskIo | Channel::Tlb => "cycles",
        }
    }

    /// Starting point for a search on this channel.
    pub fn default_initial_params(&self) -> InitialParams {
        let raw = match self {
            Channel::Cache => [1, 500, -1, -1],
            Channel::Network => [5000, -1, -1, -1],
            Channel::RowBuffer => [1, 10, 0, -1],
            Channel::Memory => [1, 10, 0, -1],
            Channel::DiskIo => [50, 50000, 1, 1],
            Channel::Tlb => [40, -1, -1, -1],
        };
        InitialParams::from_raw(raw)
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a channel name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown channel '{0}' (expected one of cache, network, row_buffer, memory, disk_io, tlb)")]
pub struct ParseChannelError(pub String);

impl std::str::FromStr for Channel {
    type Err = ParseChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Channel::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == lower)
            .ok_or(ParseChannelError(s.to_string()))
    }
}
