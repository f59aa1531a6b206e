//! Identifier types shared by the connection framework

use crate::error::{ConnectionError, Result};
use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Receptor port on a target unit
pub type Port = u32;

/// Globally stable identifier of a simulated unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeId(pub u64);

impl NodeId {
    /// Create a new node ID
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// Invalid node ID constant
    pub const INVALID: Self = Self(u64::MAX);

    /// Check if this is a valid node ID
    pub const fn is_valid(&self) -> bool {
        self.0 != u64::MAX
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a worker thread.
///
/// Narrow on purpose: checkpoint records store it in a single byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ThreadId(pub u8);

impl ThreadId {
    /// Create a new thread ID
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub const fn raw(&self) -> u8 {
        self.0
    }

    /// Index into per-thread vectors
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a unit in its thread's storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocalSlot(pub u32);

impl LocalSlot {
    /// Create a new slot
    pub const fn new(slot: u32) -> Self {
        Self(slot)
    }

    /// Get the raw slot value
    pub const fn raw(&self) -> u32 {
        self.0
    }
}

/// Synapse model identifier, limited to the 9 bits of the packed descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SynapseTypeId(u16);

impl SynapseTypeId {
    /// Largest representable synapse type id
    pub const MAX: u16 = (1 << 9) - 1;

    /// Create a synapse type id, rejecting values that do not fit 9 bits
    pub fn new(id: u16) -> Result<Self> {
        if id > Self::MAX {
            return Err(ConnectionError::configuration(format!(
                "synapse type id {} exceeds maximum {}",
                id,
                Self::MAX
            )));
        }
        Ok(Self(id))
    }

    pub(crate) const fn from_bits(bits: u16) -> Self {
        Self(bits & Self::MAX)
    }

    /// Get the raw ID value
    pub const fn raw(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for SynapseTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Thread-local address of a unit: which thread owns it and where
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeAddress {
    /// Owning thread
    pub thread: ThreadId,
    /// Slot in the owning thread's storage
    pub slot: LocalSlot,
}

impl NodeAddress {
    /// Create a new address
    pub const fn new(thread: ThreadId, slot: LocalSlot) -> Self {
        Self { thread, slot }
    }
}
