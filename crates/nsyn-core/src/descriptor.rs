//! Bit-packed per-edge descriptor
//!
//! Edge counts run into the billions, so the synapse type, the delay and two
//! flags share a single `u32`:
//!
//! ```text
//!  31        30          29 ........ 21   20 ................. 0
//! [disabled][more_targets][ synapse id  ][      delay steps     ]
//!     1          1             9 bits             21 bits
//! ```
//!
//! Accessors use explicit shifts and masks so the layout does not depend on
//! compiler bit-field rules.

use crate::{
    error::{ConnectionError, Result},
    ids::SynapseTypeId,
    time::Resolution,
};

const DELAY_BITS: u32 = 21;
const SYN_ID_BITS: u32 = 9;

const DELAY_SHIFT: u32 = 0;
const SYN_ID_SHIFT: u32 = DELAY_SHIFT + DELAY_BITS;
const MORE_TARGETS_BIT: u32 = 1 << (SYN_ID_SHIFT + SYN_ID_BITS);
const DISABLED_BIT: u32 = MORE_TARGETS_BIT << 1;

const DELAY_MASK: u32 = ((1 << DELAY_BITS) - 1) << DELAY_SHIFT;
const SYN_ID_MASK: u32 = ((1 << SYN_ID_BITS) - 1) << SYN_ID_SHIFT;

/// Largest delay in steps that fits the descriptor
pub const MAX_DELAY_STEPS: i64 = (1 << DELAY_BITS) - 1;

/// Synapse type, delay and flags of one edge packed into a machine word
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackedEdgeDescriptor(u32);

impl Default for PackedEdgeDescriptor {
    fn default() -> Self {
        Self::new(SynapseTypeId::from_bits(0))
    }
}

impl PackedEdgeDescriptor {
    /// Descriptor for the given synapse type with a one-step delay
    pub fn new(synapse_type: SynapseTypeId) -> Self {
        let mut d = Self(0);
        d.set_synapse_type_id(synapse_type);
        d.write_delay(1);
        d
    }

    /// Raw packed word
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Synapse type id
    pub fn synapse_type_id(&self) -> SynapseTypeId {
        SynapseTypeId::from_bits(((self.0 & SYN_ID_MASK) >> SYN_ID_SHIFT) as u16)
    }

    /// Set the synapse type id.
    ///
    /// Only the establishment path calls this, before the edge is attached to
    /// a connector.
    pub(crate) fn set_synapse_type_id(&mut self, id: SynapseTypeId) {
        self.0 = (self.0 & !SYN_ID_MASK) | (((id.raw() as u32) << SYN_ID_SHIFT) & SYN_ID_MASK);
    }

    /// Delay in simulation steps
    pub fn delay_steps(&self) -> i64 {
        ((self.0 & DELAY_MASK) >> DELAY_SHIFT) as i64
    }

    /// Set the delay in steps; rejects values outside `1..=MAX_DELAY_STEPS`
    pub fn set_delay_steps(&mut self, steps: i64) -> Result<()> {
        check_delay_steps(steps)?;
        self.write_delay(steps as u32);
        Ok(())
    }

    /// Delay in milliseconds under `resolution`
    pub fn delay_ms(&self, resolution: &Resolution) -> f64 {
        resolution.steps_to_ms(self.delay_steps())
    }

    /// Set the delay from milliseconds under `resolution`
    pub fn set_delay_ms(&mut self, ms: f64, resolution: &Resolution) -> Result<()> {
        if !ms.is_finite() || ms <= 0.0 {
            return Err(ConnectionError::configuration(format!(
                "delay must be positive, got {} ms",
                ms
            )));
        }
        self.set_delay_steps(resolution.ms_to_steps(ms))
    }

    /// Whether more edges of the same source follow this one
    pub fn has_more_targets(&self) -> bool {
        self.0 & MORE_TARGETS_BIT != 0
    }

    /// Set the more-targets flag
    pub fn set_has_more_targets(&mut self, more: bool) {
        if more {
            self.0 |= MORE_TARGETS_BIT;
        } else {
            self.0 &= !MORE_TARGETS_BIT;
        }
    }

    /// Whether the edge is disabled
    pub fn is_disabled(&self) -> bool {
        self.0 & DISABLED_BIT != 0
    }

    /// Disable the edge; disabled edges are skipped by delivery and dumps
    pub fn disable(&mut self) {
        self.0 |= DISABLED_BIT;
    }

    // Caller guarantees `steps` fits 21 bits.
    pub(crate) fn write_delay(&mut self, steps: u32) {
        self.0 = (self.0 & !DELAY_MASK) | ((steps << DELAY_SHIFT) & DELAY_MASK);
    }
}

/// Validate a delay in steps against the descriptor range
pub fn check_delay_steps(steps: i64) -> Result<()> {
    if steps < 1 {
        return Err(ConnectionError::configuration(format!(
            "delay must be at least one step, got {}",
            steps
        )));
    }
    if steps > MAX_DELAY_STEPS {
        return Err(ConnectionError::configuration(format!(
            "delay of {} steps exceeds the maximum of {} steps",
            steps, MAX_DELAY_STEPS
        )));
    }
    Ok(())
}

impl core::fmt::Debug for PackedEdgeDescriptor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PackedEdgeDescriptor")
            .field("synapse_type_id", &self.synapse_type_id())
            .field("delay_steps", &self.delay_steps())
            .field("more_targets", &self.has_more_targets())
            .field("disabled", &self.is_disabled())
            .finish()
    }
}
