//! Active and Open Resources accounting
//!
//! Counts how many zones hold an active or open resource and enforces the
//! namespace limits. Counts only change through [`ResourceDelta`]s applied
//! together with a committed state transition.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Change in held resources caused by one zone transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceDelta {
    pub active: i8,
    pub open: i8,
}

impl ResourceDelta {
    pub const NONE: Self = Self::new(0, 0);

    pub const fn new(active: i8, open: i8) -> Self {
        Self { active, open }
    }

    /// Portion of the delta that takes new resources.
    pub fn reservations(&self) -> (u32, u32) {
        (self.active.max(0) as u32, self.open.max(0) as u32)
    }
}

/// Current resource counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceCounters {
    pub active: u32,
    pub open: u32,
}

/// Enforces `active <= max_active` and `open <= max_open` (0 = unbounded).
#[derive(Debug, Clone)]
pub struct ResourceAccountant {
    max_active: u32,
    max_open: u32,
    counters: ResourceCounters,
}

impl ResourceAccountant {
    pub fn new(max_active: u32, max_open: u32) -> Self {
        Self {
            max_active,
            max_open,
            counters: ResourceCounters::default(),
        }
    }

    pub fn counters(&self) -> ResourceCounters {
        self.counters
    }

    pub fn active(&self) -> u32 {
        self.counters.active
    }

    pub fn open(&self) -> u32 {
        self.counters.open
    }

    pub fn max_open(&self) -> u32 {
        self.max_open
    }

    pub fn max_active(&self) -> u32 {
        self.max_active
    }

    /// Check whether `act` more active and `opn` more open zones fit.
    pub fn check(&self, act: u32, opn: u32) -> Result<()> {
        if self.max_active != 0 && self.counters.active + act > self.max_active {
            return Err(Error::TooManyActiveZones {
                limit: self.max_active,
            });
        }
        if self.max_open != 0 && self.counters.open + opn > self.max_open {
            return Err(Error::TooManyOpenZones {
                limit: self.max_open,
            });
        }
        Ok(())
    }

    /// Check the reserving part of `delta`.
    pub fn check_delta(&self, delta: ResourceDelta) -> Result<()> {
        let (act, opn) = delta.reservations();
        self.check(act, opn)
    }

    /// Whether the open limit is capped and reached.
    pub fn open_saturated(&self) -> bool {
        self.max_open != 0 && self.counters.open == self.max_open
    }

    /// Commit a delta. Only called alongside a committed state change.
    pub(crate) fn apply(&mut self, delta: ResourceDelta) {
        self.counters.active = shift(self.counters.active, delta.active);
        self.counters.open = shift(self.counters.open, delta.open);
        debug_assert!(self.max_active == 0 || self.counters.active <= self.max_active);
        debug_assert!(self.max_open == 0 || self.counters.open <= self.max_open);
    }
}

fn shift(count: u32, by: i8) -> u32 {
    if by >= 0 {
        count + by as u32
    } else {
        debug_assert!(count >= by.unsigned_abs() as u32, "resource count underflow");
        count.saturating_sub(by.unsigned_abs() as u32)
    }
}
