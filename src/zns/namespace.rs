//! The zoned namespace aggregate
//!
//! [`Namespace`] owns the zone array, the per-state queues, the resource
//! counters and the descriptor extension buffer. Every state change funnels
//! through [`Namespace::apply`], which looks the change up in the transition
//! table, checks resource reservations, and commits state, queue membership,
//! counters and write pointer together.

use tracing::{debug, info};

use super::aor::{ResourceAccountant, ResourceCounters};
use super::geometry::ZoneGeometry;
use super::queue::{QueueKind, ZoneQueues};
use super::transition::{transition, Move, Transition, WpUpdate, ZoneEvent};
use super::zone::{Zone, ZoneState, ZA_ZD_EXT_VALID};
use crate::config::ZnsConfig;
use crate::error::{Error, Result};

/// What [`Namespace::apply`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The event was legal but changed nothing
    Unchanged,
    /// The zone moved between states
    Moved { from: ZoneState, to: ZoneState },
}

/// Zone state machine for one namespace.
#[derive(Debug, Clone)]
pub struct Namespace {
    geometry: ZoneGeometry,
    zones: Vec<Zone>,
    queues: ZoneQueues,
    aor: ResourceAccountant,
    extensions: Vec<u8>,
}

impl Namespace {
    /// Allocate the zone array for `geometry`. All zones start empty.
    pub fn new(geometry: ZoneGeometry) -> Self {
        let zones = (0..geometry.num_zones)
            .map(|i| Zone::new(i, geometry.zone_start(i), geometry.zone_capacity))
            .collect();
        let extensions =
            vec![0u8; geometry.zd_extension_size as usize * geometry.num_zones as usize];

        info!(
            "Initialized zoned namespace: {} zones, nsze={} blocks",
            geometry.num_zones,
            geometry.nsze()
        );

        Self {
            queues: ZoneQueues::new(geometry.num_zones),
            aor: ResourceAccountant::new(geometry.max_active_zones, geometry.max_open_zones),
            zones,
            extensions,
            geometry,
        }
    }

    /// Validate `config` and build the namespace.
    pub fn from_config(config: &ZnsConfig) -> Result<Self> {
        Ok(Self::new(ZoneGeometry::new(config)?))
    }

    pub fn geometry(&self) -> &ZoneGeometry {
        &self.geometry
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zone(&self, index: u32) -> Option<&Zone> {
        self.zones.get(index as usize)
    }

    /// Zone containing `lba`, if `lba` is inside the namespace.
    pub fn zone_by_lba(&self, lba: u64) -> Option<&Zone> {
        if lba >= self.geometry.nsze() {
            return None;
        }
        self.zone(self.geometry.zone_index(lba))
    }

    pub fn counters(&self) -> ResourceCounters {
        self.aor.counters()
    }

    pub fn queues(&self) -> &ZoneQueues {
        &self.queues
    }

    pub(crate) fn accountant(&self) -> &ResourceAccountant {
        &self.aor
    }

    /// Descriptor extension bytes of zone `index` (empty when disabled).
    pub fn extension(&self, index: u32) -> &[u8] {
        let size = self.geometry.zd_extension_size as usize;
        let start = index as usize * size;
        &self.extensions[start..start + size]
    }

    pub(crate) fn extension_mut(&mut self, index: u32) -> &mut [u8] {
        let size = self.geometry.zd_extension_size as usize;
        let start = index as usize * size;
        &mut self.extensions[start..start + size]
    }

    pub(crate) fn zone_at(&self, index: u32) -> Result<&Zone> {
        self.zone(index).ok_or_else(|| {
            Error::InvalidField(format!(
                "zone index {} out of range ({} zones)",
                index, self.geometry.num_zones
            ))
        })
    }

    /// Number of zones currently in `state`.
    pub fn count_in_state(&self, state: ZoneState) -> usize {
        match QueueKind::for_state(state) {
            Some(kind) => self.queues.len(kind),
            None => self.zones.iter().filter(|z| z.state == state).count(),
        }
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Look up the transition for `event` on zone `index` without changing
    /// anything. Fails with an invalid transition or a resource limit error.
    pub fn check(&self, index: u32, event: ZoneEvent) -> Result<Transition> {
        let state = self.zone_at(index)?.state;
        let t = transition(state, event).ok_or(Error::InvalidStateTransition {
            zone: index,
            state,
            event,
        })?;
        if let Transition::Move(m) = t {
            self.aor.check_delta(m.delta)?;
        }
        Ok(t)
    }

    /// Apply `event` to zone `index`.
    pub fn apply(&mut self, index: u32, event: ZoneEvent) -> Result<Applied> {
        let from = self.zone_at(index)?.state;
        match self.check(index, event)? {
            Transition::Stay => Ok(Applied::Unchanged),
            Transition::Move(m) => {
                self.commit(index, m);
                debug!("Zone {}: {} -> {} ({})", index, from, m.to, event);
                Ok(Applied::Moved { from, to: m.to })
            }
        }
    }

    fn commit(&mut self, index: u32, m: Move) {
        self.aor.apply(m.delta);

        let zone = &mut self.zones[index as usize];
        match m.wp {
            WpUpdate::Keep => {}
            WpUpdate::ToBoundary => zone.write_pointer = zone.write_boundary(),
            WpUpdate::ToStart => zone.write_pointer = zone.start_lba,
        }
        if m.mark_extension {
            zone.attributes |= ZA_ZD_EXT_VALID;
        }

        self.assign_state(index, m.to);
    }

    /// Move zone `index` into `state`, keeping queue membership in sync.
    fn assign_state(&mut self, index: u32, state: ZoneState) {
        self.queues.remove(index);

        let zone = &mut self.zones[index as usize];
        zone.state = state;
        if matches!(state, ZoneState::Empty | ZoneState::Offline) {
            zone.attributes = 0;
        }

        if let Some(kind) = QueueKind::for_state(state) {
            self.queues.push_back(kind, index);
        }
    }

    /// Make room for one more open zone.
    ///
    /// When the open limit is reached, the oldest implicitly open zone is
    /// closed. Explicitly opened zones are never evicted. Returns the index
    /// of the zone that was closed, if any.
    pub fn auto_transition(&mut self) -> Option<u32> {
        if !self.aor.open_saturated() {
            return None;
        }
        let victim = self.queues.front(QueueKind::ImplicitlyOpen)?;
        // Closing an implicitly open zone only releases resources
        self.apply(victim, ZoneEvent::Close).ok()?;
        debug!("Auto-closed implicitly open zone {} under open limit", victim);
        Some(victim)
    }

    // =========================================================================
    // Device Events
    // =========================================================================

    /// Media condition: force zone `index` read-only, releasing whatever
    /// resources it held.
    pub fn mark_read_only(&mut self, index: u32) -> Result<Applied> {
        let applied = self.apply(index, ZoneEvent::MediaReadOnly)?;
        if applied != Applied::Unchanged {
            info!("Zone {} transitioned to read-only", index);
        }
        Ok(applied)
    }

    /// Release every open zone before the namespace goes away.
    ///
    /// Zones holding data (or a valid descriptor extension) end up closed
    /// and keep their active reservation; untouched zones go back to empty.
    pub fn shutdown(&mut self) -> Result<()> {
        let queued = [
            QueueKind::Closed,
            QueueKind::ImplicitlyOpen,
            QueueKind::ExplicitlyOpen,
        ];
        for kind in queued {
            for index in self.queues.snapshot(kind) {
                let zone = &self.zones[index as usize];
                let untouched = zone.write_pointer == zone.start_lba && !zone.has_extension();
                let event = if untouched {
                    ZoneEvent::Reset
                } else {
                    ZoneEvent::Close
                };
                self.apply(index, event)?;
            }
        }
        debug_assert_eq!(self.aor.open(), 0);

        info!(
            "Namespace shut down: {} active zones retained",
            self.aor.active()
        );
        Ok(())
    }

    /// Move the write pointer of zone `index` forward by `nlb` blocks and
    /// return its previous value.
    pub(crate) fn advance_write_pointer(&mut self, index: u32, nlb: u64) -> u64 {
        let zone = &mut self.zones[index as usize];
        let previous = zone.write_pointer;
        zone.write_pointer += nlb;
        previous
    }
}
