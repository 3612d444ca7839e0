//! Zone Management Send
//!
//! Single-zone actions resolve the target zone from its start LBA and apply
//! one state change. Bulk actions ("select all") walk the state queues the
//! action can affect, in a fixed order:
//!
//! ```text
//!   closed queue ─▶ implicitly open ─▶ explicitly open ─▶ full queue ─▶ read-only scan
//!   (CLOSED)        (OPENED)            (OPENED)           (FULL)        (READ_ONLY)
//! ```
//!
//! Each queue is snapshotted before it is walked because the action moves
//! zones between queues. A zone's state is re-checked when its turn comes and
//! the walk stops at the first failure.

use bitflags::bitflags;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::namespace::{Applied, Namespace};
use super::queue::QueueKind;
use super::transition::ZoneEvent;
use super::zone::ZoneState;
use crate::error::{Error, Result};

/// Zone management send action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneAction {
    Open,
    Close,
    Finish,
    Reset,
    Offline,
    SetExtension,
}

impl std::fmt::Display for ZoneAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ZoneAction::Open => write!(f, "open"),
            ZoneAction::Close => write!(f, "close"),
            ZoneAction::Finish => write!(f, "finish"),
            ZoneAction::Reset => write!(f, "reset"),
            ZoneAction::Offline => write!(f, "offline"),
            ZoneAction::SetExtension => write!(f, "set_extension"),
        }
    }
}

impl ZoneAction {
    /// State machine event the action drives.
    pub fn event(&self) -> ZoneEvent {
        match self {
            ZoneAction::Open => ZoneEvent::ExplicitOpen,
            ZoneAction::Close => ZoneEvent::Close,
            ZoneAction::Finish => ZoneEvent::Finish,
            ZoneAction::Reset => ZoneEvent::Reset,
            ZoneAction::Offline => ZoneEvent::Offline,
            ZoneAction::SetExtension => ZoneEvent::SetExtension,
        }
    }

    /// States a bulk form of the action visits.
    pub fn bulk_mask(&self) -> ProcessingMask {
        match self {
            ZoneAction::Open => ProcessingMask::CLOSED,
            ZoneAction::Close => ProcessingMask::OPENED,
            ZoneAction::Finish => ProcessingMask::OPENED | ProcessingMask::CLOSED,
            ZoneAction::Reset => {
                ProcessingMask::OPENED | ProcessingMask::CLOSED | ProcessingMask::FULL
            }
            ZoneAction::Offline => ProcessingMask::READ_ONLY,
            ZoneAction::SetExtension => ProcessingMask::empty(),
        }
    }
}

bitflags! {
    /// State classes selected by a bulk action.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ProcessingMask: u8 {
        const OPENED = 1 << 0;
        const CLOSED = 1 << 1;
        const READ_ONLY = 1 << 2;
        const FULL = 1 << 3;
    }
}

impl ProcessingMask {
    /// State class a zone in `state` falls in.
    pub fn for_state(state: ZoneState) -> Self {
        match state {
            ZoneState::ImplicitlyOpen | ZoneState::ExplicitlyOpen => Self::OPENED,
            ZoneState::Closed => Self::CLOSED,
            ZoneState::Full => Self::FULL,
            ZoneState::ReadOnly => Self::READ_ONLY,
            ZoneState::Empty | ZoneState::Offline => Self::empty(),
        }
    }
}

/// Which zones a management command addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneTarget {
    /// The zone starting at this LBA
    Zone(u64),
    /// Every zone the action applies to
    All,
}

/// A zone management send command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneMgmtSend {
    pub action: ZoneAction,
    pub target: ZoneTarget,
    /// Descriptor extension payload for [`ZoneAction::SetExtension`]
    pub extension: Option<Bytes>,
}

impl ZoneMgmtSend {
    pub fn new(action: ZoneAction, target: ZoneTarget) -> Self {
        Self {
            action,
            target,
            extension: None,
        }
    }

    pub fn set_extension(slba: u64, payload: impl Into<Bytes>) -> Self {
        Self {
            action: ZoneAction::SetExtension,
            target: ZoneTarget::Zone(slba),
            extension: Some(payload.into()),
        }
    }
}

/// How a single-zone operation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpStatus {
    /// Done synchronously
    Complete,
    /// State changed, media work (the erase) still owed
    Deferred,
}

/// Summary of a management command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MgmtOutcome {
    /// Zones the action was applied to
    pub processed: u32,
    /// Zones whose reset owes an erase
    pub deferred: u32,
}

impl Namespace {
    /// Execute a zone management send command.
    ///
    /// `on_reset` is called with the index of every zone a reset actually
    /// emptied, so the caller can charge the erase.
    pub fn zone_mgmt_send<F>(&mut self, cmd: &ZoneMgmtSend, mut on_reset: F) -> Result<MgmtOutcome>
    where
        F: FnMut(u32),
    {
        let target = match cmd.target {
            ZoneTarget::Zone(slba) => Some(self.target_zone(slba)?),
            ZoneTarget::All => None,
        };

        let mut outcome = MgmtOutcome::default();

        if cmd.action == ZoneAction::SetExtension {
            let index = target.ok_or_else(|| {
                Error::InvalidField("set zone descriptor extension cannot select all zones".into())
            })?;
            self.set_extension(index, cmd.extension.as_deref().unwrap_or_default())?;
            outcome.processed = 1;
            return Ok(outcome);
        }

        match target {
            Some(index) => {
                self.zone_op(index, cmd.action, &mut outcome, &mut on_reset)?;
            }
            None => self.bulk_op(cmd.action, &mut outcome, &mut on_reset)?,
        }

        info!(
            "Zone management {} ({}): {} zones processed",
            cmd.action,
            if target.is_some() { "single" } else { "all" },
            outcome.processed
        );
        Ok(outcome)
    }

    /// Resolve the zone a management command addresses by its start LBA.
    fn target_zone(&self, slba: u64) -> Result<u32> {
        let nsze = self.geometry().nsze();
        if slba >= nsze {
            return Err(Error::LbaRange { slba, nlb: 0, nsze });
        }
        let index = self.geometry().zone_index(slba);
        if self.geometry().zone_start(index) != slba {
            return Err(Error::InvalidField(format!(
                "slba {} is not a zone start LBA",
                slba
            )));
        }
        Ok(index)
    }

    fn zone_op<F>(
        &mut self,
        index: u32,
        action: ZoneAction,
        outcome: &mut MgmtOutcome,
        on_reset: &mut F,
    ) -> Result<OpStatus>
    where
        F: FnMut(u32),
    {
        let applied = self.apply(index, action.event())?;
        outcome.processed += 1;

        let status = match (action, applied) {
            (ZoneAction::Reset, Applied::Moved { .. }) => {
                on_reset(index);
                outcome.deferred += 1;
                OpStatus::Deferred
            }
            _ => OpStatus::Complete,
        };
        Ok(status)
    }

    fn bulk_op<F>(
        &mut self,
        action: ZoneAction,
        outcome: &mut MgmtOutcome,
        on_reset: &mut F,
    ) -> Result<()>
    where
        F: FnMut(u32),
    {
        let mask = action.bulk_mask();
        let mut walk = Vec::new();

        if mask.contains(ProcessingMask::CLOSED) {
            walk.push(QueueKind::Closed);
        }
        if mask.contains(ProcessingMask::OPENED) {
            walk.push(QueueKind::ImplicitlyOpen);
            walk.push(QueueKind::ExplicitlyOpen);
        }
        if mask.contains(ProcessingMask::FULL) {
            walk.push(QueueKind::Full);
        }

        for kind in walk {
            for index in self.queues().snapshot(kind) {
                self.bulk_zone_op(index, mask, action, outcome, on_reset)?;
            }
        }

        if mask.contains(ProcessingMask::READ_ONLY) {
            for index in 0..self.geometry().num_zones {
                self.bulk_zone_op(index, mask, action, outcome, on_reset)?;
            }
        }
        Ok(())
    }

    fn bulk_zone_op<F>(
        &mut self,
        index: u32,
        mask: ProcessingMask,
        action: ZoneAction,
        outcome: &mut MgmtOutcome,
        on_reset: &mut F,
    ) -> Result<()>
    where
        F: FnMut(u32),
    {
        let state = self.zone_at(index)?.state;
        if !ProcessingMask::for_state(state).intersects(mask) {
            return Ok(());
        }
        self.zone_op(index, action, outcome, on_reset)?;
        debug!("Bulk {}: zone {} processed", action, index);
        Ok(())
    }

    /// Attach a descriptor extension to an empty zone, moving it to closed.
    fn set_extension(&mut self, index: u32, payload: &[u8]) -> Result<()> {
        let size = self.geometry().zd_extension_size as usize;
        if size == 0 {
            return Err(Error::InvalidField(
                "zone descriptor extensions are not enabled".into(),
            ));
        }
        if payload.len() != size {
            return Err(Error::InvalidField(format!(
                "zone descriptor extension payload is {}B, expected {}B",
                payload.len(),
                size
            )));
        }

        self.check(index, ZoneEvent::SetExtension)?;
        self.extension_mut(index).copy_from_slice(payload);
        self.apply(index, ZoneEvent::SetExtension)?;
        Ok(())
    }
}
