//! Zone state transition table
//!
//! Every zone state change goes through [`transition`]: given the current
//! state and an event it yields the target state, the change in held
//! resources and the write pointer update. The table is the single place
//! that decides which transitions exist; callers check the reserving part of
//! the delta, then commit state, counters and pointer together.

use serde::{Deserialize, Serialize};

use super::aor::ResourceDelta;
use super::zone::ZoneState;

/// Something that can change a zone's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZoneEvent {
    /// Open zone management action
    ExplicitOpen,
    /// A write landed in an empty or closed zone
    ImplicitOpen,
    /// Close zone management action, or eviction under open pressure
    Close,
    /// A write advanced the write pointer to the capacity boundary
    Fill,
    /// Finish zone management action
    Finish,
    /// Reset zone management action
    Reset,
    /// Offline zone management action
    Offline,
    /// Set zone descriptor extension management action
    SetExtension,
    /// Media condition forced the zone read-only
    MediaReadOnly,
}

impl std::fmt::Display for ZoneEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ZoneEvent::ExplicitOpen => "Open",
            ZoneEvent::ImplicitOpen => "ImplicitOpen",
            ZoneEvent::Close => "Close",
            ZoneEvent::Fill => "Fill",
            ZoneEvent::Finish => "Finish",
            ZoneEvent::Reset => "Reset",
            ZoneEvent::Offline => "Offline",
            ZoneEvent::SetExtension => "SetZoneDescriptorExtension",
            ZoneEvent::MediaReadOnly => "MediaReadOnly",
        };
        f.write_str(name)
    }
}

/// Write pointer effect of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WpUpdate {
    Keep,
    ToBoundary,
    ToStart,
}

/// A committed state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub to: ZoneState,
    pub delta: ResourceDelta,
    pub wp: WpUpdate,
    pub mark_extension: bool,
}

impl Move {
    const fn to(to: ZoneState, active: i8, open: i8) -> Self {
        Self {
            to,
            delta: ResourceDelta::new(active, open),
            wp: WpUpdate::Keep,
            mark_extension: false,
        }
    }

    const fn with_wp(mut self, wp: WpUpdate) -> Self {
        self.wp = wp;
        self
    }
}

/// Result of looking up a legal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Legal, nothing changes
    Stay,
    /// Legal, the zone moves
    Move(Move),
}

/// Look up `(from, event)`. `None` means the event is not defined for the
/// state and must fail with an invalid transition.
pub fn transition(from: ZoneState, event: ZoneEvent) -> Option<Transition> {
    use Transition::Stay;
    use ZoneState::*;

    let step = |m: Move| Some(Transition::Move(m));

    match (event, from) {
        (ZoneEvent::ExplicitOpen, Empty) => step(Move::to(ExplicitlyOpen, 1, 1)),
        (ZoneEvent::ExplicitOpen, Closed) => step(Move::to(ExplicitlyOpen, 0, 1)),
        (ZoneEvent::ExplicitOpen, ImplicitlyOpen) => step(Move::to(ExplicitlyOpen, 0, 0)),
        (ZoneEvent::ExplicitOpen, ExplicitlyOpen) => Some(Stay),

        (ZoneEvent::ImplicitOpen, Empty) => step(Move::to(ImplicitlyOpen, 1, 1)),
        (ZoneEvent::ImplicitOpen, Closed) => step(Move::to(ImplicitlyOpen, 0, 1)),
        (ZoneEvent::ImplicitOpen, ImplicitlyOpen | ExplicitlyOpen) => Some(Stay),

        (ZoneEvent::Close, ImplicitlyOpen | ExplicitlyOpen) => step(Move::to(Closed, 0, -1)),
        (ZoneEvent::Close, Closed) => Some(Stay),

        (ZoneEvent::Fill, ImplicitlyOpen | ExplicitlyOpen) => step(Move::to(Full, -1, -1)),
        (ZoneEvent::Fill, Closed) => step(Move::to(Full, -1, 0)),
        (ZoneEvent::Fill, Empty) => step(Move::to(Full, 0, 0)),
        (ZoneEvent::Fill, Full) => Some(Stay),

        (ZoneEvent::Finish, ImplicitlyOpen | ExplicitlyOpen) => {
            step(Move::to(Full, -1, -1).with_wp(WpUpdate::ToBoundary))
        }
        (ZoneEvent::Finish, Closed) => step(Move::to(Full, -1, 0).with_wp(WpUpdate::ToBoundary)),
        (ZoneEvent::Finish, Empty) => step(Move::to(Full, 0, 0).with_wp(WpUpdate::ToBoundary)),
        (ZoneEvent::Finish, Full) => Some(Stay),

        (ZoneEvent::Reset, ImplicitlyOpen | ExplicitlyOpen) => {
            step(Move::to(Empty, -1, -1).with_wp(WpUpdate::ToStart))
        }
        (ZoneEvent::Reset, Closed) => step(Move::to(Empty, -1, 0).with_wp(WpUpdate::ToStart)),
        (ZoneEvent::Reset, Full) => step(Move::to(Empty, 0, 0).with_wp(WpUpdate::ToStart)),
        (ZoneEvent::Reset, Empty) => Some(Stay),

        (ZoneEvent::Offline, ReadOnly) => step(Move::to(Offline, 0, 0)),
        (ZoneEvent::Offline, Offline) => Some(Stay),

        (ZoneEvent::SetExtension, Empty) => step(Move {
            mark_extension: true,
            ..Move::to(Closed, 1, 0)
        }),

        (ZoneEvent::MediaReadOnly, ImplicitlyOpen | ExplicitlyOpen) => {
            step(Move::to(ReadOnly, -1, -1))
        }
        (ZoneEvent::MediaReadOnly, Closed) => step(Move::to(ReadOnly, -1, 0)),
        (ZoneEvent::MediaReadOnly, Empty | Full) => step(Move::to(ReadOnly, 0, 0)),
        (ZoneEvent::MediaReadOnly, ReadOnly) => Some(Stay),

        _ => None,
    }
}
