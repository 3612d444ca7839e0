//! Property-Based Tests for the Zone State Machine
//!
//! Drives a namespace with random sequences of writes, appends and
//! management commands and checks the bookkeeping after every step.
//!
//! # Test Properties
//!
//! 1. **Counter Agreement**: active/open counters equal the number of zones
//!    in resource-holding states, and never exceed the limits
//! 2. **Queue Agreement**: a zone sits on exactly the queue of its state
//! 3. **Write Pointer Bounds**: the pointer stays within the zone, sits at
//!    the start of empty zones and at the boundary of full ones
//! 4. **Failure Atomicity**: a rejected command leaves the namespace as it was

#![cfg(test)]

use proptest::prelude::*;

use super::mgmt::{ZoneAction, ZoneMgmtSend, ZoneTarget};
use super::namespace::Namespace;
use super::queue::QueueKind;
use super::test_support::namespace_with;
use super::zone::ZoneState;

const NUM_ZONES: u64 = 6;
const ZONE_BLOCKS: u64 = 16;
const CAPACITY_BLOCKS: u64 = 12;

#[derive(Debug, Clone)]
enum Op {
    Write { zone: u32, nlb: u64 },
    Append { zone: u32, nlb: u64 },
    Mgmt { action: ZoneAction, zone: Option<u32> },
    MediaReadOnly { zone: u32 },
}

// =============================================================================
// Property Strategies
// =============================================================================

fn action_strategy() -> impl Strategy<Value = ZoneAction> {
    prop_oneof![
        Just(ZoneAction::Open),
        Just(ZoneAction::Close),
        Just(ZoneAction::Finish),
        Just(ZoneAction::Reset),
        Just(ZoneAction::Offline),
    ]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let zone = 0..NUM_ZONES as u32;
    prop_oneof![
        4 => (zone.clone(), 1..6u64).prop_map(|(zone, nlb)| Op::Write { zone, nlb }),
        2 => (zone.clone(), 1..6u64).prop_map(|(zone, nlb)| Op::Append { zone, nlb }),
        3 => (action_strategy(), prop::option::weighted(0.8, zone.clone()))
            .prop_map(|(action, zone)| Op::Mgmt { action, zone }),
        1 => zone.prop_map(|zone| Op::MediaReadOnly { zone }),
    ]
}

fn limits_strategy() -> impl Strategy<Value = (u32, u32)> {
    (0..=NUM_ZONES as u32).prop_flat_map(|active| {
        let max_open = if active == 0 { NUM_ZONES as u32 } else { active };
        (Just(active), 0..=max_open)
    })
}

// =============================================================================
// Helpers
// =============================================================================

fn run(ns: &mut Namespace, op: &Op) -> bool {
    let start = |zone: u32| u64::from(zone) * ZONE_BLOCKS;
    let result = match *op {
        Op::Write { zone, nlb } => {
            let slba = ns.zone(zone).map(|z| z.write_pointer).unwrap_or(0);
            ns.prepare_write(slba, nlb, false)
                .and_then(|w| ns.commit_write(&w))
                .map(|_| ())
        }
        Op::Append { zone, nlb } => ns
            .prepare_write(start(zone), nlb, true)
            .and_then(|w| ns.commit_write(&w))
            .map(|_| ()),
        Op::Mgmt { action, zone } => {
            let target = zone.map_or(ZoneTarget::All, |z| ZoneTarget::Zone(start(z)));
            ns.zone_mgmt_send(&ZoneMgmtSend::new(action, target), |_| {})
                .map(|_| ())
        }
        Op::MediaReadOnly { zone } => ns.mark_read_only(zone).map(|_| ()),
    };
    result.is_ok()
}

fn check_invariants(ns: &Namespace) -> Result<(), TestCaseError> {
    let geo = ns.geometry();
    let counters = ns.counters();

    let active = ns.zones().iter().filter(|z| z.state.is_active()).count() as u32;
    let open = ns.zones().iter().filter(|z| z.state.is_open()).count() as u32;
    prop_assert_eq!(counters.active, active);
    prop_assert_eq!(counters.open, open);
    prop_assert!(counters.open <= counters.active);
    if geo.max_active_zones != 0 {
        prop_assert!(counters.active <= geo.max_active_zones);
    }
    if geo.max_open_zones != 0 {
        prop_assert!(counters.open <= geo.max_open_zones);
    }

    for zone in ns.zones() {
        prop_assert_eq!(
            ns.queues().queue_of(zone.index),
            QueueKind::for_state(zone.state),
            "zone {} in state {}",
            zone.index,
            zone.state
        );
        prop_assert!(zone.write_pointer >= zone.start_lba);
        prop_assert!(zone.write_pointer <= zone.write_boundary());
        match zone.state {
            ZoneState::Empty => prop_assert_eq!(zone.write_pointer, zone.start_lba),
            ZoneState::Full => prop_assert_eq!(zone.write_pointer, zone.write_boundary()),
            _ => {}
        }
    }

    let queued: usize = [
        QueueKind::ImplicitlyOpen,
        QueueKind::ExplicitlyOpen,
        QueueKind::Closed,
        QueueKind::Full,
    ]
    .iter()
    .map(|&k| ns.queues().iter(k).count())
    .sum();
    let expected = ns
        .zones()
        .iter()
        .filter(|z| QueueKind::for_state(z.state).is_some())
        .count();
    prop_assert_eq!(queued, expected);

    Ok(())
}

// =============================================================================
// State Machine Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: bookkeeping stays consistent under any command sequence.
    #[test]
    fn prop_bookkeeping_consistent(
        (max_active, max_open) in limits_strategy(),
        ops in prop::collection::vec(op_strategy(), 1..80),
    ) {
        let mut ns = namespace_with(NUM_ZONES, ZONE_BLOCKS, CAPACITY_BLOCKS, max_active, max_open);
        for op in &ops {
            run(&mut ns, op);
            check_invariants(&ns)?;
        }
    }

    /// Property: a rejected single-zone command or write changes nothing.
    #[test]
    fn prop_failed_commands_are_atomic(
        (max_active, max_open) in limits_strategy(),
        ops in prop::collection::vec(op_strategy(), 1..60),
    ) {
        let mut ns = namespace_with(NUM_ZONES, ZONE_BLOCKS, CAPACITY_BLOCKS, max_active, max_open);
        for op in &ops {
            let bulk = matches!(op, Op::Mgmt { zone: None, .. });
            let before = ns.clone();
            let ok = run(&mut ns, op);
            if !ok && !bulk && !matches!(op, Op::Write { .. } | Op::Append { .. }) {
                prop_assert_eq!(ns.zones(), before.zones());
                prop_assert_eq!(ns.counters(), before.counters());
            }
        }
    }

    /// Property: appends hand out contiguous, non-overlapping ranges.
    #[test]
    fn prop_appends_are_contiguous(sizes in prop::collection::vec(1..4u64, 1..12)) {
        let mut ns = namespace_with(NUM_ZONES, ZONE_BLOCKS, CAPACITY_BLOCKS, 0, 0);
        let mut expected = 0u64;
        for nlb in sizes {
            let result = ns.prepare_write(0, nlb, true).and_then(|w| ns.commit_write(&w));
            match result {
                Ok(commit) => {
                    prop_assert_eq!(commit.slba, expected);
                    expected += nlb;
                }
                Err(_) => prop_assert!(expected + nlb > CAPACITY_BLOCKS),
            }
        }
        prop_assert!(expected <= CAPACITY_BLOCKS);
    }
}
