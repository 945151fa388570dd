//! # Room Allocation Engine
//!
//! Turns a room selection into the ordered list of passenger slots the
//! wizard renders, carrying already-entered passenger data across edits.
//!
//! ## Synchronization
//! ```text
//! RoomSelection [(double, 1), (sharing, 1)]   no-bed: 1 child, 0 infant
//!        │
//!        ▼
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │ id │ type   │ room                     │ data from previous slots    │
//! │────┼────────┼──────────────────────────┼─────────────────────────────│
//! │  1 │ adult  │ double  room 1 seat 1    │ matched on (double,1,1)     │
//! │  2 │ adult  │ double  room 1 seat 2    │ matched on (double,1,2)     │
//! │  3 │ adult  │ sharing room 1 seat 1    │ matched on (sharing,1,1)    │
//! │  4 │ child  │ —                        │ 1st previous no-bed child   │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Synchronization never fails: a quantity of zero simply drops that room
//! type's slots, and their data is gone from the new list (it can come back
//! only if the caller still holds the older list).

use std::collections::HashMap;

use crate::types::{PassengerSlot, PassengerType, RoomSeat, RoomSelection, RoomType};

/// Rebuilds passenger slots for a room selection.
///
/// * Room-bound slots are generated per room type in selection order,
///   `room_index` 1..=quantity, `seat_index` 1..=capacity.
/// * A slot whose `(room_type, room_index, seat_index)` existed in
///   `previous` keeps that slot's passenger type and identity; new slots
///   default to Adult.
/// * No-bed children then no-bed infants are appended without a room, each
///   keeping the data of the previous room-less slot of the same type at the
///   same position.
/// * `id` is renumbered 1..=n.
///
/// ```rust
/// use safar_core::allocation::synchronize;
/// use safar_core::types::{RoomSelection, RoomType};
///
/// let selection = RoomSelection::new().with(RoomType::Triple, 2);
/// let slots = synchronize(&selection, 1, 0, &[]);
/// assert_eq!(slots.len(), 7);
/// assert_eq!(slots.last().unwrap().room, None);
/// ```
pub fn synchronize(
    selection: &RoomSelection,
    no_bed_children: u32,
    no_bed_infants: u32,
    previous: &[PassengerSlot],
) -> Vec<PassengerSlot> {
    let by_seat: HashMap<RoomSeat, &PassengerSlot> = previous
        .iter()
        .filter_map(|slot| slot.room.map(|seat| (seat, slot)))
        .collect();

    let mut slots = Vec::with_capacity((selection.total_beds() + no_bed_children + no_bed_infants) as usize);

    for entry in selection.iter() {
        let capacity = entry.room_type.capacity();
        for room_index in 1..=entry.quantity {
            for seat_index in 1..=capacity {
                let seat = RoomSeat {
                    room_type: entry.room_type,
                    room_index,
                    seat_index,
                };
                let slot = match by_seat.get(&seat) {
                    Some(prev) => PassengerSlot {
                        id: 0,
                        passenger_type: prev.passenger_type,
                        room: Some(seat),
                        identity: prev.identity.clone(),
                    },
                    None => PassengerSlot::new(0, PassengerType::Adult, Some(seat)),
                };
                slots.push(slot);
            }
        }
    }

    append_unroomed(&mut slots, PassengerType::Child, no_bed_children, previous);
    append_unroomed(&mut slots, PassengerType::Infant, no_bed_infants, previous);

    renumber(&mut slots);
    slots
}

/// Rebuilds slots for the flight-ticket flow, where nobody has a room.
///
/// Adults, then children, then infants; each keeps the data of the previous
/// room-less slot of the same type at the same position.
pub fn synchronize_unroomed(
    adults: u32,
    children: u32,
    infants: u32,
    previous: &[PassengerSlot],
) -> Vec<PassengerSlot> {
    let mut slots = Vec::with_capacity((adults + children + infants) as usize);
    append_unroomed(&mut slots, PassengerType::Adult, adults, previous);
    append_unroomed(&mut slots, PassengerType::Child, children, previous);
    append_unroomed(&mut slots, PassengerType::Infant, infants, previous);
    renumber(&mut slots);
    slots
}

fn append_unroomed(
    slots: &mut Vec<PassengerSlot>,
    passenger_type: PassengerType,
    count: u32,
    previous: &[PassengerSlot],
) {
    let mut carried = previous
        .iter()
        .filter(|s| s.room.is_none() && s.passenger_type == passenger_type);

    for _ in 0..count {
        let mut slot = PassengerSlot::new(0, passenger_type, None);
        if let Some(prev) = carried.next() {
            slot.identity = prev.identity.clone();
        }
        slots.push(slot);
    }
}

fn renumber(slots: &mut [PassengerSlot]) {
    for (idx, slot) in slots.iter_mut().enumerate() {
        slot.id = idx as u32 + 1;
    }
}

/// Number of slots of each kind, for quick capacity checks.
pub fn count_by_room(slots: &[PassengerSlot], room_type: Option<RoomType>) -> usize {
    slots.iter().filter(|s| s.room_type() == room_type).count()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn name(slots: &mut [PassengerSlot], id: u32, first_name: &str) {
        let slot = slots.iter_mut().find(|s| s.id == id).expect("slot exists");
        slot.identity.first_name = first_name.to_string();
    }

    #[test]
    fn test_capacity_invariant() {
        for quad in 0..3 {
            for double in 0..3 {
                let selection = RoomSelection::new()
                    .with(RoomType::Quad, quad)
                    .with(RoomType::Double, double)
                    .with(RoomType::Sharing, 1)
                    .with(RoomType::Private, 2);
                let slots = synchronize(&selection, 2, 1, &[]);

                for entry in selection.iter() {
                    assert_eq!(
                        count_by_room(&slots, Some(entry.room_type)) as u32,
                        entry.quantity * entry.room_type.capacity()
                    );
                }
                assert_eq!(count_by_room(&slots, None), 3);
            }
        }
    }

    #[test]
    fn test_slot_order_and_ids() {
        let selection = RoomSelection::new()
            .with(RoomType::Double, 1)
            .with(RoomType::Sharing, 1);
        let slots = synchronize(&selection, 1, 1, &[]);

        let summary: Vec<(u32, Option<RoomType>, PassengerType)> = slots
            .iter()
            .map(|s| (s.id, s.room_type(), s.passenger_type))
            .collect();
        assert_eq!(
            summary,
            vec![
                (1, Some(RoomType::Double), PassengerType::Adult),
                (2, Some(RoomType::Double), PassengerType::Adult),
                (3, Some(RoomType::Sharing), PassengerType::Adult),
                (4, None, PassengerType::Child),
                (5, None, PassengerType::Infant),
            ]
        );
    }

    #[test]
    fn test_resync_is_idempotent() {
        let selection = RoomSelection::new().with(RoomType::Triple, 2);
        let mut first = synchronize(&selection, 1, 0, &[]);
        name(&mut first, 2, "Bilal");
        first[5].passenger_type = PassengerType::Child;

        let second = synchronize(&selection, 1, 0, &first);
        let third = synchronize(&selection, 1, 0, &second);
        assert_eq!(second, first);
        assert_eq!(third, second);
    }

    #[test]
    fn test_preservation_across_configuration_change() {
        let a = RoomSelection::new().with(RoomType::Double, 2).with(RoomType::Quad, 1);
        let mut slots_a = synchronize(&a, 1, 1, &[]);
        for id in 1..=slots_a.len() as u32 {
            name(&mut slots_a, id, &format!("P{}", id));
        }

        // Shrink doubles and drop the quad: the second double and the quad vanish.
        let b = RoomSelection::new().with(RoomType::Double, 1).with(RoomType::Quad, 0);
        let slots_b = synchronize(&b, 1, 1, &slots_a);
        assert_eq!(slots_b.len(), 4);
        assert_eq!(slots_b[0].identity.first_name, "P1");
        assert_eq!(slots_b[2].identity.first_name, "P9"); // no-bed child
        assert_eq!(slots_b[3].identity.first_name, "P10"); // no-bed infant

        // Going back to A against the *A* slot list restores everything.
        let restored = synchronize(&a, 1, 1, &slots_a);
        assert_eq!(restored, slots_a);

        // Going back to A against B keeps every key B still had.
        let regrown = synchronize(&a, 1, 1, &slots_b);
        assert_eq!(regrown[0].identity.first_name, "P1");
        assert_eq!(regrown[1].identity.first_name, "P2");
        assert!(regrown[2].identity.is_blank());
    }

    #[test]
    fn test_no_bed_data_matches_within_type() {
        let mut slots = synchronize(&RoomSelection::new(), 1, 1, &[]);
        name(&mut slots, 1, "Child");
        name(&mut slots, 2, "Infant");

        let grown = synchronize(&RoomSelection::new(), 2, 1, &slots);
        assert_eq!(grown[0].identity.first_name, "Child");
        assert!(grown[1].identity.is_blank());
        assert_eq!(grown[2].identity.first_name, "Infant");
    }

    #[test]
    fn test_ticket_flow_synchronize() {
        let mut slots = synchronize_unroomed(2, 1, 1, &[]);
        assert_eq!(slots.len(), 4);
        assert!(slots.iter().all(|s| s.room.is_none()));
        name(&mut slots, 3, "Ali");

        let fewer_adults = synchronize_unroomed(1, 1, 1, &slots);
        assert_eq!(fewer_adults[1].passenger_type, PassengerType::Child);
        assert_eq!(fewer_adults[1].identity.first_name, "Ali");
        assert_eq!(fewer_adults.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_zero_quantity_removes_slots() {
        let selection = RoomSelection::new().with(RoomType::Quint, 0);
        assert!(synchronize(&selection, 0, 0, &[]).is_empty());
    }
}
