//! # Family Grouping
//!
//! A family is everyone sharing one room instance. Families are never stored:
//! they are derived from the slot list on demand, so they cannot drift from it.
//!
//! ```text
//! slots:  [1 adult  double_1] [2 child double_1] [3 child  triple_1]
//!         [4 infant triple_1] [5 child —]
//!
//! families:
//!   double_1 → members [1, 2], head 1   (first adult)
//!   triple_1 → members [3, 4], head 3   (no adult → first member)
//!   slot 5 has no room → no family
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{PassengerSlot, PassengerType, RoomType};

/// One room instance's occupants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Family {
    /// `"{room_type}_{room_index}"`
    pub key: String,
    pub room_type: RoomType,
    pub room_index: u32,
    /// Slot ids in slot order.
    pub members: Vec<u32>,
    /// Slot id of the head of family.
    pub head: u32,
}

impl Family {
    pub fn contains(&self, slot_id: u32) -> bool {
        self.members.contains(&slot_id)
    }
}

/// All families of a slot list, in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Families {
    pub families: Vec<Family>,
}

impl Families {
    pub fn get(&self, key: &str) -> Option<&Family> {
        self.families.iter().find(|f| f.key == key)
    }

    pub fn family_of(&self, slot_id: u32) -> Option<&Family> {
        self.families.iter().find(|f| f.contains(slot_id))
    }

    /// Head of the slot's family, if the slot belongs to one.
    pub fn head_of(&self, slot_id: u32) -> Option<u32> {
        self.family_of(slot_id).map(|f| f.head)
    }

    pub fn is_head(&self, slot_id: u32) -> bool {
        self.head_of(slot_id) == Some(slot_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Family> {
        self.families.iter()
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}

/// Groups slots by room instance and picks each family's head.
pub fn group_families(slots: &[PassengerSlot]) -> Families {
    let mut families: Vec<Family> = Vec::new();
    let mut has_adult_head: Vec<bool> = Vec::new();

    for slot in slots {
        let Some(seat) = slot.room else {
            continue;
        };
        let key = seat.family_key();
        let is_adult = slot.passenger_type == PassengerType::Adult;

        match families.iter().position(|f| f.key == key) {
            Some(idx) => {
                families[idx].members.push(slot.id);
                if is_adult && !has_adult_head[idx] {
                    families[idx].head = slot.id;
                    has_adult_head[idx] = true;
                }
            }
            None => {
                families.push(Family {
                    key,
                    room_type: seat.room_type,
                    room_index: seat.room_index,
                    members: vec![slot.id],
                    head: slot.id,
                });
                has_adult_head.push(is_adult);
            }
        }
    }

    Families { families }
}

/// Display name for a family member: the head's name is shown next to
/// non-head members ("Aisha (family of Omar Khan)").
pub fn display_name(slots: &[PassengerSlot], families: &Families, slot_id: u32) -> Option<String> {
    let slot = slots.iter().find(|s| s.id == slot_id)?;
    let own = slot.identity.full_name();
    match families.head_of(slot_id) {
        Some(head_id) if head_id != slot_id => {
            let head_name = slots
                .iter()
                .find(|s| s.id == head_id)
                .map(|s| s.identity.full_name())
                .unwrap_or_default();
            if head_name.is_empty() {
                Some(own)
            } else {
                Some(format!("{} (family of {})", own, head_name))
            }
        }
        _ => Some(own),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
