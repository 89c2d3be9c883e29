use rapier2d::prelude::*;
use std::sync::{Arc, Mutex};

/// Collision categories for filtering which fixtures may generate contact
/// events with which others.
///
/// Every fixture carries one category plus a mask of the categories it is
/// allowed to touch. Masks are remembered when a fixture is rebuilt (e.g.
/// on crouch or facing flip), so a weapon sensor keeps hitting the same
/// kinds of bodies after its geometry changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Ground = 0b0000_0000_0001,
    Platform = 0b0000_0000_0010,
    Wall = 0b0000_0000_0100,
    Player = 0b0000_0000_1000,
    Enemy = 0b0000_0001_0000,
    Npc = 0b0000_0010_0000,
    Feet = 0b0000_0100_0000,
    MeleeWeapon = 0b0000_1000_0000,
    Item = 0b0001_0000_0000,
    Portal = 0b0010_0000_0000,
    Interactable = 0b0100_0000_0000,
    /// Bodies of characters flagged for death; stops further weapon contact.
    Destroyed = 0b1000_0000_0000,
}

impl Category {
    pub fn bits(self) -> u32 {
        self as u32
    }

    pub fn group(self) -> Group {
        Group::from_bits_truncate(self as u32)
    }
}

/// OR several categories into one mask.
pub fn mask_of(categories: &[Category]) -> Group {
    let bits = categories.iter().fold(0u32, |acc, c| acc | c.bits());
    Group::from_bits_truncate(bits)
}

/// Build rapier interaction groups from a category and a mask.
pub fn interaction_groups(category: Category, mask: Group) -> InteractionGroups {
    InteractionGroups::new(category.group(), mask)
}

/// Contact event surfaced to game logic.
///
/// The combat engine consumes these to maintain each character's in-range
/// target and interactable sets (weapon sensor overlap begin/end).
#[derive(Debug, Clone, Copy)]
pub enum ContactEvent {
    /// Two colliders started touching
    Started {
        collider1: ColliderHandle,
        collider2: ColliderHandle,
    },

    /// Two colliders stopped touching
    Stopped {
        collider1: ColliderHandle,
        collider2: ColliderHandle,
    },
}

/// Queue for storing contact events during a physics step.
pub struct ContactEventQueue {
    events: Arc<Mutex<Vec<ContactEvent>>>,
}

impl ContactEventQueue {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::with_capacity(32))),
        }
    }

    /// Clear all events (call at start of physics step)
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    /// Get all contact events from this frame
    pub fn events(&self) -> Vec<ContactEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    fn push(&self, event: ContactEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl Default for ContactEventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for ContactEventQueue {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: rapier2d::prelude::CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        match event {
            rapier2d::prelude::CollisionEvent::Started(h1, h2, _flags) => {
                self.push(ContactEvent::Started {
                    collider1: h1,
                    collider2: h2,
                });
            }
            rapier2d::prelude::CollisionEvent::Stopped(h1, h2, _flags) => {
                self.push(ContactEvent::Stopped {
                    collider1: h1,
                    collider2: h2,
                });
            }
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
        // Force magnitudes are not used by the combat engine.
    }
}
