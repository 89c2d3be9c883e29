// Map interactables a character can stand in range of
//
// A closed set of variants with an explicit passive-damage capability query
// replaces runtime type probing: anything that hurts on contact answers
// `passive_damage`, everything else answers `None`.

/// Unique identifier for an interactable placed on the map.
pub type InteractableId = u32;

/// Map object a character can overlap and interact with.
#[derive(Debug, Clone)]
pub enum Interactable {
    /// Damaging trigger zone (spikes, fire vents). Hurts every tick a
    /// character remains in range.
    Trap { damage: i32 },
    /// Scripted trigger with no inherent damage.
    Trigger,
    /// Map-transition portal.
    Portal { destination: String },
    /// Loose item waiting to be picked up (amount travels with it).
    DroppedItem { item_id: String, amount: i32 },
}

impl Interactable {
    /// Damage dealt per tick to characters in range, if any.
    pub fn passive_damage(&self) -> Option<i32> {
        match self {
            Self::Trap { damage } => Some(*damage),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trap_reports_passive_damage() {
        let trap = Interactable::Trap { damage: 5 };
        assert_eq!(trap.passive_damage(), Some(5));
    }

    #[test]
    fn test_non_traps_report_none() {
        assert_eq!(Interactable::Trigger.passive_damage(), None);
        assert_eq!(
            Interactable::Portal {
                destination: "cave".to_string()
            }
            .passive_damage(),
            None
        );
        assert_eq!(
            Interactable::DroppedItem {
                item_id: "gold_coin".to_string(),
                amount: 3
            }
            .passive_damage(),
            None
        );
    }
}
