// Inventory and equipment ledger
//
// One canonical `Item` per definition id lives in the ledger; inventory
// buckets and equipment slots hold ids into it, never second copies.

use std::collections::{HashMap, HashSet};

use log::{error, warn};

use super::{EquipmentType, Item, ItemCategory, ItemId, EQUIPMENT_SLOT_COUNT, ITEM_CATEGORY_COUNT};

#[derive(Debug, Default)]
pub struct Inventory {
    /// Canonical instance per item definition.
    items: HashMap<ItemId, Item>,
    /// Per-category buckets of ids into `items`.
    buckets: [HashSet<ItemId>; ITEM_CATEGORY_COUNT],
    /// Equipped item ids, indexed by equipment type.
    equipment_slots: [Option<ItemId>; EQUIPMENT_SLOT_COUNT],
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` units of an item. If an item with the same definition id
    /// already exists in the ledger its stored amount grows and the passed
    /// object is discarded, keeping a single canonical instance.
    pub fn add_item(&mut self, item: Item, amount: i32) -> bool {
        if amount == 0 {
            warn!("Failed to add item, amount: [0].");
            return false;
        }

        let id = item.profile.id.clone();
        let category = item.category();

        if let Some(existing) = self.items.get_mut(&id) {
            existing.amount += amount;
        } else {
            let mut item = item;
            item.amount = amount;
            self.items.insert(id.clone(), item);
        }

        self.buckets[category.index()].insert(id);
        true
    }

    /// Remove `amount` units of an item by definition id. At zero remaining
    /// the item leaves its bucket, and leaves the ledger entirely unless it
    /// currently occupies an equipment slot.
    pub fn remove_item(&mut self, id: &str, amount: i32) -> bool {
        if amount == 0 {
            warn!("Failed to remove item, amount: [0].");
            return false;
        }

        let Some(item) = self.items.get_mut(id) else {
            warn!("Failed to remove item [{id}], not in ledger.");
            return false;
        };

        let final_amount = item.amount - amount;
        assert!(
            final_amount >= 0,
            "item amount must be >= 0 after removal (ledger corruption)"
        );
        item.amount = final_amount;

        if final_amount == 0 {
            let category = item.category();
            self.buckets[category.index()].remove(id);

            if !self.is_equipped(id) {
                self.items.remove(id);
            }
        }

        true
    }

    /// Equip an item from the ledger. Equipping over an occupied slot
    /// unequips the incumbent first (it returns to the inventory).
    pub fn equip(&mut self, id: &str) -> bool {
        let Some(item) = self.items.get(id) else {
            warn!("Failed to equip [{id}], not in ledger.");
            return false;
        };
        let Some(stats) = item.equipment_stats() else {
            warn!("Failed to equip [{id}], not an equipment.");
            return false;
        };

        let slot = stats.equipment_type.index();
        if self.equipment_slots[slot].is_some() {
            self.unequip(stats.equipment_type);
        }

        self.equipment_slots[slot] = Some(id.to_string());
        self.remove_item(id, 1);
        true
    }

    /// Move the equipped item of the given type back into the inventory.
    /// Redundant unequips are silent no-ops.
    pub fn unequip(&mut self, equipment_type: EquipmentType) -> bool {
        let slot = equipment_type.index();
        let Some(id) = self.equipment_slots[slot].take() else {
            return false;
        };

        let Some(item) = self.items.get_mut(&id) else {
            error!("The unequipped item [{id}] is not in the ledger.");
            return false;
        };

        item.amount += 1;
        let category = item.category();
        self.buckets[category.index()].insert(id);
        true
    }

    /// The equipped item in a slot, if any.
    pub fn equipped(&self, equipment_type: EquipmentType) -> Option<&Item> {
        self.equipment_slots[equipment_type.index()]
            .as_ref()
            .and_then(|id| self.items.get(id))
    }

    /// Whether the given definition id currently occupies any slot.
    pub fn is_equipped(&self, id: &str) -> bool {
        self.equipment_slots
            .iter()
            .any(|slot| slot.as_deref() == Some(id))
    }

    /// Units held of a definition id (zero when absent). Excludes the
    /// equipped copy.
    pub fn amount_of(&self, id: &str) -> i32 {
        self.items.get(id).map_or(0, |item| item.amount)
    }

    /// Canonical ledger entry for a definition id.
    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.get(id)
    }

    /// Whether the bucket for a category contains a definition id.
    pub fn bucket_contains(&self, category: ItemCategory, id: &str) -> bool {
        self.buckets[category.index()].contains(id)
    }

    /// Ids in one category bucket.
    pub fn bucket(&self, category: ItemCategory) -> impl Iterator<Item = &str> {
        self.buckets[category.index()].iter().map(String::as_str)
    }

    /// Number of distinct definitions in the ledger.
    pub fn ledger_len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::items::test_profiles;

    #[test]
    fn test_add_zero_amount_rejected() {
        let mut inv = Inventory::new();
        assert!(!inv.add_item(Item::new(test_profiles::potion()), 0));
        assert_eq!(inv.ledger_len(), 0);
    }

    #[test]
    fn test_add_same_definition_twice_merges() {
        let mut inv = Inventory::new();
        assert!(inv.add_item(Item::new(test_profiles::potion()), 2));
        assert!(inv.add_item(Item::new(test_profiles::potion()), 3));

        assert_eq!(inv.ledger_len(), 1);
        assert_eq!(inv.amount_of("small_potion"), 5);
    }

    #[test]
    fn test_add_remove_round_trip() {
        let mut inv = Inventory::new();
        inv.add_item(Item::new(test_profiles::potion()), 4);
        assert!(inv.remove_item("small_potion", 4));

        assert_eq!(inv.amount_of("small_potion"), 0);
        assert_eq!(inv.ledger_len(), 0);
        assert!(!inv.bucket_contains(ItemCategory::Consumable, "small_potion"));
    }

    #[test]
    fn test_remove_missing_item_rejected() {
        let mut inv = Inventory::new();
        assert!(!inv.remove_item("small_potion", 1));
    }

    #[test]
    #[should_panic(expected = "ledger corruption")]
    fn test_remove_more_than_held_panics() {
        let mut inv = Inventory::new();
        inv.add_item(Item::new(test_profiles::potion()), 1);
        inv.remove_item("small_potion", 2);
    }

    #[test]
    fn test_equip_removes_from_bucket_keeps_ledger() {
        let mut inv = Inventory::new();
        inv.add_item(Item::new(test_profiles::sword(5)), 1);
        assert!(inv.equip("rusty_sword"));

        assert!(inv.is_equipped("rusty_sword"));
        assert!(inv.equipped(EquipmentType::Weapon).is_some());
        // The canonical copy survives in the ledger but not the bucket.
        assert_eq!(inv.ledger_len(), 1);
        assert!(!inv.bucket_contains(ItemCategory::Equipment, "rusty_sword"));
        assert_eq!(inv.amount_of("rusty_sword"), 0);
    }

    #[test]
    fn test_unequip_restores_inventory() {
        let mut inv = Inventory::new();
        inv.add_item(Item::new(test_profiles::sword(5)), 1);
        inv.equip("rusty_sword");
        assert!(inv.unequip(EquipmentType::Weapon));

        assert!(!inv.is_equipped("rusty_sword"));
        assert!(inv.equipped(EquipmentType::Weapon).is_none());
        assert_eq!(inv.amount_of("rusty_sword"), 1);
        assert!(inv.bucket_contains(ItemCategory::Equipment, "rusty_sword"));
    }

    #[test]
    fn test_unequip_empty_slot_is_noop() {
        let mut inv = Inventory::new();
        assert!(!inv.unequip(EquipmentType::Weapon));
    }

    #[test]
    fn test_equip_replaces_incumbent() {
        let mut inv = Inventory::new();
        inv.add_item(Item::new(test_profiles::sword(5)), 1);

        let mut other = test_profiles::sword(12);
        other.id = "steel_sword".to_string();
        inv.add_item(Item::new(other), 1);

        inv.equip("rusty_sword");
        inv.equip("steel_sword");

        assert!(inv.is_equipped("steel_sword"));
        assert!(!inv.is_equipped("rusty_sword"));
        // Incumbent returned to the inventory with amount 1.
        assert_eq!(inv.amount_of("rusty_sword"), 1);
        assert!(inv.bucket_contains(ItemCategory::Equipment, "rusty_sword"));
    }

    #[test]
    fn test_equip_non_equipment_rejected() {
        let mut inv = Inventory::new();
        inv.add_item(Item::new(test_profiles::potion()), 1);
        assert!(!inv.equip("small_potion"));
    }
}
