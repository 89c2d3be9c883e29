// Items: equipment, consumables, and misc loot
//
// One `Item` struct covers every kind; capability differences live in the
// `ItemKind` tagged variant selected from profile data at load time instead
// of a class hierarchy.

pub mod inventory;

use anyhow::Context;
use serde::Deserialize;

pub use inventory::Inventory;

/// Item definition identity. Two items with equal ids share one canonical
/// ledger entry.
pub type ItemId = String;

/// The ledger id of the gold currency item.
pub const GOLD_ITEM_ID: &str = "gold_coin";

/// Coarse inventory bucket an item sorts into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemCategory {
    Equipment,
    Consumable,
    Misc,
}

pub const ITEM_CATEGORY_COUNT: usize = 3;

impl ItemCategory {
    pub fn index(self) -> usize {
        match self {
            Self::Equipment => 0,
            Self::Consumable => 1,
            Self::Misc => 2,
        }
    }
}

/// Equipment slot an equipment item occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentType {
    Weapon,
    Headgear,
    Armor,
    Gauntlets,
    Boots,
    Cape,
    Ring,
}

pub const EQUIPMENT_SLOT_COUNT: usize = 7;

impl EquipmentType {
    pub fn index(self) -> usize {
        match self {
            Self::Weapon => 0,
            Self::Headgear => 1,
            Self::Armor => 2,
            Self::Gauntlets => 3,
            Self::Boots => 4,
            Self::Cape => 5,
            Self::Ring => 6,
        }
    }
}

/// Stats block for equippable items.
#[derive(Debug, Clone, Deserialize)]
pub struct EquipmentStats {
    pub equipment_type: EquipmentType,
    #[serde(default)]
    pub bonus_physical_damage: i32,
    #[serde(default)]
    pub bonus_magical_damage: i32,
    #[serde(default)]
    pub sfx_swing: Option<String>,
    #[serde(default)]
    pub sfx_hit: Option<String>,
}

/// Effect block for consumable items. All fields optional in the profile.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsumableEffect {
    #[serde(default)]
    pub restore_health: i32,
    #[serde(default)]
    pub restore_magicka: i32,
    #[serde(default)]
    pub restore_stamina: i32,

    #[serde(default)]
    pub bonus_physical_damage: i32,
    #[serde(default)]
    pub bonus_str: i32,
    #[serde(default)]
    pub bonus_dex: i32,
    #[serde(default)]
    pub bonus_int: i32,
    #[serde(default)]
    pub bonus_luk: i32,

    #[serde(default)]
    pub bonus_move_speed: f32,
    #[serde(default)]
    pub bonus_jump_height: f32,
}

/// Capability variant of an item, chosen by the `kind` tag in its profile.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemKind {
    Equipment(EquipmentStats),
    Consumable(ConsumableEffect),
    Misc,
}

impl ItemKind {
    pub fn category(&self) -> ItemCategory {
        match self {
            Self::Equipment(_) => ItemCategory::Equipment,
            Self::Consumable(_) => ItemCategory::Consumable,
            Self::Misc => ItemCategory::Misc,
        }
    }
}

/// Immutable-at-load description of an item definition.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemProfile {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub texture_res_dir: String,
    #[serde(flatten)]
    pub kind: ItemKind,
}

impl ItemProfile {
    /// Parse a profile from its JSON definition.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("failed to parse item profile")
    }

    /// Load a profile from a JSON file on disk.
    pub fn load_file(path: &str) -> anyhow::Result<Self> {
        Ok(crate::core::resource::load_json(path)?)
    }
}

/// A stack of one item definition with a mutable amount.
#[derive(Debug, Clone)]
pub struct Item {
    pub profile: ItemProfile,
    pub amount: i32,
}

impl Item {
    pub fn new(profile: ItemProfile) -> Self {
        Self { profile, amount: 1 }
    }

    pub fn id(&self) -> &str {
        &self.profile.id
    }

    pub fn category(&self) -> ItemCategory {
        self.profile.kind.category()
    }

    pub fn is_gold(&self) -> bool {
        self.profile.id == GOLD_ITEM_ID
    }

    pub fn equipment_stats(&self) -> Option<&EquipmentStats> {
        match &self.profile.kind {
            ItemKind::Equipment(stats) => Some(stats),
            _ => None,
        }
    }

    pub fn consumable_effect(&self) -> Option<&ConsumableEffect> {
        match &self.profile.kind {
            ItemKind::Consumable(effect) => Some(effect),
            _ => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_profiles {
    use super::*;

    pub fn sword(bonus_physical_damage: i32) -> ItemProfile {
        ItemProfile {
            id: "rusty_sword".to_string(),
            name: "Rusty Sword".to_string(),
            desc: String::new(),
            texture_res_dir: String::new(),
            kind: ItemKind::Equipment(EquipmentStats {
                equipment_type: EquipmentType::Weapon,
                bonus_physical_damage,
                bonus_magical_damage: 0,
                sfx_swing: None,
                sfx_hit: None,
            }),
        }
    }

    pub fn potion() -> ItemProfile {
        ItemProfile {
            id: "small_potion".to_string(),
            name: "Small Potion".to_string(),
            desc: String::new(),
            texture_res_dir: String::new(),
            kind: ItemKind::Consumable(ConsumableEffect {
                restore_health: 30,
                ..Default::default()
            }),
        }
    }

    pub fn gold() -> ItemProfile {
        ItemProfile {
            id: GOLD_ITEM_ID.to_string(),
            name: "Gold Coin".to_string(),
            desc: String::new(),
            texture_res_dir: String::new(),
            kind: ItemKind::Misc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_from_json() {
        let json = r#"{
            "id": "iron_sword",
            "name": "Iron Sword",
            "kind": "equipment",
            "equipment_type": "weapon",
            "bonus_physical_damage": 10
        }"#;

        let profile = ItemProfile::from_json(json).unwrap();
        assert_eq!(profile.id, "iron_sword");
        match &profile.kind {
            ItemKind::Equipment(stats) => {
                assert_eq!(stats.equipment_type, EquipmentType::Weapon);
                assert_eq!(stats.bonus_physical_damage, 10);
            }
            other => panic!("expected equipment, got {other:?}"),
        }
    }

    #[test]
    fn test_consumable_defaults() {
        let json = r#"{
            "id": "bread",
            "name": "Bread",
            "kind": "consumable",
            "restore_health": 5
        }"#;

        let profile = ItemProfile::from_json(json).unwrap();
        let item = Item::new(profile);
        let effect = item.consumable_effect().unwrap();
        assert_eq!(effect.restore_health, 5);
        assert_eq!(effect.bonus_str, 0);
    }

    #[test]
    fn test_category_mapping() {
        assert_eq!(
            Item::new(test_profiles::sword(5)).category(),
            ItemCategory::Equipment
        );
        assert_eq!(
            Item::new(test_profiles::potion()).category(),
            ItemCategory::Consumable
        );
        assert_eq!(Item::new(test_profiles::gold()).category(), ItemCategory::Misc);
    }

    #[test]
    fn test_gold_detection() {
        assert!(Item::new(test_profiles::gold()).is_gold());
        assert!(!Item::new(test_profiles::sword(1)).is_gold());
    }
}
