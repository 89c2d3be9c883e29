pub mod characters;
pub mod combat;
pub mod interactable;
pub mod items;
pub mod skills;
pub mod world;

pub use world::{CombatTuning, GameWorld};
