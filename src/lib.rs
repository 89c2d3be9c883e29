//! Character and combat simulation core for a 2D action RPG.
//!
//! The crate turns raw input and physics events into character state
//! transitions, animation selection, damage resolution, and skill
//! activation. Rendering, UI, audio playback, and asset management are
//! external collaborators reached through the traits in
//! [`engine::services`]; the host wires them up at construction.
//!
//! [`game::GameWorld`] is the simulation root: it owns the rapier2d
//! physics world, the deferred-effect scheduler, and every actor, and is
//! advanced once per frame with [`game::GameWorld::update`].

pub mod core;
pub mod engine;
pub mod game;

pub use engine::physics::collision::Category;
pub use engine::services::Services;
pub use game::characters::{Character, CharacterId, CharacterState};
pub use game::{CombatTuning, GameWorld};
