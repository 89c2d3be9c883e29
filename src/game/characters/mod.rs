pub mod animation;
pub mod character;
pub mod fixtures;
pub mod profile;
pub mod state;

pub use animation::AnimationSet;
pub use character::{Character, CharacterId};
pub use fixtures::{BodyGeometry, CharacterBody, FixtureKind};
pub use profile::{CharacterProfile, CharacterSfx};
pub use state::CharacterState;
