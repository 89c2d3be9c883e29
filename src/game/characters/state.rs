// Character states and animation dispatch policy

/// Discrete animation/behavior state of a character, resolved once per tick
/// from flags and physics velocity. States are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacterState {
    Idle,
    Running,
    RunningStart,
    RunningStop,
    Jumping,
    Falling,
    FallingGetup,
    Crouching,
    DodgingBackward,
    DodgingForward,
    Attacking,
    AttackingUnarmed,
    AttackingUnarmedCrouch,
    AttackingUnarmedMidair,
    AttackingCrouch,
    AttackingForward,
    AttackingMidair,
    AttackingMidairDownward,
    AttackingUpward,
    Blocking,
    BlockingHit,
    Intro,
    Stunned,
    TakeDamage,
    Killed,
}

impl Default for CharacterState {
    fn default() -> Self {
        Self::Idle
    }
}

impl CharacterState {
    /// Whether this is one of the attack variants accepted by `attack`.
    pub fn is_attack(&self) -> bool {
        matches!(
            self,
            Self::Attacking
                | Self::AttackingUnarmed
                | Self::AttackingUnarmedCrouch
                | Self::AttackingUnarmedMidair
                | Self::AttackingCrouch
                | Self::AttackingForward
                | Self::AttackingMidair
                | Self::AttackingMidairDownward
                | Self::AttackingUpward
        )
    }

    /// Whether the state's animation loops until interrupted.
    pub fn loops(&self) -> bool {
        matches!(self, Self::Idle | Self::Running | Self::Stunned)
    }

    /// Name of the animation dispatched for this state.
    pub fn animation_name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::RunningStart => "running_start",
            Self::RunningStop => "running_stop",
            Self::Jumping => "jumping",
            Self::Falling => "falling",
            Self::FallingGetup => "falling_getup",
            Self::Crouching => "crouching",
            Self::DodgingBackward => "dodging_backward",
            Self::DodgingForward => "dodging_forward",
            Self::Attacking => "attacking",
            Self::AttackingUnarmed => "attacking_unarmed",
            Self::AttackingUnarmedCrouch => "attacking_unarmed_crouch",
            Self::AttackingUnarmedMidair => "attacking_unarmed_midair",
            Self::AttackingCrouch => "attacking_crouch",
            Self::AttackingForward => "attacking_forward",
            Self::AttackingMidair => "attacking_midair",
            Self::AttackingMidairDownward => "attacking_midair_downward",
            Self::AttackingUpward => "attacking_upward",
            Self::Blocking => "blocking",
            Self::BlockingHit => "blocking_hit",
            Self::Intro => "intro",
            Self::Stunned => "stunned",
            Self::TakeDamage => "take_damage",
            Self::Killed => "killed",
        }
    }
}

/// Vertical velocity below which an airborne character reads as falling.
pub const FALLING_VELOCITY_THRESHOLD: f32 = -2.5;

/// Horizontal velocity above which a grounded character reads as running.
pub const RUNNING_VELOCITY_THRESHOLD: f32 = 0.01;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attack_states() {
        assert!(CharacterState::Attacking.is_attack());
        assert!(CharacterState::AttackingMidair.is_attack());
        assert!(CharacterState::AttackingUnarmedCrouch.is_attack());
        assert!(!CharacterState::Blocking.is_attack());
        assert!(!CharacterState::Idle.is_attack());
    }

    #[test]
    fn test_looping_states() {
        assert!(CharacterState::Idle.loops());
        assert!(CharacterState::Running.loops());
        assert!(CharacterState::Stunned.loops());
        assert!(!CharacterState::Killed.loops());
        assert!(!CharacterState::Attacking.loops());
    }

    #[test]
    fn test_animation_names() {
        assert_eq!(CharacterState::Idle.animation_name(), "idle");
        assert_eq!(
            CharacterState::AttackingMidairDownward.animation_name(),
            "attacking_midair_downward"
        );
    }
}
