// External collaborator interfaces
//
// The simulation core never talks to the scene graph, audio device, or UI
// directly. It emits fire-and-forget notifications through these traits,
// which the host wires up at construction time (no global singletons).

/// Identifier used to reference game actors in notifications.
pub type ActorId = u32;

/// Plays a sound asset by path, optionally looping.
pub trait AudioPlayer {
    fn play_sfx(&mut self, path: &str, looped: bool);
}

/// Spawns transient visual effects (hit sparks, after-images).
pub trait FxSpawner {
    fn create_hit_fx(&mut self, target: ActorId);
}

/// Shows a floating damage number above a character.
pub trait FloatingDamageDisplay {
    fn show(&mut self, target: ActorId, damage: i32);
}

/// Notified when a character's resource pools change.
pub trait HudListener {
    fn update_status_bars(&mut self);
}

/// Drives sprite animation playback for a character.
///
/// Completion of one-shot animations is not reported back; the core derives
/// durations from profile frame data and schedules its own follow-ups.
pub trait AnimationDriver {
    fn play(&mut self, actor: ActorId, animation: &str, looped: bool);
}

/// Bundle of collaborator implementations injected into the game world.
pub struct Services {
    pub audio: Box<dyn AudioPlayer>,
    pub fx: Box<dyn FxSpawner>,
    pub floating_damage: Box<dyn FloatingDamageDisplay>,
    pub hud: Box<dyn HudListener>,
    pub animation: Box<dyn AnimationDriver>,
}

impl Default for Services {
    fn default() -> Self {
        Self {
            audio: Box::new(NullAudioPlayer),
            fx: Box::new(NullFxSpawner),
            floating_damage: Box::new(NullFloatingDamageDisplay),
            hud: Box::new(NullHudListener),
            animation: Box::new(NullAnimationDriver),
        }
    }
}

/// No-op audio player (headless runs and tests).
pub struct NullAudioPlayer;

impl AudioPlayer for NullAudioPlayer {
    fn play_sfx(&mut self, _path: &str, _looped: bool) {}
}

/// No-op effect spawner.
pub struct NullFxSpawner;

impl FxSpawner for NullFxSpawner {
    fn create_hit_fx(&mut self, _target: ActorId) {}
}

/// No-op floating damage display.
pub struct NullFloatingDamageDisplay;

impl FloatingDamageDisplay for NullFloatingDamageDisplay {
    fn show(&mut self, _target: ActorId, _damage: i32) {}
}

/// No-op HUD listener.
pub struct NullHudListener;

impl HudListener for NullHudListener {
    fn update_status_bars(&mut self) {}
}

/// No-op animation driver.
pub struct NullAnimationDriver;

impl AnimationDriver for NullAnimationDriver {
    fn play(&mut self, _actor: ActorId, _animation: &str, _looped: bool) {}
}
