//! Sound hooks fired by animation state transitions.

use crate::{PlayParams, PlaybackBackend, RandomSource, SoundDispatcher, VoiceHandle};
use serde::{Deserialize, Serialize};

/// Transition edge a hook listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPhase {
    /// The state was entered.
    Enter,
    /// The state was left.
    Exit,
}

/// Plays a sound when a named animation state is entered or exited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSoundHook {
    /// Animation state the hook is attached to.
    pub state: String,
    /// Sound name to play.
    pub sound: String,
    /// Base volume (0.0 to 1.0).
    #[serde(default = "full_volume")]
    pub volume: f32,
    /// Edge the hook fires on.
    pub phase: HookPhase,
}

fn full_volume() -> f32 {
    1.0
}

impl StateSoundHook {
    /// Hook playing `sound` at full volume.
    pub fn new(state: impl Into<String>, sound: impl Into<String>, phase: HookPhase) -> Self {
        Self {
            state: state.into(),
            sound: sound.into(),
            volume: 1.0,
            phase,
        }
    }

    /// Called when the animator enters the hook's state.
    pub fn on_state_enter<B, R>(&self, dispatcher: &SoundDispatcher<B, R>) -> Option<VoiceHandle>
    where
        B: PlaybackBackend,
        R: RandomSource,
    {
        self.fire(HookPhase::Enter, dispatcher)
    }

    /// Called when the animator leaves the hook's state.
    pub fn on_state_exit<B, R>(&self, dispatcher: &SoundDispatcher<B, R>) -> Option<VoiceHandle>
    where
        B: PlaybackBackend,
        R: RandomSource,
    {
        self.fire(HookPhase::Exit, dispatcher)
    }

    fn fire<B, R>(
        &self,
        phase: HookPhase,
        dispatcher: &SoundDispatcher<B, R>,
    ) -> Option<VoiceHandle>
    where
        B: PlaybackBackend,
        R: RandomSource,
    {
        if phase != self.phase {
            return None;
        }
        dispatcher.play(&self.sound, PlayParams::with_volume(self.volume.clamp(0.0, 1.0)))
    }
}
