// src/stage.rs
// Presentation cues for the orb visualization and the ambient audio bed.
use crate::capture::AudioClip;
use crate::errors::ZenError;
use crate::models::{ActionIntent, Breathing, Emotion};
use crate::session::Phase;
use bytes::Bytes;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const MASTER_GAIN_DB: f32 = -15.0;
pub const AMBIENT_GAIN_DB: f32 = -5.0;
pub const BREATH_GAIN_DB: f32 = -8.0;

const C3_HZ: f32 = 130.81;
const G3_HZ: f32 = 196.00;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn hex(&self) -> String {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!(
            "#{:02x}{:02x}{:02x}",
            channel(self.r),
            channel(self.g),
            channel(self.b)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Timbre {
    PinkNoise,
    BrownNoise,
    Sine,
    Triangle,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Modulation {
    AutoFilter { rate_hz: f32, depth: f32, base_hz: f32 },
    Tremolo { rate_hz: f32, depth: f32 },
    Chorus { rate_hz: f32, delay_ms: f32, depth: f32 },
    SweptLowpass { rate_hz: f32, min_hz: f32, max_hz: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AmbientProfile {
    pub id: &'static str,
    pub timbre: Timbre,
    pub pitch_hz: Option<f32>,
    pub modulation: Modulation,
    pub gain_db: f32,
}

const RAIN: AmbientProfile = AmbientProfile {
    id: "rain",
    timbre: Timbre::PinkNoise,
    pitch_hz: None,
    modulation: Modulation::AutoFilter {
        rate_hz: 0.1,
        depth: 0.4,
        base_hz: 200.0,
    },
    gain_db: AMBIENT_GAIN_DB,
};

const SINGING_BOWL: AmbientProfile = AmbientProfile {
    id: "singing_bowl",
    timbre: Timbre::Sine,
    pitch_hz: Some(174.0),
    modulation: Modulation::Tremolo {
        rate_hz: 3.0,
        depth: 0.3,
    },
    gain_db: AMBIENT_GAIN_DB,
};

const BRIGHT_PAD: AmbientProfile = AmbientProfile {
    id: "bright_pad",
    timbre: Timbre::Triangle,
    pitch_hz: Some(432.0),
    modulation: Modulation::Chorus {
        rate_hz: 1.5,
        delay_ms: 3.5,
        depth: 0.7,
    },
    gain_db: AMBIENT_GAIN_DB,
};

const WIND: AmbientProfile = AmbientProfile {
    id: "wind",
    timbre: Timbre::BrownNoise,
    pitch_hz: None,
    modulation: Modulation::SweptLowpass {
        rate_hz: 0.05,
        min_hz: 200.0,
        max_hz: 600.0,
    },
    gain_db: AMBIENT_GAIN_DB,
};

/// What the orb and the ambient bed do for one emotion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EmotionProfile {
    pub emotion: Emotion,
    pub color: Rgb,
    pub ambient: AmbientProfile,
}

impl EmotionProfile {
    pub fn for_emotion(emotion: Emotion) -> Self {
        let (color, ambient) = match emotion {
            Emotion::Anxious => (Rgb::new(1.0, 0.4, 0.0), RAIN),
            Emotion::Sad => (Rgb::new(0.2, 0.3, 0.8), SINGING_BOWL),
            Emotion::Joyful => (Rgb::new(1.0, 0.8, 0.2), BRIGHT_PAD),
            Emotion::Calm => (Rgb::new(0.2, 0.8, 0.5), WIND),
            Emotion::Neutral => (Rgb::new(0.8, 0.8, 0.8), WIND),
        };
        Self {
            emotion,
            color,
            ambient,
        }
    }

    /// Unknown realms (the fallback's "Unknown" among them) render as neutral.
    pub fn for_realm(realm: &str) -> Self {
        Self::for_emotion(Emotion::parse(realm).unwrap_or(Emotion::Neutral))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreathPhase {
    Inhale,
    Hold,
    Exhale,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BreathStep {
    pub phase: BreathPhase,
    pub seconds: u32,
    pub from_hz: f32,
    pub to_hz: f32,
}

const fn step(phase: BreathPhase, seconds: u32, from_hz: f32, to_hz: f32) -> BreathStep {
    BreathStep {
        phase,
        seconds,
        from_hz,
        to_hz,
    }
}

/// A looping breathing exercise: the guide tone rises on the inhale, holds,
/// and falls on the exhale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreathingGuide {
    pub pattern: Breathing,
    pub steps: Vec<BreathStep>,
    pub gain_db: f32,
}

impl BreathingGuide {
    pub fn for_pattern(pattern: Breathing) -> Self {
        use BreathPhase::*;
        let steps = match pattern {
            Breathing::FourSevenEight => vec![
                step(Inhale, 4, C3_HZ, G3_HZ),
                step(Hold, 7, G3_HZ, G3_HZ),
                step(Exhale, 8, G3_HZ, C3_HZ),
            ],
            Breathing::Box => vec![
                step(Inhale, 4, C3_HZ, G3_HZ),
                step(Hold, 4, G3_HZ, G3_HZ),
                step(Exhale, 4, G3_HZ, C3_HZ),
                step(Hold, 4, C3_HZ, C3_HZ),
            ],
        };
        Self {
            pattern,
            steps,
            gain_db: BREATH_GAIN_DB,
        }
    }

    pub fn cycle(&self) -> Duration {
        Duration::from_secs(self.steps.iter().map(|s| s.seconds as u64).sum())
    }

    /// The step active `elapsed` into the exercise, and the time left in it.
    pub fn position(&self, elapsed: Duration) -> (BreathStep, Duration) {
        let cycle_ms = self.cycle().as_millis().max(1);
        let mut offset = elapsed.as_millis() % cycle_ms;
        for step in &self.steps {
            let len = step.seconds as u128 * 1000;
            if offset < len {
                return (*step, Duration::from_millis((len - offset) as u64));
            }
            offset -= len;
        }
        (self.steps[0], Duration::from_secs(self.steps[0].seconds as u64))
    }
}

/// Renders presentation cues. The visualization and audio synthesis
/// themselves live in the graphical client.
pub trait Stage: Send + Sync {
    fn phase_changed(&self, phase: Phase);
    fn show_emotion(&self, profile: &EmotionProfile);
    fn play_ambient(&self, ambient: &AmbientProfile);
    fn start_breathing(&self, guide: &BreathingGuide);
    fn suggest_action(&self, action: ActionIntent);
    fn play_speech(&self, clip: &AudioClip) -> Result<(), ZenError>;
    fn stop_audio(&self);
}

#[derive(Debug, Clone, Serialize)]
pub struct Cues {
    pub phase: Phase,
    pub emotion: Option<Emotion>,
    pub color: Option<String>,
    pub ambient: Option<AmbientProfile>,
    pub breathing: Option<BreathingGuide>,
    pub action: ActionIntent,
    pub speech_id: Option<Uuid>,
    pub master_gain_db: f32,
    /// Master mute for every sound the client renders. Survives `stop_audio`.
    pub muted: bool,
}

impl Default for Cues {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            emotion: None,
            color: None,
            ambient: None,
            breathing: None,
            action: ActionIntent::None,
            speech_id: None,
            master_gain_db: MASTER_GAIN_DB,
            muted: false,
        }
    }
}

/// The server-side stage: keeps the latest cues for the graphical client
/// to poll, and the latest speech clip as WAV.
#[derive(Default)]
pub struct CueBoard {
    cues: Mutex<Cues>,
    speech: Mutex<Option<Bytes>>,
    breath_started: Mutex<Option<Instant>>,
}

/// Where the running breathing exercise is right now.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BreathNow {
    pub step: BreathStep,
    pub remaining_ms: u64,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl CueBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Cues {
        locked(&self.cues).clone()
    }

    pub fn speech(&self) -> Option<Bytes> {
        locked(&self.speech).clone()
    }

    pub fn set_muted(&self, muted: bool) -> Cues {
        let mut cues = locked(&self.cues);
        cues.muted = muted;
        cues.clone()
    }

    pub fn breath_now(&self) -> Option<BreathNow> {
        let started = (*locked(&self.breath_started))?;
        let guide = locked(&self.cues).breathing.clone()?;
        let (step, remaining) = guide.position(started.elapsed());
        Some(BreathNow {
            step,
            remaining_ms: remaining.as_millis() as u64,
        })
    }
}

impl Stage for CueBoard {
    fn phase_changed(&self, phase: Phase) {
        locked(&self.cues).phase = phase;
    }

    fn show_emotion(&self, profile: &EmotionProfile) {
        let mut cues = locked(&self.cues);
        cues.emotion = Some(profile.emotion);
        cues.color = Some(profile.color.hex());
    }

    fn play_ambient(&self, ambient: &AmbientProfile) {
        locked(&self.cues).ambient = Some(*ambient);
    }

    fn start_breathing(&self, guide: &BreathingGuide) {
        locked(&self.cues).breathing = Some(guide.clone());
        *locked(&self.breath_started) = Some(Instant::now());
    }

    fn suggest_action(&self, action: ActionIntent) {
        locked(&self.cues).action = action;
    }

    fn play_speech(&self, clip: &AudioClip) -> Result<(), ZenError> {
        let wav = clip.to_wav()?;
        *locked(&self.speech) = Some(Bytes::from(wav));
        locked(&self.cues).speech_id = Some(Uuid::new_v4());
        Ok(())
    }

    fn stop_audio(&self) {
        let mut cues = locked(&self.cues);
        cues.ambient = None;
        cues.breathing = None;
        cues.speech_id = None;
        *locked(&self.speech) = None;
        *locked(&self.breath_started) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_emotion_has_a_profile() {
        for emotion in Emotion::ALL {
            let profile = EmotionProfile::for_emotion(emotion);
            assert_eq!(profile.emotion, emotion);
            assert_eq!(profile.ambient.gain_db, AMBIENT_GAIN_DB);
        }
        assert_eq!(EmotionProfile::for_emotion(Emotion::Anxious).ambient.id, "rain");
        assert_eq!(EmotionProfile::for_emotion(Emotion::Sad).ambient.pitch_hz, Some(174.0));
        assert_eq!(EmotionProfile::for_emotion(Emotion::Anxious).color.hex(), "#ff6600");
    }

    #[test]
    fn unknown_realm_defaults_to_neutral() {
        assert_eq!(EmotionProfile::for_realm("Unknown").emotion, Emotion::Neutral);
        assert_eq!(EmotionProfile::for_realm("joyful").emotion, Emotion::Joyful);
    }

    #[test]
    fn four_seven_eight_cycle() {
        let guide = BreathingGuide::for_pattern(Breathing::FourSevenEight);
        assert_eq!(guide.cycle(), Duration::from_secs(19));

        let (s, left) = guide.position(Duration::from_secs(0));
        assert_eq!((s.phase, left), (BreathPhase::Inhale, Duration::from_secs(4)));
        let (s, left) = guide.position(Duration::from_secs(5));
        assert_eq!((s.phase, left), (BreathPhase::Hold, Duration::from_secs(6)));
        let (s, left) = guide.position(Duration::from_secs(11));
        assert_eq!((s.phase, left), (BreathPhase::Exhale, Duration::from_secs(8)));
        assert_eq!(s.from_hz, G3_HZ);
        assert_eq!(s.to_hz, C3_HZ);
        // wraps into the next cycle
        let (s, _) = guide.position(Duration::from_secs(19 + 2));
        assert_eq!(s.phase, BreathPhase::Inhale);
    }

    #[test]
    fn box_cycle_ends_on_hold() {
        let guide = BreathingGuide::for_pattern(Breathing::Box);
        assert_eq!(guide.cycle(), Duration::from_secs(16));
        let (s, left) = guide.position(Duration::from_millis(15_500));
        assert_eq!(s.phase, BreathPhase::Hold);
        assert_eq!(left, Duration::from_millis(500));
    }

    #[test]
    fn cue_board_tracks_latest_cues() {
        let board = CueBoard::new();
        let profile = EmotionProfile::for_emotion(Emotion::Calm);
        board.phase_changed(Phase::Speaking);
        board.show_emotion(&profile);
        board.play_ambient(&profile.ambient);
        board
            .play_speech(&AudioClip::mono(vec![0, 10, -10], 24_000))
            .unwrap();

        let cues = board.snapshot();
        assert_eq!(cues.phase, Phase::Speaking);
        assert_eq!(cues.emotion, Some(Emotion::Calm));
        assert_eq!(cues.ambient.map(|a| a.id), Some("wind"));
        assert!(cues.speech_id.is_some());
        assert!(board.speech().unwrap().starts_with(b"RIFF"));

        board.stop_audio();
        assert!(board.snapshot().ambient.is_none());
        assert!(board.speech().is_none());
    }

    #[test]
    fn mute_outlives_stop_audio() {
        let board = CueBoard::new();
        assert!(!board.snapshot().muted);

        assert!(board.set_muted(true).muted);
        board.stop_audio();
        board.phase_changed(Phase::Listening);
        assert!(board.snapshot().muted);

        assert!(!board.set_muted(false).muted);
        assert_eq!(board.snapshot().master_gain_db, MASTER_GAIN_DB);
    }

    #[test]
    fn breath_position_follows_the_guide() {
        let board = CueBoard::new();
        assert!(board.breath_now().is_none());

        board.start_breathing(&BreathingGuide::for_pattern(Breathing::Box));
        let now = board.breath_now().unwrap();
        assert_eq!(now.step.phase, BreathPhase::Inhale);
        assert!(now.remaining_ms <= 4_000);

        board.stop_audio();
        assert!(board.breath_now().is_none());
    }
}
