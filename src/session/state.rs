// src/session/state.rs
use crate::errors::ZenError;
use crate::models::{CulturalMode, Reply, VisionAnalysis};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Listening,
    Processing,
    Speaking,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Listening => "listening",
            Phase::Processing => "processing",
            Phase::Speaking => "speaking",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureKind {
    Microphone,
    Camera,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    StartCapture(CaptureKind),
    CaptureCancelled,
    CaptureFailed(String),
    CaptureComplete,
    Submit,
    Presented(Reply),
    FellBack(Reply),
    AnalysisFailed(String),
    Scanned(VisionAnalysis),
    PlaybackFinished,
    Dismissed,
    SetMode(CulturalMode),
}

impl Event {
    fn action(&self) -> &'static str {
        match self {
            Event::StartCapture(CaptureKind::Microphone) => "start listening",
            Event::StartCapture(CaptureKind::Camera) => "open the camera",
            Event::CaptureCancelled => "cancel a capture",
            Event::CaptureFailed(_) => "fail a capture",
            Event::CaptureComplete => "complete a capture",
            Event::Submit => "submit input",
            Event::Presented(_) | Event::FellBack(_) => "present a reply",
            Event::AnalysisFailed(_) => "fail an analysis",
            Event::Scanned(_) => "apply a scan",
            Event::PlaybackFinished => "finish playback",
            Event::Dismissed => "dismiss",
            Event::SetMode(_) => "change mode",
        }
    }

    fn is_new_input(&self) -> bool {
        matches!(
            self,
            Event::StartCapture(_) | Event::Submit | Event::SetMode(_)
        )
    }
}

/// Snapshot of one user session. Never mutated in place: `apply` returns
/// the successor state or rejects the event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    /// Bumped whenever a new capture or submission starts, so late results
    /// can tell whether the session has moved on without them.
    pub generation: u64,
    pub phase: Phase,
    pub capture: Option<CaptureKind>,
    pub mode: CulturalMode,
    pub reply: Option<Reply>,
    pub vision: Option<VisionAnalysis>,
    pub notice: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            generation: 0,
            phase: Phase::Idle,
            capture: None,
            mode: CulturalMode::default(),
            reply: None,
            vision: None,
            notice: None,
        }
    }
}

impl SessionState {
    fn to(&self, phase: Phase) -> Self {
        Self {
            phase,
            ..self.clone()
        }
    }

    pub fn apply(&self, event: Event) -> Result<SessionState, ZenError> {
        use Phase::*;

        if self.phase == Processing && event.is_new_input() {
            return Err(ZenError::Busy);
        }

        let next = match (self.phase, event) {
            // New input while speaking counts as a dismiss of the current reply.
            (Idle | Speaking, Event::StartCapture(kind)) => Self {
                generation: self.generation + 1,
                capture: Some(kind),
                notice: None,
                ..self.to(Listening)
            },
            (Idle | Speaking, Event::Submit) => Self {
                generation: self.generation + 1,
                capture: None,
                notice: None,
                ..self.to(Processing)
            },
            (_, Event::SetMode(mode)) => Self {
                mode,
                ..self.clone()
            },

            (Listening, Event::CaptureCancelled) => Self {
                capture: None,
                ..self.to(Idle)
            },
            (Listening, Event::CaptureFailed(notice)) => Self {
                capture: None,
                notice: Some(notice),
                ..self.to(Idle)
            },
            (Listening, Event::CaptureComplete) => self.to(Processing),

            (Processing, Event::Presented(reply)) => Self {
                capture: None,
                reply: Some(reply),
                ..self.to(Speaking)
            },
            (Processing, Event::FellBack(reply)) => Self {
                capture: None,
                reply: Some(reply),
                ..self.to(Idle)
            },
            (Processing, Event::AnalysisFailed(notice)) => Self {
                capture: None,
                notice: Some(notice),
                ..self.to(Idle)
            },
            (Processing, Event::Scanned(vision)) => Self {
                capture: None,
                mode: vision.mode,
                vision: Some(vision),
                ..self.to(Idle)
            },

            (Speaking, Event::PlaybackFinished | Event::Dismissed) => self.to(Idle),
            (Idle, Event::Dismissed) => self.clone(),

            (phase, event) => {
                return Err(ZenError::InvalidTransition {
                    phase: phase.as_str(),
                    action: event.action(),
                });
            }
        };

        Ok(next)
    }
}
