// src/session/orchestrator.rs
use super::state::{CaptureKind, Event, Phase, SessionState};
use crate::capture::{AudioCapture, Camera, FrameCapture, Lease, Microphone};
use crate::errors::ZenError;
use crate::models::{AnalysisResponse, CulturalMode, Input, Reply};
use crate::services::{AnalysisClient, ImageProcessor};
use crate::stage::{BreathingGuide, EmotionProfile, Stage};
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

pub const MIC_UNAVAILABLE: &str = "Microphone unavailable. Please try again.";
pub const CAMERA_DENIED: &str = "Camera denied. Using Universal mode.";
pub const AUDIO_RETRY: &str = "Could not hear you clearly. Try again.";
pub const VISION_RETRY: &str = "Vision failed. Try again.";

enum ActiveCapture {
    Audio(Lease<dyn AudioCapture>),
    Camera(Lease<dyn FrameCapture>),
}

impl ActiveCapture {
    fn release(&mut self) {
        match self {
            ActiveCapture::Audio(lease) => lease.release(),
            ActiveCapture::Camera(lease) => lease.release(),
        }
    }
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Drives one session through idle → listening → processing → speaking →
/// idle and sequences the side effects of each step.
pub struct Orchestrator {
    state: Mutex<SessionState>,
    capture: Mutex<Option<ActiveCapture>>,
    analysis: Arc<AnalysisClient>,
    stage: Arc<dyn Stage>,
    frames: ImageProcessor,
    speak_replies: bool,
}

impl Orchestrator {
    pub fn new(analysis: Arc<AnalysisClient>, stage: Arc<dyn Stage>, speak_replies: bool) -> Self {
        Self {
            state: Mutex::new(SessionState::default()),
            capture: Mutex::new(None),
            analysis,
            stage,
            frames: ImageProcessor::new(),
            speak_replies,
        }
    }

    pub fn snapshot(&self) -> SessionState {
        locked(&self.state).clone()
    }

    fn dispatch(&self, event: Event) -> Result<SessionState, ZenError> {
        let (previous, next) = {
            let mut state = locked(&self.state);
            let next = state.apply(event)?;
            let previous = std::mem::replace(&mut *state, next.clone());
            (previous.phase, next)
        };

        self.announce(previous, next.phase);
        Ok(next)
    }

    /// Applies `event` only while the session is still in `phase` for
    /// `generation`. Returns `None` when the session has moved on.
    fn dispatch_while(
        &self,
        phase: Phase,
        generation: u64,
        event: Event,
    ) -> Result<Option<SessionState>, ZenError> {
        let next = {
            let mut state = locked(&self.state);
            if state.phase != phase || state.generation != generation {
                debug!("Dropping {:?} for stale generation {}", event, generation);
                return Ok(None);
            }
            let next = state.apply(event)?;
            *state = next.clone();
            next
        };

        self.announce(phase, next.phase);
        Ok(Some(next))
    }

    fn announce(&self, previous: Phase, next: Phase) {
        if previous != next {
            debug!("Session {} -> {}", previous.as_str(), next.as_str());
            self.stage.phase_changed(next);
        }
    }

    pub fn set_mode(&self, mode: CulturalMode) -> Result<SessionState, ZenError> {
        info!("Cultural mode set to {}", mode.as_str());
        self.dispatch(Event::SetMode(mode))
    }

    /// User dismissed the reply, or the client finished playing it.
    pub fn dismiss(&self) -> Result<SessionState, ZenError> {
        self.dispatch(Event::Dismissed)
    }

    pub async fn submit_text(&self, text: &str) -> Result<SessionState, ZenError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ZenError::Validation("text must not be empty".to_string()));
        }

        let mode = self.dispatch(Event::Submit)?.mode;
        let cycle = Uuid::new_v4();
        info!("[{}] Analyzing text input ({} chars)", cycle, text.chars().count());

        let outcome = self.analysis.analyze(Input::Text(text.to_string()), mode).await;
        self.conclude(cycle, outcome, mode, AUDIO_RETRY).await
    }

    /// Journals a photo. The still is normalized before any transition so a
    /// corrupt upload is rejected without touching the session.
    pub async fn submit_image(&self, raw: &[u8]) -> Result<SessionState, ZenError> {
        let jpeg = self.frames.prepare_frame(raw)?;

        let mode = self.dispatch(Event::Submit)?.mode;
        let cycle = Uuid::new_v4();
        info!("[{}] Analyzing image input ({} bytes)", cycle, jpeg.len());

        let outcome = self.analysis.analyze(Input::Image(jpeg), mode).await;
        self.conclude(cycle, outcome, mode, VISION_RETRY).await
    }

    pub async fn start_listening(&self, mic: &dyn Microphone) -> Result<SessionState, ZenError> {
        let generation = self
            .dispatch(Event::StartCapture(CaptureKind::Microphone))?
            .generation;

        match mic.open().await {
            Ok(device) => {
                self.hold(generation, ActiveCapture::Audio(Lease::new("microphone", device)));
                Ok(self.snapshot())
            }
            Err(e) => {
                warn!("Microphone unavailable: {}", e);
                self.fail_capture(generation, MIC_UNAVAILABLE)
            }
        }
    }

    pub async fn finish_listening(&self) -> Result<SessionState, ZenError> {
        let (capture, generation) = self.take_capture();
        let mut lease = match capture {
            Some(ActiveCapture::Audio(lease)) => lease,
            other => return self.restore_capture(other, "finish listening"),
        };

        let recorded = match lease.device() {
            Ok(device) => device.finish().await,
            Err(e) => Err(e),
        };
        lease.release();

        let wav = match recorded.and_then(|clip| {
            if clip.is_empty() {
                return Err(ZenError::Device("no audio captured".to_string()));
            }
            debug!("Recorded {:.1}s of audio", clip.duration().as_secs_f32());
            clip.to_wav()
        }) {
            Ok(wav) => wav,
            Err(e) => {
                warn!("Recording failed: {}", e);
                return self.fail_capture(generation, MIC_UNAVAILABLE);
            }
        };

        let Some(state) =
            self.dispatch_while(Phase::Listening, generation, Event::CaptureComplete)?
        else {
            return Ok(self.snapshot());
        };
        let mode = state.mode;
        let cycle = Uuid::new_v4();
        info!("[{}] Analyzing voice input ({} bytes)", cycle, wav.len());

        let outcome = self.analysis.analyze(Input::Audio(wav), mode).await;
        self.conclude(cycle, outcome, mode, AUDIO_RETRY).await
    }

    pub async fn listen(&self, mic: &dyn Microphone) -> Result<SessionState, ZenError> {
        let state = self.start_listening(mic).await?;
        if state.phase != Phase::Listening {
            return Ok(state);
        }
        self.finish_listening().await
    }

    pub async fn start_scan(&self, camera: &dyn Camera) -> Result<SessionState, ZenError> {
        let generation = self
            .dispatch(Event::StartCapture(CaptureKind::Camera))?
            .generation;

        match camera.open().await {
            Ok(device) => {
                self.hold(generation, ActiveCapture::Camera(Lease::new("camera", device)));
                Ok(self.snapshot())
            }
            Err(e) => {
                warn!("Camera unavailable: {}", e);
                self.fail_capture(generation, CAMERA_DENIED)
            }
        }
    }

    pub async fn finish_scan(&self) -> Result<SessionState, ZenError> {
        let (capture, generation) = self.take_capture();
        let mut lease = match capture {
            Some(ActiveCapture::Camera(lease)) => lease,
            other => return self.restore_capture(other, "finish a scan"),
        };

        let still = match lease.device() {
            Ok(device) => device.snapshot().await,
            Err(e) => Err(e),
        };
        lease.release();

        let jpeg = match still.and_then(|raw| self.frames.prepare_frame(&raw)) {
            Ok(jpeg) => jpeg,
            Err(e) => {
                warn!("Camera frame unusable: {}", e);
                return self.fail_capture(generation, VISION_RETRY);
            }
        };

        if self
            .dispatch_while(Phase::Listening, generation, Event::CaptureComplete)?
            .is_none()
        {
            return Ok(self.snapshot());
        }
        let cycle = Uuid::new_v4();
        info!("[{}] Scanning environment", cycle);

        match self.analysis.scan_environment(jpeg).await {
            Ok(vision) => {
                info!(
                    "[{}] Scan: buddhist {:.2}, items {:?} -> {}",
                    cycle,
                    vision.buddhist_score,
                    vision.detected_items,
                    vision.mode.as_str()
                );
                self.dispatch(Event::Scanned(vision))
            }
            Err(e) => {
                error!("[{}] Vision analysis failed: {}", cycle, e);
                self.dispatch(Event::AnalysisFailed(VISION_RETRY.to_string()))?;
                Err(e)
            }
        }
    }

    pub async fn scan(&self, camera: &dyn Camera) -> Result<SessionState, ZenError> {
        let state = self.start_scan(camera).await?;
        if state.phase != Phase::Listening {
            return Ok(state);
        }
        self.finish_scan().await
    }

    /// Releases any open device before leaving `listening`. The lease is
    /// taken under the state lock so a device still opening cannot be parked
    /// after the session has gone idle.
    pub fn cancel_capture(&self) -> Result<SessionState, ZenError> {
        let (next, capture) = {
            let mut state = locked(&self.state);
            let next = state.apply(Event::CaptureCancelled)?;
            let capture = locked(&self.capture).take();
            *state = next.clone();
            (next, capture)
        };

        if let Some(mut capture) = capture {
            capture.release();
        }
        self.announce(Phase::Listening, next.phase);
        Ok(next)
    }

    /// Parks an opened device for the capture that asked for it. If that
    /// capture was cancelled while the device was opening, the device is
    /// released at once instead.
    fn hold(&self, generation: u64, mut capture: ActiveCapture) {
        {
            let state = locked(&self.state);
            if state.phase == Phase::Listening && state.generation == generation {
                // A lease still parked here would be released on drop.
                let _previous = locked(&self.capture).replace(capture);
                return;
            }
        }
        debug!("Capture {} ended while its device was opening", generation);
        capture.release();
    }

    fn fail_capture(&self, generation: u64, notice: &str) -> Result<SessionState, ZenError> {
        let failed = Event::CaptureFailed(notice.to_string());
        match self.dispatch_while(Phase::Listening, generation, failed)? {
            Some(state) => Ok(state),
            None => Ok(self.snapshot()),
        }
    }

    fn take_capture(&self) -> (Option<ActiveCapture>, u64) {
        let state = locked(&self.state);
        let capture = locked(&self.capture).take();
        (capture, state.generation)
    }

    fn restore_capture(
        &self,
        capture: Option<ActiveCapture>,
        action: &'static str,
    ) -> Result<SessionState, ZenError> {
        if let Some(capture) = capture {
            let _state = locked(&self.state);
            *locked(&self.capture) = Some(capture);
        }
        Err(ZenError::InvalidTransition {
            phase: self.snapshot().phase.as_str(),
            action,
        })
    }

    async fn conclude(
        &self,
        cycle: Uuid,
        outcome: Result<Reply, ZenError>,
        mode: CulturalMode,
        retry_notice: &str,
    ) -> Result<SessionState, ZenError> {
        match outcome {
            Ok(Reply::Guidance(response)) => self.present(cycle, response, mode).await,
            Ok(fallback @ Reply::Fallback(_)) => {
                warn!("[{}] Presenting fallback reply", cycle);
                self.stage.stop_audio();
                self.stage
                    .show_emotion(&EmotionProfile::for_realm(fallback.realm()));
                self.stage.suggest_action(fallback.action_intent());
                self.dispatch(Event::FellBack(fallback))
            }
            Err(e) => {
                error!("[{}] Analysis failed: {}", cycle, e);
                self.dispatch(Event::AnalysisFailed(retry_notice.to_string()))?;
                Err(e)
            }
        }
    }

    async fn present(
        &self,
        cycle: Uuid,
        response: AnalysisResponse,
        mode: CulturalMode,
    ) -> Result<SessionState, ZenError> {
        let generation = self
            .dispatch(Event::Presented(Reply::Guidance(response.clone())))?
            .generation;

        let profile = EmotionProfile::for_emotion(response.emotion);
        self.stage.stop_audio();
        self.stage.show_emotion(&profile);
        self.stage.play_ambient(&profile.ambient);
        if let Some(pattern) = response.breathing {
            self.stage.start_breathing(&BreathingGuide::for_pattern(pattern));
        }
        self.stage.suggest_action(response.action_intent);

        if self.speak_replies {
            match self.speak(generation, response.wisdom(mode)).await {
                Ok(true) => {
                    info!("[{}] Speaking {} guidance", cycle, response.emotion.as_str());
                    return Ok(self.snapshot());
                }
                Ok(false) => {
                    debug!("[{}] Reply dismissed before its speech arrived", cycle);
                    return Ok(self.snapshot());
                }
                Err(e) => warn!("[{}] Skipping speech: {}", cycle, e),
            }
        }

        match self.dispatch(Event::PlaybackFinished) {
            // A dismiss may already have moved the session on.
            Err(ZenError::InvalidTransition { .. }) => Ok(self.snapshot()),
            other => other,
        }
    }

    /// Publishes speech only if the reply of `generation` is still on
    /// screen. Returns whether it was played.
    async fn speak(&self, generation: u64, text: &str) -> Result<bool, ZenError> {
        let clip = self.analysis.synthesize(text).await?;

        let state = locked(&self.state);
        if state.phase != Phase::Speaking || state.generation != generation {
            return Ok(false);
        }
        self.stage.play_speech(&clip)?;
        Ok(true)
    }
}
