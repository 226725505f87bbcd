// src/models.rs
use crate::errors::ZenError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Above this buddhist score a camera scan selects the VN register.
pub const BUDDHIST_THRESHOLD: f32 = 0.6;

pub const FALLBACK_REALM: &str = "Unknown";
pub const FALLBACK_TRACE: &str = "Connection to the present moment interrupted.";
pub const FALLBACK_ADVICE: &str = "Hãy thở sâu. Kết nối mạng của bạn có vẻ không ổn định, nhưng tâm bạn vẫn có thể tĩnh lặng.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Anxious,
    Sad,
    Joyful,
    Calm,
    Neutral,
}

impl Emotion {
    pub const ALL: [Emotion; 5] = [
        Emotion::Anxious,
        Emotion::Sad,
        Emotion::Joyful,
        Emotion::Calm,
        Emotion::Neutral,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Anxious => "anxious",
            Emotion::Sad => "sad",
            Emotion::Joyful => "joyful",
            Emotion::Calm => "calm",
            Emotion::Neutral => "neutral",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Breathing {
    #[serde(rename = "4-7-8")]
    FourSevenEight,
    #[serde(rename = "box")]
    Box,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionIntent {
    SetTimer,
    PlayBinaural,
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CulturalMode {
    #[serde(rename = "VN")]
    Vn,
    #[default]
    Universal,
}

impl CulturalMode {
    pub fn from_buddhist_score(score: f32) -> Self {
        if score > BUDDHIST_THRESHOLD {
            CulturalMode::Vn
        } else {
            CulturalMode::Universal
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CulturalMode::Vn => "VN",
            CulturalMode::Universal => "Universal",
        }
    }
}

fn unit(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantumMetrics {
    pub coherence: f32,
    pub entanglement: f32,
    pub presence: f32,
}

impl QuantumMetrics {
    fn clamped(self) -> Self {
        Self {
            coherence: unit(self.coherence),
            entanglement: unit(self.entanglement),
            presence: unit(self.presence),
        }
    }
}

/// Structured guidance decoded from the inference endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    #[serde(alias = "realm")]
    pub emotion: Emotion,
    pub wisdom_vi: String,
    pub wisdom_en: String,
    #[serde(default)]
    pub breathing: Option<Breathing>,
    #[serde(default)]
    pub confidence: f32,
    pub reasoning_steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantum_metrics: Option<QuantumMetrics>,
    pub action_intent: ActionIntent,
}

impl AnalysisResponse {
    /// Decodes and validates the JSON text of a reply. Empty text, malformed
    /// JSON, labels outside the closed sets, partial metrics and blank wisdom
    /// are all rejected; scores are clamped into [0, 1].
    pub fn from_reply_text(text: &str) -> Result<Self, ZenError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ZenError::Schema("empty reply".to_string()));
        }

        let parsed: AnalysisResponse = serde_json::from_str(text)
            .map_err(|e| ZenError::Schema(format!("guidance reply: {}", e)))?;

        parsed.validated()
    }

    fn validated(mut self) -> Result<Self, ZenError> {
        if self.wisdom_vi.trim().is_empty() || self.wisdom_en.trim().is_empty() {
            return Err(ZenError::Schema("wisdom text missing".to_string()));
        }
        self.confidence = unit(self.confidence);
        self.quantum_metrics = self.quantum_metrics.map(QuantumMetrics::clamped);
        Ok(self)
    }

    pub fn wisdom(&self, mode: CulturalMode) -> &str {
        match mode {
            CulturalMode::Vn => &self.wisdom_vi,
            CulturalMode::Universal => &self.wisdom_en,
        }
    }
}

/// Graceful-degradation payload for the text path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fallback {
    pub thought_trace: String,
    pub realm: String,
    pub advice: String,
    pub action_intent: ActionIntent,
}

impl Default for Fallback {
    fn default() -> Self {
        Self {
            thought_trace: FALLBACK_TRACE.to_string(),
            realm: FALLBACK_REALM.to_string(),
            advice: FALLBACK_ADVICE.to_string(),
            action_intent: ActionIntent::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reply {
    Guidance(AnalysisResponse),
    Fallback(Fallback),
}

impl Reply {
    pub fn realm(&self) -> &str {
        match self {
            Reply::Guidance(r) => r.emotion.as_str(),
            Reply::Fallback(f) => &f.realm,
        }
    }

    pub fn action_intent(&self) -> ActionIntent {
        match self {
            Reply::Guidance(r) => r.action_intent,
            Reply::Fallback(f) => f.action_intent,
        }
    }

    pub fn advice(&self, mode: CulturalMode) -> &str {
        match self {
            Reply::Guidance(r) => r.wisdom(mode),
            Reply::Fallback(f) => &f.advice,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Reply::Fallback(_))
    }
}

/// Wire shape of a camera-scan reply. `mode` is advisory only.
#[derive(Debug, Clone, Deserialize)]
struct VisionReply {
    buddhist_score: f32,
    #[serde(default)]
    modern_score: f32,
    #[serde(default)]
    natural_score: f32,
    detected_items: Vec<String>,
    #[serde(default)]
    mode: Option<CulturalMode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionAnalysis {
    pub buddhist_score: f32,
    pub modern_score: f32,
    pub natural_score: f32,
    pub detected_items: Vec<String>,
    pub mode: CulturalMode,
}

impl VisionAnalysis {
    /// Decodes a scan reply and recomputes `mode` from the buddhist score,
    /// ignoring whatever mode the endpoint claimed.
    pub fn from_reply_text(text: &str) -> Result<Self, ZenError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ZenError::Schema("empty vision reply".to_string()));
        }

        let reply: VisionReply = serde_json::from_str(text)
            .map_err(|e| ZenError::Schema(format!("vision reply: {}", e)))?;

        let buddhist_score = unit(reply.buddhist_score);
        let mode = CulturalMode::from_buddhist_score(buddhist_score);
        if let Some(claimed) = reply.mode {
            if claimed != mode {
                log::warn!(
                    "Vision endpoint claimed mode {} but buddhist score {:.2} gives {}",
                    claimed.as_str(),
                    buddhist_score,
                    mode.as_str()
                );
            }
        }

        Ok(Self {
            buddhist_score,
            modern_score: unit(reply.modern_score),
            natural_score: unit(reply.natural_score),
            detected_items: reply.detected_items,
            mode,
        })
    }
}

/// One persisted interaction. Immutable once assigned an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoodEntry {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub input: String,
    pub realm: String,
    pub advice: String,
}

/// A mood entry before the store has assigned its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoodDraft {
    pub timestamp: DateTime<Utc>,
    pub input: String,
    pub realm: String,
    pub advice: String,
}

impl MoodDraft {
    pub fn into_entry(self, id: u64) -> MoodEntry {
        MoodEntry {
            id,
            timestamp: self.timestamp,
            input: self.input,
            realm: self.realm,
            advice: self.advice,
        }
    }
}

/// Raw user input for one analysis. Audio is a WAV file, images are JPEG.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Text(String),
    Audio(Vec<u8>),
    Image(Vec<u8>),
}

impl Input {
    pub fn mime_type(&self) -> Option<&'static str> {
        match self {
            Input::Text(_) => None,
            Input::Audio(_) => Some("audio/wav"),
            Input::Image(_) => Some("image/jpeg"),
        }
    }

    /// What gets recorded as the entry's `input` in the history log.
    pub fn journal_text(&self) -> &str {
        match self {
            Input::Text(text) => text,
            Input::Audio(_) => "(voice note)",
            Input::Image(_) => "(image)",
        }
    }
}

/// Built fresh for every call and never mutated after submission.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub input: Input,
    pub mode: CulturalMode,
    pub history: String,
    pub captured_at: DateTime<Utc>,
}
