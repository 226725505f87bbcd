// src/services/analysis_client.rs
use crate::capture::AudioClip;
use crate::capture::audio::decode_speech;
use crate::errors::ZenError;
use crate::models::*;
use crate::prompts;
use crate::services::history::{self, HistoryLog, NO_HISTORY};
use crate::services::llm_service::{GenerateRequest, InferenceEndpoint, InlineData};
use chrono::Utc;
use log::{error, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Sends user input plus recent history to the inference endpoint and
/// decodes the structured reply.
pub struct AnalysisClient {
    endpoint: Arc<dyn InferenceEndpoint>,
    history: Arc<dyn HistoryLog>,
    history_depth: usize,
    timeout: Duration,
}

impl AnalysisClient {
    pub fn new(
        endpoint: Arc<dyn InferenceEndpoint>,
        history: Arc<dyn HistoryLog>,
        history_depth: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            endpoint,
            history,
            history_depth,
            timeout,
        }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, ZenError>
    where
        F: Future<Output = Result<T, ZenError>>,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| ZenError::Timeout(self.timeout.as_secs()))?
    }

    async fn build_request(&self, input: Input, mode: CulturalMode) -> AnalysisRequest {
        let history = match self.history.summarize(self.history_depth).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("History unavailable, analyzing without context: {}", e);
                NO_HISTORY.to_string()
            }
        };

        AnalysisRequest {
            input,
            mode,
            history,
            captured_at: Utc::now(),
        }
    }

    /// Text input never fails: endpoint trouble degrades to the fixed
    /// fallback reply. Audio and image failures are returned to the caller.
    pub async fn analyze(&self, input: Input, mode: CulturalMode) -> Result<Reply, ZenError> {
        let request = self.build_request(input, mode).await;

        match self.guidance(&request).await {
            Ok(response) => {
                info!(
                    "Analysis: {} ({:.2}), action {:?}",
                    response.emotion.as_str(),
                    response.confidence,
                    response.action_intent
                );
                self.record(&request, &response);
                Ok(Reply::Guidance(response))
            }
            Err(e) => match request.input {
                Input::Text(_) if e.is_endpoint_failure() => {
                    error!("Analysis failed, using fallback: {}", e);
                    Ok(Reply::Fallback(Fallback::default()))
                }
                _ => {
                    error!("Analysis failed: {}", e);
                    Err(e)
                }
            },
        }
    }

    async fn guidance(&self, request: &AnalysisRequest) -> Result<AnalysisResponse, ZenError> {
        let (prompt, inline) = match &request.input {
            Input::Text(text) => (prompts::user_prompt(&request.history, Some(text)), None),
            Input::Audio(data) | Input::Image(data) => (
                prompts::user_prompt(&request.history, None),
                request.input.mime_type().map(|mime_type| InlineData {
                    mime_type,
                    data: data.clone(),
                }),
            ),
        };

        let generate = GenerateRequest {
            system_instruction: Some(prompts::system_instruction(request.mode)),
            prompt,
            inline,
            schema: prompts::guidance_schema(),
        };

        let text = self.bounded(self.endpoint.generate_json(&generate)).await?;
        AnalysisResponse::from_reply_text(&text)
    }

    fn record(&self, request: &AnalysisRequest, response: &AnalysisResponse) {
        let draft = MoodDraft {
            timestamp: request.captured_at,
            input: request.input.journal_text().to_string(),
            realm: response.emotion.as_str().to_string(),
            advice: response.wisdom(request.mode).to_string(),
        };
        history::record_in_background(self.history.clone(), draft);
    }

    /// Classifies the surroundings in a JPEG still. The returned mode is
    /// always derived locally from the buddhist score.
    pub async fn scan_environment(&self, jpeg: Vec<u8>) -> Result<VisionAnalysis, ZenError> {
        let generate = GenerateRequest {
            system_instruction: None,
            prompt: prompts::VISION_PROMPT.to_string(),
            inline: Some(InlineData {
                mime_type: "image/jpeg",
                data: jpeg,
            }),
            schema: prompts::vision_schema(),
        };

        let text = self.bounded(self.endpoint.generate_json(&generate)).await?;
        VisionAnalysis::from_reply_text(&text)
    }

    pub async fn synthesize(&self, text: &str) -> Result<AudioClip, ZenError> {
        let encoded = self.bounded(self.endpoint.synthesize_speech(text)).await?;
        decode_speech(&encoded)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::services::history::MemoryHistory;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned endpoint results in order and records every request.
    #[derive(Default)]
    pub(crate) struct ScriptedEndpoint {
        replies: Mutex<VecDeque<Result<String, ZenError>>>,
        speech: Mutex<VecDeque<Result<String, ZenError>>>,
        pub(crate) requests: Mutex<Vec<GenerateRequest>>,
        pub(crate) delay: Option<Duration>,
        pub(crate) speech_delay: Option<Duration>,
    }

    impl ScriptedEndpoint {
        pub(crate) fn replying(replies: Vec<Result<String, ZenError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Self::default()
            }
        }

        pub(crate) fn with_speech(self, speech: Vec<Result<String, ZenError>>) -> Self {
            *self.speech.lock().unwrap() = speech.into();
            self
        }

        pub(crate) fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl InferenceEndpoint for ScriptedEndpoint {
        async fn generate_json(&self, request: &GenerateRequest) -> Result<String, ZenError> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ZenError::Endpoint("no scripted reply".into())))
        }

        async fn synthesize_speech(&self, _text: &str) -> Result<String, ZenError> {
            if let Some(delay) = self.speech_delay {
                tokio::time::sleep(delay).await;
            }
            self.speech
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ZenError::Endpoint("no scripted speech".into())))
        }
    }

    pub(crate) fn guidance_json(emotion: &str, action: &str, breathing: Option<&str>) -> String {
        serde_json::json!({
            "emotion": emotion,
            "wisdom_vi": "Con hãy trở về với hơi thở.",
            "wisdom_en": "Return to your breath.",
            "breathing": breathing,
            "confidence": 0.9,
            "reasoning_steps": ["Nhận diện", "Chọn lời dạy", "Chiến lược"],
            "quantum_metrics": {"coherence": 0.8, "entanglement": 0.7, "presence": 0.9},
            "action_intent": action
        })
        .to_string()
    }

    /// Lets fire-and-forget appends run, then reports how many landed.
    pub(crate) async fn settle(history: &MemoryHistory, expected: usize) -> usize {
        for _ in 0..100 {
            if history.len() >= expected {
                break;
            }
            tokio::task::yield_now().await;
        }
        history.len()
    }

    fn client(endpoint: Arc<ScriptedEndpoint>, history: Arc<MemoryHistory>) -> AnalysisClient {
        AnalysisClient::new(endpoint, history, 5, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn text_success_is_recorded() {
        let endpoint = Arc::new(ScriptedEndpoint::replying(vec![Ok(guidance_json(
            "anxious",
            "PLAY_BINAURAL",
            Some("4-7-8"),
        ))]));
        let history = Arc::new(MemoryHistory::new());
        let client = client(endpoint.clone(), history.clone());

        let reply = client
            .analyze(Input::Text("I feel anxious about my exam".into()), CulturalMode::Vn)
            .await
            .unwrap();
        assert_eq!(reply.realm(), "anxious");
        assert_eq!(reply.action_intent(), ActionIntent::PlayBinaural);

        assert_eq!(settle(&history, 1).await, 1);
        let entry = &history.recent(1).await.unwrap()[0];
        assert_eq!(entry.realm, "anxious");
        assert_eq!(entry.input, "I feel anxious about my exam");
        assert_eq!(entry.advice, "Con hãy trở về với hơi thở.");

        let request = &endpoint.requests.lock().unwrap()[0];
        assert!(request.prompt.contains("No previous history."));
        assert!(request.prompt.contains("User Input: I feel anxious about my exam"));
        assert!(request.inline.is_none());
    }

    #[tokio::test]
    async fn history_context_feeds_next_request() {
        let endpoint = Arc::new(ScriptedEndpoint::replying(vec![
            Ok(guidance_json("sad", "NONE", None)),
            Ok(guidance_json("calm", "NONE", None)),
        ]));
        let history = Arc::new(MemoryHistory::new());
        let client = client(endpoint.clone(), history.clone());

        client
            .analyze(Input::Text("lonely tonight".into()), CulturalMode::Universal)
            .await
            .unwrap();
        settle(&history, 1).await;
        client
            .analyze(Input::Text("better now".into()), CulturalMode::Universal)
            .await
            .unwrap();

        let requests = endpoint.requests.lock().unwrap();
        assert!(requests[1].prompt.contains("User felt sad: \"lonely tonight\""));
    }

    #[tokio::test]
    async fn identical_calls_append_twice() {
        let endpoint = Arc::new(ScriptedEndpoint::replying(vec![
            Ok(guidance_json("neutral", "NONE", None)),
            Ok(guidance_json("neutral", "NONE", None)),
        ]));
        let history = Arc::new(MemoryHistory::new());
        let client = client(endpoint, history.clone());

        for _ in 0..2 {
            client
                .analyze(Input::Text("same words".into()), CulturalMode::Universal)
                .await
                .unwrap();
        }
        assert_eq!(settle(&history, 2).await, 2);
        let ids: Vec<u64> = history.recent(5).await.unwrap().iter().map(|e| e.id).collect();
        assert_ne!(ids[0], ids[1]);
    }

    #[tokio::test]
    async fn text_failures_fall_back_without_recording() {
        let endpoint = Arc::new(ScriptedEndpoint::replying(vec![
            Err(ZenError::Endpoint("connection reset".into())),
            Ok(guidance_json("furious", "NONE", None)),
            Ok(String::new()),
        ]));
        let history = Arc::new(MemoryHistory::new());
        let client = client(endpoint, history.clone());

        for _ in 0..3 {
            let reply = client
                .analyze(Input::Text("hello".into()), CulturalMode::Vn)
                .await
                .unwrap();
            assert_eq!(reply, Reply::Fallback(Fallback::default()));
            assert_eq!(reply.realm(), "Unknown");
            assert_eq!(reply.action_intent(), ActionIntent::None);
        }
        tokio::task::yield_now().await;
        assert_eq!(history.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_endpoint_times_out_into_fallback() {
        let endpoint = Arc::new(ScriptedEndpoint {
            delay: Some(Duration::from_secs(60)),
            ..ScriptedEndpoint::replying(vec![Ok(guidance_json("calm", "NONE", None))])
        });
        let history = Arc::new(MemoryHistory::new());
        let client = client(endpoint, history);

        let reply = client
            .analyze(Input::Text("hello".into()), CulturalMode::Universal)
            .await
            .unwrap();
        assert!(reply.is_fallback());
    }

    #[tokio::test]
    async fn audio_failures_propagate() {
        let endpoint = Arc::new(ScriptedEndpoint::replying(vec![Err(ZenError::Endpoint(
            "503".into(),
        ))]));
        let history = Arc::new(MemoryHistory::new());
        let client = client(endpoint.clone(), history);

        let result = client
            .analyze(Input::Audio(vec![1, 2, 3]), CulturalMode::Universal)
            .await;
        assert!(matches!(result, Err(ZenError::Endpoint(_))));

        let request = &endpoint.requests.lock().unwrap()[0];
        let inline = request.inline.as_ref().unwrap();
        assert_eq!(inline.mime_type, "audio/wav");
        assert_eq!(inline.data, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn vision_mode_overrides_endpoint_claim() {
        let endpoint = Arc::new(ScriptedEndpoint::replying(vec![Ok(r#"{
            "buddhist_score": 0.75, "modern_score": 0.2, "natural_score": 0.1,
            "detected_items": ["incense"], "mode": "Universal"
        }"#
        .to_string())]));
        let client = client(endpoint.clone(), Arc::new(MemoryHistory::new()));

        let vision = client.scan_environment(vec![0xFF, 0xD8]).await.unwrap();
        assert_eq!(vision.mode, CulturalMode::Vn);
        let request = &endpoint.requests.lock().unwrap()[0];
        assert_eq!(request.inline.as_ref().unwrap().mime_type, "image/jpeg");
    }

    #[tokio::test]
    async fn speech_is_decoded_or_reports_decode_error() {
        let endpoint = Arc::new(
            ScriptedEndpoint::default().with_speech(vec![Ok("AQACAA==".into()), Ok("!!".into())]),
        );
        let client = client(endpoint, Arc::new(MemoryHistory::new()));

        assert_eq!(client.synthesize("hi").await.unwrap().samples, vec![1, 2]);
        assert!(matches!(client.synthesize("hi").await, Err(ZenError::Decode(_))));
    }
}
