// src/prompts.rs
// Instruction text and response schemas sent to the inference endpoint.
use crate::models::CulturalMode;
use serde_json::{Value, json};

pub fn system_instruction(mode: CulturalMode) -> String {
    let register = match mode {
        CulturalMode::Vn => {
            "Address the user with formal Vietnamese honorifics (Thầy speaking to Con). \
             Tone: warm, ancestral, deeply compassionate."
        }
        CulturalMode::Universal => {
            "Use a universal, friendly register (Tôi speaking to Bạn). \
             Tone: gentle, direct, modern mindfulness."
        }
    };

    format!(
        r#"
        You are a Zen teacher in the lineage of Thích Nhất Hạnh: gentle, mindful, attentive to interbeing.
        CULTURAL MODE: {mode}.
        {register}

        You receive the user's recent mood history as context, then their current input
        (written text, a voice recording or a photo).

        TASK:
        1. Classify the user's emotion as exactly one of: anxious, sad, joyful, calm, neutral.
        2. Write 3 short reasoning steps in Vietnamese: detection, teaching selection, strategy.
        3. Estimate quantum metrics between 0.0 and 1.0: coherence (logic),
           entanglement (empathy), presence (mindfulness).
        4. Give guidance of 2-3 sentences, once in Vietnamese (wisdom_vi) and once in English (wisdom_en).
        5. Suggest breathing ("4-7-8" or "box") ONLY if the user is anxious or stressed, otherwise null.
        6. Choose action_intent:
           - PLAY_BINAURAL if the user is stressed, anxious or needs grounding.
           - SET_TIMER if the user needs focus or mentions working or studying.
           - NONE otherwise.
        7. Report your confidence between 0.0 and 1.0.

        Respond with STRICT JSON only.
        "#,
        mode = mode.as_str(),
        register = register,
    )
}

pub fn user_prompt(history: &str, text: Option<&str>) -> String {
    match text {
        Some(text) => format!("History Context:\n{}\n\nUser Input: {}", history, text),
        None => format!(
            "History Context:\n{}\n\nAnalyze the attached input. Return JSON with reasoning.",
            history
        ),
    }
}

pub const VISION_PROMPT: &str = r#"
Analyze the environment in this photo. DETECT:
1. Buddhist elements (altar, incense, Buddha statue, lotus, prayer beads);
2. Modern office elements (desk, computer, artificial lights);
3. Natural elements (plants, windows, daylight).
Score each between 0.0 and 1.0 and list what you detected.
RULES: buddhist_score > 0.6 -> VN mode; otherwise Universal.
Return JSON.
"#;

pub fn guidance_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "emotion": {
                "type": "STRING",
                "enum": ["anxious", "sad", "joyful", "calm", "neutral"]
            },
            "wisdom_vi": { "type": "STRING" },
            "wisdom_en": { "type": "STRING" },
            "breathing": { "type": "STRING", "enum": ["4-7-8", "box"], "nullable": true },
            "confidence": { "type": "NUMBER" },
            "reasoning_steps": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "3 steps: Detection -> Selection -> Strategy"
            },
            "quantum_metrics": {
                "type": "OBJECT",
                "properties": {
                    "coherence": { "type": "NUMBER" },
                    "entanglement": { "type": "NUMBER" },
                    "presence": { "type": "NUMBER" }
                },
                "required": ["coherence", "entanglement", "presence"]
            },
            "action_intent": {
                "type": "STRING",
                "enum": ["SET_TIMER", "PLAY_BINAURAL", "NONE"]
            }
        },
        "required": ["emotion", "wisdom_vi", "wisdom_en", "reasoning_steps", "action_intent"]
    })
}

pub fn vision_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "buddhist_score": { "type": "NUMBER" },
            "modern_score": { "type": "NUMBER" },
            "natural_score": { "type": "NUMBER" },
            "detected_items": { "type": "ARRAY", "items": { "type": "STRING" } },
            "mode": { "type": "STRING", "enum": ["VN", "Universal"] }
        },
        "required": ["mode", "detected_items", "buddhist_score"]
    })
}
