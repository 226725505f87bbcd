// src/config.rs
use crate::errors::ZenError;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub tts_model: String,
    pub voice: String,
    pub redis_url: String,
    pub bind_addr: String,
    pub history_depth: usize,
    pub request_timeout: Duration,
    pub speak_replies: bool,
    pub static_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ZenError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ZenError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let api_key = lookup("GEMINI_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ZenError::Config("GEMINI_API_KEY must be set".to_string()))?;

        let history_depth = parse_number("ZEN_HISTORY_DEPTH", &get("ZEN_HISTORY_DEPTH", "5"))?;
        let timeout_secs: u64 =
            parse_number("ZEN_REQUEST_TIMEOUT_SECS", &get("ZEN_REQUEST_TIMEOUT_SECS", "30"))?;
        if timeout_secs == 0 {
            return Err(ZenError::Config(
                "ZEN_REQUEST_TIMEOUT_SECS must be positive".to_string(),
            ));
        }

        Ok(Self {
            api_key,
            base_url: get("GEMINI_BASE_URL", DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: get("ZEN_MODEL", "gemini-2.5-flash"),
            tts_model: get("ZEN_TTS_MODEL", "gemini-2.5-flash-preview-tts"),
            voice: get("ZEN_VOICE", "Kore"),
            redis_url: get("REDIS_URL", "redis://127.0.0.1:6379"),
            bind_addr: get("ZEN_BIND", "127.0.0.1:8080"),
            history_depth,
            request_timeout: Duration::from_secs(timeout_secs),
            speak_replies: parse_flag("ZEN_SPEAK", &get("ZEN_SPEAK", "true"))?,
            static_dir: lookup("ZEN_STATIC_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ZenError> {
    raw.trim()
        .parse()
        .map_err(|_| ZenError::Config(format!("{} is not a valid number: {}", key, raw)))
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, ZenError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ZenError::Config(format!("{} is not a valid flag: {}", key, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ZenError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let cfg = config(&[("GEMINI_API_KEY", "k")]).unwrap();
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.model, "gemini-2.5-flash");
        assert_eq!(cfg.voice, "Kore");
        assert_eq!(cfg.history_depth, 5);
        assert_eq!(cfg.request_timeout, Duration::from_secs(30));
        assert!(cfg.speak_replies);
        assert!(cfg.static_dir.is_none());
    }

    #[test]
    fn api_key_is_required() {
        assert!(matches!(config(&[]), Err(ZenError::Config(_))));
        assert!(matches!(config(&[("GEMINI_API_KEY", " ")]), Err(ZenError::Config(_))));
    }

    #[test]
    fn overrides_and_invalid_values() {
        let cfg = config(&[
            ("GEMINI_API_KEY", "k"),
            ("GEMINI_BASE_URL", "http://localhost:9000/"),
            ("ZEN_HISTORY_DEPTH", "8"),
            ("ZEN_SPEAK", "off"),
            ("ZEN_STATIC_DIR", "ui/dist"),
        ])
        .unwrap();
        assert_eq!(cfg.base_url, "http://localhost:9000");
        assert_eq!(cfg.history_depth, 8);
        assert!(!cfg.speak_replies);
        assert_eq!(cfg.static_dir, Some(PathBuf::from("ui/dist")));

        assert!(config(&[("GEMINI_API_KEY", "k"), ("ZEN_HISTORY_DEPTH", "many")]).is_err());
        assert!(config(&[("GEMINI_API_KEY", "k"), ("ZEN_SPEAK", "maybe")]).is_err());
        assert!(config(&[("GEMINI_API_KEY", "k"), ("ZEN_REQUEST_TIMEOUT_SECS", "0")]).is_err());
    }
}
