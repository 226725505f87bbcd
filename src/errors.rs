// src/errors.rs
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZenError {
    #[error("Inference endpoint error: {0}")]
    Endpoint(String),

    #[error("Reply failed validation: {0}")]
    Schema(String),

    #[error("Inference endpoint timed out after {0}s")]
    Timeout(u64),

    #[error("Capture device error: {0}")]
    Device(String),

    #[error("History store error: {0}")]
    Persistence(String),

    #[error("Audio decode error: {0}")]
    Decode(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("An analysis is already in progress")]
    Busy,

    #[error("Cannot {action} while {phase}")]
    InvalidTransition {
        phase: &'static str,
        action: &'static str,
    },
}

impl ZenError {
    /// Endpoint-side failures: the ones the text path recovers from locally.
    pub fn is_endpoint_failure(&self) -> bool {
        matches!(
            self,
            ZenError::Endpoint(_) | ZenError::Schema(_) | ZenError::Timeout(_)
        )
    }
}

impl ResponseError for ZenError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ZenError::Endpoint(_) | ZenError::Schema(_) | ZenError::Timeout(_) => {
                HttpResponse::ServiceUnavailable().json(serde_json::json!({
                    "error": "AI service error",
                    "message": self.to_string()
                }))
            }
            ZenError::Busy => HttpResponse::Conflict().json(serde_json::json!({
                "error": "Busy",
                "message": self.to_string()
            })),
            ZenError::InvalidTransition { .. } => {
                HttpResponse::Conflict().json(serde_json::json!({
                    "error": "Invalid state",
                    "message": self.to_string()
                }))
            }
            ZenError::Validation(_) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Validation error",
                "message": self.to_string()
            })),
            ZenError::ImageProcessing(_) | ZenError::Decode(_) => {
                HttpResponse::BadRequest().json(serde_json::json!({
                    "error": "Media processing error",
                    "message": self.to_string()
                }))
            }
            ZenError::Device(_) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Capture error",
                "message": self.to_string()
            })),
            ZenError::Persistence(_) => {
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Database error",
                    "message": self.to_string()
                }))
            }
            ZenError::Serialization(_) | ZenError::Config(_) => {
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Data processing error",
                    "message": self.to_string()
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn busy_maps_to_conflict() {
        assert_eq!(ZenError::Busy.error_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn endpoint_failures_are_service_unavailable() {
        for err in [
            ZenError::Endpoint("down".into()),
            ZenError::Schema("bad".into()),
            ZenError::Timeout(30),
        ] {
            assert!(err.is_endpoint_failure());
            assert_eq!(err.error_response().status(), StatusCode::SERVICE_UNAVAILABLE);
        }
        assert!(!ZenError::Device("denied".into()).is_endpoint_failure());
    }
}
