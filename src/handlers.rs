// src/handlers.rs
use crate::capture::AudioClip;
use crate::capture::pushed::{PushedAudio, PushedFrame};
use crate::models::CulturalMode;
use crate::session::SessionState;
use crate::stage::{BreathNow, Cues};
use crate::{AppState, errors::ZenError};
use actix_web::{Error, HttpResponse, web};
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ReflectRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    pub mode: CulturalMode,
}

#[derive(Debug, Deserialize)]
pub struct MuteRequest {
    pub muted: bool,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// Largest page `GET /history` will return.
pub const MAX_HISTORY_LIMIT: usize = 1000;

fn history_limit(requested: Option<usize>, default: usize) -> Result<usize, ZenError> {
    match requested.unwrap_or(default) {
        0 => Err(ZenError::Validation("limit must be positive".to_string())),
        limit => Ok(limit.min(MAX_HISTORY_LIMIT)),
    }
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    /// The reply text in the session's current language.
    pub advice: Option<String>,
    pub session: SessionState,
    pub cues: Cues,
    pub breath: Option<BreathNow>,
    pub speech_available: bool,
}

fn session_view(data: &AppState, session: SessionState) -> HttpResponse {
    let advice = session
        .reply
        .as_ref()
        .map(|reply| reply.advice(session.mode).to_string());

    HttpResponse::Ok().json(SessionView {
        advice,
        session,
        cues: data.board.snapshot(),
        breath: data.board.breath_now(),
        speech_available: data.board.speech().is_some(),
    })
}

pub async fn reflect(
    data: web::Data<AppState>,
    body: web::Json<ReflectRequest>,
) -> Result<HttpResponse, Error> {
    let state = data.orchestrator.submit_text(&body.text).await?;
    Ok(session_view(&data, state))
}

pub async fn reflect_image(
    data: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, Error> {
    let state = data.orchestrator.submit_image(&body).await?;
    Ok(session_view(&data, state))
}

/// Body is the WAV recording the client made. An empty body is treated as a
/// microphone that produced nothing.
pub async fn voice(data: web::Data<AppState>, body: web::Bytes) -> Result<HttpResponse, Error> {
    let clip = if body.is_empty() {
        AudioClip::mono(Vec::new(), 16_000)
    } else {
        AudioClip::from_wav(&body)?
    };

    let state = data.orchestrator.listen(&PushedAudio::new(clip)).await?;
    Ok(session_view(&data, state))
}

pub async fn scan(data: web::Data<AppState>, body: web::Bytes) -> Result<HttpResponse, Error> {
    let camera = PushedFrame::new(body.to_vec());
    let state = data.orchestrator.scan(&camera).await?;
    Ok(session_view(&data, state))
}

pub async fn cancel_capture(data: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let state = data.orchestrator.cancel_capture()?;
    Ok(session_view(&data, state))
}

pub async fn dismiss(data: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let state = data.orchestrator.dismiss()?;
    Ok(session_view(&data, state))
}

pub async fn set_mode(
    data: web::Data<AppState>,
    body: web::Json<ModeRequest>,
) -> Result<HttpResponse, Error> {
    let state = data.orchestrator.set_mode(body.mode)?;
    Ok(session_view(&data, state))
}

/// Master mute. Allowed in every phase, including while processing.
pub async fn set_mute(data: web::Data<AppState>, body: web::Json<MuteRequest>) -> HttpResponse {
    data.board.set_muted(body.muted);
    info!("Audio {}", if body.muted { "muted" } else { "unmuted" });
    session_view(&data, data.orchestrator.snapshot())
}

pub async fn get_session(data: web::Data<AppState>) -> HttpResponse {
    session_view(&data, data.orchestrator.snapshot())
}

pub async fn get_speech(data: web::Data<AppState>) -> HttpResponse {
    match data.board.speech() {
        Some(wav) => HttpResponse::Ok().content_type("audio/wav").body(wav),
        None => HttpResponse::NotFound().json(serde_json::json!({
            "error": "Not found",
            "message": "No speech available"
        })),
    }
}

pub async fn get_history(
    data: web::Data<AppState>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, Error> {
    let limit = history_limit(query.limit, data.history_depth)?;
    let entries = data.history.recent(limit).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "entries": entries,
        "count": entries.len()
    })))
}

pub async fn health_check(data: web::Data<AppState>) -> HttpResponse {
    let ready = data.history.recent(1).await.is_ok();
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "zenmind",
        "version": env!("CARGO_PKG_VERSION"),
        "history": {
            "backend": data.history_backend,
            "ready": ready
        }
    }))
}
