// src/main.rs
use actix_web::{App, HttpServer, middleware, web};
use anyhow::Context;
use log::{info, warn};
use std::sync::Arc;

mod capture;
mod config;
mod errors;
mod handlers;
mod models;
mod prompts;
mod services;
mod session;
mod stage;

use crate::config::Config;
use crate::handlers::{
    cancel_capture, dismiss, get_history, get_session, get_speech, health_check, reflect,
    reflect_image, scan, set_mode, set_mute, voice,
};
use crate::services::{AnalysisClient, HistoryLog, LLMService, MemoryHistory, RedisService};
use crate::session::Orchestrator;
use crate::stage::CueBoard;

const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
    board: Arc<CueBoard>,
    history: Arc<dyn HistoryLog>,
    history_depth: usize,
    history_backend: &'static str,
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PayloadConfig::new(MAX_UPLOAD_BYTES))
        .service(
            web::scope("/api/v1")
                .route("/reflect", web::post().to(reflect))
                .route("/reflect/image", web::post().to(reflect_image))
                .route("/voice", web::post().to(voice))
                .route("/scan", web::post().to(scan))
                .route("/capture/cancel", web::post().to(cancel_capture))
                .route("/dismiss", web::post().to(dismiss))
                .route("/mode", web::put().to(set_mode))
                .route("/mute", web::put().to(set_mute))
                .route("/session", web::get().to(get_session))
                .route("/speech", web::get().to(get_speech))
                .route("/history", web::get().to(get_history)),
        )
        .route("/health", web::get().to(health_check));
}

async fn connect_history(config: &Config) -> (Arc<dyn HistoryLog>, &'static str) {
    match RedisService::new(&config.redis_url).await {
        Ok(redis) => {
            info!("Mood history stored in Redis at {}", config.redis_url);
            let history: Arc<dyn HistoryLog> = Arc::new(redis);
            (history, "redis")
        }
        Err(e) => {
            warn!("Redis unavailable ({}), keeping history in memory", e);
            let history: Arc<dyn HistoryLog> = Arc::new(MemoryHistory::new());
            (history, "memory")
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting ZenMind service...");

    let config = Config::from_env().context("loading configuration")?;

    // Initialize services
    let (history, history_backend) = connect_history(&config).await;
    let endpoint = Arc::new(LLMService::new(&config).context("building inference client")?);
    let analysis = Arc::new(AnalysisClient::new(
        endpoint,
        history.clone(),
        config.history_depth,
        config.request_timeout,
    ));
    let board = Arc::new(CueBoard::new());
    let orchestrator = Arc::new(Orchestrator::new(
        analysis,
        board.clone(),
        config.speak_replies,
    ));

    let app_state = AppState {
        orchestrator,
        board,
        history,
        history_depth: config.history_depth,
        history_backend,
    };
    let static_dir = config.static_dir.clone();

    info!("Starting HTTP server on {}", config.bind_addr);

    HttpServer::new(move || {
        let app = App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .configure(routes);

        match &static_dir {
            Some(dir) => app.service(actix_files::Files::new("/", dir).index_file("index.html")),
            None => app,
        }
    })
    .bind(&config.bind_addr)
    .with_context(|| format!("binding {}", config.bind_addr))?
    .run()
    .await?;

    Ok(())
}
