// src/services/mod.rs
pub mod analysis_client;
pub mod history;
pub mod image_processor;
pub mod llm_service;
pub mod redis_service;

pub use analysis_client::AnalysisClient;
pub use history::{HistoryLog, MemoryHistory};
pub use image_processor::ImageProcessor;
pub use llm_service::LLMService;
pub use redis_service::RedisService;
