//! Backend for the AI misinformation detector: accounts, per-user LLM
//! settings, scan analysis through OpenRouter, and scan history.

pub mod analysis;
pub mod config;
pub mod db;
pub mod error;
pub mod history;
pub mod llm;
pub mod settings;
pub mod web;

pub use config::AppConfig;
pub use error::AppError;
pub use web::{AppState, build_router};
