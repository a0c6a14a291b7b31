//! LoiLibre: retrieval-augmented question answering over French law codes

pub mod api;
pub mod cli;
pub mod config;
pub mod conversation_log;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod logging;
pub mod models;
pub mod rag;

#[cfg(test)]
mod config_tests;

pub use config::AppConfig;
pub use errors::*;
