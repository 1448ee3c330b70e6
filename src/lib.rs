pub mod config;
pub mod error;
pub mod gemini;
pub mod logger;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod server;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{AppConfig, GeminiConfig, OutputConfig, ServerConfig, UploadConfig};
pub use error::{Result, StudioError};
pub use gemini::{GeminiClient, GenerativeBackend, UpstreamOutput, UpstreamRequest};
pub use models::*;
pub use pipeline::ImagePipeline;
pub use storage::ResultWriter;
