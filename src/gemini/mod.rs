pub mod client;
pub mod types;

pub use client::{AuthMode, GeminiClient, GeminiConfig, TextGenerator, UpstreamError};
